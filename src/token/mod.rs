//! Token module - cached token lifecycle per target host

pub mod lifecycle;

pub use lifecycle::{TokenAuthority, TokenError, TokenManager};
