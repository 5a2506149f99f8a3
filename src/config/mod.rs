//! Configuration Management Module
//!
//! Client settings, typed per-host records and their private on-disk store.

pub mod settings;
pub mod storage;
pub mod types;

pub use settings::{
    ClientConfig, Environment, ENVIRONMENT_VAR, GENERAL_SECTION, NETWORK_TIMEOUT, PROTOCOL_VERSION,
    SERVICE_ACCOUNT, TOKEN_PROMPT,
};
pub use storage::{ConfigStore, Section, StorageError, StoreFile, STORE_VERSION};
pub use types::{
    AccountMap, Credential, Policy, Record, RecordError, Token, TokenKind, TokenState,
};
