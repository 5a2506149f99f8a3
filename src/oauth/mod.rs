//! OAuth module - identity provider collaborators
//!
//! Client registration, token validation/refresh/revocation and the
//! interactive PKCE authorization-code grant.

pub mod client;
pub mod credential;
pub mod grant;
pub mod pkce;
pub mod types;

pub use client::OAuthClient;
pub use credential::CredentialStore;
pub use grant::{
    authorization_request, begin_authorization, complete_authorization, prompt_for_code, AuthorizationRequest,
};
pub use pkce::{code_challenge_s256, generate_pkce_pair, PkcePair};
pub use types::{AuthError, TokenGrant};
