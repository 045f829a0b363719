//! Client credentials authentication for the Azure Bot Framework.
//!
//! The crate requests bearer tokens from the Bot Framework login authority
//! using the OAuth2 client credentials flow and caches them until they
//! expire. HTTP goes through the [`Transport`] capability: production code
//! hands in a [`reqwest::Client`], tests hand in a stub.
//!
//! [`ClientCredentials`] performs one token exchange; wrapping it in a
//! [`TokenManager`] adds the cache so repeated calls only hit the network
//! once per expiry window.

use tokio::time::Instant;

pub mod client_credentials;
pub mod token_manager;
pub mod transport;

pub use client_credentials::ClientCredentials;
pub use token_manager::TokenManager;
pub use transport::{Response, Transport};

/// Application identity used to request access tokens.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub app_id: String,
    pub app_secret: String,
}

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    type Token: Token;
    type Error: Send + Sync;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error>;
}

pub trait Token: Send {
    fn access_token(&self) -> &str;
}

pub trait ExpiringToken: Token {
    fn expires_at(&self) -> Instant;
}
