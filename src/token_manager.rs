//! Token lifecycle cache.

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{ExpiringToken, Token, TokenProvider};

/// Caches tokens from an inner provider until they expire.
pub struct TokenManager<Provider>
where
    Provider: TokenProvider,
{
    provider: Provider,
    cached_token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error<RenewalError> {
    #[error(transparent)]
    Provider(RenewalError),
}

/// The cached token record. Replaced wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: Instant,
}

impl CachedToken {
    pub fn from_expiring_token<T: ExpiringToken>(token: &T) -> Self {
        Self {
            access_token: token.access_token().to_owned(),
            expires_at: token.expires_at(),
        }
    }

    /// A record is valid strictly before `expires_at`.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl Token for CachedToken {
    fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl<Provider> TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: ExpiringToken,
{
    pub fn new(provider: Provider) -> Self {
        let cached_token = Mutex::const_new(None);
        Self {
            provider,
            cached_token,
        }
    }

    async fn fetch_new_token(&self) -> Result<CachedToken, Error<Provider::Error>> {
        let token = self
            .provider
            .get_auth_token()
            .await
            .map_err(Error::Provider)?;
        Ok(CachedToken::from_expiring_token(&token))
    }

    /// Returns the cached record, fetching a fresh one when none is valid.
    ///
    /// The lock is held across the fetch: concurrent callers finding an
    /// expired record collapse into a single in-flight request, and all of
    /// them observe the record it installs. A failed fetch leaves the cache
    /// untouched.
    pub async fn get_token(&self) -> Result<CachedToken, Error<Provider::Error>> {
        let mut cached_token = self.cached_token.lock().await;

        if let Some(cached_token) = cached_token.as_ref() {
            if !cached_token.is_expired() {
                debug!(message = "Using preexisting token", token_expires_at = ?cached_token.expires_at);
                return Ok(cached_token.clone());
            }
            debug!(message = "Existing token expired, refreshing", token_expires_at = ?cached_token.expires_at);
        }

        info!(
            message = "No active token found, about to get a new one",
            token_is_stale = cached_token.is_some(),
        );

        let new_record = self.fetch_new_token().await?;
        cached_token.replace(new_record.clone());

        debug!(message = "Got new token", token_expires_at = ?new_record.expires_at);

        Ok(new_record)
    }

    /// Returns a currently valid bearer token.
    pub async fn get_access_token(&self) -> Result<String, Error<Provider::Error>> {
        let token = self.get_token().await?;
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl<Provider> TokenProvider for TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: ExpiringToken,
{
    type Token = CachedToken;
    type Error = Error<Provider::Error>;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
        let token = self.get_token().await?;
        Ok(token)
    }
}
