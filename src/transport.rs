//! The injected HTTP capability.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Raw outcome of one request/response exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
}

/// One-shot HTTP POST capability.
///
/// An implementation performs a single exchange and hands back the raw
/// status and body; interpreting either is the caller's business.
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync;

    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
#[error("{status_code} status code")]
pub struct ServerError {
    pub status_code: u16,
}

pub fn check_status(response: &Response) -> Result<(), ServerError> {
    if !(200..300).contains(&response.status_code) {
        return Err(ServerError {
            status_code: response.status_code,
        });
    }
    Ok(())
}

#[async_trait]
impl Transport for reqwest::Client {
    type Error = reqwest::Error;

    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, Self::Error> {
        let response = reqwest::Client::post(self, url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Response { status_code, body })
    }
}
