//! Authorize using the client credentials flow.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::transport::{check_status, ServerError, Transport};
use crate::{Configuration, ExpiringToken, TokenProvider};

/// Token endpoint of the Bot Framework login authority.
pub const TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";

/// Resource the requested tokens are scoped to.
pub const SCOPE: &str = "https://api.botframework.com/.default";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, thiserror::Error)]
pub enum Error<TransportError> {
    /// The request/response exchange itself failed.
    #[error(transparent)]
    Transport(TransportError),
    /// The authority answered with a non-success status.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// The response body was not a token response.
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

pub struct ClientCredentials<T> {
    pub transport: T,
    pub configuration: Configuration,
}

impl<T> ClientCredentials<T>
where
    T: Transport,
{
    /// Perform the client credentials exchange.
    pub async fn perform(&self) -> Result<AuthResponse, Error<T::Error>> {
        let params = &[
            ("grant_type", "client_credentials"),
            ("client_id", self.configuration.app_id.as_str()),
            ("client_secret", self.configuration.app_secret.as_str()),
            ("scope", SCOPE),
        ];
        let body =
            serde_urlencoded::to_string(params).expect("encoding string pairs cannot fail");

        let response = self
            .transport
            .post(TOKEN_ENDPOINT, FORM_CONTENT_TYPE, body.into_bytes())
            .await
            .map_err(Error::Transport)?;
        check_status(&response)?;

        let auth_response = serde_json::from_slice(&response.body)?;
        Ok(auth_response)
    }
}

/// Wire shape of the authority's reply.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// The issued bearer token.
    access_token: String,
    /// The amount of time the token is valid, in seconds.
    expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Token {
    /// Expiry counts from `requested_at`, the instant captured before the
    /// request went out. Request latency and server clock skew shorten the
    /// cached validity window, never extend it.
    fn from_response(response: AuthResponse, requested_at: Instant) -> Self {
        let AuthResponse {
            access_token,
            expires_in,
        } = response;
        Self {
            access_token,
            expires_at: requested_at + Duration::from_secs(expires_in),
        }
    }
}

#[async_trait::async_trait]
impl<T> TokenProvider for ClientCredentials<T>
where
    T: Transport,
{
    type Token = Token;
    type Error = Error<T::Error>;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
        let requested_at = Instant::now();
        let auth_response = self.perform().await?;
        Ok(Token::from_response(auth_response, requested_at))
    }
}

impl crate::Token for Token {
    fn access_token(&self) -> &str {
        self.access_token.as_str()
    }
}

impl ExpiringToken for Token {
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::transport::Response;
    use crate::Token as _;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct StubError(String);

    struct StubTransport {
        reply: Mutex<Option<Result<Response, StubError>>>,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    impl StubTransport {
        fn replying(reply: Result<Response, StubError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for StubTransport {
        type Error = StubError;

        async fn post(
            &self,
            url: &str,
            content_type: &str,
            body: Vec<u8>,
        ) -> Result<Response, StubError> {
            self.seen.lock().unwrap().push((
                url.to_owned(),
                content_type.to_owned(),
                String::from_utf8(body).unwrap(),
            ));
            self.reply.lock().unwrap().take().expect("no reply left")
        }
    }

    fn flow(transport: StubTransport) -> ClientCredentials<StubTransport> {
        ClientCredentials {
            transport,
            configuration: Configuration {
                app_id: "ApplicationID".into(),
                app_secret: "ApplicationSecret".into(),
            },
        }
    }

    fn token_reply(json: &str) -> Result<Response, StubError> {
        Ok(Response {
            status_code: 200,
            body: json.as_bytes().to_vec(),
        })
    }

    #[tokio::test]
    async fn requests_a_token_with_form_encoded_credentials() {
        let flow = flow(StubTransport::replying(token_reply(
            r#"{"expires_in":3600,"access_token":"sample token"}"#,
        )));

        let token = flow.get_auth_token().await.unwrap();
        assert_eq!(token.access_token(), "sample token");

        let seen = flow.transport.seen.lock().unwrap();
        let (url, content_type, body) = &seen[0];
        assert_eq!(url, TOKEN_ENDPOINT);
        assert_eq!(content_type, "application/x-www-form-urlencoded");
        assert_eq!(
            body,
            "grant_type=client_credentials&client_id=ApplicationID\
             &client_secret=ApplicationSecret\
             &scope=https%3A%2F%2Fapi.botframework.com%2F.default"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_anchored_before_the_exchange() {
        let flow = flow(StubTransport::replying(token_reply(
            r#"{"expires_in":3600,"access_token":"sample token"}"#,
        )));

        let requested_at = Instant::now();
        let token = flow.get_auth_token().await.unwrap();
        assert_eq!(
            token.expires_at(),
            requested_at + Duration::from_secs(3600)
        );
    }

    #[tokio::test]
    async fn transport_errors_pass_through_unchanged() {
        let flow = flow(StubTransport::replying(Err(StubError(
            "error message".into(),
        ))));

        let err = flow.get_auth_token().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.to_string(), "error message");
    }

    #[tokio::test]
    async fn a_non_success_status_is_an_error() {
        let flow = flow(StubTransport::replying(Ok(Response {
            status_code: 400,
            body: b"bad request".to_vec(),
        })));

        let err = flow.get_auth_token().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Server(ServerError { status_code: 400 })
        ));
    }

    #[tokio::test]
    async fn a_malformed_body_is_a_decode_error() {
        let flow = flow(StubTransport::replying(token_reply("not json")));

        let err = flow.get_auth_token().await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
