//! Platform authentication helpers.
//!
//! Credentials are checked by an external identity gateway: a single JSON POST
//! that answers whether the password is valid and which directory groups the
//! user belongs to. Nothing here retries; one failed call is reported as-is.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Upper bound for one gateway round trip.
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build gateway client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("identity gateway unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("identity gateway sent an undecodable response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Username and password as posted to the gateway.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The gateway's answer for one set of credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayVerdict {
    pub success: bool,
    pub groups: Vec<String>,
}

#[derive(Deserialize)]
struct WireVerdict {
    success: bool,
    #[serde(default)]
    groups: Option<Vec<String>>,
}

impl From<WireVerdict> for GatewayVerdict {
    fn from(wire: WireVerdict) -> Self {
        Self {
            success: wire.success,
            groups: wire.groups.unwrap_or_default(),
        }
    }
}

/// Service of record for credential checks.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<GatewayVerdict, GatewayError>;
}

/// [`IdentityGateway`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpIdentityGateway {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpIdentityGateway {
    pub fn new(endpoint: Url) -> Result<Self, GatewayError> {
        Self::with_timeout(endpoint, GATEWAY_TIMEOUT)
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    #[instrument(name = "gateway.authenticate", skip_all, fields(username = %credentials.username))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<GatewayVerdict, GatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(credentials)
            .send()
            .await
            .map_err(GatewayError::Transport)?;
        // A rejection may arrive with a 4xx status; the body decides.
        let status = response.status();
        let body = response.bytes().await.map_err(GatewayError::Transport)?;
        let wire: WireVerdict = serde_json::from_slice(&body).map_err(GatewayError::Decode)?;
        debug!(%status, success = wire.success, "gateway answered");
        Ok(wire.into())
    }
}
