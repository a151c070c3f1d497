use platform_authn::{Credentials, IdentityGateway};
use platform_authz::AccessPolicy;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::session::Identity;

#[derive(Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Why a sign-in attempt did not produce a session.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("username or password missing")]
    MissingCredentials,
    #[error("identity gateway unreachable")]
    GatewayUnreachable,
    #[error("credentials rejected")]
    CredentialsRejected,
    #[error("no allowed group")]
    AccessDenied,
}

impl LoginError {
    /// Text shown on the login page. Gateway and credential failures share a
    /// message.
    pub fn user_message(self) -> &'static str {
        match self {
            LoginError::MissingCredentials => "Enter your username and password.",
            LoginError::GatewayUnreachable | LoginError::CredentialsRejected => {
                "Sign-in failed. Check your username and password or try again later."
            }
            LoginError::AccessDenied => "You do not have access. Contact your administrator.",
        }
    }
}

/// Checks the form against the gateway and the access policy.
#[instrument(name = "login.sign_in", skip_all, fields(username = %form.username.trim()))]
pub async fn sign_in(
    gateway: &dyn IdentityGateway,
    policy: &AccessPolicy,
    form: &LoginForm,
) -> Result<Identity, LoginError> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(LoginError::MissingCredentials);
    }

    let verdict = gateway
        .authenticate(&Credentials::new(username, form.password.clone()))
        .await
        .map_err(|err| {
            warn!(error = %err, "identity gateway call failed");
            LoginError::GatewayUnreachable
        })?;
    if !verdict.success {
        info!("credentials rejected");
        return Err(LoginError::CredentialsRejected);
    }
    if !policy.is_allowed(&verdict.groups) {
        info!("signed in without an allowed group");
        return Err(LoginError::AccessDenied);
    }

    info!("signed in");
    Ok(Identity::signed_in(
        username,
        verdict.groups.into_iter().collect(),
    ))
}
