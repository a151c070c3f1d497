use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::session::Identity;

pub const LOGIN_PATH: &str = "/login";

/// `302 Found` to `location`.
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// A signed-in identity. Anyone else is sent to the login page before the
/// handler runs.
///
/// Group membership is checked once, at sign-in; the cookies are trusted
/// afterwards.
#[derive(Clone, Debug)]
pub struct Authorized(pub Identity);

impl<S> FromRequestParts<S> for Authorized
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_jar(&CookieJar::from_headers(&parts.headers));
        if identity.authenticated {
            Ok(Self(identity))
        } else {
            Err(found(LOGIN_PATH))
        }
    }
}
