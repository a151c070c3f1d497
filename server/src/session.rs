//! Client-held sessions.
//!
//! The identity lives entirely in two cookies: the username and a JSON array
//! of group names. They are neither signed nor encrypted, so a client can
//! rewrite them; group membership is only verified against the identity
//! gateway at sign-in.

use std::{collections::BTreeSet, convert::Infallible};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const USERNAME_COOKIE: &str = "username";
pub const GROUPS_COOKIE: &str = "usergroups";
pub const SESSION_TTL: Duration = Duration::seconds(3600);

/// Who the request claims to come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub groups: BTreeSet<String>,
    pub authenticated: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(username: impl Into<String>, groups: BTreeSet<String>) -> Self {
        Self {
            username: username.into(),
            groups,
            authenticated: true,
        }
    }

    /// Anything missing or malformed yields [`Identity::anonymous`].
    pub fn from_jar(jar: &CookieJar) -> Self {
        let Some(username) = jar
            .get(USERNAME_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|name| !name.is_empty())
        else {
            return Self::anonymous();
        };
        let Some(groups) = jar
            .get(GROUPS_COOKIE)
            .and_then(|c| serde_json::from_str::<Vec<String>>(c.value()).ok())
        else {
            return Self::anonymous();
        };
        Self::signed_in(username, groups.into_iter().collect())
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_jar(&CookieJar::from_headers(&parts.headers)))
    }
}

/// Writes and clears the session cookies.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionCookies {
    pub secure: bool,
}

impl SessionCookies {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn establish(&self, jar: CookieJar, username: &str, groups: &BTreeSet<String>) -> CookieJar {
        let groups_json = serde_json::to_string(groups).unwrap_or_else(|_| "[]".to_string());
        jar.add(self.cookie(USERNAME_COOKIE, username.to_string(), SESSION_TTL))
            .add(self.cookie(GROUPS_COOKIE, groups_json, SESSION_TTL))
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.cookie(USERNAME_COOKIE, String::new(), Duration::ZERO))
            .add(self.cookie(GROUPS_COOKIE, String::new(), Duration::ZERO))
    }

    fn cookie(&self, name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(max_age)
            .build()
    }
}
