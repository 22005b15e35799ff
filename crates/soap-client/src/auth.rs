//! Authentication capability.
//!
//! The dispatcher asks the [`Authenticator`] synchronously whenever the
//! server answers with a challenge. The authenticator owns the retry policy:
//! returning credentials retries the request, returning `None` gives up.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// User name and password sent with HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
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

    /// Value of the `Authorization` header.
    pub fn basic_authorization(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
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

/// A challenge reported by the transport for one call.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub endpoint: String,
    /// Raw `WWW-Authenticate` header, when the server sent one.
    pub www_authenticate: Option<String>,
    /// 1 for the first challenge of this call, then 2, 3, ...
    pub attempt: u32,
}

impl AuthChallenge {
    /// `realm` parameter of the challenge, if present.
    pub fn realm(&self) -> Option<&str> {
        let header = self.www_authenticate.as_deref()?;
        let start = header.find("realm=")? + "realm=".len();
        let rest = &header[start..];
        match rest.strip_prefix('"') {
            Some(quoted) => quoted.split('"').next(),
            None => rest.split([',', ' ']).next(),
        }
    }
}

/// Answers authentication challenges.
pub trait Authenticator: Send + Sync {
    /// Credentials to retry with, or `None` to decline.
    fn credentials(&self, challenge: &AuthChallenge) -> Option<Credentials>;
}

/// Fixed basic-auth credentials, offered once per call.
#[derive(Debug, Clone)]
pub struct BasicAuthentication {
    credentials: Credentials,
}

impl BasicAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
        }
    }
}

impl Authenticator for BasicAuthentication {
    fn credentials(&self, challenge: &AuthChallenge) -> Option<Credentials> {
        // A second challenge means the server rejected these credentials.
        (challenge.attempt == 1).then(|| self.credentials.clone())
    }
}
