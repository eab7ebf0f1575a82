//! Credentials accepted by the legacy `auth` option.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

/// Value of the `auth` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `auth: { user, pass }`, sent as HTTP Basic credentials.
    Basic {
        /// User name.
        user: String,
        /// Password; a missing password encodes as `user:`.
        pass: Option<String>,
    },
    /// `auth: { bearer }`.
    Bearer(String),
}

impl Auth {
    /// Basic credentials.
    pub fn basic(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self::Basic {
            user: user.into(),
            pass: Some(pass.into()),
        }
    }

    /// Bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// `Authorization` header value for these credentials.
    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { user, pass } => {
                let credentials = match pass {
                    Some(pass) => format!("{user}:{pass}"),
                    None => format!("{user}:"),
                };
                format!("Basic {}", BASE64_STANDARD.encode(credentials.as_bytes()))
            }
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }
}
