//! URL-aware cookie jar shared by every call of one client instance.
//!
//! A [`CookieJar`] is a cheap handle over a [`cookie_store::CookieStore`];
//! clones share one store. Each request takes the lock once to render its
//! `Cookie` header, and each response takes it once to apply all of its
//! `set-cookie` headers, so a concurrent read never observes half of a
//! response's cookies.

use std::sync::Arc;

use async_lock::Mutex;
use cookie::Cookie;
use cookie_store::CookieStore;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Shared, mutable cookie store.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    store: Arc<Mutex<CookieStore>>,
}

/// Jars compare by identity: two handles are equal when they share a store.
impl PartialEq for CookieJar {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl CookieJar {
    /// New empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `Cookie` header value for `url`; empty when nothing matches.
    pub async fn cookie_string(&self, url: &Url) -> String {
        let store = self.store.lock().await;
        store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Store one `set-cookie` header value received from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] when the header cannot be parsed or
    /// names a domain `url` may not set.
    pub async fn set_cookie(&self, header: &str, url: &Url) -> Result<()> {
        let cookie = Cookie::parse(header.to_owned())
            .map_err(|err| Error::InvalidRequest(format!("rejected cookie {header:?}: {err}")))?;
        let mut store = self.store.lock().await;
        store
            .insert_raw(&cookie, url)
            .map_err(|err| Error::InvalidRequest(format!("rejected cookie {header:?}: {err}")))?;
        Ok(())
    }

    /// Apply every `set-cookie` header of one response under a single lock.
    ///
    /// Unparsable or foreign cookies are skipped.
    pub(crate) async fn store_response_cookies(&self, url: &Url, headers: Vec<String>) -> usize {
        if headers.is_empty() {
            return 0;
        }
        let parsed: Vec<Cookie<'static>> = headers
            .into_iter()
            .filter_map(|header| match Cookie::parse(header) {
                Ok(cookie) => Some(cookie),
                Err(err) => {
                    debug!(%url, %err, "ignoring unparsable set-cookie header");
                    None
                }
            })
            .collect();

        let mut store = self.store.lock().await;
        let mut stored = 0;
        for cookie in &parsed {
            match store.insert_raw(cookie, url) {
                Ok(_) => stored += 1,
                Err(err) => debug!(%url, name = cookie.name(), %err, "cookie not stored"),
            }
        }
        stored
    }

    /// Number of live cookies.
    pub async fn len(&self) -> usize {
        self.store.lock().await.iter_unexpired().count()
    }

    /// Whether the jar holds no live cookie.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
