use std::fmt;
use std::sync::{Arc, OnceLock};

use http::Method;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::{ClientBackend, DefaultBackend};
use crate::cookie::CookieJar;
use crate::error::Result;
use crate::fetch::execute;
use crate::options::{Call, Jar, Options, RequestOptions, normalize};
use crate::pending::Pending;
use crate::response::Response;

/// A request instance: a backend plus default options.
///
/// Cloning shares the backend, the defaults and the instance cookie jar.
/// [`Client::defaults`] derives a new instance with its own jar.
pub struct Client<B: ClientBackend = DefaultBackend> {
    backend: Arc<B>,
    defaults: Options,
    jar: Arc<OnceLock<CookieJar>>,
}

impl<B: ClientBackend> Clone for Client<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            defaults: self.defaults.clone(),
            jar: Arc::clone(&self.jar),
        }
    }
}

impl<B: ClientBackend> fmt::Debug for Client<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.defaults)
            .field("jar", &self.jar.get())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Instance over the default HTTPS backend with no defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(DefaultBackend::new())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! verbs {
    ($($name:ident, $with_callback:ident => $method:ident;)*) => {
        $(
            #[doc = concat!("Like [`Client::request`] with the method forced to `", stringify!($method), "`.")]
            ///
            /// # Errors
            ///
            /// Returns [`Error::MissingUrl`](crate::Error::MissingUrl) when no URL is given.
            pub fn $name(&self, call: impl Into<Call>) -> Result<Pending> {
                self.dispatch(call.into(), Some(Method::$method))
            }

            #[doc = concat!("Like [`Client::request_with_callback`] with the method forced to `", stringify!($method), "`.")]
            pub fn $with_callback<F>(&self, call: impl Into<Call>, callback: F) -> JoinHandle<()>
            where
                F: FnOnce(Result<Response>) + Send + 'static,
            {
                self.dispatch_with_callback(call.into(), Some(Method::$method), callback)
            }
        )*
    };
}

impl<B: ClientBackend> Client<B> {
    /// Instance over a custom backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            defaults: Options::new(),
            jar: Arc::new(OnceLock::new()),
        }
    }

    /// New instance whose defaults are these defaults overlaid with `partial`.
    ///
    /// Headers merge key-wise; every other field set in `partial` wins. The
    /// backend is shared, the cookie jar is not.
    #[must_use]
    pub fn defaults(&self, partial: Options) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            defaults: self.defaults.merge(&partial),
            jar: Arc::new(OnceLock::new()),
        }
    }

    /// Defaults applied to every call of this instance.
    pub const fn default_options(&self) -> &Options {
        &self.defaults
    }

    /// A new, empty cookie jar.
    #[must_use]
    pub fn jar(&self) -> CookieJar {
        CookieJar::new()
    }

    /// The jar used by calls made with `jar: true`, created on first use.
    pub fn instance_jar(&self) -> &CookieJar {
        self.jar.get_or_init(CookieJar::new)
    }

    fn resolve_jar(&self, options: &RequestOptions) -> Option<CookieJar> {
        match &options.jar {
            Jar::Disabled => None,
            Jar::Enabled => Some(self.instance_jar().clone()),
            Jar::Explicit(jar) => Some(jar.clone()),
        }
    }

    /// Dispatch a call and return its dual-mode result.
    ///
    /// The request is sent immediately; see [`Pending`] for how the body is
    /// consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingUrl`](crate::Error::MissingUrl) when neither the
    /// call nor the defaults name a URL.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn request(&self, call: impl Into<Call>) -> Result<Pending> {
        self.dispatch(call.into(), None)
    }

    /// Dispatch a call and hand its buffered outcome to `callback`.
    ///
    /// Every failure, including a missing URL, reaches the callback. On a
    /// status failure the response is available through
    /// [`Error::response`](crate::Error::response).
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn request_with_callback<F>(&self, call: impl Into<Call>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        self.dispatch_with_callback(call.into(), None, callback)
    }

    verbs! {
        get, get_with_callback => GET;
        post, post_with_callback => POST;
        put, put_with_callback => PUT;
        delete, delete_with_callback => DELETE;
        patch, patch_with_callback => PATCH;
        head, head_with_callback => HEAD;
        options, options_with_callback => OPTIONS;
    }

    fn dispatch(&self, call: Call, verb: Option<Method>) -> Result<Pending> {
        let options = normalize(&self.defaults, call, verb)?;
        let jar = self.resolve_jar(&options);
        Ok(Pending::spawn(Arc::clone(&self.backend), options, jar))
    }

    fn dispatch_with_callback<F>(&self, call: Call, verb: Option<Method>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let prepared = normalize(&self.defaults, call, verb).map(|options| {
            let jar = self.resolve_jar(&options);
            (options, jar)
        });
        tokio::spawn(async move {
            let outcome = match prepared {
                Ok((options, jar)) => execute(backend.as_ref(), &options, jar.as_ref()).await,
                Err(err) => Err(err),
            };
            if let Err(err) = &outcome {
                debug!(kind = %err.kind(), error = %err, "request failed");
            }
            callback(outcome);
        })
    }
}
