//! Legacy request options and their normalization.
//!
//! [`Options`] is the partial, mergeable record used both for instance
//! defaults and for per-call options. [`normalize`] folds the defaults, the
//! call and an optional forced verb into one canonical [`RequestOptions`].
//!
//! Options can be built fluently or deserialized from a legacy-shaped JSON
//! object:
//!
//! ```
//! use request_shim::Options;
//!
//! let options = Options::from_json(serde_json::json!({
//!     "uri": "https://api.example/posts",
//!     "qs": { "page": 2 },
//!     "json": true,
//!     "encoding": null,
//! }))
//! .unwrap();
//! assert!(options.is_json());
//! ```

use core::fmt;
use core::time::Duration;
use std::marker::PhantomData;

use bytes::Bytes;
use http::Method;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::auth::Auth;
use crate::cookie::CookieJar;
use crate::error::{Error, Result};

/// Default number of redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Ordered header list with case-insensitive names.
///
/// Setting a header replaces every existing value with the same name, so a
/// merge never leaves two spellings of one header behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Empty header list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name`, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    /// Remove `name`.
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Overlay `other` key-wise; `other` wins on conflict.
    pub fn merge(&mut self, other: &Self) {
        for (name, value) in &other.0 {
            self.set(name.clone(), value.clone());
        }
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no header is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

/// Outgoing payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw bytes, never re-encoded.
    Bytes(Bytes),
    /// Text.
    Text(String),
    /// A structured value, serialized to JSON text on the wire.
    Json(serde_json::Value),
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Decode as UTF-8 text (and JSON when `json` is set).
    #[default]
    Utf8,
    /// Legacy `encoding: null`: hand back the raw bytes.
    Binary,
}

/// Value of the `jar` option.
#[derive(Debug, Clone, PartialEq)]
pub enum Jar {
    /// `jar: false`.
    Disabled,
    /// `jar: true`: use the jar owned by the calling instance.
    Enabled,
    /// A caller-supplied jar, shared by reference.
    Explicit(CookieJar),
}

impl From<bool> for Jar {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

impl From<CookieJar> for Jar {
    fn from(jar: CookieJar) -> Self {
        Self::Explicit(jar)
    }
}

/// Partial request options.
///
/// Unset fields fall through to the instance defaults when merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "OptionsRepr")]
pub struct Options {
    url: Option<String>,
    base_url: Option<String>,
    method: Option<Method>,
    headers: Headers,
    body: Option<RequestBody>,
    json: Option<bool>,
    form: Option<Vec<(String, String)>>,
    qs: Option<Vec<(String, String)>>,
    auth: Option<Auth>,
    encoding: Option<Encoding>,
    timeout: Option<Duration>,
    jar: Option<Jar>,
    follow_redirect: Option<bool>,
    max_redirects: Option<u32>,
}

impl Options {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a legacy options object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] when the object does not match the
    /// legacy vocabulary.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|err| Error::InvalidRequest(err.to_string()))
    }

    /// Target URL (legacy `url`/`uri`).
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Base URL the target is resolved against (legacy `baseUrl`).
    #[must_use]
    pub fn base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set one header, replacing any value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Overlay a header list.
    #[must_use]
    pub fn headers(mut self, headers: &Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    /// Request payload.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Legacy `json` flag: encode the body as JSON and parse the response.
    #[must_use]
    pub fn json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// Form fields, sent as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn form<K, V, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.form = Some(pairs(fields));
        self
    }

    /// Query-string entries appended to the URL. Repeated keys are kept.
    #[must_use]
    pub fn qs<K, V, I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.qs = Some(pairs(entries));
        self
    }

    /// Credentials.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Response decoding.
    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Abort the call when it has not completed within `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cookie jar selection.
    #[must_use]
    pub fn jar(mut self, jar: impl Into<Jar>) -> Self {
        self.jar = Some(jar.into());
        self
    }

    /// Whether 3xx responses are followed.
    #[must_use]
    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = Some(follow);
        self
    }

    /// Redirect limit.
    #[must_use]
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Whether `json` is set to true.
    pub fn is_json(&self) -> bool {
        self.json == Some(true)
    }

    /// Headers set on these options.
    pub const fn header_list(&self) -> &Headers {
        &self.headers
    }

    /// Target URL, if set.
    pub fn target(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Overlay `over` onto these options.
    ///
    /// Headers merge key-wise with `over` winning; every other field set in
    /// `over` replaces the value here.
    #[must_use]
    pub fn merge(&self, over: &Self) -> Self {
        let mut headers = self.headers.clone();
        headers.merge(&over.headers);
        Self {
            url: over.url.clone().or_else(|| self.url.clone()),
            base_url: over.base_url.clone().or_else(|| self.base_url.clone()),
            method: over.method.clone().or_else(|| self.method.clone()),
            headers,
            body: over.body.clone().or_else(|| self.body.clone()),
            json: over.json.or(self.json),
            form: over.form.clone().or_else(|| self.form.clone()),
            qs: over.qs.clone().or_else(|| self.qs.clone()),
            auth: over.auth.clone().or_else(|| self.auth.clone()),
            encoding: over.encoding.or(self.encoding),
            timeout: over.timeout.or(self.timeout),
            jar: over.jar.clone().or_else(|| self.jar.clone()),
            follow_redirect: over.follow_redirect.or(self.follow_redirect),
            max_redirects: over.max_redirects.or(self.max_redirects),
        }
    }
}

fn pairs<K, V, I>(entries: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value.to_string()))
        .collect()
}

/// Canonical options for one call, produced by [`normalize`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) url: String,
    pub(crate) base_url: Option<String>,
    pub(crate) method: Method,
    pub(crate) headers: Headers,
    pub(crate) body: Option<RequestBody>,
    pub(crate) json: bool,
    pub(crate) form: Option<Vec<(String, String)>>,
    pub(crate) qs: Vec<(String, String)>,
    pub(crate) auth: Option<Auth>,
    pub(crate) encoding: Encoding,
    pub(crate) timeout: Option<Duration>,
    pub(crate) jar: Jar,
    pub(crate) follow_redirect: bool,
    pub(crate) max_redirects: u32,
}

impl RequestOptions {
    /// Target URL as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Caller headers, defaults merged in.
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Whether `json` is in effect.
    pub const fn json(&self) -> bool {
        self.json
    }

    /// Response decoding.
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Jar selection.
    pub const fn jar(&self) -> &Jar {
        &self.jar
    }
}

/// The three legacy call shapes: `(url)`, `(url, options)` and `(options)`.
#[derive(Debug, Clone)]
pub enum Call {
    /// `request(url)`.
    Url(String),
    /// `request(options)`; the URL is embedded.
    Options(Options),
    /// `request(url, options)`.
    UrlWithOptions(String, Options),
}

impl Call {
    fn into_options(self) -> Options {
        match self {
            Self::Url(url) => Options::new().url(url),
            Self::Options(options) => options,
            Self::UrlWithOptions(url, options) => options.url(url),
        }
    }
}

impl From<&str> for Call {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for Call {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&String> for Call {
    fn from(url: &String) -> Self {
        Self::Url(url.clone())
    }
}

impl From<Url> for Call {
    fn from(url: Url) -> Self {
        Self::Url(url.into())
    }
}

impl From<Options> for Call {
    fn from(options: Options) -> Self {
        Self::Options(options)
    }
}

impl From<(&str, Options)> for Call {
    fn from((url, options): (&str, Options)) -> Self {
        Self::UrlWithOptions(url.to_owned(), options)
    }
}

impl From<(String, Options)> for Call {
    fn from((url, options): (String, Options)) -> Self {
        Self::UrlWithOptions(url, options)
    }
}

impl From<(Url, Options)> for Call {
    fn from((url, options): (Url, Options)) -> Self {
        Self::UrlWithOptions(url.into(), options)
    }
}

/// Fold instance defaults, a call and an optional forced verb into canonical
/// options.
///
/// # Errors
///
/// Returns [`Error::MissingUrl`] when neither the call nor the defaults name a
/// target. An empty or blank URL counts as absent.
pub fn normalize(defaults: &Options, call: Call, verb: Option<Method>) -> Result<RequestOptions> {
    let merged = defaults.merge(&call.into_options());
    let url = merged
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(Error::MissingUrl)?;
    Ok(RequestOptions {
        url,
        base_url: merged.base_url,
        method: verb.or(merged.method).unwrap_or(Method::GET),
        headers: merged.headers,
        body: merged.body,
        json: merged.json.unwrap_or(false),
        form: merged.form,
        qs: merged.qs.unwrap_or_default(),
        auth: merged.auth,
        encoding: merged.encoding.unwrap_or_default(),
        timeout: merged.timeout,
        jar: merged.jar.unwrap_or(Jar::Disabled),
        follow_redirect: merged.follow_redirect.unwrap_or(true),
        max_redirects: merged.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Num(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Object entries in document order.
struct Entries<V>(Vec<(String, V)>);

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> core::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

impl<V> IntoIterator for Entries<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QsValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

#[derive(Deserialize)]
struct AuthRepr {
    #[serde(alias = "username")]
    user: Option<String>,
    #[serde(alias = "password")]
    pass: Option<String>,
    bearer: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsRepr {
    #[serde(alias = "uri")]
    url: Option<String>,
    base_url: Option<String>,
    method: Option<String>,
    #[serde(default)]
    headers: Entries<Scalar>,
    body: Option<serde_json::Value>,
    json: Option<bool>,
    form: Option<Entries<Scalar>>,
    qs: Option<Entries<QsValue>>,
    auth: Option<AuthRepr>,
    #[serde(default, deserialize_with = "deserialize_encoding")]
    encoding: Option<Encoding>,
    timeout: Option<u64>,
    jar: Option<bool>,
    follow_redirect: Option<bool>,
    max_redirects: Option<u32>,
}

fn deserialize_encoding<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<Option<Encoding>, D::Error> {
    let charset: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(charset.map_or(Encoding::Binary, |_| Encoding::Utf8)))
}

impl TryFrom<OptionsRepr> for Options {
    type Error = Error;

    fn try_from(repr: OptionsRepr) -> Result<Self> {
        let method = repr
            .method
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|err| Error::InvalidRequest(format!("method {m:?}: {err}")))
            })
            .transpose()?;

        let auth = match repr.auth {
            Some(AuthRepr {
                bearer: Some(token), ..
            }) => Some(Auth::Bearer(token)),
            Some(AuthRepr {
                user: Some(user),
                pass,
                ..
            }) => Some(Auth::Basic { user, pass }),
            Some(_) => {
                return Err(Error::InvalidRequest(
                    "auth requires `user` or `bearer`".to_owned(),
                ));
            }
            None => None,
        };

        let body = repr.body.and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(RequestBody::Text(text)),
            other => Some(RequestBody::Json(other)),
        });

        let qs = repr.qs.map(|entries| {
            entries
                .into_iter()
                .flat_map(|(key, value)| match value {
                    QsValue::One(v) => vec![(key, v.to_string())],
                    QsValue::Many(vs) => vs
                        .into_iter()
                        .map(|v| (key.clone(), v.to_string()))
                        .collect(),
                })
                .collect()
        });

        Ok(Self {
            url: repr.url,
            base_url: repr.base_url,
            method,
            headers: repr
                .headers
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
            body,
            json: repr.json,
            form: repr.form.map(pairs),
            qs,
            auth,
            encoding: repr.encoding,
            // `0` disables the timer.
            timeout: repr
                .timeout
                .filter(|millis| *millis > 0)
                .map(Duration::from_millis),
            jar: repr.jar.map(Jar::from),
            follow_redirect: repr.follow_redirect,
            max_redirects: repr.max_redirects,
        })
    }
}
