//! Translation of canonical options into a transport request.
//!
//! Apart from the cookie-jar lookup this is pure: it never touches the
//! network.

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderName, HeaderValue};
use http::{HeaderMap, Request};
use url::Url;
use url::form_urlencoded;

use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::options::{RequestBody, RequestOptions};

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Resolve the call's target, joined onto `base_url` when one is set, with
/// the `qs` entries appended.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] when the target does not resolve to an
/// absolute URL.
pub fn resolve_url(options: &RequestOptions) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidUrl {
        url: options.url.clone(),
        reason,
    };

    let mut url = match &options.base_url {
        Some(base) => {
            let mut base = Url::parse(base).map_err(|err| invalid(err.to_string()))?;
            // A base without a trailing slash keeps its last segment.
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            base.join(options.url.trim_start_matches('/'))
                .map_err(|err| invalid(err.to_string()))?
        }
        None => Url::parse(&options.url).map_err(|err| invalid(err.to_string()))?,
    };

    if !options.qs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &options.qs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Build the transport request for `options`.
///
/// # Errors
///
/// Fails when the URL does not resolve or a header is not valid HTTP.
pub async fn translate(options: &RequestOptions, jar: Option<&CookieJar>) -> Result<Request<Bytes>> {
    let url = resolve_url(options)?;
    let mut headers = caller_headers(options)?;

    if let Some(jar) = jar {
        let cookies = jar.cookie_string(&url).await;
        if !cookies.is_empty() {
            headers.insert(COOKIE, header_value(&cookies)?);
        }
    }

    if let Some(auth) = &options.auth {
        headers.insert(AUTHORIZATION, header_value(&auth.header_value())?);
    }

    let body = encode_body(options, &mut headers)?;

    let mut request = Request::builder()
        .method(options.method.clone())
        .uri(url.as_str())
        .body(body)
        .map_err(|err| Error::InvalidRequest(err.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn caller_headers(options: &RequestOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(options.headers.len());
    for (name, value) in options.headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::InvalidRequest(format!("header name {name:?}: {err}")))?;
        headers.insert(name, header_value(value)?);
    }
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| Error::InvalidRequest(format!("header value {value:?}: {err}")))
}

/// Pick the payload: JSON body, then form, then raw body.
///
/// The JSON and form branches overwrite any caller `Content-Type`; `Accept`
/// is only filled in when the caller left it unset.
fn encode_body(options: &RequestOptions, headers: &mut HeaderMap) -> Result<Bytes> {
    if options.json {
        if let Some(body) = &options.body {
            let encoded = match body {
                RequestBody::Json(value) => Bytes::from(value.to_string()),
                RequestBody::Text(text) => Bytes::from(serde_json::Value::from(text.as_str()).to_string()),
                RequestBody::Bytes(bytes) => bytes.clone(),
            };
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            if !headers.contains_key(ACCEPT) {
                headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
            }
            return Ok(encoded);
        }
    }

    if let Some(form) = &options.form {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        return Ok(Bytes::from(encoded));
    }

    Ok(match &options.body {
        Some(RequestBody::Bytes(bytes)) => bytes.clone(),
        Some(RequestBody::Text(text)) => Bytes::from(text.clone()),
        Some(RequestBody::Json(value)) => Bytes::from(value.to_string()),
        None => Bytes::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Auth;
    use crate::options::{Options, normalize};
    use http::Method;
    use serde_json::json;

    fn resolve(options: Options) -> RequestOptions {
        normalize(&Options::new(), options.into(), None).unwrap()
    }

    fn header<'a>(request: &'a Request<Bytes>, name: &str) -> Option<&'a str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn json_body_sets_both_headers() {
        let options = resolve(
            Options::new()
                .url("https://api.example/posts")
                .method(Method::POST)
                .json(true)
                .body(json!({ "title": "hi" })),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(request.body().as_ref(), br#"{"title":"hi"}"#);
        assert_eq!(header(&request, "content-type"), Some(APPLICATION_JSON));
        assert_eq!(header(&request, "accept"), Some(APPLICATION_JSON));
    }

    #[tokio::test]
    async fn json_branch_overrides_content_type_but_keeps_accept() {
        let options = resolve(
            Options::new()
                .url("https://api.example/posts")
                .json(true)
                .header("Content-Type", "text/plain")
                .header("Accept", "application/vnd.api+json")
                .body(json!([1, 2])),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(header(&request, "content-type"), Some(APPLICATION_JSON));
        assert_eq!(header(&request, "accept"), Some("application/vnd.api+json"));
    }

    #[tokio::test]
    async fn json_text_body_is_encoded_as_a_json_string() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .json(true)
                .body("plain"),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(request.body().as_ref(), br#""plain""#);
    }

    #[tokio::test]
    async fn json_without_body_falls_through_to_form() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .json(true)
                .form([("a", "1 2"), ("b", "&")]),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(request.body().as_ref(), b"a=1+2&b=%26");
        assert_eq!(header(&request, "content-type"), Some(FORM_URLENCODED));
        assert!(header(&request, "accept").is_none());
    }

    #[tokio::test]
    async fn form_overrides_caller_content_type() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .header("content-type", "text/plain")
                .form([("k", "v")]),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(header(&request, "content-type"), Some(FORM_URLENCODED));
    }

    #[tokio::test]
    async fn form_wins_over_raw_body() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .body("ignored")
                .form([("k", "v")]),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(request.body().as_ref(), b"k=v");
    }

    #[tokio::test]
    async fn raw_body_is_untouched_and_infers_nothing() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .header("content-type", "text/csv")
                .body("a,b\n1,2"),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(request.body().as_ref(), b"a,b\n1,2");
        assert_eq!(header(&request, "content-type"), Some("text/csv"));

        let options = resolve(Options::new().url("https://api.example/").body("x"));
        let request = translate(&options, None).await.unwrap();
        assert!(header(&request, "content-type").is_none());
    }

    #[tokio::test]
    async fn qs_appends_and_keeps_duplicates() {
        let options = resolve(
            Options::new()
                .url("https://api.example/search?q=rust")
                .qs([("tag", "a b"), ("tag", "c"), ("page", "2")]),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(
            request.uri().to_string(),
            "https://api.example/search?q=rust&tag=a+b&tag=c&page=2"
        );
    }

    #[test]
    fn base_url_is_joined() {
        let options = resolve(
            Options::new()
                .base_url("https://api.example/v1")
                .url("/posts/1"),
        );
        assert_eq!(
            resolve_url(&options).unwrap().as_str(),
            "https://api.example/v1/posts/1"
        );
    }

    #[test]
    fn relative_url_without_base_is_invalid() {
        let options = resolve(Options::new().url("/posts"));
        assert!(matches!(resolve_url(&options), Err(Error::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn auth_overrides_authorization() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .header("Authorization", "Token old")
                .auth(Auth::basic("user", "pass")),
        );
        let request = translate(&options, None).await.unwrap();
        assert_eq!(header(&request, "authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn jar_cookies_replace_caller_cookie_only_when_present() {
        let jar = CookieJar::new();
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .header("Cookie", "manual=1"),
        );

        let request = translate(&options, Some(&jar)).await.unwrap();
        assert_eq!(header(&request, "cookie"), Some("manual=1"));

        let origin = Url::parse("https://api.example/").unwrap();
        jar.set_cookie("sid=42", &origin).await.unwrap();
        let request = translate(&options, Some(&jar)).await.unwrap();
        assert_eq!(header(&request, "cookie"), Some("sid=42"));
    }

    #[tokio::test]
    async fn invalid_header_is_a_request_error() {
        let options = resolve(
            Options::new()
                .url("https://api.example/")
                .header("bad header", "x"),
        );
        let err = translate(&options, None).await.unwrap_err();
        assert!(err.is_request_error());
    }
}
