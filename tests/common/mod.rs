//! Local HTTP server for the integration tests.
//!
//! Implements the handful of httpbin-style endpoints the suite needs. Each
//! request is answered on its own thread so slow routes never hold up the
//! rest of the suite. `REQUEST_SHIM_TEST_BASE_URL` points the tests at
//! another server instead.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::thread;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value, json};
use tiny_http::{Header, ListenAddr, Request, Response, Server, StatusCode};
use url::Url;

type Reply = Response<Cursor<Vec<u8>>>;

#[derive(Debug)]
pub struct TestServer {
    base: String,
    _thread: thread::JoinHandle<()>,
}

/// Base URL of the test server, without a trailing slash.
pub fn base() -> String {
    if let Ok(base) = std::env::var("REQUEST_SHIM_TEST_BASE_URL") {
        return base.trim_end_matches('/').to_string();
    }
    test_server().base.clone()
}

/// Full URL for `path` on the test server.
pub fn uri(path: &str) -> String {
    format!("{}/{}", base(), path.trim_start_matches('/'))
}

pub fn test_server() -> &'static TestServer {
    static INSTANCE: OnceCell<TestServer> = OnceCell::new();
    INSTANCE.get_or_init(TestServer::start)
}

impl TestServer {
    fn start() -> Self {
        let server = Server::http("127.0.0.1:0").expect("start test server");
        let addr: ListenAddr = server.server_addr();
        let base = format!("http://{addr}");
        let thread = thread::spawn(move || {
            for request in server.incoming_requests() {
                thread::spawn(move || answer(request));
            }
        });

        Self {
            base,
            _thread: thread,
        }
    }
}

fn answer(mut request: Request) {
    let url = Url::parse(&format!("http://localhost{}", request.url())).unwrap();
    let path = url.path().to_string();

    if path == "/stream" {
        let chunks = ["alpha\n", "beta\n", "gamma\n"].concat().into_bytes();
        // Unknown length makes tiny_http use chunked encoding.
        let response = Response::new(StatusCode(200), Vec::new(), Cursor::new(chunks), None, None);
        let _ = request.respond(response);
        return;
    }

    let response = route(&mut request, &path);
    let _ = request.respond(response);
}

fn route(request: &mut Request, path: &str) -> Reply {
    match path {
        "/json" => json_response(200, &json!({ "id": 1, "name": "shim" })),
        "/echo" => {
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body).unwrap();
            let content_type =
                header_value(request, "content-type").unwrap_or_else(|| "text/plain".to_string());
            Response::from_data(body).with_header(header("Content-Type", &content_type))
        }
        "/headers" => {
            let headers: Map<String, Value> = request
                .headers()
                .iter()
                .map(|header| {
                    (
                        header.field.to_string().to_ascii_lowercase(),
                        Value::String(header.value.to_string()),
                    )
                })
                .collect();
            json_response(200, &Value::Object(headers))
        }
        "/method" => text_response(200, request.method().to_string()),
        "/query" => text_response(200, request.url().split_once('?').map_or("", |(_, q)| q)),
        "/cookies" => text_response(200, header_value(request, "cookie").unwrap_or_default()),
        "/bearer" => match header_value(request, "authorization") {
            Some(auth) if auth.starts_with("Bearer ") => text_response(200, "authorized"),
            _ => text_response(401, "unauthorized"),
        },
        "/binary" => Response::from_data(vec![0x89, b'P', b'N', b'G', 0x00, 0xff]),
        _ => {
            if let Some(rest) = path.strip_prefix("/status/") {
                let status = rest.parse::<u16>().unwrap_or(400);
                return text_response(status, format!("status {status}"));
            }
            if let Some(rest) = path.strip_prefix("/cookies/set/") {
                let (name, value) = rest.split_once('/').unwrap_or((rest, ""));
                return text_response(200, "cookie set")
                    .with_header(header("Set-Cookie", &format!("{name}={value}; Path=/")));
            }
            if let Some(rest) = path.strip_prefix("/delay/") {
                let millis = rest.parse::<u64>().unwrap_or(0);
                thread::sleep(Duration::from_millis(millis));
                return text_response(200, "delayed");
            }
            if let Some(rest) = path.strip_prefix("/redirect/") {
                let steps = rest.parse::<u32>().unwrap_or(0);
                if steps == 0 {
                    return text_response(200, "redirect complete");
                }
                return text_response(302, "redirect")
                    .with_header(header("Location", &format!("/redirect/{}", steps - 1)));
            }
            if let Some(rest) = path.strip_prefix("/basic-auth/") {
                let (user, pass) = rest.split_once('/').unwrap_or((rest, ""));
                let expected = format!("Basic {}", BASE64.encode(format!("{user}:{pass}")));
                return if header_value(request, "authorization").as_deref() == Some(expected.as_str())
                {
                    text_response(200, "authenticated")
                } else {
                    text_response(401, "unauthorized")
                };
            }
            text_response(404, format!("no route for {path}"))
        }
    }
}

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap()
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.to_string().eq_ignore_ascii_case(name))
        .map(|header| header.value.to_string())
}

fn json_response(status: u16, body: &Value) -> Reply {
    Response::from_string(body.to_string())
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", "application/json"))
}

fn text_response(status: u16, body: impl Into<String>) -> Reply {
    Response::from_string(body.into()).with_status_code(StatusCode(status))
}
