//! Getting entities out of a Backstage instance (or a saved response).
//!
//! One GET per refresh, no auth, no retries.

use crate::config::Settings;
use crate::entity::{entities_from_payload, DecodedEntities};
use crate::error::{CatalogError, Result};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENTITIES_PATH: &str = "/api/catalog/entities";

/// Anything that can produce a fresh entity list on demand.
pub trait EntitySource {
    fn fetch_entities(&self) -> Result<DecodedEntities>;
}

impl<T: EntitySource + ?Sized> EntitySource for Box<T> {
    fn fetch_entities(&self) -> Result<DecodedEntities> {
        (**self).fetch_entities()
    }
}

/// `{base_url}/api/catalog/entities`
pub fn entities_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), ENTITIES_PATH)
}

fn dump(out: &mut dyn Write, text: &str) {
    if let Err(e) = writeln!(out, "{}", text) {
        debug!("Could not write payload dump: {}", e);
    }
}

/// Decode a response body into entities.
///
/// With `debug` on the body is written to `out` first: pretty-printed when it
/// parses, verbatim when it does not.
fn decode_body(body: &str, debug: bool, out: &mut dyn Write) -> Result<DecodedEntities> {
    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(e) => {
            if debug {
                dump(out, body);
            }
            return Err(e.into());
        }
    };
    if debug {
        match serde_json::to_string_pretty(&payload) {
            Ok(pretty) => dump(out, &pretty),
            Err(_) => dump(out, body),
        }
    }
    entities_from_payload(&payload)
}

/// Used in place of the HTTP client when no base URL is set, so a
/// long-running session can still start and report it on each refresh.
pub struct Unconfigured;

impl EntitySource for Unconfigured {
    fn fetch_entities(&self) -> Result<DecodedEntities> {
        Err(CatalogError::MissingBaseUrl)
    }
}

// ============================================================================
// HTTP
// ============================================================================

pub struct CatalogClient {
    http: reqwest::blocking::Client,
    url: String,
    debug: bool,
}

impl CatalogClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_base_url()?;
        // `None` also clears the blocking client's built-in default timeout.
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(CatalogError::Client)?;
        Ok(Self {
            http,
            url: entities_url(base_url),
            debug: settings.debug,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EntitySource for CatalogClient {
    fn fetch_entities(&self) -> Result<DecodedEntities> {
        info!("Fetching catalog entities from {}", self.url);
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|source| CatalogError::Http {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.text().map_err(|source| CatalogError::Http {
            url: self.url.clone(),
            source,
        })?;
        decode_body(&body, self.debug, &mut io::stderr())
    }
}

// ============================================================================
// File
// ============================================================================

/// Reads a saved `/api/catalog/entities` response instead of calling out.
pub struct FileSource {
    path: PathBuf,
    debug: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            path: path.into(),
            debug,
        }
    }
}

impl EntitySource for FileSource {
    fn fetch_entities(&self) -> Result<DecodedEntities> {
        let body = read_body(&self.path)?;
        decode_body(&body, self.debug, &mut io::stderr())
    }
}

fn read_body(path: &Path) -> Result<String> {
    debug!("Loading catalog payload from {:?}", path);
    fs::read_to_string(path).map_err(|source| CatalogError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    /// Answer exactly one request with `response`; the handle yields the raw request.
    fn serve_once(response: String) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn client_for(base_url: String, timeout_secs: u64) -> CatalogClient {
        CatalogClient::new(&Settings {
            base_url: Some(base_url),
            debug: false,
            timeout_secs,
        })
        .unwrap()
    }

    #[test]
    fn test_entities_url() {
        assert_eq!(
            entities_url("https://backstage.example.com"),
            "https://backstage.example.com/api/catalog/entities"
        );
        assert_eq!(
            entities_url("http://localhost:7007/"),
            "http://localhost:7007/api/catalog/entities"
        );
    }

    #[test]
    fn test_client_requires_base_url() {
        let err = CatalogClient::new(&Settings::default()).err().unwrap();
        assert!(matches!(err, CatalogError::MissingBaseUrl));
    }

    #[test]
    fn test_client_url() {
        let settings = Settings {
            base_url: Some("http://localhost:7007/".to_string()),
            ..Settings::default()
        };
        let client = CatalogClient::new(&settings).unwrap();
        assert_eq!(client.url(), "http://localhost:7007/api/catalog/entities");
    }

    #[test]
    fn test_file_source_reads_payload() {
        let path = std::env::temp_dir().join(format!("bac-fetch-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"[{"kind":"System","metadata":{"name":"payments"}},{"kind":"Group"}]"#,
        )
        .unwrap();

        let decoded = FileSource::new(&path, false).fetch_entities().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(decoded.entities.len(), 1);
        assert_eq!(decoded.entities[0].name, "payments");
        assert_eq!(decoded.skipped, 1);
    }

    #[test]
    fn test_file_source_missing_file() {
        let err = FileSource::new("/nonexistent/entities.json", false)
            .fetch_entities()
            .unwrap_err();
        assert!(matches!(err, CatalogError::FileRead { .. }));
    }

    #[test]
    fn test_fetch_valid_array() {
        let body = r#"[{"kind":"System","metadata":{"name":"payments","description":"Payments system"}}]"#;
        let (base_url, server) = serve_once(http_response("200 OK", body));

        let decoded = client_for(format!("{}/", base_url), 30)
            .fetch_entities()
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/catalog/entities HTTP/1.1"));
        assert_eq!(decoded.entities.len(), 1);
        assert_eq!(decoded.entities[0].name, "payments");
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn test_fetch_server_error() {
        let (base_url, server) =
            serve_once(http_response("500 Internal Server Error", "oops"));

        let err = client_for(base_url, 30).fetch_entities().unwrap_err();
        server.join().unwrap();

        match err {
            CatalogError::HttpStatus { url, status } => {
                assert_eq!(status.as_u16(), 500);
                assert!(url.ends_with("/api/catalog/entities"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fetch_malformed_body() {
        let (base_url, server) = serve_once(http_response("200 OK", "{nope"));

        let err = client_for(base_url, 30).fetch_entities().unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, CatalogError::Json(_)));
        assert!(err.to_string().starts_with("Failed to parse catalog payload"));
    }

    #[test]
    fn test_fetch_with_zero_timeout() {
        let (base_url, server) = serve_once(http_response("200 OK", "[]"));

        let decoded = client_for(base_url, 0).fetch_entities().unwrap();
        server.join().unwrap();

        assert!(decoded.entities.is_empty());
    }

    #[test]
    fn test_debug_dumps_unparseable_body() {
        let mut out = Vec::new();
        let err = decode_body("{nope", true, &mut out).unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
        assert_eq!(String::from_utf8(out).unwrap(), "{nope\n");
    }

    #[test]
    fn test_debug_dumps_pretty_payload() {
        let mut out = Vec::new();
        let decoded =
            decode_body(r#"[{"kind":"Group","metadata":{"name":"team-a"}}]"#, true, &mut out)
                .unwrap();
        assert_eq!(decoded.entities.len(), 1);
        assert!(String::from_utf8(out).unwrap().contains("\"kind\": \"Group\""));
    }

    #[test]
    fn test_no_dump_without_debug() {
        let mut out = Vec::new();
        assert!(decode_body("{nope", false, &mut out).is_err());
        assert!(out.is_empty());
    }
}
