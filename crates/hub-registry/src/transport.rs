//! Registry transports: where bytes come from and where publishes go.
//!
//! A registry location is either a local directory (the bundled sample
//! registry, or any checkout on disk) or an HTTP endpoint. [`Location::parse`]
//! decides which by the shape of the string. [`open`] hands back a transport
//! that routes each request by the shape of its location, since a local
//! registry may still list absolute URL sources. Local paths are read-only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::error::TransportError;

/// Timeout applied to every HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// File name of the index document inside a registry directory.
pub const INDEX_FILE: &str = "index.json";

/// A fetchable location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Path on the local filesystem.
    Local(PathBuf),
    /// `http://` or `https://` URL.
    Remote(String),
}

impl Location {
    /// Classify a location string by its shape.
    ///
    /// `http(s)://` is remote; `file://` and everything else is a local path,
    /// with a leading `~/` expanded to the home directory.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if is_remote(location) {
            return Location::Remote(location.to_string());
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        Location::Local(expand_home(path))
    }

    /// Whether this location is served over HTTP.
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Append an already-normalized relative path (`/`-separated).
    pub fn join(&self, relative: &str) -> Location {
        match self {
            Location::Local(base) => {
                let mut path = base.clone();
                path.extend(relative.split('/').filter(|s| !s.is_empty()));
                Location::Local(path)
            }
            Location::Remote(base) => {
                let separator = if base.ends_with('/') { "" } else { "/" };
                Location::Remote(format!("{base}{separator}{relative}"))
            }
        }
    }

    /// Split a registry location into `(index document, base directory)`.
    ///
    /// A location naming a `.json` file is the index itself and its parent is
    /// the base; anything else is a directory holding `index.json`.
    pub fn registry_parts(&self) -> (Location, Location) {
        match self {
            Location::Remote(url) => {
                if url.trim_end_matches('/').ends_with(".json") {
                    let base = match url.rfind('/') {
                        Some(i) => url[..=i].to_string(),
                        None => url.clone(),
                    };
                    (self.clone(), Location::Remote(base))
                } else {
                    let base = format!("{}/", url.trim_end_matches('/'));
                    let base = Location::Remote(base);
                    (base.join(INDEX_FILE), base)
                }
            }
            Location::Local(path) => {
                let is_document = path.is_file()
                    || path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_document {
                    let base = path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    (self.clone(), Location::Local(base))
                } else {
                    (Location::Local(path.join(INDEX_FILE)), self.clone())
                }
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Byte-level access to a registry backend.
pub trait Transport {
    /// Read the bytes at `location`.
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, TransportError>;

    /// Store `body` at `location`, authenticated with a bearer `credential`.
    ///
    /// Returns the backend's response body.
    fn write(
        &self,
        location: &Location,
        body: &[u8],
        credential: &str,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Open a transport for the registry at `location`.
pub fn open(location: &Location) -> Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(RoutingTransport::new(&location.to_string())?))
}

/// Sends local paths to [`LocalTransport`] and URLs to [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct RoutingTransport {
    local: LocalTransport,
    http: HttpTransport,
}

impl RoutingTransport {
    /// Build a router; `endpoint` only labels HTTP client construction errors.
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        Ok(RoutingTransport {
            local: LocalTransport,
            http: HttpTransport::new(endpoint)?,
        })
    }

    fn route(&self, location: &Location) -> &dyn Transport {
        match location {
            Location::Local(_) => &self.local,
            Location::Remote(_) => &self.http,
        }
    }
}

impl Transport for RoutingTransport {
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, TransportError> {
        self.route(location).fetch(location)
    }

    fn write(
        &self,
        location: &Location,
        body: &[u8],
        credential: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.route(location).write(location, body, credential)
    }
}

/// Reads registry files from disk. Never writable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, TransportError> {
        let Location::Local(path) = location else {
            return Err(unsupported(location));
        };
        debug!("reading {}", path.display());
        std::fs::read(path).map_err(|source| TransportError::Read {
            location: location.to_string(),
            source,
        })
    }

    fn write(
        &self,
        location: &Location,
        _body: &[u8],
        _credential: &str,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::ReadOnly {
            location: location.to_string(),
        })
    }
}

/// Talks to a registry over HTTP. Anonymous reads, bearer-authenticated writes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client for the registry at `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TransportError::Request {
                location: endpoint.to_string(),
                source,
            })?;
        Ok(HttpTransport { client })
    }

    fn finish(
        location: &Location,
        response: reqwest::blocking::Response,
    ) -> Result<Vec<u8>, TransportError> {
        let status = response.status();
        let body = response.bytes().map_err(|source| TransportError::Request {
            location: location.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(TransportError::Status {
                location: location.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body.to_vec())
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, location: &Location) -> Result<Vec<u8>, TransportError> {
        let Location::Remote(url) = location else {
            return Err(unsupported(location));
        };
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| TransportError::Request {
                location: url.clone(),
                source,
            })?;
        Self::finish(location, response)
    }

    fn write(
        &self,
        location: &Location,
        body: &[u8],
        credential: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let Location::Remote(url) = location else {
            return Err(unsupported(location));
        };
        debug!("PUT {url} ({} bytes)", body.len());
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {credential}"))
            .body(body.to_vec())
            .send()
            .map_err(|source| TransportError::Request {
                location: url.clone(),
                source,
            })?;
        Self::finish(location, response)
    }
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn unsupported(location: &Location) -> TransportError {
    TransportError::Read {
        location: location.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "location is not served by this transport",
        ),
    }
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_by_shape() {
        assert!(Location::parse("https://api.example.com/index.json").is_remote());
        assert!(Location::parse("HTTP://localhost:8080").is_remote());
        assert_eq!(
            Location::parse("file:///srv/registry"),
            Location::Local(PathBuf::from("/srv/registry"))
        );
        assert_eq!(
            Location::parse("  ./registry "),
            Location::Local(PathBuf::from("./registry"))
        );
    }

    #[test]
    fn remote_index_url_splits_into_base() {
        let (index, base) = Location::parse("https://api.example.com/v1/index.json").registry_parts();
        assert_eq!(index.to_string(), "https://api.example.com/v1/index.json");
        assert_eq!(base.to_string(), "https://api.example.com/v1/");
        assert_eq!(
            base.join("packages/a/b/x.py").to_string(),
            "https://api.example.com/v1/packages/a/b/x.py"
        );
    }

    #[test]
    fn remote_directory_url_gets_index_file() {
        let (index, base) = Location::parse("https://api.example.com").registry_parts();
        assert_eq!(index.to_string(), "https://api.example.com/index.json");
        assert_eq!(base.to_string(), "https://api.example.com/");
    }

    #[test]
    fn local_directory_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let root = Location::Local(dir.path().to_path_buf());
        let (index, base) = root.registry_parts();
        assert_eq!(index, Location::Local(dir.path().join("index.json")));
        assert_eq!(base, root);

        let doc = dir.path().join("index.json");
        std::fs::write(&doc, "{}").unwrap();
        let (index, base) = Location::Local(doc.clone()).registry_parts();
        assert_eq!(index, Location::Local(doc));
        assert_eq!(base, root);
    }

    #[test]
    fn local_transport_reads_and_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let location = Location::Local(file);
        assert_eq!(LocalTransport.fetch(&location).unwrap(), b"hello");
        assert!(matches!(
            LocalTransport.write(&location, b"x", "key"),
            Err(TransportError::ReadOnly { .. })
        ));
        assert!(matches!(
            LocalTransport.fetch(&Location::Local(dir.path().join("missing"))),
            Err(TransportError::Read { .. })
        ));
    }

    #[test]
    fn http_fetch_and_status_errors() {
        let mut server = mockito::Server::new();
        let ok = server
            .mock("GET", "/packages/a/b/x.py")
            .with_status(200)
            .with_body("print('x')")
            .create();
        let missing = server.mock("GET", "/missing").with_status(404).with_body("nope").create();

        let base = Location::Remote(format!("{}/", server.url()));
        let transport = open(&base).unwrap();
        assert_eq!(
            transport.fetch(&base.join("packages/a/b/x.py")).unwrap(),
            b"print('x')"
        );
        match transport.fetch(&base.join("missing")).unwrap_err() {
            TransportError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
        ok.assert();
        missing.assert();
    }

    #[test]
    fn routing_transport_serves_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("local.py");
        std::fs::write(&file, b"LOCAL = 1").unwrap();

        let mut server = mockito::Server::new();
        let blob = server.mock("GET", "/blob/remote.py").with_body("REMOTE = 1").create();

        let transport = open(&Location::Local(dir.path().to_path_buf())).unwrap();
        assert_eq!(transport.fetch(&Location::Local(file.clone())).unwrap(), b"LOCAL = 1");
        let url = Location::Remote(format!("{}/blob/remote.py", server.url()));
        assert_eq!(transport.fetch(&url).unwrap(), b"REMOTE = 1");
        assert!(matches!(
            transport.write(&Location::Local(file), b"{}", "key"),
            Err(TransportError::ReadOnly { .. })
        ));
        blob.assert();
    }

    #[test]
    fn http_write_sends_bearer_token() {
        let mut server = mockito::Server::new();
        let put = server
            .mock("PUT", "/api/packages/a/b")
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body("{}")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create();

        let location = Location::Remote(format!("{}/api/packages/a/b", server.url()));
        let transport = HttpTransport::new(&server.url()).unwrap();
        let body = transport.write(&location, b"{}", "secret").unwrap();
        assert_eq!(body, br#"{"ok":true}"#);
        put.assert();
    }
}
