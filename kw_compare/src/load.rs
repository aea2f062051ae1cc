use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::record::RawShow;
use crate::KwError;

/// Where a karma dataset comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
}

impl DataSource {
    /// `http://` and `https://` inputs are URLs; anything else is a path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Url(trimmed.to_string())
        } else {
            DataSource::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => f.write_str(url),
            DataSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadedSource {
    pub origin: String,
    pub sha256: String,
    pub shows: Vec<RawShow>,
}

/// Origin reported when the HTTP client itself cannot be set up.
const HTTP_CLIENT_ORIGIN: &str = "http client";

/// Fetches datasets over HTTP or from disk. One attempt per source, no retry.
#[derive(Clone, Debug)]
pub struct Loader {
    client: Client,
}

impl Loader {
    pub fn new() -> Result<Self, KwError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, KwError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kw_compare/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| load_error(HTTP_CLIENT_ORIGIN, e))?;
        Ok(Self { client })
    }

    pub fn load(&self, source: &DataSource) -> Result<LoadedSource, KwError> {
        let origin = source.to_string();
        let bytes = match source {
            DataSource::Url(url) => self.fetch(url)?,
            DataSource::File(path) => fs::read(path).map_err(|e| load_error(&origin, e))?,
        };
        let shows = parse_shows(&bytes).map_err(|reason| KwError::DataLoad {
            origin: origin.clone(),
            reason,
        })?;
        info!("Loaded {} shows from {}", shows.len(), origin);
        Ok(LoadedSource {
            origin,
            sha256: sha256_hex(&bytes),
            shows,
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, KwError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| load_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KwError::DataLoad {
                origin: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        let body = response.bytes().map_err(|e| load_error(url, e))?;
        Ok(body.to_vec())
    }
}

/// Accept either a single show object or an array of them.
pub fn parse_shows(bytes: &[u8]) -> Result<Vec<RawShow>, String> {
    let value: JsonValue =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| parse_show(item).map_err(|e| format!("entry {i}: {e}")))
            .collect(),
        value @ JsonValue::Object(_) => Ok(vec![parse_show(value)?]),
        other => Err(format!(
            "expected a show object or an array of shows, found {}",
            json_kind(&other)
        )),
    }
}

fn parse_show(value: JsonValue) -> Result<RawShow, String> {
    if !value.is_object() {
        return Err(format!("expected an object, found {}", json_kind(&value)));
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn load_error(origin: &str, err: impl fmt::Display) -> KwError {
    KwError::DataLoad {
        origin: origin.to_string(),
        reason: err.to_string(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
