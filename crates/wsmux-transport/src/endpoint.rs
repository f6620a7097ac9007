use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, TransportError};

/// Path suffix appended to the console base path.
const SOCKET_SUFFIX: &str = "_websocket";

/// WebSocket address of one (server, optional instance) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Derive the socket address from the console base URL.
    ///
    /// The scheme mirrors the base URL's security (`http` → `ws`,
    /// `https` → `wss`), the path is the base path followed by `_websocket`,
    /// and the instance, when given, becomes the final path segment.
    ///
    /// `https://mcs.example/console/` + `simulator` →
    /// `wss://mcs.example/console/_websocket/simulator`
    pub fn from_base_url(base: &str, instance: Option<&str>) -> Result<Self> {
        let mut url = parse_url(base)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(invalid(base, format!("unsupported scheme '{other}'")));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| invalid(base, "cannot switch to websocket scheme"))?;

        let mut path = url.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(SOCKET_SUFFIX);
        if let Some(instance) = instance.filter(|name| !name.is_empty()) {
            if instance.contains('/') {
                return Err(invalid(base, format!("instance '{instance}' contains '/'")));
            }
            path.push('/');
            path.push_str(instance);
        }
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url })
    }

    /// Use an explicit `ws://` / `wss://` URL as-is.
    ///
    /// `http(s)` URLs are treated as console base URLs and go through
    /// [`Endpoint::from_base_url`] without an instance.
    pub fn parse(input: &str) -> Result<Self> {
        let url = parse_url(input)?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            "http" | "https" => Self::from_base_url(input, None),
            other => Err(invalid(input, format!("unsupported scheme '{other}'"))),
        }
    }

    /// The full socket URL.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The parsed socket URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns true for `wss://` endpoints.
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|err| invalid(input, err.to_string()))
}

fn invalid(url: &str, reason: impl Into<String>) -> TransportError {
    TransportError::InvalidEndpoint {
        url: url.to_string(),
        reason: reason.into(),
    }
}
