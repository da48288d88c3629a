use http::Uri;

use crate::{Error, Result};

/// Scheme and host of a discovery endpoint URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self> {
        let uri: Uri = raw
            .parse()
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {}", raw, e)))?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| Error::InvalidEndpoint(format!("{}: missing scheme", raw)))?
            .to_ascii_lowercase();
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidEndpoint(format!("{}: missing host", raw)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        Ok(Self { scheme, host })
    }
}
