use std::fmt;

use anyhow::{anyhow, Result};
use reqwest::Url;

/// Text-round-trippable descriptor of one remote endpoint.
///
/// The text form is a single URL per line. The base path is normalized to end
/// with `/` so remote file names join beneath it rather than replacing its
/// last segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(anyhow!("empty endpoint descriptor"));
        }
        let mut base =
            Url::parse(line).map_err(|e| anyhow!("invalid endpoint '{}': {}", line, e))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("endpoint '{}' cannot hold remote files", line));
        }
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn scheme(&self) -> &str {
        self.base.scheme()
    }

    /// Resolve a remote file name relative to this endpoint.
    pub fn join(&self, remote_path: &str) -> Result<Url> {
        self.base
            .join(remote_path)
            .map_err(|e| anyhow!("cannot resolve '{}' under {}: {}", remote_path, self.base, e))
    }

    pub fn is_identical_to(&self, other: &Endpoint) -> bool {
        self.base == other.base
    }

    pub fn to_line(&self) -> String {
        self.base.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())
    }
}

/// Parse a one-descriptor-per-line list. Blank lines and `#` comments are
/// skipped; each malformed line yields one error message.
pub fn parse_endpoint_list(text: &str) -> (Vec<Endpoint>, Vec<String>) {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut errors = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Endpoint::parse(line) {
            Ok(endpoint) => {
                if !endpoints.iter().any(|e| e.is_identical_to(&endpoint)) {
                    endpoints.push(endpoint);
                }
            }
            Err(e) => errors.push(format!("line {}: {}", idx + 1, e)),
        }
    }
    (endpoints, errors)
}

/// Render descriptors back into the list format.
pub fn render_endpoint_list(endpoints: &[Endpoint]) -> String {
    let mut out = String::new();
    for endpoint in endpoints {
        out.push_str(&endpoint.to_line());
        out.push('\n');
    }
    out
}
