//! Mount URI parsing.

use crate::error::ProviderError;
use std::str::FromStr;

/// A parsed mount URI: `{scheme, location, path, hostname, port}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountUri {
    /// Scheme, e.g. `file`, `archive`, `mutable`, `zip`, `http`, `https`.
    pub scheme: String,
    /// Authority/location portion (empty for local schemes).
    pub location: String,
    /// Path portion.
    pub path: String,
    /// Hostname, for network schemes.
    pub hostname: Option<String>,
    /// Port, for network schemes.
    pub port: Option<u16>,
}

impl MountUri {
    /// The original URI this was parsed from, reconstructed.
    #[must_use]
    pub fn to_uri_string(&self) -> String {
        if let Some(host) = &self.hostname {
            let port = self
                .port
                .map(|p| format!(":{p}"))
                .unwrap_or_default();
            format!("{}://{host}{port}{}", self.scheme, self.path)
        } else {
            format!("{}:{}{}", self.scheme, self.location, self.path)
        }
    }
}

impl FromStr for MountUri {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| ProviderError::UnsupportedUri(s.to_string()))?;

        if let Some(authority_and_path) = rest.strip_prefix("//") {
            let (authority, path) = authority_and_path
                .find('/')
                .map_or((authority_and_path, ""), |idx| {
                    authority_and_path.split_at(idx)
                });
            let (hostname, port) = match authority.split_once(':') {
                Some((host, port_str)) => {
                    let port = port_str.parse::<u16>().ok();
                    (host.to_string(), port)
                }
                None => (authority.to_string(), None),
            };
            Ok(Self {
                scheme: scheme.to_string(),
                location: authority.to_string(),
                path: path.to_string(),
                hostname: Some(hostname),
                port,
            })
        } else {
            Ok(Self {
                scheme: scheme.to_string(),
                location: String::new(),
                path: rest.to_string(),
                hostname: None,
                port: None,
            })
        }
    }
}
