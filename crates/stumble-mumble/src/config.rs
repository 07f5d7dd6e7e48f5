//! Connection options.

use std::time::Duration;

use crate::error::{MumbleError, MumbleResult};

/// Options for one connection attempt.
///
/// `key` and `cert` hold PEM file contents (PKCS#8 key, certificate chain).
/// A client identity is presented only when both are set.
#[derive(Clone)]
pub struct ConnectOptions {
    pub key: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    /// Accept self-signed or otherwise unverifiable server certificates.
    pub accept_invalid_certs: bool,
    /// Bound on TCP connect plus TLS handshake, each.
    pub connect_timeout: Duration,
    /// Keepalive period. Servers drop clients silent for 30 seconds.
    pub ping_interval: Duration,
    /// Release string sent in the version handshake.
    pub release: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            key: None,
            cert: None,
            accept_invalid_certs: true,
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(15),
            release: format!("stumble {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConnectOptions {
    /// Builds the TLS client identity from `cert` and `key`, if both are set.
    pub fn identity(&self) -> MumbleResult<Option<native_tls::Identity>> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => native_tls::Identity::from_pkcs8(cert, key)
                .map(Some)
                .map_err(|e| MumbleError::Tls(format!("invalid client certificate: {e}"))),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("cert", &self.cert.as_ref().map(|c| c.len()))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("connect_timeout", &self.connect_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("release", &self.release)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_requires_both_files() {
        let only_key = ConnectOptions {
            key: Some(b"key".to_vec()),
            ..Default::default()
        };
        assert!(only_key.identity().unwrap().is_none());
        assert!(ConnectOptions::default().identity().unwrap().is_none());
    }

    #[test]
    fn test_identity_rejects_garbage() {
        let options = ConnectOptions {
            key: Some(b"not a key".to_vec()),
            cert: Some(b"not a cert".to_vec()),
            ..Default::default()
        };
        assert!(matches!(options.identity(), Err(MumbleError::Tls(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let options = ConnectOptions {
            key: Some(b"secret".to_vec()),
            ..Default::default()
        };
        let debug = format!("{options:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }
}
