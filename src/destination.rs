//! Network destination value type.

use std::fmt;

use crate::ConfigError;

/// A network listener that receives beats: host, port and OSC address.
///
/// `Destination` is a plain immutable value. Several destinations may share
/// a host/port or a channel label; no uniqueness is enforced.
///
/// # Example
///
/// ```
/// use beat_osc::Destination;
///
/// let dest = Destination::parse("127.0.0.1", "9000", "/beat")?;
/// assert_eq!(dest.port(), 9000);
/// assert_eq!(dest.to_string(), "/beat@127.0.0.1:9000");
/// # Ok::<(), beat_osc::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    host: String,
    port: u16,
    channel: String,
}

impl Destination {
    /// Creates a destination, validating host, port and channel.
    ///
    /// # Errors
    ///
    /// - `EmptyHost` if `host` is blank
    /// - `InvalidPort` if `port` is 0
    /// - `InvalidChannel` if `channel` does not start with `/`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        channel: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        let channel = channel.into();

        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if port == 0 {
            return Err(ConfigError::InvalidPort {
                value: port.to_string(),
            });
        }
        if !channel.starts_with('/') {
            return Err(ConfigError::InvalidChannel { value: channel });
        }

        Ok(Self {
            host,
            port,
            channel,
        })
    }

    /// Parses a destination from the three `--client` values.
    ///
    /// # Errors
    ///
    /// Same as [`Destination::new`], plus `InvalidPort` if `port` is not an integer.
    pub fn parse(host: &str, port: &str, channel: &str) -> Result<Self, ConfigError> {
        let port = port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
            value: port.to_string(),
        })?;
        Self::new(host.trim(), port, channel)
    }

    /// Host name or IP address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// UDP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OSC address the beat is tagged with.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.channel, self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.channel, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let dest = Destination::parse("192.168.1.20", "7000", "/lights/beat").unwrap();
        assert_eq!(dest.host(), "192.168.1.20");
        assert_eq!(dest.port(), 7000);
        assert_eq!(dest.channel(), "/lights/beat");
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        for port in ["0", "65536", "-1", "abc", ""] {
            assert!(
                matches!(
                    Destination::parse("127.0.0.1", port, "/beat"),
                    Err(ConfigError::InvalidPort { .. })
                ),
                "port {port:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_empty_host() {
        assert_eq!(
            Destination::parse("  ", "9000", "/beat"),
            Err(ConfigError::EmptyHost)
        );
    }

    #[test]
    fn test_parse_rejects_channel_without_slash() {
        assert_eq!(
            Destination::parse("127.0.0.1", "9000", "beat"),
            Err(ConfigError::InvalidChannel {
                value: "beat".to_string()
            })
        );
    }

    #[test]
    fn test_display() {
        let v4 = Destination::new("10.0.0.1", 9000, "/beat").unwrap();
        assert_eq!(v4.to_string(), "/beat@10.0.0.1:9000");

        let v6 = Destination::new("::1", 9000, "/beat").unwrap();
        assert_eq!(v6.to_string(), "/beat@[::1]:9000");
    }

    #[test]
    fn test_duplicates_allowed() {
        let a = Destination::new("127.0.0.1", 9000, "/beat").unwrap();
        let b = Destination::new("127.0.0.1", 9000, "/beat").unwrap();
        assert_eq!(a, b);
    }
}
