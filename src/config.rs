//! Process-level configuration for the capture pipeline and forwarder.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::{Result, StreamError};

/// Static configuration for the capture pipeline and the frame server.
///
/// Defaults describe the reference device: a 640x480 sensor producing 12-bit
/// RAW frames stored as 16-bit pixels (614,400 bytes per frame), one frame
/// every two seconds, streamed on port 8080 with a five frame limit.
///
/// All fields are optional in serialized form; missing fields fall back to
/// the defaults.
///
/// ```rust
/// use framewire::CaptureConfig;
///
/// let config = CaptureConfig::from_yaml("period_ms: 100\nport: 9000\n").unwrap();
/// assert_eq!(config.frame_size(), 614_400);
/// assert_eq!(config.port, 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame width in pixels.
    pub frame_width: usize,

    /// Frame height in pixels.
    pub frame_height: usize,

    /// Bytes per pixel (2 for RAW12 stored as 16-bit).
    pub bytes_per_pixel: usize,

    /// Capture period in milliseconds.
    pub period_ms: u64,

    /// TCP port the frame server binds.
    pub port: u16,

    /// Number of frames to transmit before closing the stream.
    pub frame_limit: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            bytes_per_pixel: 2,
            period_ms: 2000,
            port: 8080,
            frame_limit: 5,
        }
    }
}

impl CaptureConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| StreamError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Size of one frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_width * self.frame_height * self.bytes_per_pixel
    }

    /// Capture period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Address the frame server binds (all interfaces, configured port).
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size() == 0 {
            return Err(StreamError::config("frame size must be non-zero"));
        }
        if self.period_ms == 0 {
            return Err(StreamError::config("capture period must be non-zero"));
        }
        if self.frame_limit == 0 {
            return Err(StreamError::config("frame limit must be non-zero"));
        }
        Ok(())
    }
}
