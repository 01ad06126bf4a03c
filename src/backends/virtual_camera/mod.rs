// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera output
//!
//! Frames read from a capture session can be relayed to a virtual camera
//! device that other applications open as a regular webcam. Only one node may
//! write to the output at a time.
//!
//! # Architecture
//!
//! ```text
//! FrameReader (NV12 / YUY2 / BGR24)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │  VirtualOutput   │  ← single owner, config validation
//! └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │   OutputDriver   │  ← v4l2loopback node, or in-memory for tests
//! └──────────────────┘
//!        │
//!        ▼
//!   Video Apps (Zoom, Teams, etc.)
//! ```

#[cfg(target_os = "linux")]
mod loopback;
mod memory;

#[cfg(target_os = "linux")]
pub use loopback::LoopbackDriver;
pub use memory::{MemoryDriver, MemoryFrames};

use crate::constants::SENTINEL;
use crate::errors::OutputError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pixel layouts the output accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    Nv12,
    Yuy2,
    #[default]
    Bgr24,
    /// Sentinel: no format chosen
    None,
}

impl OutputFormat {
    /// Bytes in a frame of `width` x `height`
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            OutputFormat::Nv12 => pixels * 3 / 2,
            OutputFormat::Yuy2 => pixels * 2,
            OutputFormat::Bgr24 => pixels * 3,
            OutputFormat::None => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Nv12 => "NV12",
            OutputFormat::Yuy2 => "YUY2",
            OutputFormat::Bgr24 => "BGR24",
            OutputFormat::None => SENTINEL,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NV12" => Ok(OutputFormat::Nv12),
            "YUY2" | "YUYV" => Ok(OutputFormat::Yuy2),
            "BGR24" => Ok(OutputFormat::Bgr24),
            "NONE" => Ok(OutputFormat::None),
            _ => Err(OutputError::InvalidConfig(format!("unknown format {}", s))),
        }
    }
}

/// Output stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub format: OutputFormat,
}

impl OutputConfig {
    pub fn frame_len(&self) -> usize {
        self.format.frame_len(self.width, self.height)
    }

    /// Reject configurations no sink can be built for
    pub fn validate(&self) -> Result<(), OutputError> {
        if self.width == 0 || self.height == 0 {
            return Err(OutputError::InvalidConfig(format!(
                "resolution {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate.is_nan() || self.frame_rate <= 0.0 {
            return Err(OutputError::InvalidConfig(format!(
                "frame rate {}",
                self.frame_rate
            )));
        }
        if self.format == OutputFormat::None {
            return Err(OutputError::InvalidConfig("no format".to_string()));
        }
        if self.format != OutputFormat::Bgr24 {
            warn!(format = %self.format, "Not tested format");
        }
        Ok(())
    }
}

/// Identity of a node writing to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opened output stream
pub trait OutputSink: Send {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), OutputError>;
}

/// Creates sinks for a configuration
pub trait OutputDriver: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self, config: &OutputConfig) -> Result<Box<dyn OutputSink>, OutputError>;
}

struct OutputState {
    owner: Option<OwnerId>,
    config: Option<OutputConfig>,
    sink: Option<Box<dyn OutputSink>>,
}

/// Single-writer virtual camera output
///
/// Thread-safe and can be shared across threads.
pub struct VirtualOutput {
    driver: Box<dyn OutputDriver>,
    state: Mutex<OutputState>,
}

impl VirtualOutput {
    pub fn new(driver: Box<dyn OutputDriver>) -> Self {
        info!(driver = driver.name(), "Creating virtual output");
        Self {
            driver,
            state: Mutex::new(OutputState {
                owner: None,
                config: None,
                sink: None,
            }),
        }
    }

    /// Current owner, if any
    pub fn owner(&self) -> Option<OwnerId> {
        self.lock().owner
    }

    pub fn config(&self) -> Option<OutputConfig> {
        self.lock().config
    }

    /// Take ownership and configure the output
    ///
    /// The owner may call this again to change the configuration; the sink
    /// is only rebuilt when the configuration actually changed.
    pub fn acquire(&self, owner: OwnerId, config: OutputConfig) -> Result<(), OutputError> {
        let mut state = self.lock();
        if let Some(current) = state.owner
            && current != owner
        {
            debug!(owner = %owner, current = %current, "Virtual output busy");
            return Err(OutputError::Busy);
        }

        config.validate()?;

        if state.sink.is_none() || state.config != Some(config) {
            state.sink = None;
            let sink = self.driver.open(&config)?;
            info!(
                owner = %owner,
                width = config.width,
                height = config.height,
                fps = config.frame_rate,
                format = %config.format,
                "Virtual output configured"
            );
            state.sink = Some(sink);
            state.config = Some(config);
        }

        state.owner = Some(owner);
        Ok(())
    }

    /// Give up ownership; a no-op for anyone but the owner
    pub fn release(&self, owner: OwnerId) {
        let mut state = self.lock();
        if state.owner == Some(owner) {
            info!(owner = %owner, "Virtual output released");
            state.owner = None;
        }
    }

    /// Write one frame
    ///
    /// `data` must hold at least one full frame; extra bytes are ignored.
    pub fn send_frame(&self, owner: OwnerId, data: &[u8]) -> Result<(), OutputError> {
        let mut state = self.lock();
        if state.owner != Some(owner) {
            return Err(OutputError::NotOwner);
        }

        let expected = state.config.map(|c| c.frame_len()).unwrap_or(0);
        if data.len() < expected {
            return Err(OutputError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }

        let sink = state
            .sink
            .as_mut()
            .ok_or_else(|| OutputError::Backend("no sink".to_string()))?;
        sink.write_frame(&data[..expected])
    }

    /// Drop the sink and any owner
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.owner = None;
        state.config = None;
        if state.sink.take().is_some() {
            info!("Virtual output closed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(format: OutputFormat) -> OutputConfig {
        OutputConfig {
            width: 4,
            height: 2,
            frame_rate: 30.0,
            format,
        }
    }

    fn output() -> (VirtualOutput, MemoryFrames) {
        let driver = MemoryDriver::new();
        let frames = driver.frames();
        (VirtualOutput::new(Box::new(driver)), frames)
    }

    #[test]
    fn test_frame_len_per_format() {
        assert_eq!(OutputFormat::Nv12.frame_len(4, 2), 12);
        assert_eq!(OutputFormat::Yuy2.frame_len(4, 2), 16);
        assert_eq!(OutputFormat::Bgr24.frame_len(4, 2), 24);
    }

    #[test]
    fn test_second_owner_is_busy() {
        let (output, _) = output();
        let a = OwnerId::new();
        let b = OwnerId::new();

        output.acquire(a, config(OutputFormat::Bgr24)).unwrap();
        assert_eq!(output.acquire(b, config(OutputFormat::Bgr24)), Err(OutputError::Busy));

        output.release(b);
        assert_eq!(output.owner(), Some(a));

        output.release(a);
        assert!(output.acquire(b, config(OutputFormat::Bgr24)).is_ok());
        assert_eq!(output.owner(), Some(b));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let (output, _) = output();
        let owner = OwnerId::new();

        let mut bad = config(OutputFormat::Bgr24);
        bad.width = 0;
        assert!(matches!(output.acquire(owner, bad), Err(OutputError::InvalidConfig(_))));

        let mut bad = config(OutputFormat::Bgr24);
        bad.frame_rate = 0.0;
        assert!(matches!(output.acquire(owner, bad), Err(OutputError::InvalidConfig(_))));

        assert!(matches!(
            output.acquire(owner, config(OutputFormat::None)),
            Err(OutputError::InvalidConfig(_))
        ));
        assert_eq!(output.owner(), None);
    }

    #[test]
    fn test_sink_rebuilt_only_on_config_change() {
        let (output, frames) = output();
        let owner = OwnerId::new();

        output.acquire(owner, config(OutputFormat::Nv12)).unwrap();
        output.acquire(owner, config(OutputFormat::Nv12)).unwrap();
        assert_eq!(frames.sinks_opened(), 1);

        output.acquire(owner, config(OutputFormat::Yuy2)).unwrap();
        assert_eq!(frames.sinks_opened(), 2);
    }

    #[test]
    fn test_send_frame_checks_owner_and_size() {
        let (output, frames) = output();
        let owner = OwnerId::new();
        output.acquire(owner, config(OutputFormat::Nv12)).unwrap();

        assert_eq!(output.send_frame(OwnerId::new(), &[0; 12]), Err(OutputError::NotOwner));
        assert_eq!(
            output.send_frame(owner, &[0; 11]),
            Err(OutputError::BufferTooSmall {
                expected: 12,
                actual: 11
            })
        );

        output.send_frame(owner, &[5; 16]).unwrap();
        assert_eq!(frames.written(), vec![vec![5; 12]]);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("nv12".parse::<OutputFormat>(), Ok(OutputFormat::Nv12));
        assert_eq!("NONE".parse::<OutputFormat>(), Ok(OutputFormat::None));
        assert!("RGBA".parse::<OutputFormat>().is_err());
    }
}
