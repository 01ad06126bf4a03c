// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture backend abstraction

//! Shared types for capture backends

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::SENTINEL;

/// Capture backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CaptureBackendType {
    /// Video4Linux2 capture devices (/dev/video*)
    #[default]
    V4l2,
    /// Scripted in-memory backend with a synthetic test camera
    Mock,
}

impl std::fmt::Display for CaptureBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackendType::V4l2 => write!(f, "V4L2"),
            CaptureBackendType::Mock => write!(f, "mock"),
        }
    }
}

/// Backend-assigned device key
///
/// Stable for as long as the device stays plugged in, but not guaranteed to
/// survive a reboot. For V4L2 this is the device node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Display name, not guaranteed unique
    pub name: String,
    pub id: DeviceId,
}

impl Device {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: DeviceId(id.into()),
        }
    }
}

/// Four character pixel format code (e.g. "NV12", "YUY2")
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const NV12: FourCc = FourCc(*b"NV12");
    pub const YUY2: FourCc = FourCc(*b"YUY2");

    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Map backend-specific aliases onto a single tag
    ///
    /// V4L2 reports packed 4:2:2 as `YUYV` while Media Foundation and
    /// GStreamer call it `YUY2`.
    pub fn canonical(self) -> Self {
        match &self.0 {
            b"YUYV" | b"YUNV" | b"V422" => Self::YUY2,
            b"NV12" | b"NM12" => Self::NV12,
            _ => self,
        }
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
    /// Bytes in one frame, for the layouts with a known size
    pub fn frame_len(&self, resolution: Resolution) -> Option<usize> {
        let pixels = resolution.pixels() as usize;
        match self.canonical() {
            Self::NV12 => Some(pixels * 3 / 2),
            Self::YUY2 => Some(pixels * 2),
            _ => None,
        }
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc({})", self.as_str())
    }
}

impl FromStr for FourCc {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || s == SENTINEL {
            return Err(ParseValueError(s.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Serialize for FourCc {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for FourCc {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Major media type of a native format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MajorType {
    #[default]
    Video,
    Other(u32),
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ParseValueError;

    /// Parse "WIDTHxHEIGHT"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() == 2
            && let (Ok(width), Ok(height)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>())
        {
            return Ok(Self { width, height });
        }
        Err(ParseValueError(s.to_string()))
    }
}

/// Standard capture frame rates
///
/// Discriminant order is ascending rate, so deriving `Ord` sorts by speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameRate {
    Fps1,
    Fps5,
    Fps7_5,
    Fps10,
    Fps14_98,
    Fps15,
    Fps20,
    Fps23_98,
    Fps24,
    Fps25,
    Fps29_97,
    Fps30,
    Fps47_95,
    Fps48,
    Fps50,
    Fps59_94,
    Fps60,
    Fps119_88,
    Fps120,
}

impl FrameRate {
    pub const ALL: [FrameRate; 19] = [
        FrameRate::Fps1,
        FrameRate::Fps5,
        FrameRate::Fps7_5,
        FrameRate::Fps10,
        FrameRate::Fps14_98,
        FrameRate::Fps15,
        FrameRate::Fps20,
        FrameRate::Fps23_98,
        FrameRate::Fps24,
        FrameRate::Fps25,
        FrameRate::Fps29_97,
        FrameRate::Fps30,
        FrameRate::Fps47_95,
        FrameRate::Fps48,
        FrameRate::Fps50,
        FrameRate::Fps59_94,
        FrameRate::Fps60,
        FrameRate::Fps119_88,
        FrameRate::Fps120,
    ];

    /// Frames per second as an exact fraction (numerator, denominator)
    pub fn as_fraction(&self) -> (u32, u32) {
        match self {
            FrameRate::Fps1 => (1, 1),
            FrameRate::Fps5 => (5, 1),
            FrameRate::Fps7_5 => (15, 2),
            FrameRate::Fps10 => (10, 1),
            FrameRate::Fps14_98 => (15000, 1001),
            FrameRate::Fps15 => (15, 1),
            FrameRate::Fps20 => (20, 1),
            FrameRate::Fps23_98 => (24000, 1001),
            FrameRate::Fps24 => (24, 1),
            FrameRate::Fps25 => (25, 1),
            FrameRate::Fps29_97 => (30000, 1001),
            FrameRate::Fps30 => (30, 1),
            FrameRate::Fps47_95 => (48000, 1001),
            FrameRate::Fps48 => (48, 1),
            FrameRate::Fps50 => (50, 1),
            FrameRate::Fps59_94 => (60000, 1001),
            FrameRate::Fps60 => (60, 1),
            FrameRate::Fps119_88 => (120000, 1001),
            FrameRate::Fps120 => (120, 1),
        }
    }

    pub fn as_f64(&self) -> f64 {
        let (num, denom) = self.as_fraction();
        num as f64 / denom as f64
    }

    /// Display label used in option lists
    pub fn label(&self) -> &'static str {
        match self {
            FrameRate::Fps1 => "1",
            FrameRate::Fps5 => "5",
            FrameRate::Fps7_5 => "7.5",
            FrameRate::Fps10 => "10",
            FrameRate::Fps14_98 => "14.98",
            FrameRate::Fps15 => "15",
            FrameRate::Fps20 => "20",
            FrameRate::Fps23_98 => "23.98",
            FrameRate::Fps24 => "24",
            FrameRate::Fps25 => "25",
            FrameRate::Fps29_97 => "29.97",
            FrameRate::Fps30 => "30",
            FrameRate::Fps47_95 => "47.95",
            FrameRate::Fps48 => "48",
            FrameRate::Fps50 => "50",
            FrameRate::Fps59_94 => "59.94",
            FrameRate::Fps60 => "60",
            FrameRate::Fps119_88 => "119.88",
            FrameRate::Fps120 => "120",
        }
    }

    /// Match a frames-per-second fraction against the standard rates
    ///
    /// Exact rational matches win; otherwise a rate within 0.01 fps is
    /// accepted to absorb rounding in drivers that report e.g. 10000000/1333333.
    pub fn from_fraction(num: u32, denom: u32) -> Option<Self> {
        if num == 0 || denom == 0 {
            return None;
        }
        let exact = Self::ALL.iter().find(|rate| {
            let (n, d) = rate.as_fraction();
            n as u64 * denom as u64 == num as u64 * d as u64
        });
        if let Some(rate) = exact {
            return Some(*rate);
        }
        let fps = num as f64 / denom as f64;
        Self::ALL
            .iter()
            .find(|rate| (rate.as_f64() - fps).abs() < 0.01)
            .copied()
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FrameRate {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|rate| rate.label() == s)
            .copied()
            .ok_or_else(|| ParseValueError(s.to_string()))
    }
}

impl Serialize for FrameRate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FrameRate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A value that is not a valid label for its level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseValueError(pub String);

impl std::fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unrecognized value: {:?}", self.0)
    }
}

impl std::error::Error for ParseValueError {}

/// The part of a native format the selection logic reasons over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityTuple {
    pub format: FourCc,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
}

impl std::fmt::Display for CapabilityTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} @ {}fps", self.format, self.resolution, self.frame_rate)
    }
}

/// Native format descriptor as enumerated by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub stream_index: u32,
    pub major_type: MajorType,
    /// Backend-native pixel format code (may be an alias, see [`FourCc::canonical`])
    pub sub_type: FourCc,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
}

impl FormatDescriptor {
    pub fn video(sub_type: FourCc, width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            stream_index: 0,
            major_type: MajorType::Video,
            sub_type,
            resolution: Resolution::new(width, height),
            frame_rate,
        }
    }

    pub fn format_tag(&self) -> FourCc {
        self.sub_type.canonical()
    }

    pub fn tuple(&self) -> CapabilityTuple {
        CapabilityTuple {
            format: self.format_tag(),
            resolution: self.resolution,
            frame_rate: self.frame_rate,
        }
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream {}: {}", self.stream_index, self.tuple())
    }
}

/// Result of querying the native types of one stream index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeTypes {
    /// Every native type of the stream, in backend order
    Types(Vec<FormatDescriptor>),
    /// The stream index does not exist on this device
    InvalidStream,
}

/// Outcome of pulling one unit from a backend reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// A sample of this many bytes was written into the buffer
    Sample(usize),
    EndOfStream,
    /// Heartbeat without payload
    StreamTick,
    Failed(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Device enumeration failed
    EnumerationFailed(String),
    /// Capture device not found
    DeviceNotFound(String),
    /// Format could not be negotiated
    FormatNotSupported(String),
    /// Reader could not be opened
    OpenFailed(String),
    /// General I/O error
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::EnumerationFailed(msg) => write!(f, "Enumeration failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::OpenFailed(msg) => write!(f, "Open failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_canonical_aliases() {
        assert_eq!(FourCc::new(b"YUYV").canonical(), FourCc::YUY2);
        assert_eq!(FourCc::new(b"NV12").canonical(), FourCc::NV12);
        assert_eq!(FourCc::new(b"MJPG").canonical(), FourCc::new(b"MJPG"));
    }

    #[test]
    fn test_frame_len() {
        let res = Resolution::new(640, 480);
        assert_eq!(FourCc::NV12.frame_len(res), Some(460_800));
        assert_eq!(FourCc::new(b"YUYV").frame_len(res), Some(614_400));
        assert_eq!(FourCc::new(b"MJPG").frame_len(res), None);
    }

    #[test]
    fn test_fourcc_rejects_sentinel_and_bad_length() {
        assert!("NONE".parse::<FourCc>().is_err());
        assert!("NV1".parse::<FourCc>().is_err());
        assert_eq!("NV12".parse::<FourCc>(), Ok(FourCc::NV12));
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("1280x720".parse(), Ok(Resolution::new(1280, 720)));
        assert!("1280".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn test_frame_rate_labels_round_trip() {
        for rate in FrameRate::ALL {
            assert_eq!(rate.label().parse::<FrameRate>(), Ok(rate));
        }
        assert!("31".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_frame_rate_from_fraction() {
        assert_eq!(FrameRate::from_fraction(30, 1), Some(FrameRate::Fps30));
        assert_eq!(FrameRate::from_fraction(60, 2), Some(FrameRate::Fps30));
        assert_eq!(FrameRate::from_fraction(30000, 1001), Some(FrameRate::Fps29_97));
        // Media Foundation style approximation of 7.5 fps
        assert_eq!(
            FrameRate::from_fraction(10_000_000, 1_333_333),
            Some(FrameRate::Fps7_5)
        );
        assert_eq!(FrameRate::from_fraction(31, 1), None);
        assert_eq!(FrameRate::from_fraction(0, 1), None);
    }

    #[test]
    fn test_frame_rate_ordering_is_ascending() {
        assert!(FrameRate::Fps60 > FrameRate::Fps59_94);
        assert!(FrameRate::Fps30 > FrameRate::Fps29_97);
        assert!(FrameRate::Fps1 < FrameRate::Fps5);
    }

    #[test]
    fn test_descriptor_tuple_uses_canonical_tag() {
        let desc = FormatDescriptor::video(FourCc::new(b"YUYV"), 640, 480, FrameRate::Fps30);
        assert_eq!(desc.tuple().format, FourCc::YUY2);
        assert_eq!(desc.sub_type, FourCc::new(b"YUYV"));
    }
}
