// SPDX-License-Identifier: GPL-3.0-only

//! Device and format catalog
//!
//! Normalizes whatever the backend reports into a short, ordered list of
//! capability tuples per device:
//!
//! 1. Only video types whose pixel format is on the allow-list survive
//!    (aliases are folded onto their canonical tag first).
//! 2. Duplicate (format, resolution, frame rate) tuples collapse onto the
//!    first descriptor seen, which keeps its stream index.
//! 3. Ordering: allow-list priority, then width, height and frame rate, all
//!    descending, so the first entry of any filtered view is the best quality
//!    option.

use super::CaptureBackend;
use super::types::*;
use crate::constants::{formats, streams};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Catalog over one capture backend
#[derive(Clone)]
pub struct FormatCatalog {
    backend: Arc<dyn CaptureBackend>,
    /// Allowed pixel formats, highest priority first
    supported: Vec<FourCc>,
}

impl FormatCatalog {
    /// Create a catalog with the default allow-list
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        let supported = formats::DEFAULT_SUPPORTED
            .iter()
            .filter_map(|f| f.parse().ok())
            .collect();
        Self { backend, supported }
    }

    /// Create a catalog with a custom allow-list (priority order)
    pub fn with_supported_formats(backend: Arc<dyn CaptureBackend>, supported: Vec<FourCc>) -> Self {
        let supported = supported.into_iter().map(FourCc::canonical).collect();
        Self { backend, supported }
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    pub fn supported_formats(&self) -> &[FourCc] {
        &self.supported
    }

    /// List capture devices
    ///
    /// Enumeration failures degrade to an empty list.
    pub fn list_devices(&self) -> Vec<Device> {
        match self.backend.enumerate_devices() {
            Ok(devices) => {
                debug!(count = devices.len(), "Enumerated capture devices");
                devices
            }
            Err(e) => {
                warn!(error = %e, backend = %self.backend.backend_type(), "Device enumeration failed");
                Vec::new()
            }
        }
    }

    /// List the supported formats of a device, deduplicated and ordered
    pub fn list_formats(&self, device: &Device) -> Vec<FormatDescriptor> {
        let mut raw = Vec::new();

        for stream_index in 0..streams::MAX_STREAM_INDEX {
            match self.backend.native_formats(&device.id, stream_index) {
                Ok(NativeTypes::Types(types)) => raw.extend(types),
                Ok(NativeTypes::InvalidStream) => break,
                Err(e) => {
                    warn!(
                        device = %device.name,
                        stream_index,
                        error = %e,
                        "Native format enumeration failed"
                    );
                    break;
                }
            }
        }

        let formats = normalize_formats(raw, &self.supported);
        debug!(device = %device.name, count = formats.len(), "Enumerated device formats");
        formats
    }

    /// Find the descriptor matching a tuple exactly in a fresh snapshot
    pub fn find_format(&self, device: &Device, tuple: &CapabilityTuple) -> Option<FormatDescriptor> {
        find_descriptor(&self.list_formats(device), tuple)
    }
}

impl std::fmt::Debug for FormatCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatCatalog")
            .field("backend", &self.backend.backend_type())
            .field("supported", &self.supported)
            .finish()
    }
}

/// Filter, deduplicate and order raw descriptors
pub fn normalize_formats(raw: Vec<FormatDescriptor>, supported: &[FourCc]) -> Vec<FormatDescriptor> {
    let mut seen = HashSet::new();
    let mut formats: Vec<FormatDescriptor> = raw
        .into_iter()
        .filter(|f| f.major_type == MajorType::Video)
        .filter(|f| supported.contains(&f.format_tag()))
        .filter(|f| seen.insert(f.tuple()))
        .collect();

    formats.sort_by(|a, b| compare_priority(a, b, supported));
    formats
}

/// Ordering used by [`normalize_formats`]
pub fn compare_priority(a: &FormatDescriptor, b: &FormatDescriptor, supported: &[FourCc]) -> Ordering {
    let rank = |f: &FormatDescriptor| {
        supported
            .iter()
            .position(|s| *s == f.format_tag())
            .unwrap_or(usize::MAX)
    };

    rank(a)
        .cmp(&rank(b))
        .then_with(|| b.resolution.width.cmp(&a.resolution.width))
        .then_with(|| b.resolution.height.cmp(&a.resolution.height))
        .then_with(|| b.frame_rate.cmp(&a.frame_rate))
}

/// Exact tuple lookup in a descriptor list
pub fn find_descriptor(formats: &[FormatDescriptor], tuple: &CapabilityTuple) -> Option<FormatDescriptor> {
    formats.iter().find(|f| f.tuple() == *tuple).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::mock::MockBackend;

    fn desc(code: &[u8; 4], width: u32, height: u32, rate: FrameRate) -> FormatDescriptor {
        FormatDescriptor::video(FourCc::new(code), width, height, rate)
    }

    fn default_supported() -> Vec<FourCc> {
        vec![FourCc::NV12, FourCc::YUY2]
    }

    #[test]
    fn test_normalize_filters_unsupported_formats() {
        let raw = vec![
            desc(b"MJPG", 1920, 1080, FrameRate::Fps30),
            desc(b"YUY2", 640, 480, FrameRate::Fps30),
            desc(b"H264", 1920, 1080, FrameRate::Fps30),
        ];

        let formats = normalize_formats(raw, &default_supported());
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].format_tag(), FourCc::YUY2);
    }

    #[test]
    fn test_normalize_orders_by_priority_then_quality() {
        let raw = vec![
            desc(b"YUY2", 1920, 1080, FrameRate::Fps30),
            desc(b"NV12", 640, 480, FrameRate::Fps15),
            desc(b"NV12", 1280, 720, FrameRate::Fps30),
            desc(b"NV12", 1280, 960, FrameRate::Fps30),
            desc(b"NV12", 1280, 720, FrameRate::Fps60),
        ];

        let formats = normalize_formats(raw, &default_supported());
        let order: Vec<String> = formats.iter().map(|f| f.tuple().to_string()).collect();
        assert_eq!(
            order,
            vec![
                "NV12 1280x960 @ 30fps",
                "NV12 1280x720 @ 60fps",
                "NV12 1280x720 @ 30fps",
                "NV12 640x480 @ 15fps",
                "YUY2 1920x1080 @ 30fps",
            ]
        );
    }

    #[test]
    fn test_normalize_dedupes_keeping_first_stream() {
        let mut second = desc(b"NV12", 640, 480, FrameRate::Fps30);
        second.stream_index = 1;
        let raw = vec![desc(b"NV12", 640, 480, FrameRate::Fps30), second];

        let formats = normalize_formats(raw, &default_supported());
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].stream_index, 0);
    }

    #[test]
    fn test_normalize_folds_aliases() {
        let raw = vec![
            desc(b"YUYV", 640, 480, FrameRate::Fps30),
            desc(b"YUY2", 640, 480, FrameRate::Fps30),
        ];

        let formats = normalize_formats(raw, &default_supported());
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].sub_type, FourCc::new(b"YUYV"));
    }

    #[test]
    fn test_custom_priority_puts_yuy2_first() {
        let raw = vec![
            desc(b"NV12", 1920, 1080, FrameRate::Fps30),
            desc(b"YUY2", 640, 480, FrameRate::Fps30),
        ];

        let formats = normalize_formats(raw, &[FourCc::YUY2, FourCc::NV12]);
        assert_eq!(formats[0].format_tag(), FourCc::YUY2);
    }

    #[test]
    fn test_list_formats_walks_every_stream() {
        let mut second = desc(b"NV12", 320, 240, FrameRate::Fps30);
        second.stream_index = 1;
        let backend = MockBackend::new().with_device_streams(
            "Cam",
            vec![vec![desc(b"NV12", 640, 480, FrameRate::Fps30)], vec![second]],
        );
        let catalog = FormatCatalog::new(Arc::new(backend));
        let device = catalog.list_devices().remove(0);

        let formats = catalog.list_formats(&device);
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[1].stream_index, 1);
    }

    #[test]
    fn test_list_devices_failure_is_empty() {
        let backend = MockBackend::new().with_device("Cam", vec![]);
        backend.set_enumeration_failure(true);
        let catalog = FormatCatalog::new(Arc::new(backend));

        assert!(catalog.list_devices().is_empty());
    }

    #[test]
    fn test_list_formats_unknown_device_is_empty() {
        let catalog = FormatCatalog::new(Arc::new(MockBackend::new()));
        let ghost = Device::new("Ghost", "mock:ghost");

        assert!(catalog.list_formats(&ghost).is_empty());
    }
}
