// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Reserved option value meaning "unset" at any selection level
pub const SENTINEL: &str = "NONE";

/// Pixel format constants
pub mod formats {
    /// Pixel formats surfaced by the catalog, highest priority first
    pub const DEFAULT_SUPPORTED: &[&str] = &["NV12", "YUY2"];
}

/// Native type enumeration limits
pub mod streams {
    /// Upper bound on stream indices probed per device, in case a backend
    /// never reports an invalid index
    pub const MAX_STREAM_INDEX: u32 = 16;
}

/// Frame reader constants
pub mod reader {
    /// Reads attempted per execution cycle (the first sample after opening
    /// is frequently empty, so one retry is allowed)
    pub const READS_PER_CYCLE: usize = 2;
}

/// V4L2 constants
pub mod v4l2 {
    /// Number of memory-mapped capture buffers
    pub const DEFAULT_BUFFER_COUNT: u32 = 4;

    /// Device node prefix scanned for capture devices
    pub const DEVICE_PREFIX: &str = "video";
}

/// Timing constants
pub mod timing {
    /// Default interval between reader execution cycles
    pub const DEFAULT_READ_INTERVAL_MS: u64 = 16;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Host option list naming
pub mod lists {
    /// Prefix of every option list name published to the host
    pub const LIST_PREFIX: &str = "webcam";
}

/// Application version from build.rs
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_supported_formats_are_fourcc() {
        for format in formats::DEFAULT_SUPPORTED {
            assert_eq!(format.len(), 4);
            assert_ne!(*format, SENTINEL);
        }
    }

    #[test]
    fn test_reads_per_cycle_allows_one_retry() {
        assert_eq!(reader::READS_PER_CYCLE, 2);
    }
}
