// SPDX-License-Identifier: GPL-3.0-only

//! v4l2loopback output driver
//!
//! Sets the output format on a loopback node and writes raw frames to it.
//! The node is usually created with
//! `modprobe v4l2loopback exclusive_caps=1 card_label="Webcam Stream"`.

use super::{OutputConfig, OutputDriver, OutputFormat, OutputSink};
use crate::errors::OutputError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use v4l::video::Output;
use v4l::{Format, FourCC};

/// Writes frames to a v4l2loopback device node
pub struct LoopbackDriver {
    path: PathBuf,
}

impl LoopbackDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn fourcc(format: OutputFormat) -> Option<FourCC> {
    match format {
        OutputFormat::Nv12 => Some(FourCC::new(b"NV12")),
        OutputFormat::Yuy2 => Some(FourCC::new(b"YUYV")),
        OutputFormat::Bgr24 => Some(FourCC::new(b"BGR3")),
        OutputFormat::None => None,
    }
}

impl OutputDriver for LoopbackDriver {
    fn name(&self) -> &str {
        "v4l2loopback"
    }

    fn open(&self, config: &OutputConfig) -> Result<Box<dyn OutputSink>, OutputError> {
        let fourcc = fourcc(config.format)
            .ok_or_else(|| OutputError::InvalidConfig("no format".to_string()))?;

        let device = v4l::Device::with_path(&self.path)
            .map_err(|e| OutputError::Backend(format!("{}: {}", self.path.display(), e)))?;
        let actual = Output::set_format(&device, &Format::new(config.width, config.height, fourcc))
            .map_err(|e| OutputError::Backend(format!("set format: {}", e)))?;
        if actual.width != config.width || actual.height != config.height {
            return Err(OutputError::InvalidConfig(format!(
                "device accepted {}x{} instead of {}x{}",
                actual.width, actual.height, config.width, config.height
            )));
        }

        let file = OpenOptions::new().write(true).open(&self.path)?;
        info!(
            path = %self.path.display(),
            fourcc = %actual.fourcc,
            width = actual.width,
            height = actual.height,
            "Loopback output opened"
        );

        Ok(Box::new(LoopbackSink {
            _device: device,
            file,
            frames: 0,
        }))
    }
}

struct LoopbackSink {
    _device: v4l::Device,
    file: File,
    frames: u64,
}

impl OutputSink for LoopbackSink {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), OutputError> {
        self.file.write_all(data)?;
        self.frames += 1;
        if self.frames == 1 {
            debug!(bytes = data.len(), "First frame written to loopback");
        }
        Ok(())
    }
}
