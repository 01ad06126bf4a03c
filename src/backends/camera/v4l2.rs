// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture backend
//!
//! Devices are the `/dev/video*` nodes advertising video capture. Each node is
//! a single stream; only discrete frame sizes and intervals are reported, and
//! intervals that do not map onto a standard frame rate are skipped.

use super::types::*;
use super::{CaptureBackend, StreamReader};
use crate::constants::v4l2::{DEFAULT_BUFFER_COUNT, DEVICE_PREFIX};
use std::path::Path;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::{CaptureStream, Stream as _};
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC, Fraction};

/// V4L2 backend
pub struct V4l2Backend {
    buffer_count: u32,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }

    /// Number of mmap buffers requested per reader
    pub fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count.max(1);
        self
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of a `/dev/videoN` node name
fn node_index(file_name: &str) -> Option<u32> {
    file_name.strip_prefix(DEVICE_PREFIX)?.parse().ok()
}

fn open_device(id: &DeviceId) -> BackendResult<v4l::Device> {
    v4l::Device::with_path(&id.0).map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", id, e)))
}

fn to_fourcc(fourcc: FourCC) -> FourCc {
    FourCc(fourcc.repr)
}

impl CaptureBackend for V4l2Backend {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::V4l2
    }

    fn enumerate_devices(&self) -> BackendResult<Vec<Device>> {
        let entries = std::fs::read_dir("/dev")
            .map_err(|e| BackendError::EnumerationFailed(format!("/dev: {}", e)))?;

        let mut nodes: Vec<(u32, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let index = node_index(&name)?;
                Some((index, entry.path().to_string_lossy().into_owned()))
            })
            .collect();
        nodes.sort();

        let mut devices = Vec::new();
        for (_, path) in nodes {
            let dev = match v4l::Device::with_path(&path) {
                Ok(dev) => dev,
                Err(e) => {
                    debug!(path, error = %e, "Skipping unopenable node");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path, error = %e, "Skipping node without capabilities");
                    continue;
                }
            };
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                debug!(path, card = %caps.card, "Skipping non-capture node");
                continue;
            }

            debug!(path, card = %caps.card, driver = %caps.driver, "Found capture device");
            devices.push(Device::new(caps.card, path));
        }

        info!(count = devices.len(), "Enumerated V4L2 capture devices");
        Ok(devices)
    }

    fn native_formats(&self, device: &DeviceId, stream_index: u32) -> BackendResult<NativeTypes> {
        if stream_index > 0 {
            return Ok(NativeTypes::InvalidStream);
        }
        if !Path::new(&device.0).exists() {
            return Err(BackendError::DeviceNotFound(device.to_string()));
        }

        let dev = open_device(device)?;
        let descriptions = dev
            .enum_formats()
            .map_err(|e| BackendError::EnumerationFailed(e.to_string()))?;

        let mut types = Vec::new();
        for description in descriptions {
            let sizes = match dev.enum_framesizes(description.fourcc) {
                Ok(sizes) => sizes,
                Err(e) => {
                    debug!(fourcc = %description.fourcc, error = %e, "No frame sizes");
                    continue;
                }
            };

            for size in sizes {
                let FrameSizeEnum::Discrete(discrete) = size.size else {
                    debug!(fourcc = %description.fourcc, "Skipping stepwise frame size");
                    continue;
                };
                let Ok(intervals) =
                    dev.enum_frameintervals(description.fourcc, discrete.width, discrete.height)
                else {
                    continue;
                };

                for interval in intervals {
                    let FrameIntervalEnum::Discrete(frac) = interval.interval else {
                        continue;
                    };
                    // Interval is seconds per frame
                    let Some(frame_rate) = FrameRate::from_fraction(frac.denominator, frac.numerator)
                    else {
                        debug!(
                            fourcc = %description.fourcc,
                            width = discrete.width,
                            height = discrete.height,
                            interval = %format!("{}/{}", frac.numerator, frac.denominator),
                            "Dropping non-standard frame rate"
                        );
                        continue;
                    };

                    types.push(FormatDescriptor {
                        stream_index,
                        major_type: MajorType::Video,
                        sub_type: to_fourcc(description.fourcc),
                        resolution: Resolution::new(discrete.width, discrete.height),
                        frame_rate,
                    });
                }
            }
        }

        Ok(NativeTypes::Types(types))
    }

    fn open_reader(
        &self,
        device: &Device,
        format: &FormatDescriptor,
    ) -> BackendResult<Box<dyn StreamReader>> {
        let dev = open_device(&device.id)?;

        let requested = Format::new(
            format.resolution.width,
            format.resolution.height,
            FourCC::new(&format.sub_type.0),
        );
        let actual = dev
            .set_format(&requested)
            .map_err(|e| BackendError::FormatNotSupported(format!("{}: {}", format, e)))?;

        let (num, denom) = format.frame_rate.as_fraction();
        let frame_rate = match dev.set_params(&Parameters::new(Fraction::new(denom, num))) {
            Ok(params) => FrameRate::from_fraction(params.interval.denominator, params.interval.numerator)
                .unwrap_or(format.frame_rate),
            Err(e) => {
                warn!(device = %device.name, error = %e, "Could not set frame interval");
                format.frame_rate
            }
        };

        let negotiated = FormatDescriptor {
            stream_index: format.stream_index,
            major_type: MajorType::Video,
            sub_type: to_fourcc(actual.fourcc),
            resolution: Resolution::new(actual.width, actual.height),
            frame_rate,
        };
        if negotiated.tuple() != format.tuple() {
            warn!(
                device = %device.name,
                requested = %format.tuple(),
                negotiated = %negotiated.tuple(),
                "Device coerced the requested format"
            );
        }

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, self.buffer_count)
            .map_err(|e| BackendError::OpenFailed(format!("{}: {}", device.name, e)))?;

        info!(
            device = %device.name,
            format = %negotiated,
            buffers = self.buffer_count,
            "V4L2 reader opened"
        );

        Ok(Box::new(V4l2Reader {
            _device: dev,
            stream,
            negotiated,
        }))
    }
}

struct V4l2Reader {
    _device: v4l::Device,
    stream: Stream<'static>,
    negotiated: FormatDescriptor,
}

impl StreamReader for V4l2Reader {
    fn negotiated(&self) -> FormatDescriptor {
        self.negotiated
    }

    fn read_into(&mut self, buffer: &mut Vec<u8>) -> ReadStatus {
        match self.stream.next() {
            Ok((data, meta)) => {
                if meta.bytesused == 0 {
                    return ReadStatus::StreamTick;
                }
                let used = (meta.bytesused as usize).min(data.len());
                buffer.clear();
                buffer.extend_from_slice(&data[..used]);
                ReadStatus::Sample(used)
            }
            Err(e) => ReadStatus::Failed(e.to_string()),
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.stream.stop() {
            debug!(error = %e, "Stopping V4L2 stream failed");
        }
    }
}
