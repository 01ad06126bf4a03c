// SPDX-License-Identifier: GPL-3.0-only

//! Scripted in-memory capture backend
//!
//! Used by the test suite and by `--backend mock`. Devices and their native
//! types are configured up front; open failures, format coercion and read
//! results can be scripted at runtime. Opens and releases are counted so
//! tests can check that every reader is released exactly once.

use super::types::*;
use super::{CaptureBackend, StreamReader};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// One scripted read result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    Data(Vec<u8>),
    /// Zero-length sample
    Empty,
    Tick,
    EndOfStream,
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockDevice {
    device: Device,
    /// Native types per stream index
    streams: Vec<Vec<FormatDescriptor>>,
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    open_failure: Option<String>,
    coerce: Option<FormatDescriptor>,
    reads: VecDeque<MockRead>,
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    releases: AtomicUsize,
    flushes: AtomicUsize,
}

/// Scripted capture backend
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    counters: Arc<Counters>,
    fail_enumeration: Arc<AtomicBool>,
}

impl MockBackend {
    /// A backend with no devices
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with one synthetic camera offering a few common modes
    pub fn demo() -> Self {
        Self::new().with_device(
            "Virtual Test Camera",
            vec![
                FormatDescriptor::video(FourCc::NV12, 1280, 720, FrameRate::Fps30),
                FormatDescriptor::video(FourCc::NV12, 640, 480, FrameRate::Fps30),
                FormatDescriptor::video(FourCc::NV12, 640, 480, FrameRate::Fps15),
                FormatDescriptor::video(FourCc::new(b"YUYV"), 640, 480, FrameRate::Fps30),
            ],
        )
    }

    /// Add a device exposing a single stream
    pub fn with_device(self, name: &str, formats: Vec<FormatDescriptor>) -> Self {
        self.with_device_streams(name, vec![formats])
    }

    /// Add a device exposing several streams
    ///
    /// Each descriptor's stream index is set to its position in `streams`.
    pub fn with_device_streams(self, name: &str, streams: Vec<Vec<FormatDescriptor>>) -> Self {
        {
            let mut state = self.lock();
            let id = format!("mock:{}", state.devices.len());
            let streams = streams
                .into_iter()
                .enumerate()
                .map(|(index, formats)| {
                    formats
                        .into_iter()
                        .map(|mut f| {
                            f.stream_index = index as u32;
                            f
                        })
                        .collect()
                })
                .collect();
            state.devices.push(MockDevice {
                device: Device::new(name, id),
                streams,
            });
        }
        self
    }

    /// Unplug every device with this name
    pub fn remove_device(&self, name: &str) {
        self.lock().devices.retain(|d| d.device.name != name);
    }

    /// Make device enumeration fail
    pub fn set_enumeration_failure(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// Make every open fail with this diagnostic, or clear it with `None`
    pub fn set_open_failure(&self, message: Option<&str>) {
        self.lock().open_failure = message.map(str::to_string);
    }

    /// Have every subsequent open negotiate `format` regardless of the request
    pub fn coerce_to(&self, format: FormatDescriptor) {
        self.lock().coerce = Some(format);
    }

    /// Queue read results; once drained, readers synthesize frames
    pub fn script_reads(&self, reads: Vec<MockRead>) {
        self.lock().reads.extend(reads);
    }

    /// Every native type of a device across all streams
    pub fn formats_of(&self, id: &DeviceId) -> Vec<FormatDescriptor> {
        self.lock()
            .devices
            .iter()
            .find(|d| d.device.id == *id)
            .map(|d| d.streams.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.counters.flushes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CaptureBackend for MockBackend {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::Mock
    }

    fn enumerate_devices(&self) -> BackendResult<Vec<Device>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(BackendError::EnumerationFailed(
                "mock enumeration failure".to_string(),
            ));
        }
        Ok(self.lock().devices.iter().map(|d| d.device.clone()).collect())
    }

    fn native_formats(&self, device: &DeviceId, stream_index: u32) -> BackendResult<NativeTypes> {
        let state = self.lock();
        let mock = state
            .devices
            .iter()
            .find(|d| d.device.id == *device)
            .ok_or_else(|| BackendError::DeviceNotFound(device.to_string()))?;

        Ok(match mock.streams.get(stream_index as usize) {
            Some(types) => NativeTypes::Types(types.clone()),
            None => NativeTypes::InvalidStream,
        })
    }

    fn open_reader(
        &self,
        device: &Device,
        format: &FormatDescriptor,
    ) -> BackendResult<Box<dyn StreamReader>> {
        let negotiated = {
            let state = self.lock();
            if let Some(message) = &state.open_failure {
                return Err(BackendError::OpenFailed(message.clone()));
            }
            if !state.devices.iter().any(|d| d.device.id == device.id) {
                return Err(BackendError::DeviceNotFound(device.name.clone()));
            }
            state.coerce.unwrap_or(*format)
        };

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        debug!(device = %device.name, format = %negotiated, "Mock reader opened");

        Ok(Box::new(MockReader {
            negotiated,
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            frame: 0,
        }))
    }
}

struct MockReader {
    negotiated: FormatDescriptor,
    state: Arc<Mutex<MockState>>,
    counters: Arc<Counters>,
    frame: u64,
}

impl MockReader {
    /// Moving diagonal ramp sized for the negotiated format
    fn synthesize(&mut self, buffer: &mut Vec<u8>) -> usize {
        let resolution = self.negotiated.resolution;
        let len = self
            .negotiated
            .sub_type
            .frame_len(resolution)
            .unwrap_or(resolution.pixels() as usize);
        let width = resolution.width.max(1) as usize;

        buffer.clear();
        buffer.extend((0..len).map(|i| ((i % width + i / width) as u64 + self.frame) as u8));
        self.frame += 1;
        len
    }
}

impl StreamReader for MockReader {
    fn negotiated(&self) -> FormatDescriptor {
        self.negotiated
    }

    fn read_into(&mut self, buffer: &mut Vec<u8>) -> ReadStatus {
        let scripted = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reads
            .pop_front();

        match scripted {
            Some(MockRead::Data(data)) => {
                buffer.clear();
                buffer.extend_from_slice(&data);
                ReadStatus::Sample(data.len())
            }
            Some(MockRead::Empty) => {
                buffer.clear();
                ReadStatus::Sample(0)
            }
            Some(MockRead::Tick) => ReadStatus::StreamTick,
            Some(MockRead::EndOfStream) => ReadStatus::EndOfStream,
            Some(MockRead::Fail(message)) => ReadStatus::Failed(message),
            None => ReadStatus::Sample(self.synthesize(buffer)),
        }
    }

    fn flush(&mut self) {
        self.counters.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
