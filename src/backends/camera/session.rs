// SPDX-License-Identifier: GPL-3.0-only

//! Opened capture sessions
//!
//! A [`CaptureSession`] owns exactly one backend [`StreamReader`] together
//! with the buffer samples are copied into. Reads and close share one mutex,
//! so a close never tears the reader down under an in-flight read, and a
//! [`Sample`] keeps the session locked until the caller is done with it.

use super::StreamReader;
use super::types::*;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Opaque session identifier, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ParseValueError(s.to_string()))
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Metadata published to the host once a session is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: SessionId,
    pub device_name: String,
    pub format_name: String,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    pub stream_index: u32,
}

impl StreamInfo {
    /// The negotiated tuple described by this info
    pub fn tuple(&self) -> Option<CapabilityTuple> {
        Some(CapabilityTuple {
            format: self.format_name.parse().ok()?,
            resolution: self.resolution,
            frame_rate: self.frame_rate,
        })
    }
}

struct ReaderSlot {
    reader: Option<Box<dyn StreamReader>>,
    buffer: Vec<u8>,
}

/// One opened stream bound to a negotiated format
pub struct CaptureSession {
    id: SessionId,
    device: Device,
    requested: FormatDescriptor,
    negotiated: FormatDescriptor,
    slot: Mutex<ReaderSlot>,
}

impl CaptureSession {
    /// Wrap an opened reader
    pub fn new(device: Device, requested: FormatDescriptor, reader: Box<dyn StreamReader>) -> Self {
        let negotiated = reader.negotiated();
        Self {
            id: SessionId::new(),
            device,
            requested,
            negotiated,
            slot: Mutex::new(ReaderSlot {
                reader: Some(reader),
                buffer: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The descriptor the session was opened for
    pub fn requested(&self) -> &FormatDescriptor {
        &self.requested
    }

    /// The descriptor the backend actually configured
    pub fn negotiated(&self) -> &FormatDescriptor {
        &self.negotiated
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id,
            device_name: self.device.name.clone(),
            format_name: self.negotiated.format_tag().to_string(),
            resolution: self.negotiated.resolution,
            frame_rate: self.negotiated.frame_rate,
            stream_index: self.negotiated.stream_index,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.lock_slot().reader.is_some() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    /// Pull one unit from the reader
    ///
    /// End of stream, heartbeats, empty payloads and backend failures all
    /// yield `None`. The returned sample holds the session lock, so the next
    /// read or close waits until it is dropped.
    pub fn read_sample(&self) -> Option<Sample<'_>> {
        let mut slot = self.lock_slot();
        let ReaderSlot { reader, buffer } = &mut *slot;
        let reader = reader.as_mut()?;

        match reader.read_into(buffer) {
            ReadStatus::Sample(0) => {
                trace!(session = %self.id, "Empty sample");
                None
            }
            ReadStatus::Sample(len) => {
                let len = len.min(buffer.len());
                Some(Sample { guard: slot, len })
            }
            ReadStatus::EndOfStream => {
                debug!(session = %self.id, "End of stream");
                None
            }
            ReadStatus::StreamTick => {
                trace!(session = %self.id, "Stream tick");
                None
            }
            ReadStatus::Failed(msg) => {
                debug!(session = %self.id, error = %msg, "Sample read failed");
                None
            }
        }
    }

    /// Flush and release the reader
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn close(&self) -> bool {
        let mut slot = self.lock_slot();
        match slot.reader.take() {
            Some(mut reader) => {
                reader.flush();
                drop(reader);
                slot.buffer = Vec::new();
                info!(session = %self.id, device = %self.device.name, "Capture session closed");
                true
            }
            None => false,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, ReaderSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("device", &self.device.name)
            .field("negotiated", &self.negotiated)
            .finish_non_exhaustive()
    }
}

/// Bytes of one sample, borrowed from the session buffer
pub struct Sample<'a> {
    guard: MutexGuard<'a, ReaderSlot>,
    len: usize,
}

impl Sample<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for Sample<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard.buffer[..self.len]
    }
}
