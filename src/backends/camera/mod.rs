// SPDX-License-Identifier: GPL-3.0-only

//! Capture backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐        ┌─────────────────────┐
//! │  SelectionResolver  │        │     FrameReader     │
//! └──────────┬──────────┘        └──────────┬──────────┘
//!            │ open / delete                │ get
//!            ▼                              ▼
//! ┌──────────────────────────────────────────────────┐
//! │                 SessionRegistry                  │  ← RwLock'd id → session table
//! └──────────┬──────────────────────────┬────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌─────────────────────┐    ┌─────────────────────┐
//! │    FormatCatalog    │    │   CaptureSession    │  ← owns one StreamReader
//! └──────────┬──────────┘    └──────────┬──────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌──────────────────────────────────────────────────┐
//! │              CaptureBackend trait                │
//! └──────────┬──────────────────────────┬────────────┘
//!            ▼                          ▼
//!        ┌────────┐                ┌────────┐
//!        │  V4L2  │                │  Mock  │
//!        └────────┘                └────────┘
//! ```

pub mod catalog;
pub mod frame_loop;
pub mod mock;
pub mod registry;
pub mod session;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use catalog::FormatCatalog;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{CaptureSession, Sample, SessionId, SessionState, StreamInfo};
pub use types::*;

use std::sync::Arc;

/// Capture backend trait
///
/// Backends provide device discovery, native format enumeration and readers
/// bound to one negotiated format. Implementations must be safe to call from
/// the selection thread and the reader thread at the same time.
pub trait CaptureBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CaptureBackendType;

    /// Enumerate capture devices currently present
    fn enumerate_devices(&self) -> BackendResult<Vec<Device>>;

    /// Enumerate the native types of one stream of a device
    ///
    /// Returns [`NativeTypes::InvalidStream`] once `stream_index` is past the
    /// last stream of the device.
    fn native_formats(&self, device: &DeviceId, stream_index: u32) -> BackendResult<NativeTypes>;

    /// Open a reader configured for `format`
    ///
    /// The reader reports the format the device actually accepted, which may
    /// differ from the request.
    fn open_reader(
        &self,
        device: &Device,
        format: &FormatDescriptor,
    ) -> BackendResult<Box<dyn StreamReader>>;
}

/// A reader bound to one stream of an opened device
///
/// Dropping the reader releases the backend handle.
pub trait StreamReader: Send {
    /// The format negotiated with the device
    fn negotiated(&self) -> FormatDescriptor;

    /// Pull one unit into `buffer`, replacing its contents
    fn read_into(&mut self, buffer: &mut Vec<u8>) -> ReadStatus;

    /// Discard any queued samples
    fn flush(&mut self);
}

/// Get a concrete backend instance
///
/// `buffer_count` is the number of capture buffers requested per reader on
/// backends that stream through mapped buffers.
#[cfg_attr(not(target_os = "linux"), allow(unused_variables))]
pub fn get_backend(
    backend_type: CaptureBackendType,
    buffer_count: u32,
) -> BackendResult<Arc<dyn CaptureBackend>> {
    match backend_type {
        CaptureBackendType::Mock => Ok(Arc::new(mock::MockBackend::demo())),
        #[cfg(target_os = "linux")]
        CaptureBackendType::V4l2 => Ok(Arc::new(
            v4l2::V4l2Backend::new().with_buffer_count(buffer_count),
        )),
        #[cfg(not(target_os = "linux"))]
        CaptureBackendType::V4l2 => Err(BackendError::NotAvailable(
            "V4L2 is only available on Linux".to_string(),
        )),
    }
}

/// Get the default backend type
pub fn get_default_backend() -> CaptureBackendType {
    CaptureBackendType::default()
}
