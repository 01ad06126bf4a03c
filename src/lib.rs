// SPDX-License-Identifier: GPL-3.0-only

//! Webcam stream - cascading capture selection and frame delivery
//!
//! A capture node exposes four dependent selections (device, pixel format,
//! resolution, frame rate). Each choice narrows the options of the next level;
//! once all four are concrete a capture session is opened and frames are read
//! from it on a periodic thread.
//!
//! # Architecture
//!
//! - [`backends`]: capture backends (V4L2, mock), the format catalog, the
//!   session registry and the virtual camera output
//! - [`selection`]: the cascading resolver and the node that executes it
//! - [`pipelines`]: frame reader execution cycles
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webcam_stream::backends::camera::mock::MockBackend;
//! use webcam_stream::selection::{Level, RecordingHost};
//! use webcam_stream::{FormatCatalog, SessionRegistry, StreamNode};
//!
//! let catalog = FormatCatalog::new(Arc::new(MockBackend::demo()));
//! let mut node = StreamNode::new("1", SessionRegistry::new(catalog), RecordingHost::default());
//! node.refresh_devices();
//! node.set(Level::Device, "Virtual Test Camera");
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod selection;

// Re-export commonly used types
pub use backends::camera::{FormatCatalog, SessionRegistry};
pub use backends::virtual_camera::VirtualOutput;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipelines::FrameReader;
pub use selection::{Level, StreamNode};
