// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌────────────────┐
//! │   Registry   │ ──▶ │   Frame Reader    │ ──▶ │ Host / Virtual │
//! │  (session)   │     │  - retry once     │     │     Output     │
//! │              │     │  - copy min len   │     │                │
//! └──────────────┘     └───────────────────┘     └────────────────┘
//! ```
//!
//! - [`reader`]: periodic execution cycles over an open session

pub mod reader;

pub use reader::{FrameReader, ReaderStats};
