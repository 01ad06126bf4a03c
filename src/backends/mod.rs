// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for capture and output
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Selection / Frame Reader            │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │     Camera       │  │ Virtual Camera  │  │
//! │  │  (V4L2 / Mock)   │  │ (v4l2loopback)  │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: device enumeration, format catalog and capture sessions
//! - [`virtual_camera`]: single-owner output that other applications read

pub mod camera;
pub mod virtual_camera;
