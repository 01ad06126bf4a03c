// SPDX-License-Identifier: GPL-3.0-only

//! Device, format, resolution and frame rate selection
//!
//! A [`StreamNode`] feeds host value changes through its
//! [`SelectionResolver`] and carries out the resulting effects: option list
//! updates, value corrections and session open/close on the registry.

pub mod level;
pub mod node;
pub mod options;
pub mod resolver;

pub use level::{Level, SelectionState};
pub use node::{NodeStatus, ParameterHost, RecordingHost, StreamNode};
pub use resolver::{CatalogSource, Effect, LevelChanged, SelectionResolver, Transition};
