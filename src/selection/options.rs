// SPDX-License-Identifier: GPL-3.0-only

//! Option list derivation
//!
//! Every list starts with the sentinel, followed by the distinct values that
//! are consistent with the ancestors' current selection. Values keep catalog
//! order, so the first concrete entry is always the best quality one.

use super::level::{Level, SelectionState};
use crate::backends::camera::types::{Device, FormatDescriptor};
use crate::constants::SENTINEL;

fn with_sentinel(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut options = vec![SENTINEL.to_string()];
    for value in values {
        if !options.contains(&value) {
            options.push(value);
        }
    }
    options
}

/// Device names; duplicates collapse onto the first device
pub fn device_options(devices: &[Device]) -> Vec<String> {
    with_sentinel(devices.iter().map(|d| d.name.clone()))
}

/// Options for a level below Device, from the selected device's formats
pub fn level_options(level: Level, state: &SelectionState, formats: &[FormatDescriptor]) -> Vec<String> {
    let values: Vec<String> = match level {
        Level::Format if state.device.is_some() => formats
            .iter()
            .map(|f| f.format_tag().to_string())
            .collect(),
        Level::Resolution => match (&state.device, state.format) {
            (Some(_), Some(format)) => formats
                .iter()
                .filter(|f| f.format_tag() == format)
                .map(|f| f.resolution.to_string())
                .collect(),
            _ => Vec::new(),
        },
        Level::FrameRate => match (&state.device, state.format, state.resolution) {
            (Some(_), Some(format), Some(resolution)) => formats
                .iter()
                .filter(|f| f.format_tag() == format && f.resolution == resolution)
                .map(|f| f.frame_rate.to_string())
                .collect(),
            _ => Vec::new(),
        },
        Level::Device | Level::Format => Vec::new(),
    };
    with_sentinel(values.into_iter())
}

/// Entries other than the sentinel
pub fn concrete(options: &[String]) -> impl Iterator<Item = &String> {
    options.iter().filter(|o| o.as_str() != SENTINEL)
}

/// The one concrete entry, if there is exactly one
pub fn single_choice(options: &[String]) -> Option<&str> {
    let mut values = concrete(options);
    match (values.next(), values.next()) {
        (Some(only), None) => Some(only.as_str()),
        _ => None,
    }
}
