// SPDX-License-Identifier: GPL-3.0-only

//! Selection levels and the per-node selection state

use crate::backends::camera::types::{CapabilityTuple, Device, FourCc, FrameRate, Resolution};
use crate::constants::lists::LIST_PREFIX;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One level of the dependent capture configuration, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Device,
    Format,
    Resolution,
    FrameRate,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Device, Level::Format, Level::Resolution, Level::FrameRate];

    /// The level directly below this one
    pub fn next(self) -> Option<Level> {
        match self {
            Level::Device => Some(Level::Format),
            Level::Format => Some(Level::Resolution),
            Level::Resolution => Some(Level::FrameRate),
            Level::FrameRate => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Device => "Device",
            Level::Format => "Format",
            Level::Resolution => "Resolution",
            Level::FrameRate => "FrameRate",
        }
    }

    /// Host option list name, e.g. `webcam.DeviceList.node-1`
    pub fn list_name(self, node_id: &str) -> String {
        format!("{}.{}List.{}", LIST_PREFIX, self.name(), node_id)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown level: {}", s))
    }
}

/// Current selection of one node; `None` is the sentinel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub device: Option<Device>,
    pub format: Option<FourCc>,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<FrameRate>,
}

impl SelectionState {
    /// Display value held at `level`
    pub fn value(&self, level: Level) -> Option<String> {
        match level {
            Level::Device => self.device.as_ref().map(|d| d.name.clone()),
            Level::Format => self.format.map(|f| f.to_string()),
            Level::Resolution => self.resolution.map(|r| r.to_string()),
            Level::FrameRate => self.frame_rate.map(|r| r.to_string()),
        }
    }

    pub fn is_set(&self, level: Level) -> bool {
        match level {
            Level::Device => self.device.is_some(),
            Level::Format => self.format.is_some(),
            Level::Resolution => self.resolution.is_some(),
            Level::FrameRate => self.frame_rate.is_some(),
        }
    }

    pub fn clear(&mut self, level: Level) {
        match level {
            Level::Device => self.device = None,
            Level::Format => self.format = None,
            Level::Resolution => self.resolution = None,
            Level::FrameRate => self.frame_rate = None,
        }
    }

    /// The full tuple, once all four levels are concrete
    pub fn tuple(&self) -> Option<CapabilityTuple> {
        self.device.as_ref()?;
        Some(CapabilityTuple {
            format: self.format?,
            resolution: self.resolution?,
            frame_rate: self.frame_rate?,
        })
    }

    /// No concrete level sits below an unset one
    pub fn is_consistent(&self) -> bool {
        let mut unset_above = false;
        for level in Level::ALL {
            if self.is_set(level) && unset_above {
                return false;
            }
            unset_above |= !self.is_set(level);
        }
        true
    }
}
