// SPDX-License-Identifier: GPL-3.0-only

//! Cascading capability resolution
//!
//! [`SelectionResolver::handle`] is a transition function: it updates the
//! selection for one `LevelChanged` event and returns the ordered effects the
//! node has to carry out. It never opens or closes anything itself.
//!
//! Handling a change at level `k`:
//!
//! 1. `"NONE"` unsets the level. Any other value must be one of the level's
//!    live options, otherwise it is corrected back to `"NONE"`.
//! 2. The option list of the level below is recomputed and published.
//! 3. The level below is re-applied with its held value if still valid, or
//!    forced to `"NONE"` if not. An unset level with exactly one concrete
//!    option is auto-selected, unless the event is an initial restore.
//! 4. Reaching FrameRate with every level concrete opens the matching
//!    session; an unset FrameRate closes the open one.
//!
//! Each event visits every level at or below `k` exactly once, so a
//! transition takes at most four steps.

use super::level::{Level, SelectionState};
use super::options::{device_options, level_options, single_choice};
use crate::backends::camera::FormatCatalog;
use crate::backends::camera::catalog::find_descriptor;
use crate::backends::camera::types::{CapabilityTuple, Device, DeviceId, FormatDescriptor};
use crate::constants::SENTINEL;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device and format queries the resolver needs
pub trait CatalogSource: Send + Sync {
    fn list_devices(&self) -> Vec<Device>;
    fn list_formats(&self, device: &Device) -> Vec<FormatDescriptor>;
}

impl CatalogSource for FormatCatalog {
    fn list_devices(&self) -> Vec<Device> {
        FormatCatalog::list_devices(self)
    }

    fn list_formats(&self, device: &Device) -> Vec<FormatDescriptor> {
        FormatCatalog::list_formats(self, device)
    }
}

/// A value change reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChanged {
    pub level: Level,
    pub value: String,
    /// Set while the host restores persisted values; suppresses auto-select
    pub initial_restore: bool,
}

impl LevelChanged {
    pub fn new(level: Level, value: impl Into<String>) -> Self {
        Self {
            level,
            value: value.into(),
            initial_restore: false,
        }
    }

    pub fn restore(level: Level, value: impl Into<String>) -> Self {
        Self {
            initial_restore: true,
            ..Self::new(level, value)
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Correct or auto-select the host's value for a level
    SetValue { level: Level, value: String },
    /// Replace the host's option list for a level
    UpdateOptions { level: Level, options: Vec<String> },
    /// Open a session for the tuple
    OpenSession {
        device: Device,
        tuple: CapabilityTuple,
    },
    /// Close this resolver's session
    CloseSession,
}

/// Effects of one transition, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    /// Levels visited
    pub steps: usize,
}

impl Transition {
    pub fn opens(&self) -> Option<&CapabilityTuple> {
        self.effects.iter().find_map(|e| match e {
            Effect::OpenSession { tuple, .. } => Some(tuple),
            _ => None,
        })
    }

    pub fn closes(&self) -> bool {
        self.effects.contains(&Effect::CloseSession)
    }

    /// Values pushed to the host for `level`
    pub fn values_set(&self, level: Level) -> Vec<&str> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::SetValue { level: l, value } if *l == level => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Last option list published for `level`
    pub fn options(&self, level: Level) -> Option<&[String]> {
        self.effects.iter().rev().find_map(|e| match e {
            Effect::UpdateOptions { level: l, options } if *l == level => Some(options.as_slice()),
            _ => None,
        })
    }
}

/// Selection state machine of one node
pub struct SelectionResolver {
    catalog: Arc<dyn CatalogSource>,
    state: SelectionState,
    /// Formats of the selected device, snapshotted when the device was applied
    device_formats: Vec<FormatDescriptor>,
    /// Tuple this resolver has asked to open
    opened: Option<(DeviceId, CapabilityTuple)>,
}

impl SelectionResolver {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            catalog,
            state: SelectionState::default(),
            device_formats: Vec::new(),
            opened: None,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn device_formats(&self) -> &[FormatDescriptor] {
        &self.device_formats
    }

    /// Whether a session for the current selection has been requested
    pub fn has_session(&self) -> bool {
        self.opened.is_some()
    }

    /// Publish the device list
    pub fn refresh_devices(&self) -> Transition {
        let options = device_options(&self.catalog.list_devices());
        Transition {
            effects: vec![Effect::UpdateOptions {
                level: Level::Device,
                options,
            }],
            steps: 0,
        }
    }

    /// Current option list of a level
    pub fn options(&self, level: Level) -> Vec<String> {
        match level {
            Level::Device => device_options(&self.catalog.list_devices()),
            _ => level_options(level, &self.state, &self.device_formats),
        }
    }

    /// Handle one value change
    pub fn handle(&mut self, event: &LevelChanged) -> Transition {
        debug!(
            level = %event.level,
            value = %event.value,
            initial = event.initial_restore,
            "Selection changed"
        );
        let mut transition = Transition::default();
        self.apply(event.level, &event.value, event.initial_restore, &mut transition);
        transition
    }

    /// The requested session could not be opened
    pub fn reject_open(&mut self, diagnostic: &str) -> Transition {
        warn!(error = %diagnostic, "Session open rejected, clearing frame rate");
        self.opened = None;
        self.state.frame_rate = None;
        Transition {
            effects: vec![Effect::SetValue {
                level: Level::FrameRate,
                value: SENTINEL.to_string(),
            }],
            steps: 0,
        }
    }

    /// Drop the session bookkeeping without touching the selection
    pub fn forget_session(&mut self) {
        self.opened = None;
    }

    fn apply(&mut self, level: Level, raw: &str, initial: bool, transition: &mut Transition) {
        transition.steps += 1;

        let accepted = raw != SENTINEL && self.record(level, raw, transition);
        if !accepted {
            if raw != SENTINEL {
                debug!(level = %level, value = %raw, "Value not among live options");
                transition.effects.push(Effect::SetValue {
                    level,
                    value: SENTINEL.to_string(),
                });
            }
            self.unset(level);
        }

        if level == Level::FrameRate {
            self.sync_session(transition);
            return;
        }
        let Some(next) = level.next() else {
            return;
        };

        let options = level_options(next, &self.state, &self.device_formats);
        transition.effects.push(Effect::UpdateOptions {
            level: next,
            options: options.clone(),
        });

        let value = match self.state.value(next) {
            Some(held) if options.contains(&held) => held,
            Some(held) => {
                debug!(level = %next, value = %held, "Held value invalidated");
                transition.effects.push(Effect::SetValue {
                    level: next,
                    value: SENTINEL.to_string(),
                });
                SENTINEL.to_string()
            }
            None => match single_choice(&options) {
                Some(only) if !initial => {
                    debug!(level = %next, value = %only, "Auto-selecting only option");
                    transition.effects.push(Effect::SetValue {
                        level: next,
                        value: only.to_string(),
                    });
                    only.to_string()
                }
                _ => SENTINEL.to_string(),
            },
        };

        self.apply(next, &value, initial, transition);
    }

    /// Store a concrete value; false when it matches no live option
    ///
    /// A device missing from the fresh snapshot republishes the device list,
    /// since the host's copy is stale.
    fn record(&mut self, level: Level, raw: &str, transition: &mut Transition) -> bool {
        match level {
            Level::Device => {
                // Fresh snapshot; names are not unique, first match wins
                let devices = self.catalog.list_devices();
                let Some(device) = devices.iter().find(|d| d.name == raw).cloned() else {
                    transition.effects.push(Effect::UpdateOptions {
                        level: Level::Device,
                        options: device_options(&devices),
                    });
                    return false;
                };
                self.device_formats = self.catalog.list_formats(&device);
                self.state.device = Some(device);
                true
            }
            _ => {
                let options = level_options(level, &self.state, &self.device_formats);
                if !options.iter().any(|o| o == raw) {
                    return false;
                }
                match level {
                    Level::Format => raw.parse().map(|v| self.state.format = Some(v)).is_ok(),
                    Level::Resolution => raw.parse().map(|v| self.state.resolution = Some(v)).is_ok(),
                    Level::FrameRate => raw.parse().map(|v| self.state.frame_rate = Some(v)).is_ok(),
                    Level::Device => false,
                }
            }
        }
    }

    fn unset(&mut self, level: Level) {
        self.state.clear(level);
        if level == Level::Device {
            self.device_formats.clear();
        }
    }

    fn sync_session(&mut self, transition: &mut Transition) {
        let (Some(device), Some(tuple)) = (self.state.device.clone(), self.state.tuple()) else {
            if self.opened.take().is_some() {
                transition.effects.push(Effect::CloseSession);
            }
            return;
        };

        if self.opened.as_ref() == Some(&(device.id.clone(), tuple)) {
            debug!(tuple = %tuple, "Session already open for selection");
            return;
        }

        if self.opened.take().is_some() {
            transition.effects.push(Effect::CloseSession);
        }

        if find_descriptor(&self.device_formats, &tuple).is_none() {
            warn!(device = %device.name, tuple = %tuple, "No catalog entry for selection");
            self.state.frame_rate = None;
            transition.effects.push(Effect::SetValue {
                level: Level::FrameRate,
                value: SENTINEL.to_string(),
            });
            return;
        }

        info!(device = %device.name, tuple = %tuple, "Selection complete, opening session");
        self.opened = Some((device.id.clone(), tuple));
        transition.effects.push(Effect::OpenSession { device, tuple });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{FourCc, FrameRate};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCatalog {
        devices: Mutex<Vec<(Device, Vec<FormatDescriptor>)>>,
    }

    impl FakeCatalog {
        fn with(devices: Vec<(&str, Vec<FormatDescriptor>)>) -> Arc<Self> {
            let devices = devices
                .into_iter()
                .enumerate()
                .map(|(i, (name, formats))| (Device::new(name, format!("fake:{}", i)), formats))
                .collect();
            Arc::new(Self {
                devices: Mutex::new(devices),
            })
        }

        fn unplug(&self, name: &str) {
            self.devices.lock().unwrap().retain(|(d, _)| d.name != name);
        }
    }

    impl CatalogSource for FakeCatalog {
        fn list_devices(&self) -> Vec<Device> {
            self.devices.lock().unwrap().iter().map(|(d, _)| d.clone()).collect()
        }

        fn list_formats(&self, device: &Device) -> Vec<FormatDescriptor> {
            self.devices
                .lock()
                .unwrap()
                .iter()
                .find(|(d, _)| d == device)
                .map(|(_, f)| f.clone())
                .unwrap_or_default()
        }
    }

    fn yuy2(width: u32, height: u32) -> FormatDescriptor {
        FormatDescriptor::video(FourCc::YUY2, width, height, FrameRate::Fps30)
    }

    #[test]
    fn test_zero_devices_rejects_everything() {
        let mut resolver = SelectionResolver::new(FakeCatalog::with(vec![]));

        let refresh = resolver.refresh_devices();
        assert_eq!(refresh.options(Level::Device), Some(&["NONE".to_string()][..]));

        let t = resolver.handle(&LevelChanged::new(Level::Device, "Ghost"));
        assert_eq!(t.values_set(Level::Device), vec!["NONE"]);
        assert!(resolver.state().device.is_none());
    }

    #[test]
    fn test_multiple_resolutions_do_not_auto_select() {
        let catalog = FakeCatalog::with(vec![("D", vec![yuy2(1280, 720), yuy2(640, 480)])]);
        let mut resolver = SelectionResolver::new(catalog);

        let t = resolver.handle(&LevelChanged::new(Level::Device, "D"));
        // Single format auto-selected, resolution left for the user
        assert_eq!(t.values_set(Level::Format), vec!["YUY2"]);
        assert_eq!(
            t.options(Level::Resolution).unwrap(),
            &["NONE", "1280x720", "640x480"]
        );
        assert!(t.values_set(Level::Resolution).is_empty());
        assert!(t.opens().is_none());
    }

    #[test]
    fn test_initial_restore_suppresses_auto_select() {
        let catalog = FakeCatalog::with(vec![(
            "D",
            vec![FormatDescriptor::video(FourCc::NV12, 1920, 1080, FrameRate::Fps60)],
        )]);
        let mut resolver = SelectionResolver::new(catalog);

        let t = resolver.handle(&LevelChanged::restore(Level::Device, "D"));
        assert!(t.values_set(Level::Format).is_empty());
        assert!(t.opens().is_none());

        resolver.handle(&LevelChanged::restore(Level::Format, "NV12"));
        resolver.handle(&LevelChanged::restore(Level::Resolution, "1920x1080"));
        let t = resolver.handle(&LevelChanged::restore(Level::FrameRate, "60"));
        assert!(t.opens().is_some());
    }

    #[test]
    fn test_invalidated_descendants_reset() {
        let catalog = FakeCatalog::with(vec![
            ("A", vec![yuy2(1280, 720), yuy2(640, 480)]),
            ("B", vec![FormatDescriptor::video(FourCc::NV12, 320, 240, FrameRate::Fps15), yuy2(640, 480)]),
        ]);
        let mut resolver = SelectionResolver::new(catalog);

        resolver.handle(&LevelChanged::new(Level::Device, "A"));
        resolver.handle(&LevelChanged::new(Level::Resolution, "1280x720"));
        assert!(resolver.has_session());

        // B has YUY2 but not 1280x720
        let t = resolver.handle(&LevelChanged::new(Level::Device, "B"));
        assert_eq!(t.values_set(Level::Resolution), vec!["NONE"]);
        assert!(t.closes());
        assert!(!resolver.has_session());
        assert_eq!(resolver.state().format, Some(FourCc::YUY2));
        assert!(resolver.state().is_consistent());
    }

    #[test]
    fn test_same_tuple_is_not_reopened() {
        let catalog = FakeCatalog::with(vec![("D", vec![yuy2(640, 480)])]);
        let mut resolver = SelectionResolver::new(catalog);

        let first = resolver.handle(&LevelChanged::new(Level::Device, "D"));
        assert!(first.opens().is_some());

        let again = resolver.handle(&LevelChanged::new(Level::Format, "YUY2"));
        assert!(again.opens().is_none());
        assert!(!again.closes());
    }

    #[test]
    fn test_vanished_device_is_no_match() {
        let catalog = FakeCatalog::with(vec![("D", vec![yuy2(640, 480)])]);
        let mut resolver = SelectionResolver::new(catalog.clone());
        resolver.handle(&LevelChanged::new(Level::Device, "D"));

        catalog.unplug("D");
        let t = resolver.handle(&LevelChanged::new(Level::Device, "D"));
        assert_eq!(t.values_set(Level::Device), vec!["NONE"]);
        assert_eq!(t.options(Level::Device).unwrap(), &["NONE"]);
        assert!(t.closes());
        assert_eq!(resolver.state(), &SelectionState::default());
    }

    #[test]
    fn test_reject_open_clears_frame_rate() {
        let catalog = FakeCatalog::with(vec![("D", vec![yuy2(640, 480)])]);
        let mut resolver = SelectionResolver::new(catalog);
        resolver.handle(&LevelChanged::new(Level::Device, "D"));

        let t = resolver.reject_open("device busy");
        assert_eq!(t.values_set(Level::FrameRate), vec!["NONE"]);
        assert!(!resolver.has_session());
        assert!(resolver.state().frame_rate.is_none());
        assert_eq!(resolver.state().resolution, Some(yuy2(640, 480).resolution));
    }

    #[test]
    fn test_cascade_is_bounded() {
        let catalog = FakeCatalog::with(vec![("D", vec![yuy2(640, 480)])]);
        let mut resolver = SelectionResolver::new(catalog);

        for level in Level::ALL {
            let t = resolver.handle(&LevelChanged::new(level, "NONE"));
            assert!(t.steps <= Level::ALL.len());
        }
        let t = resolver.handle(&LevelChanged::new(Level::Device, "D"));
        assert_eq!(t.steps, 4);
    }
}
