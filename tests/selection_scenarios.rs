// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end selection tests against the mock backend

use std::sync::Arc;
use webcam_stream::backends::camera::mock::{MockBackend, MockRead};
use webcam_stream::backends::camera::types::*;
use webcam_stream::errors::{CycleError, SessionError};
use webcam_stream::selection::{LevelChanged, NodeStatus, RecordingHost};
use webcam_stream::{FormatCatalog, FrameReader, Level, SessionRegistry, StreamNode};

const NODE: &str = "1";

fn node_for(backend: &MockBackend) -> (SessionRegistry, StreamNode<RecordingHost>) {
    let registry = SessionRegistry::new(FormatCatalog::new(Arc::new(backend.clone())));
    let mut node = StreamNode::new(NODE, registry.clone(), RecordingHost::default());
    node.refresh_devices();
    (registry, node)
}

fn single_mode_camera() -> MockBackend {
    MockBackend::new().with_device(
        "Cam",
        vec![FormatDescriptor::video(FourCc::NV12, 1920, 1080, FrameRate::Fps60)],
    )
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_zero_devices() {
    let backend = MockBackend::new();
    let (registry, mut node) = node_for(&backend);

    assert_eq!(
        node.host().latest_options(&Level::Device.list_name(NODE)),
        Some(&strings(&["NONE"])[..])
    );

    node.set(Level::Device, "Ghost");
    assert_eq!(node.host().latest_value(Level::Device), Some("NONE"));
    assert!(node.session_id().is_none());
    assert!(registry.is_empty());
    assert_eq!(backend.open_count(), 0);
}

#[test]
fn test_two_resolutions_wait_for_user() {
    let backend = MockBackend::new().with_device(
        "Cam",
        vec![
            FormatDescriptor::video(FourCc::YUY2, 1280, 720, FrameRate::Fps30),
            FormatDescriptor::video(FourCc::YUY2, 640, 480, FrameRate::Fps30),
        ],
    );
    let (_registry, mut node) = node_for(&backend);

    let t = node.set(Level::Device, "Cam");
    assert_eq!(t.values_set(Level::Format), vec!["YUY2"]);
    assert_eq!(
        node.host().latest_options(&Level::Resolution.list_name(NODE)),
        Some(&strings(&["NONE", "1280x720", "640x480"])[..])
    );
    assert!(node.resolver().state().resolution.is_none());
    assert!(node.session_id().is_none());

    node.set(Level::Resolution, "640x480");
    assert_eq!(node.host().latest_value(Level::FrameRate), Some("30"));
    assert!(node.session_id().is_some());
}

#[test]
fn test_single_format_cascades_and_opens() {
    let backend = single_mode_camera();
    let (registry, mut node) = node_for(&backend);

    let t = node.set(Level::Device, "Cam");

    assert_eq!(t.values_set(Level::Format), vec!["NV12"]);
    assert_eq!(t.values_set(Level::Resolution), vec!["1920x1080"]);
    assert_eq!(t.values_set(Level::FrameRate), vec!["60"]);
    assert!(t.steps <= 4);

    let id = node.session_id().expect("session opened");
    assert_eq!(registry.len(), 1);
    assert_eq!(backend.open_count(), 1);
    assert_eq!(node.status(), &NodeStatus::Streaming);
    assert_eq!(node.host().restarts, 1);

    let info = node.stream_info().unwrap();
    assert_eq!(info.id, id);
    assert_eq!(info.device_name, "Cam");
    assert_eq!(info.format_name, "NV12");
    assert_eq!(info.resolution, Resolution::new(1920, 1080));
    assert_eq!(info.frame_rate, FrameRate::Fps60);
}

#[test]
fn test_device_reset_closes_session() {
    let backend = single_mode_camera();
    let (registry, mut node) = node_for(&backend);
    node.set(Level::Device, "Cam");
    assert!(node.session_id().is_some());

    let t = node.set(Level::Device, "NONE");

    assert!(t.closes());
    assert!(node.session_id().is_none());
    assert!(registry.is_empty());
    assert_eq!(backend.release_count(), 1);
    assert_eq!(node.host().streams.last(), Some(&None));
    assert_eq!(node.status(), &NodeStatus::Idle);

    let state = node.resolver().state();
    for level in Level::ALL {
        assert!(!state.is_set(level), "{} should be unset", level);
    }
    assert!(state.is_consistent());
}

#[test]
fn test_double_empty_read_fails_cycle_but_keeps_session() {
    let backend = single_mode_camera();
    let (registry, mut node) = node_for(&backend);
    node.set(Level::Device, "Cam");
    let id = node.session_id().unwrap().to_string();

    let reader = FrameReader::new(registry.clone());
    let mut dest = vec![0u8; 1920 * 1080 * 3 / 2];

    backend.script_reads(vec![MockRead::Empty, MockRead::Empty]);
    assert_eq!(reader.execute(Some(&id), &mut dest), Err(CycleError::NoSample));
    assert_eq!(registry.len(), 1);
    assert_eq!(backend.release_count(), 0);

    // One empty read is absorbed by the retry
    backend.script_reads(vec![MockRead::Empty, MockRead::Data(vec![9; 16])]);
    assert_eq!(reader.execute(Some(&id), &mut dest), Ok(16));
    assert_eq!(&dest[..16], &[9; 16]);
}

#[test]
fn test_tuple_missing_from_snapshot_never_reaches_backend() {
    let backend = single_mode_camera();
    let registry = SessionRegistry::new(FormatCatalog::new(Arc::new(backend.clone())));
    let device = registry.catalog().list_devices().remove(0);

    let tuple = CapabilityTuple {
        format: FourCc::NV12,
        resolution: Resolution::new(320, 240),
        frame_rate: FrameRate::Fps60,
    };
    let result = registry.open(&device, &tuple);

    assert!(matches!(result, Err(SessionError::UnsupportedTuple { .. })));
    assert_eq!(backend.open_count(), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_open_failure_resets_frame_rate() {
    let backend = single_mode_camera();
    backend.set_open_failure(Some("device busy"));
    let (registry, mut node) = node_for(&backend);

    node.set(Level::Device, "Cam");

    assert!(node.session_id().is_none());
    assert!(registry.is_empty());
    assert!(matches!(node.status(), NodeStatus::Error(msg) if msg.contains("device busy")));
    assert_eq!(node.host().latest_value(Level::FrameRate), Some("NONE"));
    assert!(node.resolver().state().frame_rate.is_none());
    // Levels above are kept
    assert_eq!(node.resolver().state().format, Some(FourCc::NV12));

    backend.set_open_failure(None);
    node.set(Level::FrameRate, "60");
    assert!(node.session_id().is_some());
    assert_eq!(node.status(), &NodeStatus::Streaming);
}

#[test]
fn test_initial_restore_does_not_auto_select() {
    let backend = single_mode_camera();
    let (_registry, mut node) = node_for(&backend);

    let t = node.on_level_changed(LevelChanged::restore(Level::Device, "Cam"));
    assert!(t.values_set(Level::Format).is_empty());
    assert!(node.session_id().is_none());

    for (level, value) in [
        (Level::Format, "NV12"),
        (Level::Resolution, "1920x1080"),
        (Level::FrameRate, "60"),
    ] {
        node.on_level_changed(LevelChanged::restore(level, value));
    }
    assert!(node.session_id().is_some());
}

#[test]
fn test_options_only_offer_catalog_entries() {
    let backend = MockBackend::demo();
    let (registry, mut node) = node_for(&backend);
    let device = registry.catalog().list_devices().remove(0);
    let formats = registry.catalog().list_formats(&device);

    node.set(Level::Device, &device.name);
    for format in node.resolver().options(Level::Format) {
        if format == "NONE" {
            continue;
        }
        node.set(Level::Format, &format);
        for resolution in node.resolver().options(Level::Resolution) {
            if resolution == "NONE" {
                continue;
            }
            node.set(Level::Resolution, &resolution);
            for rate in node.resolver().options(Level::FrameRate) {
                if rate == "NONE" {
                    continue;
                }
                assert!(
                    formats.iter().any(|d| d.format_tag().to_string() == format
                        && d.resolution.to_string() == resolution
                        && d.frame_rate.to_string() == rate),
                    "{} {} @ {} is not a catalog entry",
                    format,
                    resolution,
                    rate
                );
            }
        }
    }
}

#[test]
fn test_cascade_terminates_and_keeps_one_session() {
    let backend = MockBackend::demo();
    let (registry, mut node) = node_for(&backend);

    let events = [
        (Level::Device, "Virtual Test Camera"),
        (Level::Format, "NV12"),
        (Level::Resolution, "640x480"),
        (Level::FrameRate, "30"),
        (Level::FrameRate, "15"),
        (Level::Resolution, "1280x720"),
        (Level::FrameRate, "30"),
        (Level::Format, "YUY2"),
        (Level::Resolution, "9x9"),
        (Level::Device, "Virtual Test Camera"),
        (Level::Format, "NONE"),
        (Level::Device, "NONE"),
    ];

    for (level, value) in events {
        let t = node.set(level, value);
        assert!(t.steps <= 4, "{} = {} took {} steps", level, value, t.steps);
        assert!(registry.len() <= 1);
        assert!(backend.open_count() - backend.release_count() <= 1);
        assert!(node.resolver().state().is_consistent());
    }

    node.shutdown();
    registry.close_all();
    assert_eq!(backend.open_count(), backend.release_count());
}

#[test]
fn test_repeating_a_selection_is_idempotent() {
    let backend = single_mode_camera();
    let (_registry, mut node) = node_for(&backend);

    node.set(Level::Device, "Cam");
    let state = node.resolver().state().clone();
    let session = node.session_id();

    let t = node.set(Level::Device, "Cam");
    assert_eq!(node.resolver().state(), &state);
    assert_eq!(node.session_id(), session);
    assert!(!t.closes());
    assert!(t.opens().is_none());
    assert_eq!(backend.open_count(), 1);
}

#[test]
fn test_unplugged_device_is_rejected_on_reselect() {
    let backend = single_mode_camera().with_device(
        "Other",
        vec![FormatDescriptor::video(FourCc::YUY2, 640, 480, FrameRate::Fps30)],
    );
    let (_registry, mut node) = node_for(&backend);
    node.set(Level::Device, "Cam");

    backend.remove_device("Cam");
    node.set(Level::Device, "Cam");

    assert_eq!(node.host().latest_value(Level::Device), Some("NONE"));
    assert_eq!(
        node.host().latest_options(&Level::Device.list_name(NODE)),
        Some(&strings(&["NONE", "Other"])[..])
    );
    assert!(node.session_id().is_none());
    assert_eq!(backend.release_count(), 1);
}
