// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use webcam_stream::Level;
use webcam_stream::backends::camera::types::{FourCc, FrameRate};
use webcam_stream::constants::{SENTINEL, formats, lists};

#[test]
fn test_default_formats_parse() {
    for format in formats::DEFAULT_SUPPORTED {
        assert!(
            format.parse::<FourCc>().is_ok(),
            "{} should be a valid format code",
            format
        );
    }
}

#[test]
fn test_list_names_use_prefix() {
    for level in Level::ALL {
        let name = level.list_name("7");
        assert!(name.starts_with(lists::LIST_PREFIX));
        assert!(name.ends_with(".7"));
    }
    assert_eq!(Level::Resolution.list_name("7"), "webcam.ResolutionList.7");
}

#[test]
fn test_frame_rates_ordered_and_labelled() {
    let mut prev = 0.0;
    for rate in FrameRate::ALL {
        assert!(rate.as_f64() > prev, "{} should be above {}", rate, prev);
        assert_ne!(rate.label(), SENTINEL);
        prev = rate.as_f64();
    }
}

#[test]
fn test_sentinel_is_not_a_value() {
    assert!(SENTINEL.parse::<FrameRate>().is_err());
    assert!(SENTINEL.parse::<FourCc>().is_err());
}
