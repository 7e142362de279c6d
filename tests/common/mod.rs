// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synthetic activities shared by the integration tests

#![allow(dead_code)]

use pierre_activity_analysis::analysis::geo::EARTH_RADIUS_M;
use pierre_activity_analysis::models::{Activity, ActivityType, LocationSample, SensorSample};
use std::f64::consts::PI;

pub const START_MS: u64 = 1_700_000_000_000;
pub const TEMPO_START_S: u64 = 420;
pub const TEMPO_END_S: u64 = 720;
pub const TEMPO_SPEED: f64 = 5.5;
pub const DURATION_S: u64 = 20 * 60;

/// Easy running with a gentle one-minute surge pattern and a five minute tempo block
pub fn tempo_speed(t: u64) -> f64 {
    if (TEMPO_START_S..TEMPO_END_S).contains(&t) {
        TEMPO_SPEED
    } else {
        4.0 - 0.3 * (2.0 * PI * t as f64 / 60.0).cos()
    }
}

/// 1 Hz northbound track; `speed(t)` is the speed held during second `t`
pub fn track(duration_s: u64, speed: impl Fn(u64) -> f64) -> Vec<LocationSample> {
    let mut latitude = 45.0;
    let mut locations = Vec::with_capacity(duration_s as usize + 1);
    for t in 0..=duration_s {
        locations.push(LocationSample::new(START_MS + t * 1000, latitude, -73.0, 0.0));
        latitude += (speed(t) / EARTH_RADIUS_M).to_degrees();
    }
    locations
}

pub fn tempo_run(id: &str, user_id: &str) -> Activity {
    let mut activity = Activity::new(id, user_id, ActivityType::Running);
    activity.start_time = Some((START_MS / 1000) as i64);
    activity.locations = track(DURATION_S, tempo_speed);
    activity.sensors.heart_rate = (0..=DURATION_S)
        .step_by(5)
        .map(|t| SensorSample {
            timestamp_ms: START_MS + t * 1000,
            value: if (TEMPO_START_S..TEMPO_END_S).contains(&t) { 172.0 } else { 148.0 },
        })
        .collect();
    activity
}

/// Short steady ride with a power stream
pub fn steady_ride(id: &str, user_id: &str, watts: f64) -> Activity {
    let mut activity = Activity::new(id, user_id, ActivityType::Cycling);
    activity.start_time = Some((START_MS / 1000) as i64);
    activity.locations = track(600, |_| 8.0);
    activity.sensors.power = (0..=600)
        .map(|t| SensorSample {
            timestamp_ms: START_MS + t * 1000,
            value: watts,
        })
        .collect();
    activity
}
