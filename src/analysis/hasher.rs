// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Content hash of an activity's raw samples
//!
//! The canonical form must stay byte-for-byte stable: clients compute the
//! same digest independently to detect duplicate uploads.
//!
//! Layout, with no separators:
//! - every location: timestamp, then latitude, longitude and altitude with
//!   six decimal places
//! - accelerometer samples: timestamp, then x, y and z with six decimal places
//! - heart rate samples, then power samples: truncated timestamp and
//!   truncated value
//!
//! Cadence does not contribute.

use crate::models::{Activity, SensorSample};
use sha2::{Digest, Sha512};

pub struct ActivityHasher<'a> {
    activity: &'a Activity,
}

impl<'a> ActivityHasher<'a> {
    pub fn new(activity: &'a Activity) -> Self {
        Self { activity }
    }

    /// The exact string fed to the digest
    pub fn canonical_form(&self) -> String {
        let mut out = String::new();

        for location in &self.activity.locations {
            out.push_str(&format!(
                "{}{:.6}{:.6}{:.6}",
                location.timestamp_ms, location.latitude, location.longitude, location.altitude
            ));
        }

        for sample in &self.activity.sensors.accelerometer {
            out.push_str(&format!(
                "{}{:.6}{:.6}{:.6}",
                sample.timestamp_ms, sample.x, sample.y, sample.z
            ));
        }

        write_scalar(&mut out, &self.activity.sensors.heart_rate);
        write_scalar(&mut out, &self.activity.sensors.power);
        out
    }

    /// Lowercase hex SHA-512 of the canonical form
    pub fn hash(&self) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.canonical_form().as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn write_scalar(out: &mut String, samples: &[SensorSample]) {
    for sample in samples {
        out.push_str(&format!("{}{}", sample.timestamp_ms, sample.value.trunc() as i64));
    }
}
