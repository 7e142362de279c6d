// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Training stress estimates from pace or power

use crate::constants::analysis;

pub struct IntensityCalculator;

impl IntensityCalculator {
    /// `(duration * avg pace / threshold pace) * 100`; 0 for a non-positive threshold
    pub fn estimate_from_pace(duration_s: f64, avg_pace_mps: f64, threshold_pace_mps: f64) -> f64 {
        if threshold_pace_mps <= 0.0 {
            return 0.0;
        }
        (duration_s * avg_pace_mps / threshold_pace_mps) * 100.0
    }

    /// IF = NP / FTP
    pub fn intensity_factor(normalized_power: f64, ftp: f64) -> Option<f64> {
        (ftp >= analysis::MIN_FTP_WATTS).then(|| normalized_power / ftp)
    }

    /// TSS = (duration * NP * IF) / (FTP * 36); 0 without a usable FTP
    pub fn score_from_power(duration_s: f64, normalized_power: f64, ftp: Option<f64>) -> f64 {
        let Some(ftp) = ftp else {
            return 0.0;
        };
        match Self::intensity_factor(normalized_power, ftp) {
            Some(intensity_factor) => (duration_s * normalized_power * intensity_factor) / (ftp * 36.0),
            None => 0.0,
        }
    }
}
