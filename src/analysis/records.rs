// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Best values achieved within a single activity

use crate::models::AnalysisSummary;
use std::collections::BTreeMap;

/// Named bests. A record is only ever replaced by a strictly better value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalRecordSet {
    records: BTreeMap<String, f64>,
}

impl PersonalRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an elapsed time; lower wins. Returns true when the record changed.
    pub fn offer_time(&mut self, name: &str, seconds: f64) -> bool {
        match self.records.get(name) {
            Some(&best) if seconds >= best => false,
            _ => {
                self.records.insert(name.to_string(), seconds);
                true
            }
        }
    }

    /// Offer a magnitude (speed, power); higher wins. Returns true when the record changed.
    pub fn offer_max(&mut self, name: &str, value: f64) -> bool {
        match self.records.get(name) {
            Some(&best) if value <= best => false,
            _ => {
                self.records.insert(name.to_string(), value);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.records.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.records.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn to_summary(&self) -> AnalysisSummary {
        let mut summary = AnalysisSummary::new();
        for (name, value) in self.iter() {
            summary.insert(name, value);
        }
        summary
    }
}
