// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Frequency maps over quantized positions or speeds

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Counts occurrences of quantized keys and tracks the highest count
#[derive(Debug, Clone)]
pub struct HeatMap<K> {
    counts: HashMap<K, u32>,
    max_count: u32,
}

impl<K: Hash + Eq> Default for HeatMap<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
            max_count: 0,
        }
    }
}

impl<K: Hash + Eq> HeatMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: K) {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count > self.max_count {
            self.max_count = *count;
        }
    }

    pub fn count(&self, key: &K) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u32)> {
        self.counts.iter().map(|(k, c)| (k, *c))
    }
}

/// A (lat, lon) pair rounded to a fixed number of decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationCell {
    lat_units: i64,
    lon_units: i64,
    decimal_places: u32,
}

impl LocationCell {
    pub fn new(latitude: f64, longitude: f64, decimal_places: u32) -> Self {
        let scale = 10f64.powi(decimal_places as i32);
        Self {
            lat_units: (latitude * scale).round() as i64,
            lon_units: (longitude * scale).round() as i64,
            decimal_places,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.lat_units as f64 / 10f64.powi(self.decimal_places as i32)
    }

    pub fn longitude(&self) -> f64 {
        self.lon_units as f64 / 10f64.powi(self.decimal_places as i32)
    }
}

/// A speed rounded to the nearest bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeedBucket(i64);

impl SpeedBucket {
    pub fn new(speed: f64, bucket_size: f64) -> Self {
        SpeedBucket((speed / bucket_size).round() as i64)
    }

    pub fn speed(&self, bucket_size: f64) -> f64 {
        self.0 as f64 * bucket_size
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationHeatMapEntry {
    pub latitude: f64,
    pub longitude: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeedHeatMapEntry {
    pub speed: f64,
    pub count: u32,
}

impl HeatMap<LocationCell> {
    /// Entries sorted by cell for stable output
    pub fn location_entries(&self) -> Vec<LocationHeatMapEntry> {
        let mut cells: Vec<_> = self.iter().collect();
        cells.sort_by_key(|(cell, _)| **cell);
        cells
            .into_iter()
            .map(|(cell, count)| LocationHeatMapEntry {
                latitude: cell.latitude(),
                longitude: cell.longitude(),
                count,
            })
            .collect()
    }
}

impl HeatMap<SpeedBucket> {
    pub fn speed_entries(&self, bucket_size: f64) -> Vec<SpeedHeatMapEntry> {
        let mut buckets: Vec<_> = self.iter().collect();
        buckets.sort_by_key(|(bucket, _)| **bucket);
        buckets
            .into_iter()
            .map(|(bucket, count)| SpeedHeatMapEntry {
                speed: bucket.speed(bucket_size),
                count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_maximum() {
        let mut map = HeatMap::new();
        assert_eq!(map.max_count(), 0);
        map.append("a");
        map.append("b");
        map.append("a");
        assert_eq!(map.count(&"a"), 2);
        assert_eq!(map.count(&"c"), 0);
        assert_eq!(map.max_count(), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_location_cells_quantize() {
        let mut map = HeatMap::new();
        map.append(LocationCell::new(45.50171, -73.56731, 4));
        map.append(LocationCell::new(45.50169, -73.56729, 4));
        map.append(LocationCell::new(45.50300, -73.56731, 4));
        assert_eq!(map.len(), 2);
        assert_eq!(map.max_count(), 2);

        let entries = map.location_entries();
        assert!((entries[0].latitude - 45.5017).abs() < 1e-9);
        assert_eq!(entries[0].count, 2);
    }

    #[test]
    fn test_speed_buckets() {
        let mut map = HeatMap::new();
        for speed in [3.01, 2.98, 3.52] {
            map.append(SpeedBucket::new(speed, 0.1));
        }
        let entries = map.speed_entries(0.1);
        assert_eq!(entries.len(), 2);
        assert!((entries[0].speed - 3.0).abs() < 1e-9);
        assert_eq!(entries[0].count, 2);
    }
}
