// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Interval Detection
//!
//! Isolates genuine changes of pace from GPS noise in the speed graph:
//!
//! 1. smooth the graph with a short centered moving average
//! 2. find peaks whose rise and fall both exceed a minimum prominence
//! 3. turn each peak's trough-to-trough span into a candidate effort
//! 4. cluster the candidates' average speeds with 1-D k-means, pick k at the
//!    elbow of the distortion curve and drop the slowest cluster

use super::location::DistanceRecord;
use crate::config::analysis_config::IntervalConfig;
use crate::constants::{analysis, units};
use crate::models::{IntervalEffort, SpeedPoint};
use tracing::debug;

/// Indices of a peak and its flanking troughs in a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub left_trough: usize,
    pub peak: usize,
    pub right_trough: usize,
}

/// Result of one k-means run. Labels are ordered so that 0 is the slowest cluster.
#[derive(Debug, Clone)]
pub struct ClusterFit {
    pub centroids: Vec<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid
    pub distortion: f64,
}

pub struct IntervalDetector<'a> {
    config: &'a IntervalConfig,
}

impl<'a> IntervalDetector<'a> {
    pub fn new(config: &'a IntervalConfig) -> Self {
        Self { config }
    }

    /// Significant efforts in the speed graph, in chronological order
    pub fn detect(&self, speed_graph: &[SpeedPoint], distances: &DistanceRecord) -> Vec<IntervalEffort> {
        let raw: Vec<f64> = speed_graph.iter().map(|p| p.speed).collect();
        let smoothed = moving_average(&raw, self.config.smoothing_window);
        let peaks = find_peaks(&smoothed, self.config.peak_min_prominence);

        let candidates: Vec<IntervalEffort> = peaks
            .iter()
            .filter_map(|peak| {
                let start = speed_graph[peak.left_trough].timestamp_ms;
                let end = speed_graph[peak.right_trough].timestamp_ms;
                let duration_s = end.saturating_sub(start) as f64 / units::MILLIS_PER_SECOND;
                if duration_s < self.config.min_interval_duration_s {
                    return None;
                }

                let span = &raw[peak.left_trough..=peak.right_trough];
                Some(IntervalEffort {
                    start_time_ms: start,
                    end_time_ms: end,
                    duration_s,
                    length_m: distances.distance_at(end) - distances.distance_at(start),
                    avg_speed: span.iter().sum::<f64>() / span.len() as f64,
                })
            })
            .collect();

        debug!(
            peaks = peaks.len(),
            candidates = candidates.len(),
            "Interval candidates found"
        );

        if candidates.len() < 2 {
            return Vec::new();
        }

        let speeds: Vec<f64> = candidates.iter().map(|c| c.avg_speed).collect();
        let max_k = self.config.max_clusters.min(speeds.len());
        let fits: Vec<ClusterFit> = (1..=max_k)
            .map(|k| kmeans_1d(&speeds, k, analysis::KMEANS_MAX_ITERATIONS))
            .collect();
        let distortions: Vec<f64> = fits.iter().map(|f| f.distortion).collect();
        let k = elbow(&distortions);
        let fit = &fits[k - 1];

        debug!(k, "Interval clusters chosen");

        candidates
            .into_iter()
            .zip(&fit.labels)
            .filter(|(_, &label)| label != 0)
            .map(|(candidate, _)| candidate)
            .collect()
    }
}

/// Centered moving average; windows are clamped at both ends of the series
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let n = values.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(window / 2);
            let end = (start + window).min(n);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Hysteresis peak detection. A peak is reported only once the series has
/// risen by `prominence` from the trough before it and fallen by `prominence`
/// after it. A peak still falling at the end of the series uses the lowest
/// point after it as its right trough.
pub fn find_peaks(values: &[f64], prominence: f64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let (mut min, mut min_pos) = (f64::INFINITY, 0);
    let (mut max, mut max_pos) = (f64::NEG_INFINITY, 0);
    let mut left_trough = 0;
    let mut pending: Option<(usize, usize)> = None;
    let mut looking_for_max = false;

    for (i, &v) in values.iter().enumerate() {
        if v > max {
            max = v;
            max_pos = i;
        }
        if v < min {
            min = v;
            min_pos = i;
        }

        if looking_for_max {
            if v < max - prominence {
                pending = Some((left_trough, max_pos));
                min = v;
                min_pos = i;
                looking_for_max = false;
            }
        } else if v > min + prominence {
            if let Some((left, peak)) = pending.take() {
                peaks.push(Peak {
                    left_trough: left,
                    peak,
                    right_trough: min_pos,
                });
            }
            left_trough = min_pos;
            max = v;
            max_pos = i;
            looking_for_max = true;
        }
    }

    if let Some((left, peak)) = pending {
        peaks.push(Peak {
            left_trough: left,
            peak,
            right_trough: min_pos,
        });
    }
    peaks
}

/// Deterministic 1-D k-means: quantile seeding then Lloyd iterations
pub fn kmeans_1d(values: &[f64], k: usize, max_iterations: usize) -> ClusterFit {
    if values.is_empty() || k == 0 {
        return ClusterFit {
            centroids: Vec::new(),
            labels: vec![0; values.len()],
            distortion: 0.0,
        };
    }

    let k = k.min(values.len());
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut centroids: Vec<f64> = if k == 1 {
        vec![values.iter().sum::<f64>() / values.len() as f64]
    } else {
        (0..k).map(|j| sorted[j * (sorted.len() - 1) / (k - 1)]).collect()
    };
    let mut labels = assign(values, &centroids);

    for _ in 0..max_iterations {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&v, &label) in values.iter().zip(&labels) {
            sums[label] += v;
            counts[label] += 1;
        }
        for j in 0..k {
            // Empty clusters keep their previous centroid
            if counts[j] > 0 {
                centroids[j] = sums[j] / counts[j] as f64;
            }
        }

        let next = assign(values, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }

    // Relabel so that label 0 is the slowest centroid
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| centroids[a].total_cmp(&centroids[b]));
    let mut rank = vec![0; k];
    for (position, &cluster) in order.iter().enumerate() {
        rank[cluster] = position;
    }

    let distortion = values
        .iter()
        .zip(&labels)
        .map(|(&v, &label)| (v - centroids[label]).powi(2))
        .sum();

    ClusterFit {
        centroids: order.iter().map(|&c| centroids[c]).collect(),
        labels: labels.into_iter().map(|label| rank[label]).collect(),
        distortion,
    }
}

fn assign(values: &[f64], centroids: &[f64]) -> Vec<usize> {
    values
        .iter()
        .map(|&v| {
            let mut best = 0;
            for (j, &c) in centroids.iter().enumerate().skip(1) {
                if (v - c).abs() < (v - centroids[best]).abs() {
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Pick k from the distortions of k = 1..=n. The first k whose following drop
/// falls below the average drop wins; otherwise the k at the end of the
/// steepest drop.
///
/// On a curve that keeps falling steeply after its steepest drop, such as
/// `[10, 5, 1, 0.9, 0.8]`, this stops at k = 3 rather than at the end of the
/// steepest drop (k = 2). The extra middle cluster is then reported as
/// significant; moderate efforts between the background pace and the hardest
/// efforts are kept instead of being folded into the background.
pub fn elbow(distortions: &[f64]) -> usize {
    if distortions.len() <= 1 {
        return distortions.len().max(1);
    }

    let drops: Vec<f64> = distortions.windows(2).map(|w| w[0] - w[1]).collect();
    let steepest = drops
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if drops[steepest] <= f64::EPSILON {
        return 1;
    }

    let average_drop = drops.iter().sum::<f64>() / drops.len() as f64;
    drops
        .iter()
        .position(|&drop| drop < average_drop)
        .map(|i| i + 1)
        .unwrap_or(steepest + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_clamps_edges() {
        let smoothed = moving_average(&[0.0, 4.0, 8.0, 4.0, 0.0], 4);
        assert_eq!(smoothed.len(), 5);
        assert!((smoothed[0] - 4.0).abs() < 1e-9);
        assert!((smoothed[4] - 4.0).abs() < 1e-9);
        assert_eq!(moving_average(&[], 4), Vec::<f64>::new());
    }

    #[test]
    fn test_peaks_require_prominence_on_both_sides() {
        let series = [1.0, 1.0, 2.0, 3.0, 2.0, 1.0, 1.1, 1.0, 2.5, 1.0];
        let peaks = find_peaks(&series, 0.5);
        assert_eq!(
            peaks,
            vec![
                Peak { left_trough: 0, peak: 3, right_trough: 5 },
                Peak { left_trough: 5, peak: 8, right_trough: 9 },
            ]
        );

        // The first of equal lows is the trough; the bump at index 6 is ignored
        assert!(find_peaks(&[1.0, 1.1, 1.0], 0.5).is_empty());
    }

    #[test]
    fn test_kmeans_separates_two_groups() {
        let fit = kmeans_1d(&[5.0, 4.0, 4.1, 5.1, 3.9], 2, 100);
        assert_eq!(fit.labels, vec![1, 0, 0, 1, 0]);
        assert!((fit.centroids[0] - 4.0).abs() < 1e-9);
        assert!((fit.centroids[1] - 5.05).abs() < 1e-9);
        assert!(fit.distortion < 0.05);
    }

    #[test]
    fn test_elbow_picks_the_knee() {
        assert_eq!(elbow(&[10.0, 1.0, 0.8, 0.7]), 2);
        assert_eq!(elbow(&[0.0, 0.0, 0.0]), 1);
        assert_eq!(elbow(&[3.0, 0.0]), 2);
        assert_eq!(elbow(&[2.0]), 1);
    }

    #[test]
    fn test_elbow_follows_the_average_drop_past_the_steepest() {
        // Drops are 5, 4, 0.1, 0.1; the steepest ends at k = 2 but 4 is still above average
        assert_eq!(elbow(&[10.0, 5.0, 1.0, 0.9, 0.8]), 3);
    }

    #[test]
    fn test_fewer_than_two_candidates_yield_nothing() {
        let config = IntervalConfig::default();
        let mut distances = DistanceRecord::default();
        let graph: Vec<SpeedPoint> = (0..60u64)
            .map(|t| {
                distances.push(t * 1000, t as f64 * 4.0);
                let speed = if (20..40).contains(&t) { 6.0 } else { 4.0 };
                SpeedPoint { timestamp_ms: t * 1000, speed }
            })
            .collect();

        assert!(IntervalDetector::new(&config).detect(&graph, &distances).is_empty());
    }
}
