// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Analysis Module
//!
//! Streaming analyzers and the per-activity pipeline built from them.
//!
//! ## Components
//!
//! - [`location`]: GPS track analysis, splits, distance records, speed graph
//! - [`intervals`]: effort detection over the speed graph
//! - [`sensor`] / [`power`]: per-sensor running statistics behind one trait
//! - [`heat_map`]: frequency maps over positions and speeds
//! - [`hasher`]: content hash for change detection
//! - [`intensity`]: training stress formulas
//! - [`activity_analyzer`]: runs all of the above over one activity

pub mod activity_analyzer;
pub mod geo;
pub mod hasher;
pub mod heat_map;
pub mod intensity;
pub mod intervals;
pub mod location;
pub mod power;
pub mod records;
pub mod sensor;

pub use activity_analyzer::{ActivityAnalysis, ActivityAnalyzer};
pub use hasher::ActivityHasher;
pub use intensity::IntensityCalculator;
pub use intervals::IntervalDetector;
pub use location::{LocationAnalyzer, LocationAnalyzerState};
pub use records::PersonalRecordSet;
pub use sensor::{create_sensor_analyzer, create_with_data, SampleSeries, SensorAnalyzer};
