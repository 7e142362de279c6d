// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration management for the analysis worker
//!
//! Two layers:
//! - [`WorkerConfig`]: process-level settings read from the environment (and `.env`)
//! - [`AnalysisConfig`]: algorithm tunables loaded from TOML or built-in defaults

pub mod analysis_config;
pub mod environment;

pub use analysis_config::AnalysisConfig;
pub use environment::WorkerConfig;
