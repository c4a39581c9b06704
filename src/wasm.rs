// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use anyhow::Context;
use wasm_bindgen::prelude::*;

use crate::goroutine::{
    parse_goroutines, resolve_states, FilterConfig, Format, GroupBy, Listing, StatsReport,
    DEFAULT_OUTLIER_STATES,
};

#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

fn from_file_content(content: &str, threshold_secs: f64, group_by: &str) -> anyhow::Result<String> {
    if !threshold_secs.is_finite() {
        anyhow::bail!("invalid threshold: {}", threshold_secs);
    }
    let threshold = Duration::try_from_secs_f64(threshold_secs.max(0.0))
        .with_context(|| format!("invalid threshold: {}", threshold_secs))?;
    let goroutines = parse_goroutines(content).context("Failed to parse goroutine dump")?;

    web_sys::console::log_1(&format!("parsed {} goroutines", goroutines.len()).into());

    let config = FilterConfig {
        format: Format::Stats,
        group_by: group_by.parse::<GroupBy>()?,
        states: resolve_states::<&str>(&[], DEFAULT_OUTLIER_STATES),
        threshold,
        ..Default::default()
    };
    let outliers = config.outlier_filter().apply(&goroutines);

    let stats = StatsReport::new(outliers.iter().copied(), &config);
    let listing_config = FilterConfig {
        format: Format::Short,
        ..config.clone()
    };
    let listing = Listing::new(outliers.iter().copied(), &listing_config);
    Ok(format!(
        "------ Outlier Groups ------\n{}------ Outliers ------\n{}",
        stats, listing
    ))
}

/// Analyzes the goroutine dump provided as a string: outliers waiting at least
/// `threshold_secs` in one of the default states, grouped by `group_by`, then listed.
/// Returns a string containing the report or an error message.
#[wasm_bindgen]
pub fn analyze_dump_str(dump_content: &str, threshold_secs: f64, group_by: &str) -> String {
    // Set the panic hook for better error messages in the browser console.
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    from_file_content(dump_content, threshold_secs, group_by)
        .unwrap_or_else(|e| format!("Error analyzing goroutines: {:#}", e))
}
