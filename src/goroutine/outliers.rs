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

use log::debug;

use crate::goroutine::dump::Goroutine;

pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(10);

/// Goroutines waiting for at least `threshold`, in input order.
pub fn select_outliers(goroutines: &[Goroutine], threshold: Duration) -> Vec<&Goroutine> {
    goroutines
        .iter()
        .filter(|g| g.wait >= threshold)
        .collect()
}

/// Goroutines whose state is one of `states`. An empty `states` keeps everything.
pub fn filter_states<'a, S: AsRef<str>>(
    goroutines: impl IntoIterator<Item = &'a Goroutine>,
    states: &[S],
) -> Vec<&'a Goroutine> {
    goroutines
        .into_iter()
        .filter(|g| in_states(g, states))
        .collect()
}

fn in_states<S: AsRef<str>>(goroutine: &Goroutine, states: &[S]) -> bool {
    states.is_empty() || states.iter().any(|s| s.as_ref() == goroutine.state)
}

/// Wait threshold and state restriction, applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlierFilter {
    pub threshold: Duration,
    pub states: Vec<String>,
}

impl OutlierFilter {
    pub fn new(threshold: Duration, states: Vec<String>) -> Self {
        Self { threshold, states }
    }

    pub fn matches(&self, goroutine: &Goroutine) -> bool {
        goroutine.wait >= self.threshold && in_states(goroutine, &self.states)
    }

    pub fn apply<'a>(&self, goroutines: &'a [Goroutine]) -> Vec<&'a Goroutine> {
        let outliers = filter_states(select_outliers(goroutines, self.threshold), &self.states);
        debug!(
            "{} of {} goroutines are outliers (threshold {:?}, states {:?})",
            outliers.len(),
            goroutines.len(),
            self.threshold,
            self.states
        );
        outliers
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, Vec::new())
    }
}
