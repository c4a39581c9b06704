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

use std::fmt::{Display, Formatter};

use log::warn;

use crate::goroutine::dump::Goroutine;
use crate::goroutine::options::FilterConfig;
use crate::goroutine::outliers::filter_states;
use crate::goroutine::utils::{find_first_frame, FrameFilter};

/// Outcome of looking a goroutine up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a Goroutine),
    NotFound(u64),
    /// The goroutine exists but none of its frames passes the filters.
    NoMatchingFrame(&'a Goroutine),
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Goroutine> {
        match self {
            Lookup::Found(goroutine) => Some(goroutine),
            _ => None,
        }
    }
}

impl Display for Lookup<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Found(goroutine) => write!(f, "goroutine {} found", goroutine.id),
            Lookup::NotFound(id) => write!(f, "goroutine {} not found", id),
            Lookup::NoMatchingFrame(goroutine) => write!(
                f,
                "goroutine {} has no frame matching filter criteria",
                goroutine.id
            ),
        }
    }
}

pub fn lookup<'a>(goroutines: &'a [Goroutine], id: u64, filters: &[FrameFilter]) -> Lookup<'a> {
    match goroutines.iter().find(|g| g.id == id) {
        None => Lookup::NotFound(id),
        Some(goroutine) if find_first_frame(&goroutine.stack, filters).is_none() => {
            Lookup::NoMatchingFrame(goroutine)
        }
        Some(goroutine) => Lookup::Found(goroutine),
    }
}

/// Goroutines to print: the one with `id` if given, otherwise every goroutine in
/// `config.states` having a frame under the `--filter` prefix. Goroutines left out
/// for lack of a matching frame are reported, not treated as errors.
pub fn select_printable<'a>(
    goroutines: &'a [Goroutine],
    id: Option<u64>,
    config: &FilterConfig,
) -> Vec<&'a Goroutine> {
    let filters = config.prefix_filters();
    if let Some(id) = id {
        let found = lookup(goroutines, id, &filters);
        if found.found().is_none() {
            warn!("{}", found);
        }
        return found.found().into_iter().collect();
    }

    filter_states(goroutines, &config.states)
        .into_iter()
        .filter(|goroutine| {
            let matched = find_first_frame(&goroutine.stack, &filters).is_some();
            if !matched {
                warn!("{}", Lookup::NoMatchingFrame(goroutine));
            }
            matched
        })
        .collect()
}
