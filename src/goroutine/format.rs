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

use std::cmp::Reverse;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::error::Result;
use crate::goroutine::dump::Goroutine;
use crate::goroutine::group::{group_goroutines, sorted_groups, Group, GroupSummary};
use crate::goroutine::options::{FilterConfig, Format};
use crate::goroutine::utils::{format_duration, passes_all, strip_module, FrameFilter};

/// Renders `goroutines` as configured: a listing, or group statistics for the
/// `stats` formats.
pub fn render<'a>(
    goroutines: impl IntoIterator<Item = &'a Goroutine>,
    config: &'a FilterConfig,
) -> Result<String> {
    match config.format {
        Format::Stats | Format::StatsJson => StatsReport::new(goroutines, config).render(),
        Format::Short | Format::Full | Format::NoPath | Format::Json => {
            Listing::new(goroutines, config).render()
        }
    }
}

/// Longest wait first. Goroutines waiting equally long keep their input order.
pub fn sort_by_wait<'a>(
    goroutines: impl IntoIterator<Item = &'a Goroutine>,
) -> Vec<&'a Goroutine> {
    goroutines
        .into_iter()
        .sorted_by_key(|g| Reverse(g.wait))
        .collect()
}

/// One entry per goroutine, sorted by wait time.
#[derive(Debug, Clone)]
pub struct Listing<'a> {
    goroutines: Vec<&'a Goroutine>,
    format: Format,
    filters: Vec<FrameFilter>,
    module: Option<&'a str>,
    /// Written where filtered frames were skipped. Nothing by default.
    elision_marker: Option<&'a str>,
}

impl<'a> Listing<'a> {
    pub fn new(
        goroutines: impl IntoIterator<Item = &'a Goroutine>,
        config: &'a FilterConfig,
    ) -> Self {
        Self {
            goroutines: sort_by_wait(goroutines),
            format: config.format,
            filters: config.listing_filters(),
            module: config.module(),
            elision_marker: None,
        }
    }

    pub fn with_elision_marker(mut self, marker: &'a str) -> Self {
        self.elision_marker = Some(marker);
        self
    }

    pub fn goroutines(&self) -> &[&'a Goroutine] {
        &self.goroutines
    }

    pub fn render(&self) -> Result<String> {
        match self.format {
            Format::Json | Format::StatsJson => self.to_json(),
            _ => Ok(self.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.goroutines)?)
    }

    fn fmt_goroutine(&self, f: &mut Formatter<'_>, goroutine: &Goroutine) -> std::fmt::Result {
        write!(f, "goroutine {} [{}", goroutine.id, goroutine.state)?;
        if !goroutine.wait.is_zero() {
            write!(f, ", {}", format_duration(goroutine.wait))?;
        }
        writeln!(f, "]")?;

        if self.format == Format::Short {
            return Ok(());
        }

        let mut elided = false;
        for frame in &goroutine.stack {
            if !passes_all(frame, &self.filters) {
                elided = true;
                continue;
            }
            if elided {
                self.mark_elided(f)?;
                elided = false;
            }

            writeln!(f, "{}()", strip_module(&frame.func, self.module))?;
            if self.format != Format::NoPath {
                writeln!(f, "\t{}:{}", frame.file, frame.line)?;
            }
        }
        if elided {
            self.mark_elided(f)?;
        }
        Ok(())
    }

    fn mark_elided(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.elision_marker {
            Some(marker) => writeln!(f, "{}", marker),
            None => Ok(()),
        }
    }
}

impl Display for Listing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for goroutine in &self.goroutines {
            self.fmt_goroutine(f, goroutine)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Goroutine count and average wait time per group.
#[derive(Debug, Clone)]
pub struct StatsReport<'a> {
    groups: Vec<Group<'a>>,
    format: Format,
    module: Option<&'a str>,
}

impl<'a> StatsReport<'a> {
    pub fn new(
        goroutines: impl IntoIterator<Item = &'a Goroutine>,
        config: &'a FilterConfig,
    ) -> Self {
        let groups = group_goroutines(goroutines, config.group_by, &config.group_filters());
        Self {
            groups: sorted_groups(groups),
            format: config.format,
            module: config.module(),
        }
    }

    pub fn groups(&self) -> &[Group<'a>] {
        &self.groups
    }

    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.groups.iter().map(|g| g.summary(self.module)).collect()
    }

    pub fn render(&self) -> Result<String> {
        match self.format {
            Format::Json | Format::StatsJson => self.to_json(),
            _ => Ok(self.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summaries())?)
    }
}

impl Display for StatsReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for group in &self.groups {
            writeln!(f, "{}:", strip_module(group.key(), self.module))?;
            writeln!(
                f,
                "\t{} goroutines, avg wait time: {}",
                group.len(),
                format_duration(group.avg_wait())
            )?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::goroutine::dump::Frame;
    use crate::goroutine::group::GroupBy;

    const MODULE: &str = "github.com/acme/svc";

    fn goroutines() -> Vec<Goroutine> {
        let stack = |func: &str, file: &str| {
            vec![
                Frame::new("runtime.gopark", "runtime/proc.go", 398),
                Frame::new("sync.(*Mutex).Lock", "sync/mutex.go", 90),
                Frame::new(func, file, 42),
            ]
        };
        vec![
            Goroutine::new(1, "sync.Mutex.Lock", Duration::from_secs(5)).with_stack(stack(
                "github.com/acme/svc/db.(*Pool).Get",
                "/app/db/pool.go",
            )),
            Goroutine::new(2, "sync.Mutex.Lock", Duration::from_secs(12)).with_stack(stack(
                "github.com/acme/svc/db.(*Pool).Put",
                "/app/db/pool.go",
            )),
            Goroutine::new(3, "syscall", Duration::from_secs(20)).with_stack(stack(
                "github.com/acme/svc/server.serve",
                "/app/server/serve.go",
            )),
            Goroutine::new(4, "running", Duration::ZERO),
            Goroutine::new(5, "syscall", Duration::from_secs(12)),
        ]
    }

    fn config(format: Format) -> FilterConfig {
        FilterConfig {
            format,
            module: Some(MODULE.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_is_stable() {
        let goroutines = goroutines();
        let ids = sort_by_wait(&goroutines)
            .iter()
            .map(|g| g.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 2, 5, 1, 4]);
    }

    #[test]
    fn test_short_listing() -> Result<()> {
        let goroutines = goroutines();
        let config = config(Format::Short);
        let expected = "goroutine 3 [syscall, 20s]\n\n\
                        goroutine 2 [sync.Mutex.Lock, 12s]\n\n\
                        goroutine 5 [syscall, 12s]\n\n\
                        goroutine 1 [sync.Mutex.Lock, 5s]\n\n\
                        goroutine 4 [running]\n\n";
        assert_eq!(render(&goroutines, &config)?, expected);
        Ok(())
    }

    #[test]
    fn test_full_listing_omits_stdlib() -> Result<()> {
        let goroutines = goroutines();
        let config = FilterConfig {
            omit_stdlib: true,
            ..config(Format::Full)
        };
        let listing = Listing::new(&goroutines[2..3], &config);
        let expected = "goroutine 3 [syscall, 20s]\n\
                        server.serve()\n\
                        \t/app/server/serve.go:42\n\n";
        assert_eq!(listing.to_string(), expected);
        Ok(())
    }

    #[test]
    fn test_no_path_listing() {
        let goroutines = goroutines();
        let config = config(Format::NoPath);
        let listing = Listing::new(&goroutines[2..3], &config);
        let expected = "goroutine 3 [syscall, 20s]\n\
                        runtime.gopark()\n\
                        sync.(*Mutex).Lock()\n\
                        server.serve()\n\n";
        assert_eq!(listing.to_string(), expected);
    }

    #[test]
    fn test_elision_marker() {
        let goroutines = goroutines();
        let config = FilterConfig {
            omit_stdlib: true,
            ..config(Format::NoPath)
        };
        let listing = Listing::new(&goroutines[2..3], &config).with_elision_marker("...");
        assert_eq!(
            listing.to_string(),
            "goroutine 3 [syscall, 20s]\n...\nserver.serve()\n\n"
        );
    }

    #[test]
    fn test_stats_report() -> Result<()> {
        let goroutines = goroutines();
        let config = config(Format::Stats);
        // Goroutines 4 and 5 have no application frame.
        let expected = "db:\n\
                        \t2 goroutines, avg wait time: 8.5s\n\n\
                        server:\n\
                        \t1 goroutines, avg wait time: 20s\n\n";
        assert_eq!(render(&goroutines, &config)?, expected);
        Ok(())
    }

    #[test]
    fn test_stats_by_package() {
        let goroutines = goroutines();
        let config = FilterConfig {
            group_by: GroupBy::Package,
            ..config(Format::Stats)
        };
        let report = StatsReport::new(&goroutines, &config);
        let keys = report.groups().iter().map(|g| g.key()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["/app/db", "/app/server"]);
    }

    #[test]
    fn test_stats_json() -> Result<()> {
        let goroutines = goroutines();
        let config = config(Format::StatsJson);
        let json: serde_json::Value = serde_json::from_str(&render(&goroutines, &config)?)?;
        assert_eq!(json[0]["key"], "db");
        assert_eq!(json[0]["goroutines"], 2);
        assert_eq!(json[0]["avg_wait_ns"], 8_500_000_000u64);
        Ok(())
    }

    #[test]
    fn test_listing_json() -> Result<()> {
        let goroutines = goroutines();
        let config = config(Format::Json);
        let json: serde_json::Value = serde_json::from_str(&render(&goroutines, &config)?)?;
        let ids = json
            .as_array()
            .map(|a| a.iter().map(|g| g["id"].as_u64()).collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(ids, vec![Some(3), Some(2), Some(5), Some(1), Some(4)]);
        Ok(())
    }

    #[test]
    fn test_empty_reports() -> Result<()> {
        let none: Vec<Goroutine> = Vec::new();
        let config = config(Format::Stats);
        assert_eq!(render(&none, &config)?, "");
        let config = FilterConfig {
            format: Format::Short,
            ..config
        };
        assert_eq!(render(&none, &config)?, "");
        Ok(())
    }
}
