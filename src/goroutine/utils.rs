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

use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::{DiagnoseError, Result};
use crate::goroutine::dump::{parse_goroutines, Frame, Goroutine};

/// File prefixes of the Go standard library as they appear in `-trimpath` builds.
pub const STDLIB_PREFIXES: &[&str] = &[
    "runtime/",
    "internal/",
    "net/",
    "sync/",
    "os/",
    "syscall/",
    "io/",
    "bufio/",
    "encoding/",
];

pub fn is_stdlib_frame(frame: &Frame) -> bool {
    STDLIB_PREFIXES
        .iter()
        .any(|prefix| frame.file.starts_with(prefix))
}

pub fn is_app_frame(frame: &Frame) -> bool {
    !is_stdlib_frame(frame)
}

/// A predicate on a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFilter {
    /// Rejects standard library frames.
    OmitStdlib,
    /// Accepts only frames whose function name starts with the prefix.
    FuncPrefix(String),
}

impl FrameFilter {
    pub fn matches(&self, frame: &Frame) -> bool {
        match self {
            FrameFilter::OmitStdlib => is_app_frame(frame),
            FrameFilter::FuncPrefix(prefix) => frame.func.starts_with(prefix.as_str()),
        }
    }
}

pub fn passes_all(frame: &Frame, filters: &[FrameFilter]) -> bool {
    filters.iter().all(|filter| filter.matches(frame))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMatch<'a> {
    pub frame: &'a Frame,
    /// Whether frames before `frame` were skipped by the filters.
    pub elided: bool,
}

/// Returns the first frame of `stack` passing every filter, or `None` when the stack
/// is empty or entirely filtered out.
pub fn find_first_frame<'a>(
    stack: &'a [Frame],
    filters: &[FrameFilter],
) -> Option<FrameMatch<'a>> {
    stack
        .iter()
        .position(|frame| passes_all(frame, filters))
        .map(|idx| FrameMatch {
            frame: &stack[idx],
            elided: idx > 0,
        })
}

/// Strips `<module>/` from a function name or path.
pub fn strip_module<'a>(name: &'a str, module: Option<&str>) -> &'a str {
    match module {
        Some(module) if !module.is_empty() => name
            .strip_prefix(module)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name),
        _ => name,
    }
}

pub fn read_dump<P: AsRef<Path>>(path: P) -> Result<Vec<Goroutine>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| DiagnoseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let goroutines = parse_goroutines(&content)?;
    debug!(
        "parsed {} goroutines from {}",
        goroutines.len(),
        path.display()
    );
    Ok(goroutines)
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Formats a duration the way Go prints a `time.Duration`.
///
/// # Examples:
/// - 20s → "20s"
/// - 5min → "5m0s"
/// - 3723.5s → "1h2m3.5s"
/// - 250ms → "250ms"
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns == 0 {
        return "0s".to_owned();
    }
    if ns < NANOS_PER_MICRO {
        return format!("{}ns", ns);
    }
    if ns < NANOS_PER_MILLI {
        return format!("{}µs", fmt_frac(ns, NANOS_PER_MICRO));
    }
    if ns < NANOS_PER_SEC {
        return format!("{}ms", fmt_frac(ns, NANOS_PER_MILLI));
    }

    let total_secs = ns / NANOS_PER_SEC;
    let hours = total_secs / 3600;
    let minutes = total_secs / 60 % 60;
    let seconds = fmt_frac(ns % (60 * NANOS_PER_SEC), NANOS_PER_SEC);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// `value / unit` with the fractional digits kept and trailing zeros trimmed.
fn fmt_frac(value: u128, unit: u128) -> String {
    let int = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return int.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", int, digits.trim_end_matches('0'))
}

/// Parses a Go-style duration string.
///
/// # Supported Formats:
/// - "10s", "500ms", "250us", "100ns"
/// - "1m30s", "2h"
/// - "1.5s"
/// - "0"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let invalid = || DiagnoseError::InvalidDuration(s.to_owned());
    let input = s.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total_ns = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let value = rest[..num_len].parse::<f64>().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_ns = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_ns += value * unit_ns;
    }
    Ok(Duration::from_nanos(total_ns.round() as u64))
}
