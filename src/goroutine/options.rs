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
use std::str::FromStr;
use std::time::Duration;

use crate::error::DiagnoseError;
use crate::goroutine::group::GroupBy;
use crate::goroutine::outliers::{OutlierFilter, DEFAULT_THRESHOLD};
use crate::goroutine::utils::FrameFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Goroutine id, state and wait time.
    #[default]
    Short,
    /// `Short` plus the stack with file and line.
    Full,
    /// `Full` without file and line.
    NoPath,
    /// Goroutine count and average wait time per group.
    Stats,
    /// The listing as JSON.
    Json,
    /// The group statistics as JSON.
    StatsJson,
}

impl FromStr for Format {
    type Err = DiagnoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Format::Short),
            "full" => Ok(Format::Full),
            "no-path" => Ok(Format::NoPath),
            "stats" => Ok(Format::Stats),
            "json" => Ok(Format::Json),
            "stats-json" => Ok(Format::StatsJson),
            _ => Err(DiagnoseError::UnknownFormat(s.to_owned())),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Short => "short",
            Format::Full => "full",
            Format::NoPath => "no-path",
            Format::Stats => "stats",
            Format::Json => "json",
            Format::StatsJson => "stats-json",
        })
    }
}

/// Everything the pipeline needs to know about one invocation. Built once, then only
/// passed around by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub format: Format,
    /// Hide standard library frames from the rendered stacks.
    pub omit_stdlib: bool,
    pub group_by: GroupBy,
    /// Module path of the analyzed program, stripped from displayed names.
    pub module: Option<String>,
    /// Effective states, empty for no restriction.
    pub states: Vec<String>,
    pub threshold: Duration,
    /// Only frames whose function starts with this prefix are considered.
    pub func_prefix: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            omit_stdlib: false,
            group_by: GroupBy::default(),
            module: None,
            states: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
            func_prefix: None,
        }
    }
}

impl FilterConfig {
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    fn prefix_filter(&self) -> Option<FrameFilter> {
        self.func_prefix
            .as_ref()
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| FrameFilter::FuncPrefix(prefix.clone()))
    }

    /// The `--filter` prefix alone.
    pub fn prefix_filters(&self) -> Vec<FrameFilter> {
        self.prefix_filter().into_iter().collect()
    }

    /// Filters for the frames rendered in `full` and `no-path` listings.
    pub fn listing_filters(&self) -> Vec<FrameFilter> {
        let mut filters = self.stdlib_filters();
        filters.extend(self.prefix_filter());
        filters
    }

    /// `--omit-stdlib` alone.
    pub fn stdlib_filters(&self) -> Vec<FrameFilter> {
        if self.omit_stdlib {
            vec![FrameFilter::OmitStdlib]
        } else {
            Vec::new()
        }
    }

    /// Groups are keyed on the first application frame, whatever `omit_stdlib` says.
    pub fn group_filters(&self) -> Vec<FrameFilter> {
        let mut filters = vec![FrameFilter::OmitStdlib];
        filters.extend(self.prefix_filter());
        filters
    }

    pub fn outlier_filter(&self) -> OutlierFilter {
        OutlierFilter::new(self.threshold, self.states.clone())
    }
}

/// Makes a `--filter` value relative to `module` unless it is already a full import
/// path (starts with the module, or with a domain like `github.com/`) or targets
/// package `main`, whose symbols never carry the module path.
pub fn resolve_func_prefix(filter: &str, module: Option<&str>) -> String {
    let Some(module) = module.filter(|m| !m.is_empty()) else {
        return filter.to_owned();
    };
    let is_absolute = filter.starts_with(module)
        || filter.starts_with("main.")
        || filter
            .split_once('/')
            .is_some_and(|(first, _)| first.contains('.'));
    if is_absolute {
        filter.to_owned()
    } else {
        format!("{}/{}", module, filter.trim_start_matches('/'))
    }
}

/// The `module` directive of a `go.mod` file.
pub fn module_path_from_go_mod(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let path = line.strip_prefix("module")?;
        if !path.starts_with(char::is_whitespace) {
            return None;
        }
        let path = path.trim().trim_matches(|c| c == '"' || c == '`');
        (!path.is_empty()).then(|| path.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        for format in [
            Format::Short,
            Format::Full,
            Format::NoPath,
            Format::Stats,
            Format::Json,
            Format::StatsJson,
        ] {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
        assert!(matches!(
            "yaml".parse::<Format>(),
            Err(DiagnoseError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_filters() {
        let config = FilterConfig {
            omit_stdlib: true,
            func_prefix: Some("github.com/acme/svc/db".to_owned()),
            ..Default::default()
        };
        let prefix = FrameFilter::FuncPrefix("github.com/acme/svc/db".to_owned());
        assert_eq!(config.prefix_filters(), vec![prefix.clone()]);
        assert_eq!(
            config.listing_filters(),
            vec![FrameFilter::OmitStdlib, prefix.clone()]
        );
        assert_eq!(config.stdlib_filters(), vec![FrameFilter::OmitStdlib]);

        let config = FilterConfig {
            func_prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(config.listing_filters().is_empty());
        assert_eq!(config.group_filters(), vec![FrameFilter::OmitStdlib]);
    }

    #[test]
    fn test_resolve_func_prefix() {
        let module = Some("github.com/acme/svc");
        assert_eq!(
            resolve_func_prefix("db", module),
            "github.com/acme/svc/db"
        );
        assert_eq!(
            resolve_func_prefix("internal/db", module),
            "github.com/acme/svc/internal/db"
        );
        assert_eq!(
            resolve_func_prefix("github.com/acme/svc/db", module),
            "github.com/acme/svc/db"
        );
        assert_eq!(
            resolve_func_prefix("golang.org/x/net", module),
            "golang.org/x/net"
        );
        assert_eq!(resolve_func_prefix("main.worker", module), "main.worker");
        assert_eq!(resolve_func_prefix("db", None), "db");
    }

    #[test]
    fn test_module_path_from_go_mod() {
        let go_mod = "// comment\nmodule github.com/acme/svc // trailing\n\ngo 1.22\n";
        assert_eq!(
            module_path_from_go_mod(go_mod).as_deref(),
            Some("github.com/acme/svc")
        );
        assert_eq!(
            module_path_from_go_mod("module \"example.com/quoted\"\n").as_deref(),
            Some("example.com/quoted")
        );
        assert_eq!(module_path_from_go_mod("modules x\ngo 1.22\n"), None);
        assert_eq!(module_path_from_go_mod(""), None);
    }
}
