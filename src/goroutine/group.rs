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
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::error::DiagnoseError;
use crate::goroutine::dump::{Frame, Goroutine};
use crate::goroutine::utils::{find_first_frame, strip_module, FrameFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupBy {
    /// Directory of the source file.
    Package,
    /// Function name truncated at the first `.` after its last `/`.
    #[default]
    Struct,
    /// Fully qualified function name.
    Func,
}

impl GroupBy {
    pub fn key(self, frame: &Frame) -> String {
        match self {
            GroupBy::Package => package_key(&frame.file).to_owned(),
            GroupBy::Struct => struct_key(&frame.func).to_owned(),
            GroupBy::Func => frame.func.clone(),
        }
    }
}

impl FromStr for GroupBy {
    type Err = DiagnoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "package" | "dir" | "directory" => Ok(GroupBy::Package),
            "struct" | "type" => Ok(GroupBy::Struct),
            "func" | "function" => Ok(GroupBy::Func),
            _ => Err(DiagnoseError::UnknownGroupBy(s.to_owned())),
        }
    }
}

impl Display for GroupBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GroupBy::Package => "package",
            GroupBy::Struct => "struct",
            GroupBy::Func => "func",
        })
    }
}

/// Goroutines sharing a grouping key. A group always has at least one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    key: String,
    goroutines: Vec<&'a Goroutine>,
    cum_wait: Duration,
}

#[allow(clippy::len_without_is_empty)]
impl<'a> Group<'a> {
    fn new(key: String, first: &'a Goroutine) -> Self {
        Self {
            key,
            goroutines: vec![first],
            cum_wait: first.wait,
        }
    }

    fn push(&mut self, goroutine: &'a Goroutine) {
        self.goroutines.push(goroutine);
        self.cum_wait += goroutine.wait;
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn goroutines(&self) -> &[&'a Goroutine] {
        &self.goroutines
    }

    pub fn len(&self) -> usize {
        self.goroutines.len()
    }

    pub fn cum_wait(&self) -> Duration {
        self.cum_wait
    }

    pub fn avg_wait(&self) -> Duration {
        let avg_ns = self.cum_wait.as_nanos() / self.goroutines.len() as u128;
        Duration::from_nanos(avg_ns as u64)
    }

    pub fn summary(&self, module: Option<&str>) -> GroupSummary {
        GroupSummary {
            key: strip_module(&self.key, module).to_owned(),
            goroutines: self.len(),
            cum_wait_ns: self.cum_wait.as_nanos() as u64,
            avg_wait_ns: self.avg_wait().as_nanos() as u64,
        }
    }
}

/// Serializable view of a [`Group`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub goroutines: usize,
    pub cum_wait_ns: u64,
    pub avg_wait_ns: u64,
}

/// Buckets goroutines by the key of their first frame passing `filters`. Goroutines
/// without such a frame are left out.
///
/// The map has no meaningful order, use [`sorted_groups`] before display.
pub fn group_goroutines<'a>(
    goroutines: impl IntoIterator<Item = &'a Goroutine>,
    group_by: GroupBy,
    filters: &[FrameFilter],
) -> HashMap<String, Group<'a>> {
    let mut groups: HashMap<String, Group<'a>> = HashMap::new();
    let mut skipped = 0;
    for goroutine in goroutines {
        let Some(found) = find_first_frame(&goroutine.stack, filters) else {
            skipped += 1;
            continue;
        };
        let key = group_by.key(found.frame);
        match groups.get_mut(&key) {
            Some(group) => group.push(goroutine),
            None => {
                groups.insert(key.clone(), Group::new(key, goroutine));
            }
        }
    }
    debug!(
        "grouped by {} into {} groups, {} goroutines without a matching frame",
        group_by,
        groups.len(),
        skipped
    );
    groups
}

/// Largest groups first, ties broken by key.
pub fn sorted_groups<'a>(groups: HashMap<String, Group<'a>>) -> Vec<Group<'a>> {
    groups
        .into_values()
        .sorted_by(|a, b| {
            Reverse(a.len())
                .cmp(&Reverse(b.len()))
                .then_with(|| a.key.cmp(&b.key))
        })
        .collect()
}

/// `/app/server/server.go` -> `/app/server`
pub fn package_key(file: &str) -> &str {
    match file.rfind('/') {
        Some(0) => "/",
        Some(idx) => &file[..idx],
        None => ".",
    }
}

/// Truncates a qualified function name at the first `.` after its last `/`, which
/// leaves the package path:
///
/// - `pkg/sub.Type.Method`, `pkg/sub.(*Type).Method`, `pkg/sub.Func` -> `pkg/sub`
/// - a name without `.` after its last `/` is returned whole.
pub fn struct_key(func: &str) -> &str {
    let start = func.rfind('/').map_or(0, |idx| idx + 1);
    match func[start..].find('.') {
        Some(dot) => &func[..start + dot],
        None => func,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn goroutine(id: u64, wait_secs: u64, stack: &[(&str, &str)]) -> Goroutine {
        Goroutine::new(id, "chan receive", Duration::from_secs(wait_secs)).with_stack(
            stack
                .iter()
                .map(|(func, file)| Frame::new(*func, *file, 1))
                .collect(),
        )
    }

    #[test]
    fn test_struct_key() {
        assert_eq!(struct_key("pkg/sub.Type.Method"), "pkg/sub");
        assert_eq!(struct_key("pkg/sub.(*Type).Method"), "pkg/sub");
        assert_eq!(struct_key("pkg/sub.Func.func1"), "pkg/sub");
        assert_eq!(struct_key("main.main"), "main");
        assert_eq!(
            struct_key("gopkg.in/yaml%2ev3.(*decoder).unmarshal"),
            "gopkg.in/yaml%2ev3"
        );
    }

    #[test]
    fn test_struct_key_degenerate_names() {
        assert_eq!(struct_key("nodots"), "nodots");
        assert_eq!(struct_key("a/b/nodots"), "a/b/nodots");
        assert_eq!(struct_key("a/b/"), "a/b/");
        assert_eq!(struct_key(""), "");
        assert_eq!(struct_key("pkg/sub."), "pkg/sub");
        assert_eq!(struct_key(".F"), "");
    }

    #[test]
    fn test_package_key() {
        assert_eq!(package_key("/app/server/server.go"), "/app/server");
        assert_eq!(package_key("/main.go"), "/");
        assert_eq!(package_key("main.go"), ".");
    }

    #[test]
    fn test_group_by_parse() {
        assert_eq!("package".parse::<GroupBy>().unwrap(), GroupBy::Package);
        assert_eq!("type".parse::<GroupBy>().unwrap(), GroupBy::Struct);
        assert_eq!("func".parse::<GroupBy>().unwrap(), GroupBy::Func);
        assert!(matches!(
            "line".parse::<GroupBy>(),
            Err(DiagnoseError::UnknownGroupBy(s)) if s == "line"
        ));
    }

    #[test]
    fn test_group_by_struct() {
        let goroutines = vec![
            goroutine(1, 10, &[("pkg/sub.A.M", "/app/sub/a.go")]),
            goroutine(2, 20, &[("pkg/sub.(*B).M", "/app/sub/b.go")]),
            goroutine(3, 30, &[("pkg/sub.Free", "/app/sub/c.go")]),
            goroutine(4, 40, &[("pkg/other.Run", "/app/other/d.go")]),
        ];
        let groups = group_goroutines(&goroutines, GroupBy::Struct, &[]);
        assert_eq!(groups.len(), 2);

        // Methods of different receivers and free functions share their package.
        let group = &groups["pkg/sub"];
        assert_eq!(group.len(), 3);
        assert_eq!(group.cum_wait(), Duration::from_secs(60));
        assert_eq!(group.avg_wait(), Duration::from_secs(20));
        assert_eq!(groups["pkg/other"].len(), 1);
    }

    #[test]
    fn test_group_skips_unattributable_goroutines() {
        let goroutines = vec![
            goroutine(1, 10, &[("runtime.gopark", "runtime/proc.go")]),
            goroutine(2, 10, &[]),
            goroutine(
                3,
                10,
                &[("runtime.gopark", "runtime/proc.go"), ("main.loop", "/app/main.go")],
            ),
        ];
        let groups = group_goroutines(&goroutines, GroupBy::Func, &[FrameFilter::OmitStdlib]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["main.loop"].goroutines()[0].id, 3);
        // No group is ever empty, so averaging is always defined.
        assert!(groups.values().all(|g| !g.goroutines().is_empty()));
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let goroutines = vec![
            goroutine(1, 10, &[("a.F", "/app/a/a.go")]),
            goroutine(2, 20, &[("b.G", "/app/b/b.go")]),
            goroutine(3, 30, &[("a.H", "/app/a/h.go")]),
        ];
        let first = sorted_groups(group_goroutines(&goroutines, GroupBy::Package, &[]));
        let second = sorted_groups(group_goroutines(&goroutines, GroupBy::Package, &[]));
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|g| g.key()).collect::<Vec<_>>(),
            vec!["/app/a", "/app/b"]
        );
        assert_eq!(first[0].cum_wait(), Duration::from_secs(40));
    }

    #[test]
    fn test_sorted_groups_breaks_ties_by_key() {
        let goroutines = vec![
            goroutine(1, 1, &[("z.F", "z.go")]),
            goroutine(2, 1, &[("a.F", "a.go")]),
            goroutine(3, 1, &[("m.F", "m.go")]),
            goroutine(4, 1, &[("m.F", "m.go")]),
        ];
        let sorted = sorted_groups(group_goroutines(&goroutines, GroupBy::Func, &[]));
        assert_eq!(
            sorted.iter().map(|g| g.key()).collect::<Vec<_>>(),
            vec!["m.F", "a.F", "z.F"]
        );
    }
}
