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

//! Resolution of the `--states` overrides against a baseline.

/// Wait states that usually indicate a stuck goroutine when they last long.
pub const DEFAULT_OUTLIER_STATES: &[&str] = &["syscall", "sync.Cond.Wait", "sync.Mutex.Lock"];

/// Removes the whole baseline, wherever it appears in the overrides.
pub const EXCLUDE_ALL: &str = "-all";

/// Merges state overrides into `defaults`.
///
/// - `+label` (or a bare `label`) is included as is, duplicates kept;
/// - `-label` drops `label` from the baseline;
/// - `-all` drops the whole baseline, later tokens still apply.
///
/// The explicit inclusions come first, in input order, followed by what is left of
/// the baseline, in baseline order.
pub fn resolve_states<S: AsRef<str>>(overrides: &[S], defaults: &[&str]) -> Vec<String> {
    let mut states = Vec::new();
    let mut defaults = defaults.to_vec();
    let mut include_defaults = true;

    for token in overrides {
        let token = token.as_ref().trim();
        if token == EXCLUDE_ALL {
            include_defaults = false;
        } else if let Some(label) = token.strip_prefix('-') {
            defaults.retain(|s| *s != label);
        } else {
            let label = token.strip_prefix('+').unwrap_or(token);
            if !label.is_empty() {
                states.push(label.to_owned());
            }
        }
    }

    if include_defaults {
        states.extend(defaults.into_iter().map(str::to_owned));
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_OVERRIDES: &[&str] = &[];

    #[test]
    fn test_no_overrides_keep_defaults() {
        assert_eq!(
            resolve_states(NO_OVERRIDES, DEFAULT_OUTLIER_STATES),
            vec!["syscall", "sync.Cond.Wait", "sync.Mutex.Lock"]
        );
        assert!(resolve_states(NO_OVERRIDES, &[]).is_empty());
    }

    #[test]
    fn test_exclude_all() {
        assert!(resolve_states(&["-all"], DEFAULT_OUTLIER_STATES).is_empty());
        assert_eq!(resolve_states(&["+z", "-all"], &["x"]), vec!["z"]);
        assert_eq!(resolve_states(&["-all", "+z"], &["x"]), vec!["z"]);
    }

    #[test]
    fn test_remove_default() {
        assert_eq!(resolve_states(&["-x"], &["x", "y"]), vec!["y"]);
        assert_eq!(resolve_states(&["-missing"], &["x", "y"]), vec!["x", "y"]);
    }

    #[test]
    fn test_merge_scenario() {
        assert_eq!(
            resolve_states(&["-syscall", "+my.Custom.Wait"], DEFAULT_OUTLIER_STATES),
            vec!["my.Custom.Wait", "sync.Cond.Wait", "sync.Mutex.Lock"]
        );
    }

    #[test]
    fn test_inclusions_keep_duplicates_and_order() {
        assert_eq!(
            resolve_states(&["+b", "a", "+b", "+", "-", ""], &["c"]),
            vec!["b", "a", "b", "c"]
        );
    }
}
