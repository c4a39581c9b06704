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
use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

pub type Result<T, E = DiagnoseError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum DiagnoseError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse file: {0}")]
    Parse(#[from] ParseErrors),

    #[error("unknown group by: {0} (expected package, struct or func)")]
    UnknownGroupBy(String),

    #[error("unknown format: {0} (expected short, full, no-path, stats, json or stats-json)")]
    UnknownFormat(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single malformed region of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number, 0 when the error is not tied to a line (e.g. JSON input).
    pub line: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Every error found while parsing a dump. Never empty when returned as an `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} error(s):\n{}", .0.len(), .0.iter().join("\n"))]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }
}
