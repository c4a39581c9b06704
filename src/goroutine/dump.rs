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

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseErrors};

/// One goroutine of a stack dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goroutine {
    pub id: u64,

    /// Wait reason as printed by the runtime, e.g. `chan receive` or `sync.Mutex.Lock`.
    pub state: String,

    /// Time spent in `state`. The runtime only reports it in whole minutes, and only
    /// past one minute, so zero means "not reported".
    #[serde(rename = "wait_ns", with = "duration_ns", default)]
    pub wait: Duration,

    /// Innermost call first.
    #[serde(default)]
    pub stack: Vec<Frame>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked_to_thread: bool,

    /// The runtime truncated the stack (`...additional frames elided...`).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub frames_elided: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Frame>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<u64>,
}

impl Goroutine {
    pub fn new(id: u64, state: impl Into<String>, wait: Duration) -> Self {
        Self {
            id,
            state: state.into(),
            wait,
            stack: Vec::new(),
            locked_to_thread: false,
            frames_elided: false,
            created_by: None,
            creator_id: None,
        }
    }

    pub fn with_stack(mut self, stack: Vec<Frame>) -> Self {
        self.stack = stack;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Fully qualified function name, e.g. `github.com/org/repo/pkg.(*Type).Method`.
    pub func: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(func: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            func: func.into(),
            file: file.into(),
            line,
        }
    }
}

mod duration_ns {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

/// Parses a dump, either in the runtime's text format or as a JSON array of
/// [`Goroutine`]s. See [`crate::goroutine`] for the text format.
///
/// Parsing does not stop at the first malformed line: all of them are reported.
pub fn parse_goroutines(input: &str) -> Result<Vec<Goroutine>, ParseErrors> {
    if input.trim_start().starts_with('[') {
        return serde_json::from_str(input).map_err(|e| {
            ParseErrors(vec![ParseError {
                line: e.line(),
                message: format!("invalid goroutine JSON: {}", e),
            }])
        });
    }

    let mut parser = TextParser::default();
    for (idx, line) in input.lines().enumerate() {
        parser.feed(idx + 1, line.trim_end());
    }
    parser.finish()
}

enum PendingFrame {
    Call(String),
    CreatedBy {
        func: String,
        creator_id: Option<u64>,
    },
}

impl PendingFrame {
    fn func(&self) -> &str {
        match self {
            PendingFrame::Call(func) | PendingFrame::CreatedBy { func, .. } => func,
        }
    }
}

#[derive(Default)]
struct TextParser {
    goroutines: Vec<Goroutine>,
    current: Option<Goroutine>,
    /// A function line waiting for its `file:line` line.
    pending: Option<(usize, PendingFrame)>,
    errors: Vec<ParseError>,
}

impl TextParser {
    fn feed(&mut self, lineno: usize, line: &str) {
        if let Some((func_lineno, pending)) = self.pending.take() {
            if let Some((file, line_no)) = parse_file_line(line) {
                let frame = Frame::new(pending.func(), file, line_no);
                self.attach(pending, frame);
                return;
            }
            self.error(
                func_lineno,
                format!("missing `file:line` for `{}`", pending.func()),
            );
        }

        if line.trim().is_empty() {
            self.end_goroutine();
            return;
        }

        if line.starts_with("goroutine ") && line.ends_with(':') {
            self.end_goroutine();
            match parse_header(line) {
                Ok(goroutine) => self.current = Some(goroutine),
                Err(message) => self.error(lineno, message),
            }
            return;
        }

        let Some(current) = self.current.as_mut() else {
            // Panic message, signal info and the like before the first goroutine.
            return;
        };

        if line == "...additional frames elided..." {
            current.frames_elided = true;
        } else if let Some(rest) = line.strip_prefix("created by ") {
            let (func, creator_id) = match rest.split_once(" in goroutine ") {
                Some((func, id)) => (func, id.trim().parse().ok()),
                None => (rest, None),
            };
            self.pending = Some((
                lineno,
                PendingFrame::CreatedBy {
                    func: func.trim().to_owned(),
                    creator_id,
                },
            ));
        } else if let Some(func) = parse_func_line(line) {
            self.pending = Some((lineno, PendingFrame::Call(func.to_owned())));
        } else {
            self.error(lineno, format!("unexpected line `{}`", line));
        }
    }

    fn attach(&mut self, pending: PendingFrame, frame: Frame) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        match pending {
            PendingFrame::Call(_) => current.stack.push(frame),
            PendingFrame::CreatedBy { creator_id, .. } => {
                current.created_by = Some(frame);
                current.creator_id = creator_id;
            }
        }
    }

    fn end_goroutine(&mut self) {
        if let Some(goroutine) = self.current.take() {
            self.goroutines.push(goroutine);
        }
    }

    fn error(&mut self, line: usize, message: String) {
        self.errors.push(ParseError { line, message });
    }

    fn finish(mut self) -> Result<Vec<Goroutine>, ParseErrors> {
        if let Some((lineno, pending)) = self.pending.take() {
            self.error(
                lineno,
                format!("missing `file:line` for `{}`", pending.func()),
            );
        }
        self.end_goroutine();

        if self.errors.is_empty() {
            Ok(self.goroutines)
        } else {
            Err(ParseErrors(self.errors))
        }
    }
}

/// Parses `goroutine 7 [chan receive, 12 minutes, locked to thread]:`.
///
/// Anything between the id and the bracket (`gp=0x... m=nil`) is ignored.
fn parse_header(line: &str) -> Result<Goroutine, String> {
    let rest = line
        .strip_prefix("goroutine ")
        .and_then(|s| s.strip_suffix(':'))
        .ok_or_else(|| format!("malformed goroutine header `{}`", line))?;

    let (open, close) = match (rest.find('['), rest.rfind(']')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return Err(format!("missing `[state]` in goroutine header `{}`", line)),
    };

    let id_str = rest[..open].split_whitespace().next().unwrap_or_default();
    let id = id_str
        .parse::<u64>()
        .map_err(|_| format!("invalid goroutine id `{}`", id_str))?;

    let mut parts = rest[open + 1..close].split(", ");
    let state = parts.next().unwrap_or_default().trim();
    if state.is_empty() {
        return Err(format!("empty state for goroutine {}", id));
    }

    let mut goroutine = Goroutine::new(id, state, Duration::ZERO);
    for part in parts {
        let part = part.trim();
        if part == "locked to thread" {
            goroutine.locked_to_thread = true;
        } else if let Some(minutes) = part
            .strip_suffix(" minutes")
            .or_else(|| part.strip_suffix(" minute"))
        {
            let minutes = minutes
                .parse::<u64>()
                .map_err(|_| format!("invalid wait time `{}` for goroutine {}", part, id))?;
            let secs = minutes
                .checked_mul(60)
                .ok_or_else(|| {
                    format!("wait time `{}` out of range for goroutine {}", part, id)
                })?;
            goroutine.wait = Duration::from_secs(secs);
        }
    }
    Ok(goroutine)
}

/// `main.(*Server).loop(0xc000010000, {0x1, 0x2})` -> `main.(*Server).loop`
fn parse_func_line(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) || !line.ends_with(')') {
        return None;
    }
    let open = line.rfind('(')?;
    let func = &line[..open];
    (!func.is_empty()).then_some(func)
}

/// `\t/app/server.go:42 +0x1d` -> (`/app/server.go`, 42)
fn parse_file_line(line: &str) -> Option<(String, u32)> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let mut location = line.trim();
    for marker in [" +0x", " fp=", " pc="] {
        if let Some(idx) = location.find(marker) {
            location = &location[..idx];
        }
    }
    let (file, line_no) = location.rsplit_once(':')?;
    let line_no = line_no.parse::<u32>().ok()?;
    (!file.is_empty()).then(|| (file.to_owned(), line_no))
}
