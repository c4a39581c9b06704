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

//! Goroutine dump format
//!
//! As printed by the Go runtime on `SIGQUIT`, on an unrecovered panic, or by
//! `runtime.Stack(buf, true)`:
//!
//! ```text
//! goroutine 1 [running]:
//! main.main()
//! 	/app/main.go:12 +0x1d
//!
//! goroutine 7 [chan receive, 12 minutes, locked to thread]:
//! github.com/acme/svc/server.(*Server).loop(0xc000010000)
//! 	/app/server/server.go:42 +0x1d
//! ...additional frames elided...
//! created by github.com/acme/svc/server.Start in goroutine 1
//! 	/app/server/start.go:10 +0x55
//! ```
//!
//! Frames are listed innermost first. The wait time is only printed once a goroutine
//! has been blocked for a minute, and only in whole minutes.
//!
//! A dump can also be given as a JSON array of [`Goroutine`], which is what the `json`
//! format prints.

mod dump;
mod format;
mod group;
mod lookup;
mod options;
mod outliers;
mod states;
pub(crate) mod utils;

pub use dump::*;
pub use format::*;
pub use group::*;
pub use lookup::*;
pub use options::*;
pub use outliers::*;
pub use states::*;
pub use utils::{
    find_first_frame, format_duration, is_app_frame, is_stdlib_frame, parse_duration,
    passes_all, read_dump, strip_module, FrameFilter, FrameMatch, STDLIB_PREFIXES,
};
