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

//! Diagnose stuck goroutines from Go runtime stack dumps.
//!
//! The [`goroutine`] module parses a dump into [`goroutine::Goroutine`] records and
//! narrows them down to outliers, groups them by code location and renders reports.

pub mod error;
pub mod goroutine;

cfg_if::cfg_if! {
    if #[cfg(feature = "wasm")] {
        mod wasm;
        pub use wasm::analyze_dump_str;
    }
}
