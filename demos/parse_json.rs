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

//! Converts a text dump to JSON and back.

use go_diagnose_tools::goroutine::{parse_goroutines, render, FilterConfig, Format};

fn main() -> anyhow::Result<()> {
    let text = "goroutine 7 [select, 3 minutes]:\n\
                example.com/app/worker.(*Pool).run(0xc000100000)\n\
                \t/app/worker/pool.go:88 +0x1c5\n";
    let goroutines = parse_goroutines(text)?;

    let config = FilterConfig {
        format: Format::Json,
        ..Default::default()
    };
    let json = render(&goroutines, &config)?;
    println!("{json}");

    let reparsed = parse_goroutines(&json)?;
    assert_eq!(reparsed, goroutines);
    Ok(())
}
