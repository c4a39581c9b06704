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

//! Finds the goroutines stuck on a mutex or in a syscall for more than a minute and
//! groups them by receiver type.

use std::time::Duration;

use go_diagnose_tools::goroutine::{
    parse_goroutines, resolve_states, FilterConfig, Format, Listing, StatsReport,
    DEFAULT_OUTLIER_STATES,
};

const DUMP: &str = r#"goroutine 1 [running]:
main.main()
	/app/main.go:21 +0x1d

goroutine 18 [sync.Mutex.Lock, 14 minutes]:
sync.runtime_SemacquireMutex(0x0?, 0x0?, 0x0?)
	runtime/sema.go:95 +0x25
sync.(*Mutex).lockSlow(0xc0000a4010)
	sync/mutex.go:173 +0x15d
sync.(*Mutex).Lock(...)
	sync/mutex.go:92
example.com/shop/cart.(*Store).Add(0xc0000a4000, {0x6b2f3e, 0x3})
	/app/cart/store.go:40 +0x45
created by main.main in goroutine 1
	/app/main.go:17 +0x85

goroutine 19 [sync.Mutex.Lock, 9 minutes]:
sync.runtime_SemacquireMutex(0x0?, 0x0?, 0x0?)
	runtime/sema.go:95 +0x25
sync.(*Mutex).Lock(...)
	sync/mutex.go:92
example.com/shop/cart.(*Store).Remove(0xc0000a4000, {0x6b2f3e, 0x3})
	/app/cart/store.go:58 +0x45
created by main.main in goroutine 1
	/app/main.go:18 +0x85

goroutine 20 [chan receive, 30 minutes]:
example.com/shop/events.Listen(0xc0000b2000)
	/app/events/listen.go:12 +0x2a
"#;

fn main() -> anyhow::Result<()> {
    let goroutines = parse_goroutines(DUMP)?;

    let config = FilterConfig {
        format: Format::Full,
        omit_stdlib: true,
        module: Some("example.com/shop".to_owned()),
        states: resolve_states::<&str>(&[], DEFAULT_OUTLIER_STATES),
        threshold: Duration::from_secs(60),
        ..Default::default()
    };
    let outliers = config.outlier_filter().apply(&goroutines);

    // cart:
    // 	2 goroutines, avg wait time: 11m30s
    print!("{}", StatsReport::new(outliers.iter().copied(), &config));

    // goroutine 18 [sync.Mutex.Lock, 14m0s]
    // cart.(*Store).Add()
    // 	/app/cart/store.go:40
    // ...
    print!("{}", Listing::new(outliers, &config));
    Ok(())
}
