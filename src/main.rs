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

//! `go-diagnose`: find stuck goroutines in a Go stack dump.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{debug, warn};

use go_diagnose_tools::goroutine::{
    format_duration, module_path_from_go_mod, parse_duration, read_dump, render,
    resolve_func_prefix, resolve_states, select_printable, FilterConfig, Format, GroupBy,
    DEFAULT_OUTLIER_STATES,
};

#[derive(Parser, Debug)]
#[command(name = "go-diagnose")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filter goroutines with a symptomatic wait time
    ///
    /// States can be prefixed with '+' or '-' to add them to or remove them from the
    /// default list (syscall, sync.Cond.Wait, sync.Mutex.Lock); '-all' drops the
    /// whole default list.
    Outliers {
        /// Goroutine dump, as text or JSON
        file: PathBuf,

        /// Minimum wait time of an outlier
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        threshold: Duration,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print goroutines, or a single one with --id
    Print {
        /// Goroutine dump, as text or JSON
        file: PathBuf,

        /// Id of the goroutine to print, 0 for all
        #[arg(long, default_value_t = 0)]
        id: u64,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// States of goroutines to include (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    states: Vec<String>,

    /// Output format: short, full, no-path, stats, json or stats-json
    #[arg(long, default_value = "short")]
    format: Format,

    /// Omit standard library frames when printing stacks
    #[arg(long)]
    omit_stdlib: bool,

    /// With --format=stats, group by package, struct or func
    #[arg(long, default_value = "struct")]
    group_by: GroupBy,

    /// Only consider frames whose function starts with this prefix, relative to the
    /// module unless it is a full import path
    #[arg(long)]
    filter: Option<String>,

    /// Module path stripped from displayed names [default: read from ./go.mod]
    #[arg(long)]
    module: Option<String>,
}

impl CommonArgs {
    fn to_config(&self, states: Vec<String>) -> FilterConfig {
        let module = self.module.clone().or_else(|| detect_module(Path::new("go.mod")));
        let func_prefix = self
            .filter
            .as_deref()
            .map(|filter| resolve_func_prefix(filter, module.as_deref()));
        FilterConfig {
            format: self.format,
            omit_stdlib: self.omit_stdlib,
            group_by: self.group_by,
            module,
            states,
            func_prefix,
            ..Default::default()
        }
    }
}

fn detect_module(go_mod: &Path) -> Option<String> {
    let content = std::fs::read_to_string(go_mod).ok()?;
    let module = module_path_from_go_mod(&content);
    debug!("module path from {}: {:?}", go_mod.display(), module);
    module
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Outliers {
            file,
            threshold,
            common,
        } => run_outliers(&file, threshold, &common),
        Commands::Print { file, id, common } => run_print(&file, id, &common),
    }
}

fn run_outliers(file: &Path, threshold: Duration, common: &CommonArgs) -> Result<()> {
    let config = FilterConfig {
        threshold,
        ..common.to_config(resolve_states(&common.states, DEFAULT_OUTLIER_STATES))
    };
    let goroutines =
        read_dump(file).with_context(|| format!("failed to analyze {}", file.display()))?;

    let outliers = config.outlier_filter().apply(&goroutines);
    if outliers.is_empty() {
        warn!(
            "no goroutine waited {} or more in states {:?}",
            format_duration(config.threshold),
            config.states
        );
    }
    emit(render(outliers, &config)?);
    Ok(())
}

fn run_print(file: &Path, id: u64, common: &CommonArgs) -> Result<()> {
    let config = common.to_config(resolve_states(&common.states, &[]));
    let goroutines =
        read_dump(file).with_context(|| format!("failed to analyze {}", file.display()))?;

    let selected = select_printable(&goroutines, (id != 0).then_some(id), &config);
    // The prefix selects goroutines, it does not hide their frames.
    let config = FilterConfig {
        func_prefix: None,
        ..config
    };
    emit(render(selected, &config)?);
    Ok(())
}

fn emit(mut output: String) {
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    print!("{}", output);
}
