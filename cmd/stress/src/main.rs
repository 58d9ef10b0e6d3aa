//! CPU stress - pin N workers and burn floating point until the budget ends
//!
//! Usage:
//!
//!     stress [--workers N] [--passes N] [--time SECS] [--bind] [--core-base N]
//!
//! Anything not given on the command line comes from `FICA_*` environment
//! variables, then library defaults. Exits non-zero if any worker fails.

use fica::{
    available_core_count, ferror, finfo, fprintln, run_with, PoolConfig, PoolReport, Step,
    WorkerContext,
};
use std::hint::black_box;
use std::process::ExitCode;
use std::time::Duration;

const USAGE: &str = "\
usage: stress [options]
  --workers N     worker threads (default: FICA_NUM_WORKERS or min(8, cores))
  --passes N      iterations per worker, 0 = unlimited
  --time SECS     run time per worker, 0 = no deadline
  --bind          pin worker i to core base+i
  --core-base N   first core when binding
  --help          show this text";

/// Progress line every this many passes
const REPORT_EVERY: u64 = 10_000_000;

fn parse_args(mut config: PoolConfig) -> Result<PoolConfig, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut it = args.iter();

    fn value<'a, T: std::str::FromStr>(
        flag: &str,
        it: &mut impl Iterator<Item = &'a String>,
    ) -> Result<T, String> {
        it.next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("{} needs a numeric value", flag))
    }

    while let Some(arg) = it.next() {
        config = match arg.as_str() {
            "--workers" => config.num_workers(value("--workers", &mut it)?),
            "--passes" => config.passes(value("--passes", &mut it)?),
            "--time" => {
                let secs: u64 = value("--time", &mut it)?;
                config.deadline((secs > 0).then(|| Duration::from_secs(secs)))
            }
            "--bind" => config.bind(true),
            "--core-base" => config.core_base(value("--core-base", &mut it)?),
            "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => return Err(format!("unknown option: {}", other)),
        };
    }
    Ok(config)
}

/// One pass of the floating point churn
#[inline]
fn churn(base: f32) -> f32 {
    if base > 20_130_605.0 {
        base * std::f32::consts::PI
    } else {
        base / std::f32::consts::PI
    }
}

fn main() -> ExitCode {
    fica::init_logging();

    let config = match parse_args(PoolConfig::from_env()) {
        Ok(c) => c,
        Err(e) => {
            ferror!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    fprintln!("=== fica CPU stress ===");
    fprintln!("online cores: {}", available_core_count());
    config.print();

    let results = run_with(&config, |_desc| {
        let mut base = std::f32::consts::PI;
        move |ctx: &mut WorkerContext| {
            base = black_box(churn(base));
            if (ctx.iteration() + 1) % REPORT_EVERY == 0 {
                finfo!("{} passes", ctx.iteration() + 1);
            }
            Ok(Step::item())
        }
    });

    let results = match results {
        Ok(r) => r,
        Err(e) => {
            ferror!("stress failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for r in &results {
        fprintln!("{}", r);
    }
    let report = PoolReport::from_results(&results);
    fprintln!("{}", report);

    if report.all_succeeded() {
        fprintln!("stress test by {} threads successful", report.workers);
        ExitCode::SUCCESS
    } else {
        ferror!("{} of {} workers failed", report.failed, report.workers);
        ExitCode::FAILURE
    }
}
