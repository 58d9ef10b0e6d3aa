//! Pipeline - producer, writer, reader and checker over a loopback ring
//!
//! ```text
//!   producer --tx.work--> writer --ring "port0"--> reader --rx.work--> checker
//!      ^                    |                         ^                   |
//!      +------tx.free-------+                         +-----rx.free-------+
//! ```
//!
//! The producer stamps each buffer with the incrementing pattern, the
//! checker verifies it on the far side. Four workers, one per stage.
//!
//! Usage:
//!
//!     pipeline [BUFFERS] [BUF_SIZE]
//!
//! Needs at least 4 online cores, one per stage.
//! Binding, deadline and idle backoff come from `FICA_*` environment variables.

use fica::{
    available_core_count, ferror, fprintln, pattern, run_with, BufferQueues, ChannelProvider,
    Direction, LoopbackDevice, PoolConfig, PoolReport, Step, StepResult, Transfer,
    WorkerContext, WorkerDescriptor,
};
use std::process::ExitCode;
use std::sync::Arc;

type StageFn = Box<dyn FnMut(&mut WorkerContext) -> StepResult + Send>;

const STAGES: usize = 4;
const RING: &str = "port0";
/// Nodes per side
const POOL_NODES: usize = 16;

fn producer(queues: Arc<BufferQueues>, buffers: u64) -> StageFn {
    let mut seq = 0u64;
    Box::new(move |_ctx: &mut WorkerContext| {
        if seq == buffers {
            return Ok(Step::Done);
        }
        let mut node = match queues.free().dequeue() {
            Some(node) => node,
            None => return Ok(Step::Idle),
        };
        let len = node.capacity();
        pattern::fill(node.buf_mut(), seq);
        node.set_valid(len);
        queues.submit(node);
        seq += 1;
        Ok(Step::bytes(len as u64))
    })
}

fn checker(queues: Arc<BufferQueues>, buffers: u64) -> StageFn {
    let mut seq = 0u64;
    Box::new(move |_ctx: &mut WorkerContext| {
        if seq == buffers {
            return Ok(Step::Done);
        }
        let node = match queues.work().dequeue() {
            Some(node) => node,
            None => return Ok(Step::Idle),
        };
        let len = node.valid();
        let checked = pattern::verify(node.data(), seq);
        queues.recycle(node);
        checked?;
        seq += 1;
        Ok(Step::bytes(len as u64))
    })
}

/// One worker per stage, so the machine needs a core per stage
fn check_cores(available: usize) -> Result<(), String> {
    if available < STAGES {
        return Err(format!(
            "pipeline needs {} online cores (one per stage), found {}",
            STAGES, available
        ));
    }
    Ok(())
}

/// Filler for a slot already handed out
fn finished() -> StageFn {
    Box::new(|_ctx: &mut WorkerContext| Ok(Step::Done))
}

fn main() -> ExitCode {
    fica::init_logging();

    let args: Vec<String> = std::env::args().collect();
    let buffers: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let buf_size: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(4096);

    fprintln!("=== fica pipeline ===");
    fprintln!("buffers: {}  buf_size: {}  cores: {}", buffers, buf_size, available_core_count());

    if let Err(e) = check_cores(available_core_count()) {
        ferror!("{}", e);
        return ExitCode::FAILURE;
    }

    let config = PoolConfig::from_env().num_workers(STAGES);
    let device = LoopbackDevice::with_rings(POOL_NODES, &[RING]);
    let tx = Arc::new(BufferQueues::new(POOL_NODES, buf_size));
    let rx = Arc::new(BufferQueues::new(POOL_NODES, buf_size));
    let total_bytes = buffers * buf_size as u64;

    let (tx_chan, rx_chan) = match (device.open(RING), device.open(RING)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            ferror!("open {}: {}", RING, e);
            return ExitCode::FAILURE;
        }
    };

    let mut writer = Transfer::new(tx_chan, Arc::clone(&tx), Direction::Write).limit(total_bytes);
    let mut reader = Transfer::new(rx_chan, Arc::clone(&rx), Direction::Read).limit(total_bytes);

    let write_stage: StageFn = Box::new(move |_ctx: &mut WorkerContext| writer.step());
    let read_stage: StageFn = Box::new(move |_ctx: &mut WorkerContext| reader.step());
    let mut stages: Vec<Option<StageFn>> = vec![
        Some(producer(Arc::clone(&tx), buffers)),
        Some(write_stage),
        Some(read_stage),
        Some(checker(Arc::clone(&rx), buffers)),
    ];

    let results = run_with(&config, |desc: &WorkerDescriptor| {
        stages
            .get_mut(desc.index)
            .and_then(Option::take)
            .unwrap_or_else(finished)
    });

    let results = match results {
        Ok(r) => r,
        Err(e) => {
            ferror!("pipeline failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for r in &results {
        fprintln!("{}", r);
    }
    let report = PoolReport::from_results(&results);
    fprintln!("{}", report);

    if report.all_succeeded() && results[STAGES - 1].items == buffers {
        fprintln!("pipeline moved {} buffers intact", buffers);
        ExitCode::SUCCESS
    } else {
        ferror!("pipeline incomplete");
        ExitCode::FAILURE
    }
}
