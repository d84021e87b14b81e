//! Runs the canonical emit -> pipe -> null pipeline for a fixed number of
//! virtual-time steps, logging each step's delivered values. Exercises
//! the same collect/execute/expose path the library's scheduler tests
//! cover, as a runnable end-to-end sanity check.
//!
//! With `--dispatch`, the `pipe` component runs in a child process
//! reached over the dispatch bridge instead of in-process: this same
//! binary re-execs itself with `--worker-for pipe` to serve that side.

use clap::Parser;
use dflow::bridge::worker::{run_worker_for, WorkerEntry, WorkerRegistry};
use dflow::bridge::{transport::fifo, BincodeCodec, CodecTable};
use dflow::payload::{downcast, Dict, PortValue};
use dflow::{Component, MultiprocessPool, Timing, VirtualTimeScheduler};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "emit -> pipe -> null dataflow demo")]
struct Args {
    /// Number of virtual-time steps to run.
    #[arg(short, long, default_value_t = 6)]
    steps: u64,

    /// Value the emitter produces on every firing.
    #[arg(short, long, default_value_t = 1)]
    value: i64,

    /// Run `pipe` through a worker process over the dispatch bridge.
    #[arg(long, default_value_t = false)]
    dispatch: bool,

    /// Directory the dispatch bridge's FIFO pairs live in.
    #[arg(long, default_value = "./dflow-demo-fifo")]
    base_dir: PathBuf,

    /// Internal: re-exec entry point for the worker side of the bridge.
    #[arg(long, hide = true)]
    worker_for: Option<String>,
}

fn pipe_codecs() -> CodecTable {
    let mut codecs = CodecTable::new();
    codecs.insert("in".to_string(), Box::new(BincodeCodec::<i64>::new()));
    codecs.insert("out".to_string(), Box::new(BincodeCodec::<i64>::new()));
    codecs
}

fn pipe_transfer(inputs: &Dict) -> Dict {
    let mut out = Dict::new();
    if let Some(v) = inputs.get("in") {
        out.insert("out".to_string(), v.clone());
    }
    out
}

fn run_worker(base_dir: &PathBuf, id: &str) {
    let mut registry = WorkerRegistry::new();
    registry.register(
        id,
        WorkerEntry {
            transfer: Box::new(pipe_transfer),
            codecs: pipe_codecs(),
        },
    );
    let mut transport = fifo::open_as_worker(base_dir, id).expect("fifo pair already created by parent");
    run_worker_for(id, &mut transport, &registry).expect("worker loop failed");
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Some(id) = &args.worker_for {
        run_worker(&args.base_dir, id);
        return;
    }

    let mut scheduler = VirtualTimeScheduler::new();
    let mut pool = args.dispatch.then(|| MultiprocessPool::new(args.base_dir.clone()));

    let emitted = args.value;
    let mut emit = Component::new("emit", move |_: &Dict| {
        let mut out = Dict::new();
        out.insert("out".to_string(), PortValue::Value(Box::new(emitted)));
        out
    });
    emit.make_out_port("out").expect("fresh component");

    let mut pipe = if let Some(pool) = pool.as_mut() {
        let mut worker_command = std::process::Command::new(std::env::current_exe().unwrap());
        worker_command
            .arg("--base-dir")
            .arg(&args.base_dir)
            .arg("--worker-for")
            .arg("pipe");
        let bridge = pool
            .spawn("pipe", &mut worker_command, pipe_codecs())
            .expect("failed to spawn pipe worker");
        Component::new("pipe", bridge)
    } else {
        Component::new("pipe", pipe_transfer)
    };
    pipe.make_in_port("in").expect("fresh component");
    pipe.make_out_port("out").expect("fresh component");

    let mut null = Component::new("null", |inputs: &Dict| {
        if let Some(v) = inputs.get("in").and_then(PortValue::as_payload) {
            if let Some(n) = downcast::<i64>(v) {
                log::info!("null received {n}");
            }
        }
        Dict::new()
    });
    null.make_in_port("in").expect("fresh component");

    scheduler
        .add_component(emit, Timing::new(0, 1, 0))
        .expect("fresh schedule");
    scheduler
        .add_component(pipe, Timing::new(0, 1, 0))
        .expect("fresh schedule");
    scheduler
        .add_component(null, Timing::new(0, 1, 0))
        .expect("fresh schedule");
    scheduler
        .connect("emit", "out", "pipe", "in")
        .expect("ports exist");
    scheduler
        .connect("pipe", "out", "null", "in")
        .expect("ports exist");

    for _ in 0..args.steps {
        scheduler.step().expect("transfer functions never fail here");
        log::info!("t = {}", scheduler.now());
    }
}
