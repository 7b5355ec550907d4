//! Stream example
//!
//! Writes numbered lines to a file through a worker thread.
//!
//! Usage: to-file [PATH] [LINES]
//!
//! Channel settings come from the TS_* environment variables, e.g.
//! `TS_SYNC=0 TS_BUFFER_SIZE=4K to-file /tmp/out.log 10000`.

use std::env;
use std::process;
use std::time::Instant;

use futures::executor::block_on;
use threadstream::{to_file, EventKind, StreamConfig, StreamEvent, ThreadStream, WriteMode};

const DEFAULT_PATH: &str = "/tmp/threadstream-demo.log";
const DEFAULT_LINES: usize = 10_000;

fn main() {
    println!("=== threadstream to-file Example ===\n");

    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_PATH.to_string());
    let lines = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LINES);

    let config = StreamConfig::from_env();
    println!(
        "Writing {} lines to {} (capacity {} bytes, {:?})\n",
        lines, path, config.capacity, config.mode
    );

    let mut stream = match to_file(&path, config) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to start stream: {}", e);
            process::exit(1);
        }
    };

    stream.on(EventKind::Ready, |_| println!("[Stream] Worker ready"));
    stream.on(EventKind::Finish, |_| println!("[Stream] End acknowledged"));
    stream.on(EventKind::Close, |_| println!("[Stream] Worker exited"));
    stream.on(EventKind::Error, |event| {
        if let StreamEvent::Error(cause) = event {
            println!("[Stream] Error: {}", cause);
        }
    });

    let start = Instant::now();
    let result = produce(&mut stream, lines);
    let elapsed = start.elapsed();

    if let Err(e) = result {
        eprintln!("Stream failed: {}", e);
        process::exit(1);
    }

    println!("\nWrote {} lines in {:?}", lines, elapsed);
    println!("\n=== Example Complete ===");
}

fn produce(stream: &mut ThreadStream, lines: usize) -> threadstream::StreamResult<()> {
    let mut backpressure = 0usize;

    for i in 0..lines {
        let line = format!("line {:>8}: the quick brown fox jumps over the lazy dog\n", i);
        if !stream.write(&line)? {
            backpressure += 1;
            if stream.config().mode == WriteMode::Async {
                block_on(stream.flush())?;
            }
        }
    }

    println!("[Producer] Done, backpressure signalled {} times", backpressure);
    stream.end()?;
    stream.wait_closed()
}
