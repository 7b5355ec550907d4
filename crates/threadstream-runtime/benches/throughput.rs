//! Channel throughput: sync vs async producers feeding a null destination.
//!
//! Run with: cargo bench -p threadstream-runtime

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io;
use std::time::Duration;

use futures::executor::block_on;
use threadstream_runtime::{
    Destination, DestinationFactory, StreamConfig, ThreadStream, WorkerContext, WriteMode,
};

const LINE_LEN: usize = 1024;
const LINES: usize = 1024;
const CAPACITY: usize = 4 * 1024 * 1024;

struct NullDestination {
    bytes: usize,
}

impl Destination for NullDestination {
    fn write(&mut self, chunk: &str) -> io::Result<bool> {
        self.bytes += black_box(chunk).len();
        Ok(true)
    }

    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn null_destination() -> impl DestinationFactory {
    |_: &WorkerContext| -> io::Result<Box<dyn Destination>> {
        Ok(Box::new(NullDestination { bytes: 0 }))
    }
}

fn config(mode: WriteMode) -> StreamConfig {
    StreamConfig::new()
        .capacity(CAPACITY)
        .mode(mode)
        .poll_interval(Duration::from_millis(50))
}

fn line() -> String {
    let mut line = "x".repeat(LINE_LEN - 1);
    line.push('\n');
    line
}

fn run_sync(line: &str) {
    let mut stream = ThreadStream::new(config(WriteMode::Sync), null_destination())
        .expect("spawn stream");
    for _ in 0..LINES {
        stream.write(line).expect("write");
    }
    stream.end().expect("end");
    stream.wait_closed().expect("close");
}

fn run_async(line: &str) {
    let mut stream = ThreadStream::new(config(WriteMode::Async), null_destination())
        .expect("spawn stream");
    for _ in 0..LINES {
        if !stream.write(line).expect("write") {
            block_on(stream.flush()).expect("flush");
        }
    }
    stream.end().expect("end");
    stream.wait_closed().expect("close");
}

fn bench_throughput(c: &mut Criterion) {
    let line = line();
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Bytes((LINE_LEN * LINES) as u64));
    group.sample_size(20);

    group.bench_function("sync_1k_lines", |b| b.iter(|| run_sync(&line)));
    group.bench_function("async_1k_lines", |b| b.iter(|| run_async(&line)));

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
