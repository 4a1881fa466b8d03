//! Throughput benchmarks for the store, the dispatcher and the decoder.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nimbuskv::commands::CommandHandler;
use nimbuskv::protocol::{RespParser, RespValue};
use nimbuskv::storage::{Expiry, SetOptions, StorageEngine};

fn key(prefix: &str, i: u64) -> Bytes {
    Bytes::from(format!("{}:{}", prefix, i))
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    for (name, size) in [("set_small", 16), ("set_medium", 1024), ("set_large", 64 * 1024)] {
        let mut engine = StorageEngine::new();
        let value = Bytes::from("x".repeat(size));
        group.bench_function(name, |b| {
            let mut i = 0u64;
            b.iter(|| {
                engine.set(key("key", i), value.clone(), SetOptions::default());
                i += 1;
            });
        });
    }

    group.bench_function("set_with_ttl", |b| {
        let mut engine = StorageEngine::new();
        let options = SetOptions {
            expiry: Some(Expiry::Seconds(3600)),
            condition: None,
        };
        let mut i = 0u64;
        b.iter(|| {
            engine.set(key("key", i), Bytes::from("value"), options);
            i += 1;
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut engine = StorageEngine::new();
    for i in 0..100_000 {
        engine.set(key("key", i), key("value", i), SetOptions::default());
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&key("key", i % 100_000)).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&key("missing", i)).ok());
            i += 1;
        });
    });

    group.finish();
}

fn bench_incr(c: &mut Criterion) {
    let mut engine = StorageEngine::new();

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_counter", |b| {
        let counter = Bytes::from("counter");
        b.iter(|| {
            black_box(engine.incr(counter.clone()).ok());
        });
    });

    group.bench_function("many_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.incr(key("counter", i % 1000)).ok());
            i += 1;
        });
    });

    group.finish();
}

fn bench_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("lists");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rpush_lpop", |b| {
        let mut engine = StorageEngine::new();
        let list = Bytes::from("queue");
        b.iter(|| {
            let _ = engine.rpush(list.clone(), vec![Bytes::from("job")]);
            black_box(engine.lpop(&list).ok());
        });
    });

    group.bench_function("lrange_100", |b| {
        let mut engine = StorageEngine::new();
        let list = Bytes::from("list");
        let items: Vec<Bytes> = (0..1000).map(|i| key("item", i)).collect();
        let _ = engine.rpush(list.clone(), items);
        b.iter(|| {
            black_box(engine.lrange(&list, 100, 199).ok());
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut handler = CommandHandler::default();
    let set: Vec<Bytes> = ["SET", "foo", "bar", "EX", "100"]
        .iter()
        .map(|s| Bytes::from(*s))
        .collect();
    let get: Vec<Bytes> = ["GET", "foo"].iter().map(|s| Bytes::from(*s)).collect();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(2));

    group.bench_function("set_get", |b| {
        b.iter(|| {
            black_box(handler.execute(&set));
            black_box(handler.execute(&get));
        });
    });

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut parser = RespParser::new();
    let pipeline = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n".repeat(100);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(100));

    group.bench_function("decode_pipeline", |b| {
        b.iter(|| {
            let mut offset = 0;
            while let Ok(Some((command, used))) = parser.parse(&pipeline[offset..]) {
                black_box(command);
                offset += used;
            }
        });
    });

    let reply = RespValue::bulk_array((0..100).map(|i| key("item", i)));
    group.bench_function("encode_array", |b| {
        let mut out = bytes::BytesMut::with_capacity(4096);
        b.iter(|| {
            out.clear();
            reply.encode(&mut out);
            black_box(out.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_incr,
    bench_lists,
    bench_dispatch,
    bench_codec,
);

criterion_main!(benches);
