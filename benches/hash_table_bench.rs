use bucketed_map::{equal_string, hash_string, HashTable};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn table() -> HashTable<String, u64> {
    HashTable::new(hash_string::<String>, equal_string::<String>)
}

fn filled(seed: u64, n: usize) -> (HashTable<String, u64>, Vec<String>) {
    let mut t = table();
    let keys: Vec<_> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        t.insert(k.clone(), i as u64).unwrap();
    }
    (t, keys)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("hash_table_insert_10k", |b| {
        b.iter_batched(
            table,
            |mut t| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    t.insert(key(x), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("hash_table_get_hit", |b| {
        let (t, keys) = filled(7, 20_000);
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("hash_table_get_miss", |b| {
        let (t, _) = filled(11, 10_000);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(t.get(&k));
        })
    });
}

fn bench_insert_remove_cycle(c: &mut Criterion) {
    c.bench_function("hash_table_insert_remove_cycle", |b| {
        let keys: Vec<_> = lcg(3).take(2_000).map(key).collect();
        b.iter_batched(
            table,
            |mut t| {
                for (i, k) in keys.iter().enumerate() {
                    t.insert(k.clone(), i as u64).unwrap();
                }
                for k in &keys {
                    t.remove(k).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cursor_walk(c: &mut Criterion) {
    c.bench_function("hash_table_cursor_walk_10k", |b| {
        let (mut t, _) = filled(5, 10_000);
        b.iter(|| {
            let cur = t.open_iterator();
            let mut sum = 0u64;
            while let Some((_, v)) = t.advance(&cur) {
                sum = sum.wrapping_add(*v);
            }
            t.close_iterator(cur);
            black_box(sum)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_insert_remove_cycle, bench_cursor_walk
}
criterion_main!(benches);
