use criterion::{criterion_group, criterion_main};


use codec::register_benchmarks as register_codec_benchmarks;
use journal::register_benchmarks as register_journal_benchmarks;

criterion_group!(benches, register_journal_benchmarks, register_codec_benchmarks);

criterion_main!(benches);
