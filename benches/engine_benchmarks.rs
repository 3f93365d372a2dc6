//! Criterion benchmarks: perft throughput, move generation, SEE and the
//! evaluation paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use basalt::board::movegen::{perft, GenMode};
use basalt::board::Board;
use basalt::eval;
use basalt::nnue::eval_node::EvalStack;
use basalt::nnue::weights::Weights;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    let startpos = Board::start_pos();
    for depth in 1..=4 {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| perft(black_box(&startpos), depth));
        });
    }

    let kiwipete = Board::parse_fen(KIWIPETE).unwrap();
    for depth in 1..=3 {
        group.bench_with_input(BenchmarkId::new("kiwipete", depth), &depth, |b, &depth| {
            b.iter(|| perft(black_box(&kiwipete), depth));
        });
    }

    group.finish();
}

fn bench_movegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("movegen");

    let startpos = Board::start_pos();
    group.bench_function("startpos_all", |b| {
        b.iter(|| black_box(&startpos).generate_moves(GenMode::ALL));
    });

    let kiwipete = Board::parse_fen(KIWIPETE).unwrap();
    group.bench_function("kiwipete_all", |b| {
        b.iter(|| black_box(&kiwipete).generate_moves(GenMode::ALL));
    });
    group.bench_function("kiwipete_noisy", |b| {
        b.iter(|| black_box(&kiwipete).generate_moves(GenMode::NOISY_AND_CHECK));
    });

    group.finish();
}

fn bench_see(c: &mut Criterion) {
    let kiwipete = Board::parse_fen(KIWIPETE).unwrap();
    let moves = kiwipete.generate_moves(GenMode::ALL);
    c.bench_function("see_all_moves", |b| {
        b.iter(|| {
            let mut count = 0;
            for mv in &moves {
                if kiwipete.see_ge(*mv, 0) {
                    count += 1;
                }
            }
            count
        });
    });
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");

    let kiwipete = Board::parse_fen(KIWIPETE).unwrap();
    group.bench_function("classical", |b| {
        b.iter(|| eval::classical(black_box(&kiwipete)));
    });

    let weights = Arc::new(Weights::pseudo_random(1));
    let mut stack = EvalStack::new(weights);
    stack.reinitialize();
    stack.set_root(&kiwipete);
    group.bench_function("nnue_forward", |b| {
        b.iter(|| stack.evaluate(0, black_box(&kiwipete)));
    });

    let mv = kiwipete.generate_moves(GenMode::ALL).as_slice()[0];
    group.bench_function("nnue_incremental_update", |b| {
        b.iter(|| {
            stack.set_dirty(1, &kiwipete, mv);
            stack.materialize(1);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_perft, bench_movegen, bench_see, bench_eval);
criterion_main!(benches);
