use basalt::{bench, uci};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("bench") {
        let depth = args
            .get(2)
            .and_then(|d| d.parse().ok())
            .unwrap_or(bench::BENCH_DEPTH);
        bench::run(depth);
        return;
    }
    uci::UciEngine::new().run();
}
