//! The UCI shell.
//!
//! Translates protocol commands into engine calls and engine callbacks into
//! `info` lines. Castling crosses this boundary in both directions: the
//! engine encodes castles as king-takes-rook, while the wire format uses
//! the king's two-square step; `Move::uci_name` and the move matching in
//! `Board::after_uci_moves` perform the translation.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::board::{Board, BoardHistory};
use crate::nnue::weights::Weights;
use crate::search::orchestrator::WorkerOrchestrator;
use crate::search::worker::{IterationReport, OnIter, OnUpdate};
use crate::search::{is_mate_score, score_to_centipawns, Depth, Score, MATE_SCORE, MAX_DEPTH};

const ENGINE_NAME: &str = "Basalt";
const DEFAULT_HASH_MIB: usize = 16;

#[derive(Clone, Copy)]
enum GoLimit {
    Depth(Depth),
    Movetime(u64),
    Infinite,
}

/// Format a score for `info`: centipawns, or moves-to-mate.
fn format_score(score: Score) -> String {
    if is_mate_score(score) {
        let plies = -MATE_SCORE - score.abs();
        let moves = (plies + 1) / 2;
        if score > 0 {
            format!("mate {moves}")
        } else {
            format!("mate -{moves}")
        }
    } else {
        format!("cp {}", score_to_centipawns(score))
    }
}

struct SharedClock {
    start: Mutex<Instant>,
}

impl SharedClock {
    fn restart(&self) {
        *self.start.lock() = Instant::now();
    }

    fn nps(&self, nodes: u64) -> u64 {
        let elapsed = self.start.lock().elapsed().as_secs_f64().max(1e-6);
        (nodes as f64 / elapsed) as u64
    }
}

pub struct UciEngine {
    orchestrator: Arc<WorkerOrchestrator>,
    clock: Arc<SharedClock>,
    board: Board,
    history: BoardHistory,
    hash_mib: usize,
    threads: usize,
    weights: Arc<Weights>,
}

impl UciEngine {
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(SharedClock {
            start: Mutex::new(Instant::now()),
        });
        let weights = Arc::new(Weights::zeroed());
        let orchestrator = Self::build_orchestrator(
            Arc::clone(&weights),
            DEFAULT_HASH_MIB,
            1,
            Arc::clone(&clock),
        );
        UciEngine {
            orchestrator,
            clock,
            board: Board::start_pos(),
            history: BoardHistory::new(),
            hash_mib: DEFAULT_HASH_MIB,
            threads: 1,
            weights,
        }
    }

    fn build_orchestrator(
        weights: Arc<Weights>,
        hash_mib: usize,
        threads: usize,
        clock: Arc<SharedClock>,
    ) -> Arc<WorkerOrchestrator> {
        let iter_clock = Arc::clone(&clock);
        let on_iter: OnIter = Arc::new(move |report: &IterationReport| {
            println!(
                "info depth {} seldepth {} score {} nodes {} nps {} tbhits {} pv {}",
                report.depth,
                report.selective_depth,
                format_score(report.score),
                report.nodes,
                iter_clock.nps(report.nodes),
                report.tb_hits,
                report.pv,
            );
            let _ = io::stdout().flush();
        });
        // The in-search callback is where a time manager would hook in;
        // the shell's limits are enforced by the watcher thread instead.
        let on_update: OnUpdate = Arc::new(|_nodes| {});
        let mut orchestrator =
            WorkerOrchestrator::new(weights, hash_mib, on_iter, on_update);
        orchestrator.resize(threads);
        Arc::new(orchestrator)
    }

    fn rebuild(&mut self) {
        self.orchestrator.stop();
        self.orchestrator = Self::build_orchestrator(
            Arc::clone(&self.weights),
            self.hash_mib,
            self.threads,
            Arc::clone(&self.clock),
        );
    }

    fn cmd_uci(&self) {
        println!("id name {ENGINE_NAME}");
        println!("id author the {ENGINE_NAME} developers");
        println!("option name Hash type spin default {DEFAULT_HASH_MIB} min 1 max 65536");
        println!("option name Threads type spin default 1 min 1 max 256");
        println!("option name Weights type string default <empty>");
        println!("uciok");
    }

    fn cmd_setoption(&mut self, tokens: &[&str]) {
        // setoption name <id> value <x>
        let name_pos = tokens.iter().position(|&t| t == "name");
        let value_pos = tokens.iter().position(|&t| t == "value");
        let (Some(name_pos), Some(value_pos)) = (name_pos, value_pos) else {
            return;
        };
        let name = tokens[name_pos + 1..value_pos].join(" ").to_lowercase();
        let value = tokens[value_pos + 1..].join(" ");

        match name.as_str() {
            "hash" => {
                if let Ok(mib) = value.parse::<usize>() {
                    self.hash_mib = mib.max(1);
                    self.rebuild();
                }
            }
            "threads" => {
                if let Ok(threads) = value.parse::<usize>() {
                    self.threads = threads.clamp(1, 256);
                    self.rebuild();
                }
            }
            "weights" => match Weights::load_file(&value) {
                Ok(weights) => {
                    println!("info string weights signature {:#010x}", weights.signature());
                    self.weights = Arc::new(weights);
                    self.rebuild();
                }
                Err(err) => {
                    println!("info string failed to load weights: {err}");
                }
            },
            _ => {}
        }
    }

    fn cmd_position(&mut self, tokens: &[&str]) {
        let mut idx = 0;
        let base = match tokens.first() {
            Some(&"startpos") => {
                idx += 1;
                Board::start_pos()
            }
            Some(&"fen") => {
                let end = tokens
                    .iter()
                    .position(|&t| t == "moves")
                    .unwrap_or(tokens.len());
                let fen = tokens[1..end].join(" ");
                idx = end;
                match Board::parse_fen(&fen) {
                    Ok(bd) => bd,
                    Err(err) => {
                        println!("info string {err}");
                        return;
                    }
                }
            }
            _ => return,
        };

        let moves = if tokens.get(idx) == Some(&"moves") {
            tokens[idx + 1..].join(" ")
        } else {
            String::new()
        };
        match base.after_uci_moves(&moves) {
            Ok((history, board)) => {
                self.history = history;
                self.board = board;
            }
            Err(err) => println!("info string {err}"),
        }
    }

    fn cmd_go(&mut self, tokens: &[&str]) {
        let mut limit = GoLimit::Infinite;
        let mut iter = tokens.iter();
        while let Some(&token) = iter.next() {
            match token {
                "depth" => {
                    if let Some(depth) = iter.next().and_then(|t| t.parse::<Depth>().ok()) {
                        limit = GoLimit::Depth(depth.clamp(1, MAX_DEPTH));
                    }
                }
                "movetime" => {
                    if let Some(ms) = iter.next().and_then(|t| t.parse::<u64>().ok()) {
                        limit = GoLimit::Movetime(ms);
                    }
                }
                "infinite" => limit = GoLimit::Infinite,
                _ => {}
            }
        }

        self.clock.restart();
        self.orchestrator.go(&self.history, &self.board);

        let orchestrator = Arc::clone(&self.orchestrator);
        let pov = self.board.turn();
        std::thread::spawn(move || {
            match limit {
                GoLimit::Depth(depth) => orchestrator.block_until_depth(depth),
                GoLimit::Movetime(ms) => {
                    let deadline = Instant::now() + Duration::from_millis(ms);
                    while orchestrator.primary_worker().keep_going() && Instant::now() < deadline {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    orchestrator.stop();
                }
                GoLimit::Infinite => {
                    while orchestrator.primary_worker().keep_going() {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            let best = orchestrator.primary_worker().best_move();
            let ponder = orchestrator.primary_worker().ponder_move();
            if ponder.is_null() {
                println!("bestmove {}", best.uci_name(pov));
            } else {
                println!(
                    "bestmove {} ponder {}",
                    best.uci_name(pov),
                    ponder.uci_name(pov.other())
                );
            }
            let _ = io::stdout().flush();
        });
    }

    /// Run the blocking command loop until `quit` or EOF.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle_command(&line) {
                break;
            }
        }
        self.orchestrator.stop();
    }

    /// Dispatch one command line; returns false on `quit`.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return true;
        };
        match command {
            "uci" => self.cmd_uci(),
            "isready" => println!("readyok"),
            "setoption" => self.cmd_setoption(&tokens[1..]),
            "ucinewgame" => self.orchestrator.reset(),
            "position" => self.cmd_position(&tokens[1..]),
            "go" => self.cmd_go(&tokens[1..]),
            "stop" => self.orchestrator.stop(),
            "perft" => {
                if let Some(depth) = tokens.get(1).and_then(|t| t.parse::<usize>().ok()) {
                    let start = Instant::now();
                    let nodes = crate::board::movegen::perft(&self.board, depth);
                    let elapsed = start.elapsed().as_secs_f64();
                    println!("info string perft {depth} nodes {nodes} time {elapsed:.3}s");
                }
            }
            "quit" => return false,
            _ => {}
        }
        let _ = io::stdout().flush();
        true
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        UciEngine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0), "cp 0");
        assert_eq!(format_score(1024), "cp 288");
        // Mate at height one: mate in one move.
        assert_eq!(format_score(-(MATE_SCORE + 1)), "mate 1");
        assert_eq!(format_score(MATE_SCORE + 2), "mate -1");
        assert_eq!(format_score(-(MATE_SCORE + 5)), "mate 3");
    }

    #[test]
    fn test_position_command_applies_moves() {
        let mut engine = UciEngine::new();
        assert!(engine.handle_command("position startpos moves e2e4 e7e5 g1f3"));
        assert_eq!(
            engine.board.fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
        assert_eq!(engine.history.len(), 3);
    }

    #[test]
    fn test_position_command_castling_translation() {
        let mut engine = UciEngine::new();
        assert!(engine.handle_command(
            "position fen r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1 moves e1g1"
        ));
        assert!(engine
            .board
            .man
            .white
            .king()
            .is_member(crate::board::types::Square::from_name("g1").unwrap()));
    }

    #[test]
    fn test_bad_fen_keeps_prior_position() {
        let mut engine = UciEngine::new();
        engine.handle_command("position startpos moves e2e4");
        let before = engine.board.fen();
        engine.handle_command("position fen not/a/real/fen w - - 0 1");
        assert_eq!(engine.board.fen(), before);
    }

    #[test]
    fn test_quit_returns_false() {
        let mut engine = UciEngine::new();
        assert!(!engine.handle_command("quit"));
    }
}
