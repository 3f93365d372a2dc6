//! Legal move generation.
//!
//! Generation is total: pins, checks and en-passant discoveries are excluded
//! before a move is emitted, never filtered afterwards. The generator is
//! parameterized by a category mask selecting which of three disjoint move
//! classes to emit:
//!
//! - `noisy`: captures and queen promotions (castling is encoded as the king
//!   capturing its own rook, so it rides along here),
//! - `check`: quiet responses while in check (blocks and king retreats),
//! - `quiet`: ordinary non-captures when not in check.
//!
//! Under-promotions, including under-promotion captures, are emitted with the
//! quiet class; reordering that would require retuning the search.

use super::attack_tables;
use super::masks::{castle_info, pawn_info};
use super::types::{Color, Move, MoveList, PieceType, Square, SquareSet};
use super::Board;

/// Which move categories to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenMode {
    pub noisy: bool,
    pub check: bool,
    pub quiet: bool,
}

impl GenMode {
    pub const ALL: GenMode = GenMode {
        noisy: true,
        check: true,
        quiet: true,
    };
    pub const NOISY_AND_CHECK: GenMode = GenMode {
        noisy: true,
        check: true,
        quiet: false,
    };
    pub const NOISY: GenMode = GenMode {
        noisy: true,
        check: false,
        quiet: false,
    };
    pub const QUIET: GenMode = GenMode {
        noisy: false,
        check: false,
        quiet: true,
    };
}

/// Per-position context shared by all the emitters.
pub struct MoveGenInfo {
    pub occ: SquareSet,
    pub last_rank: SquareSet,
    pub checkers: SquareSet,
    pub checker_rays: SquareSet,
    pub pinned: SquareSet,
    pub king_danger: SquareSet,
    pub king_diagonal: SquareSet,
    pub king_horizontal: SquareSet,
}

impl Board {
    #[must_use]
    pub fn move_generator_info(&self, c: Color) -> MoveGenInfo {
        let occ = self.occupancy();
        let (checkers, checker_rays) = self.checkers(c, occ);
        let king = self.king_sq(c);
        MoveGenInfo {
            occ,
            last_rank: pawn_info(c).last_rank,
            checkers,
            checker_rays,
            pinned: self.pinned(c),
            king_danger: self.king_danger(c),
            king_diagonal: attack_tables::bishop_attacks(king, SquareSet::EMPTY),
            king_horizontal: attack_tables::rook_attacks(king, SquareSet::EMPTY),
        }
    }

    fn add_normal_pawn(&self, c: Color, mode: GenMode, info: &MoveGenInfo, out: &mut MoveList) {
        let them = self.man.them(c);
        for from in self.man.us(c).pawn() & !info.pinned {
            let to_quiet = attack_tables::pawn_pushes(c, from, info.occ);
            let to_noisy = attack_tables::pawn_attacks(c, from) & them.all();
            if mode.quiet {
                for to in to_quiet & !info.last_rank {
                    out.push(Move::quiet(from, to, PieceType::Pawn));
                }
            }
            if mode.noisy {
                for to in to_noisy & !info.last_rank {
                    out.push(Move::capture(from, to, PieceType::Pawn, them.occ(to)));
                }
            }
            for to in to_quiet & info.last_rank {
                if mode.quiet {
                    out.push_under_promotions(from, to, false, PieceType::Pawn);
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, false, PieceType::Pawn);
                }
            }
            for to in to_noisy & info.last_rank {
                if mode.quiet {
                    out.push_under_promotions(from, to, true, them.occ(to));
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, true, them.occ(to));
                }
            }
        }
    }

    fn add_normal_piece(
        &self,
        c: Color,
        mode: GenMode,
        info: &MoveGenInfo,
        pt: PieceType,
        out: &mut MoveList,
    ) {
        let them = self.man.them(c);
        for from in self.man.us(c).plane(pt) & !info.pinned {
            let to_mask = Board::attacks_of(pt, c, from, info.occ);
            if mode.quiet {
                for to in to_mask & !info.occ {
                    out.push(Move::quiet(from, to, pt));
                }
            }
            if mode.noisy {
                for to in to_mask & them.all() {
                    out.push(Move::capture(from, to, pt, them.occ(to)));
                }
            }
        }
    }

    fn add_castle(&self, c: Color, mode: GenMode, info: &MoveGenInfo, out: &mut MoveList) {
        if !mode.noisy {
            return;
        }
        let castle = castle_info(c);
        let lat = self.lat.us(c);
        if lat.oo() && (castle.oo_mask & (info.king_danger | info.occ)).none() {
            out.push(Move::capture(
                castle.start_king,
                castle.oo_rook,
                PieceType::King,
                PieceType::Rook,
            ));
        }
        if lat.ooo()
            && (castle.ooo_danger_mask & info.king_danger).none()
            && (castle.ooo_occ_mask & info.occ).none()
        {
            out.push(Move::capture(
                castle.start_king,
                castle.ooo_rook,
                PieceType::King,
                PieceType::Rook,
            ));
        }
    }

    fn add_pinned_pawn(&self, c: Color, mode: GenMode, info: &MoveGenInfo, out: &mut MoveList) {
        let them = self.man.them(c);
        // Diagonally pinned pawns may only capture along the pin ray.
        for from in self.man.us(c).pawn() & info.pinned & info.king_diagonal {
            let to_mask = attack_tables::pawn_attacks(c, from) & info.king_diagonal;
            if mode.noisy {
                for to in to_mask & !info.last_rank & them.all() {
                    out.push(Move::capture(from, to, PieceType::Pawn, them.occ(to)));
                }
            }
            for to in to_mask & info.last_rank & them.all() {
                if mode.quiet {
                    out.push_under_promotions(from, to, true, them.occ(to));
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, true, them.occ(to));
                }
            }
        }
        // Vertically pinned pawns may only push along the file.
        for from in self.man.us(c).pawn() & info.pinned & info.king_horizontal {
            let to_mask = attack_tables::pawn_pushes(c, from, info.occ) & info.king_horizontal;
            if mode.quiet {
                for to in to_mask & !info.last_rank {
                    out.push(Move::quiet(from, to, PieceType::Pawn));
                }
            }
            for to in to_mask & info.last_rank {
                if mode.quiet {
                    out.push_under_promotions(from, to, false, PieceType::Pawn);
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, false, PieceType::Pawn);
                }
            }
        }
    }

    fn add_pinned_slider(
        &self,
        c: Color,
        mode: GenMode,
        info: &MoveGenInfo,
        pt: PieceType,
        out: &mut MoveList,
    ) {
        let them = self.man.them(c);
        let rays: &[(SquareSet, bool)] = &[(info.king_diagonal, true), (info.king_horizontal, false)];
        for &(king_ray, diagonal) in rays {
            if (pt == PieceType::Bishop && !diagonal) || (pt == PieceType::Rook && diagonal) {
                continue;
            }
            for from in self.man.us(c).plane(pt) & info.pinned & king_ray {
                let to_mask = if diagonal {
                    attack_tables::bishop_attacks(from, info.occ)
                } else {
                    attack_tables::rook_attacks(from, info.occ)
                } & king_ray;
                if mode.quiet {
                    for to in to_mask & !info.occ {
                        out.push(Move::quiet(from, to, pt));
                    }
                }
                if mode.noisy {
                    for to in to_mask & them.all() {
                        out.push(Move::capture(from, to, pt, them.occ(to)));
                    }
                }
            }
        }
    }

    fn add_checked_pawn(&self, c: Color, mode: GenMode, info: &MoveGenInfo, out: &mut MoveList) {
        let them = self.man.them(c);
        for from in self.man.us(c).pawn() & !info.pinned {
            let to_quiet = info.checker_rays & attack_tables::pawn_pushes(c, from, info.occ);
            let to_noisy = info.checkers & attack_tables::pawn_attacks(c, from);
            if mode.check {
                for to in to_quiet & !info.last_rank {
                    out.push(Move::quiet(from, to, PieceType::Pawn));
                }
            }
            if mode.noisy {
                for to in to_noisy & !info.last_rank {
                    out.push(Move::capture(from, to, PieceType::Pawn, them.occ(to)));
                }
            }
            for to in to_quiet & info.last_rank {
                if mode.check {
                    out.push_under_promotions(from, to, false, PieceType::Pawn);
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, false, PieceType::Pawn);
                }
            }
            for to in to_noisy & info.last_rank {
                if mode.check {
                    out.push_under_promotions(from, to, true, them.occ(to));
                }
                if mode.noisy {
                    out.push_queen_promotion(from, to, true, them.occ(to));
                }
            }
        }
    }

    fn add_checked_piece(
        &self,
        c: Color,
        mode: GenMode,
        info: &MoveGenInfo,
        pt: PieceType,
        out: &mut MoveList,
    ) {
        let them = self.man.them(c);
        for from in self.man.us(c).plane(pt) & !info.pinned {
            let to_mask = Board::attacks_of(pt, c, from, info.occ);
            if mode.check {
                for to in info.checker_rays & to_mask {
                    out.push(Move::quiet(from, to, pt));
                }
            }
            if mode.noisy {
                for to in info.checkers & to_mask {
                    out.push(Move::capture(from, to, pt, them.occ(to)));
                }
            }
        }
    }

    fn add_king(&self, c: Color, mode: GenMode, info: &MoveGenInfo, out: &mut MoveList) {
        let from = self.king_sq(c);
        let them = self.man.them(c);
        let to_mask = !info.king_danger & attack_tables::king_attacks(from);
        let emit_quiet = if info.checkers.any() {
            mode.check
        } else {
            mode.quiet
        };
        if emit_quiet {
            for to in to_mask & !info.occ {
                out.push(Move::quiet(from, to, PieceType::King));
            }
        }
        if mode.noisy {
            for to in to_mask & them.all() {
                out.push(Move::capture(from, to, PieceType::King, them.occ(to)));
            }
        }
    }

    fn add_en_passant(&self, c: Color, mode: GenMode, out: &mut MoveList) {
        if !mode.noisy {
            return;
        }
        let ep_mask = self.lat.them(c).ep_mask();
        if ep_mask.none() {
            return;
        }
        let occ = self.occupancy();
        let ep_square = ep_mask.item();
        let captured_mask = attack_tables::pawn_pushes(c.other(), ep_square, SquareSet::EMPTY);
        let from_mask = attack_tables::pawn_attacks(c.other(), ep_square) & self.man.us(c).pawn();
        for from in from_mask {
            // Remove both pawns and re-scan for checks: this catches the
            // horizontal discovered check no pin test can see.
            let occ_after = (occ & !SquareSet::of(from) & !captured_mask) | ep_mask;
            if self.checkers(c, occ_after).0.none() {
                out.push(Move::en_passant(from, ep_square, captured_mask.item()));
            }
        }
    }

    /// Generate all legal moves of the selected categories.
    #[must_use]
    pub fn generate_moves(&self, mode: GenMode) -> MoveList {
        let c = self.turn();
        let info = self.move_generator_info(c);
        let mut result = MoveList::new();

        match info.checkers.count() {
            0 => {
                self.add_normal_pawn(c, mode, &info, &mut result);
                self.add_normal_piece(c, mode, &info, PieceType::Knight, &mut result);
                self.add_normal_piece(c, mode, &info, PieceType::Rook, &mut result);
                self.add_normal_piece(c, mode, &info, PieceType::Bishop, &mut result);
                self.add_normal_piece(c, mode, &info, PieceType::Queen, &mut result);
                self.add_castle(c, mode, &info, &mut result);
                if info.pinned.any() {
                    self.add_pinned_pawn(c, mode, &info, &mut result);
                    self.add_pinned_slider(c, mode, &info, PieceType::Bishop, &mut result);
                    self.add_pinned_slider(c, mode, &info, PieceType::Rook, &mut result);
                    self.add_pinned_slider(c, mode, &info, PieceType::Queen, &mut result);
                }
            }
            1 => {
                self.add_checked_pawn(c, mode, &info, &mut result);
                self.add_checked_piece(c, mode, &info, PieceType::Knight, &mut result);
                self.add_checked_piece(c, mode, &info, PieceType::Rook, &mut result);
                self.add_checked_piece(c, mode, &info, PieceType::Bishop, &mut result);
                self.add_checked_piece(c, mode, &info, PieceType::Queen, &mut result);
            }
            _ => {}
        }
        self.add_king(c, mode, &info, &mut result);
        self.add_en_passant(c, mode, &mut result);
        result
    }

    /// Validate a move from an untrusted source (e.g. the transposition
    /// table) against the same rules the generator enforces.
    #[must_use]
    pub fn is_legal(&self, mode: GenMode, mv: Move) -> bool {
        let c = self.turn();

        if mv.is_castle_oo(c) || mv.is_castle_ooo(c) || mv.is_enpassant() {
            let info = self.move_generator_info(c);
            let mut list = MoveList::new();
            self.add_castle(c, mode, &info, &mut list);
            self.add_en_passant(c, mode, &mut list);
            return list.has(mv);
        }

        let us = self.man.us(c);
        let them = self.man.them(c);

        if !us.all().is_member(mv.from()) || us.all().is_member(mv.to()) {
            return false;
        }
        if mv.piece() != us.occ(mv.from()) {
            return false;
        }
        if mv.is_capture() != them.all().is_member(mv.to()) {
            return false;
        }
        if mv.is_capture() && mv.captured() != them.occ(mv.to()) {
            return false;
        }
        if !mv.is_capture() && mv.captured() != PieceType::Pawn {
            return false;
        }
        if !mv.is_enpassant() && mv.enpassant_sq() != Square::from_index(0) {
            return false;
        }
        if !mv.is_promotion() && mv.promoted() != PieceType::Pawn {
            return false;
        }

        let info = self.move_generator_info(c);

        let is_noisy = (!mv.is_promotion() || mv.promoted() == PieceType::Queen)
            && (mv.is_capture() || mv.is_promotion());
        if !mode.noisy && is_noisy {
            return false;
        }
        if !mode.check && info.checkers.any() && !is_noisy {
            return false;
        }
        if !mode.quiet && info.checkers.none() && !is_noisy {
            return false;
        }

        let rook_mask = attack_tables::rook_attacks(mv.from(), info.occ);
        let bishop_mask = attack_tables::bishop_attacks(mv.from(), info.occ);

        let legal_from_to = match mv.piece() {
            PieceType::Pawn => {
                let pawn_mask = if mv.is_capture() {
                    attack_tables::pawn_attacks(c, mv.from())
                } else {
                    attack_tables::pawn_pushes(c, mv.from(), info.occ)
                };
                pawn_mask.is_member(mv.to())
            }
            PieceType::Knight => attack_tables::knight_attacks(mv.from()).is_member(mv.to()),
            PieceType::Bishop => bishop_mask.is_member(mv.to()),
            PieceType::Rook => rook_mask.is_member(mv.to()),
            PieceType::Queen => (bishop_mask | rook_mask).is_member(mv.to()),
            PieceType::King => attack_tables::king_attacks(mv.from()).is_member(mv.to()),
        };
        if !legal_from_to {
            return false;
        }

        if mv.piece() == PieceType::King && info.king_danger.is_member(mv.to()) {
            return false;
        }
        if info.checkers.any() && mv.piece() != PieceType::King {
            if info.checkers.count() >= 2 {
                return false;
            }
            if info.pinned.is_member(mv.from()) {
                return false;
            }
            if !(info.checkers | info.checker_rays).is_member(mv.to()) {
                return false;
            }
        }

        if info.pinned.is_member(mv.from()) {
            let same_diagonal = info.king_diagonal.is_member(mv.from())
                && (info.king_diagonal & bishop_mask).is_member(mv.to());
            let same_horizontal = info.king_horizontal.is_member(mv.from())
                && (info.king_horizontal & rook_mask).is_member(mv.to());
            if !same_diagonal && !same_horizontal {
                return false;
            }
        }

        if mv.is_promotion() {
            if mv.piece() != PieceType::Pawn || !info.last_rank.is_member(mv.to()) {
                return false;
            }
            if !matches!(
                mv.promoted(),
                PieceType::Knight | PieceType::Bishop | PieceType::Rook | PieceType::Queen
            ) {
                return false;
            }
        }

        true
    }
}

/// Count leaf nodes of the legal move tree to the given depth.
#[must_use]
pub fn perft(bd: &Board, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = bd.generate_moves(GenMode::ALL);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .iter()
        .map(|&mv| perft(&bd.forward(mv), depth - 1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_move_count() {
        let bd = Board::start_pos();
        assert_eq!(bd.generate_moves(GenMode::ALL).len(), 20);
        assert_eq!(bd.generate_moves(GenMode::NOISY).len(), 0);
        assert_eq!(bd.generate_moves(GenMode::QUIET).len(), 20);
    }

    #[test]
    fn test_modes_partition_all() {
        let fens = [
            super::super::START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            // in check
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            let all = bd.generate_moves(GenMode::ALL);
            let mut split = 0;
            split += bd.generate_moves(GenMode::NOISY).len();
            split += bd
                .generate_moves(GenMode {
                    noisy: false,
                    check: true,
                    quiet: false,
                })
                .len();
            split += bd.generate_moves(GenMode::QUIET).len();
            assert_eq!(split, all.len(), "fen: {fen}");
        }
    }

    #[test]
    fn test_is_legal_matches_generation() {
        let fens = [
            super::super::START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            let legal = bd.generate_moves(GenMode::ALL);
            for mv in &legal {
                assert!(bd.is_legal(GenMode::ALL, *mv), "fen: {fen} mv: {mv}");
            }
            // Moves legal in some *other* position must be rejected here.
            let other =
                Board::parse_fen("rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2")
                    .unwrap();
            for mv in &other.generate_moves(GenMode::ALL) {
                assert_eq!(
                    bd.is_legal(GenMode::ALL, *mv),
                    legal.has(*mv),
                    "fen: {fen} mv: {mv}"
                );
            }
        }
    }

    #[test]
    fn test_pinned_piece_cannot_move_off_ray() {
        // The e-file knight is pinned by the rook and cannot move at all.
        let bd = Board::parse_fen("4r2k/8/8/8/8/4N3/8/4K3 w - - 0 1").unwrap();
        let moves = bd.generate_moves(GenMode::ALL);
        assert!(moves.iter().all(|mv| mv.piece() != PieceType::Knight));
    }

    #[test]
    fn test_en_passant_discovered_check_suppressed() {
        // Capturing en passant would expose the king along the fifth rank.
        let bd = Board::parse_fen("8/8/8/KPp4r/8/8/8/4k3 w - c6 0 2").unwrap();
        let moves = bd.generate_moves(GenMode::ALL);
        assert!(moves.iter().all(|mv| !mv.is_enpassant()));
    }

    #[test]
    fn test_en_passant_allowed() {
        let bd = Board::parse_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let moves = bd.generate_moves(GenMode::ALL);
        assert!(moves.iter().any(|mv| mv.is_enpassant()));
    }

    #[test]
    fn test_double_check_only_king_moves() {
        let bd = Board::parse_fen("4k3/8/8/8/8/4r3/6n1/4K3 w - - 0 1").unwrap();
        assert_eq!(bd.checkers(Color::White, bd.occupancy()).0.count(), 2);
        let moves = bd.generate_moves(GenMode::ALL);
        assert!(moves.iter().all(|mv| mv.piece() == PieceType::King));
    }

    #[test]
    fn test_castle_through_check_rejected() {
        // The black rook on f8 covers f1, so short castling is illegal.
        let bd = Board::parse_fen("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let moves = bd.generate_moves(GenMode::ALL);
        assert!(!moves.iter().any(|mv| mv.is_castle_oo(Color::White)));
        assert!(moves.iter().any(|mv| mv.is_castle_ooo(Color::White)));
    }

    #[test]
    fn test_perft_shallow() {
        let bd = Board::start_pos();
        assert_eq!(perft(&bd, 1), 20);
        assert_eq!(perft(&bd, 2), 400);
        assert_eq!(perft(&bd, 3), 8_902);
        assert_eq!(perft(&bd, 4), 197_281);
    }

    #[test]
    fn test_perft_kiwipete_shallow() {
        let bd = Board::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(perft(&bd, 1), 48);
        assert_eq!(perft(&bd, 2), 2_039);
        assert_eq!(perft(&bd, 3), 97_862);
    }

    #[test]
    fn test_perft_mirror_symmetry() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            for depth in 1..=3 {
                assert_eq!(
                    perft(&bd, depth),
                    perft(&bd.mirrored(), depth),
                    "fen: {fen} depth: {depth}"
                );
            }
        }
    }
}
