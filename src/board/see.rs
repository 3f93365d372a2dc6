//! Static exchange evaluation.
//!
//! Estimates the material outcome of the capture sequence on a move's target
//! square by alternately applying each side's least valuable attacker.
//! Sliders behind the pieces already used are rediscovered by recomputing
//! attacks with the used squares removed from the occupancy, which handles
//! X-rays without an explicit ray walk.

use super::attack_tables;
use super::types::{Color, Move, PieceType, Square, SquareSet};
use super::Board;

pub type SeeValue = i32;

/// Exchange values. The king is effectively infinite: capturing it ends the
/// sequence, and it may never be profitably given up.
#[inline]
#[must_use]
pub const fn material_value(pt: PieceType) -> SeeValue {
    match pt {
        PieceType::Pawn => 100,
        PieceType::Knight | PieceType::Bishop => 300,
        PieceType::Rook => 450,
        PieceType::Queen => 900,
        PieceType::King => 1_000_000,
    }
}

impl Board {
    /// Least valuable piece of `c` attacking `tgt`, ignoring `ignore`
    /// squares. Returns `None` when no attacker remains.
    fn least_valuable_attacker(
        &self,
        c: Color,
        tgt: Square,
        ignore: SquareSet,
    ) -> Option<(PieceType, Square)> {
        let us = self.man.us(c);

        let p_attackers = attack_tables::pawn_attacks(c.other(), tgt) & us.pawn() & !ignore;
        if p_attackers.any() {
            return Some((PieceType::Pawn, p_attackers.item()));
        }

        let n_attackers = attack_tables::knight_attacks(tgt) & us.knight() & !ignore;
        if n_attackers.any() {
            return Some((PieceType::Knight, n_attackers.item()));
        }

        let occ = self.occupancy() & !ignore;

        let b_mask = attack_tables::bishop_attacks(tgt, occ);
        let b_attackers = b_mask & us.bishop() & !ignore;
        if b_attackers.any() {
            return Some((PieceType::Bishop, b_attackers.item()));
        }

        let r_mask = attack_tables::rook_attacks(tgt, occ);
        let r_attackers = r_mask & us.rook() & !ignore;
        if r_attackers.any() {
            return Some((PieceType::Rook, r_attackers.item()));
        }

        let q_attackers = (b_mask | r_mask) & us.queen() & !ignore;
        if q_attackers.any() {
            return Some((PieceType::Queen, q_attackers.item()));
        }

        let k_attackers = attack_tables::king_attacks(tgt) & us.king() & !ignore;
        if k_attackers.any() {
            return Some((PieceType::King, k_attackers.item()));
        }

        None
    }

    /// Base material swing of the move itself, before any recapture.
    fn see_base(&self, c: Color, mv: Move) -> SeeValue {
        let mut value = 0;
        if mv.is_promotion() {
            value += material_value(mv.promoted()) - material_value(mv.piece());
        }
        if mv.is_capture() && !mv.is_castle_oo(c) && !mv.is_castle_ooo(c) {
            value += material_value(mv.captured());
        }
        value
    }

    /// True iff the exchange starting with `mv` nets at least `threshold`.
    ///
    /// Short-circuits as soon as the running balance decides the outcome
    /// regardless of how the rest of the sequence plays out.
    #[must_use]
    pub fn see_ge(&self, mv: Move, threshold: SeeValue) -> bool {
        let c = self.turn();
        let tgt = mv.to();
        let mut used = SquareSet::of(mv.from());
        let mut on_sq = if mv.is_promotion() {
            mv.promoted()
        } else {
            mv.piece()
        };
        let mut value = self.see_base(c, mv) - threshold;

        loop {
            if value < 0 {
                return false;
            }
            if value - material_value(on_sq) >= 0 {
                return true;
            }

            match self.least_valuable_attacker(c.other(), tgt, used) {
                None => break,
                Some((pt, sq)) => {
                    value -= material_value(on_sq);
                    used.insert(sq);
                    on_sq = pt;
                }
            }

            if value >= 0 {
                return true;
            }
            if value + material_value(on_sq) < 0 {
                return false;
            }

            match self.least_valuable_attacker(c, tgt, used) {
                None => break,
                Some((pt, sq)) => {
                    value += material_value(on_sq);
                    used.insert(sq);
                    on_sq = pt;
                }
            }
        }

        value >= 0
    }

    #[inline]
    #[must_use]
    pub fn see_gt(&self, mv: Move, threshold: SeeValue) -> bool {
        self.see_ge(mv, threshold + 1)
    }

    /// Exact exchange value; used by tests to pin down `see_ge`.
    #[must_use]
    pub fn see(&self, mv: Move) -> SeeValue {
        let c = self.turn();
        let tgt = mv.to();
        let mut used = SquareSet::of(mv.from());
        let mut on_sq = if mv.is_promotion() {
            mv.promoted()
        } else {
            mv.piece()
        };
        let mut deltas: Vec<SeeValue> = Vec::new();

        loop {
            match self.least_valuable_attacker(c.other(), tgt, used) {
                None => break,
                Some((pt, sq)) => {
                    deltas.push(material_value(on_sq));
                    used.insert(sq);
                    on_sq = pt;
                }
            }
            match self.least_valuable_attacker(c, tgt, used) {
                None => break,
                Some((pt, sq)) => {
                    deltas.push(material_value(on_sq));
                    used.insert(sq);
                    on_sq = pt;
                }
            }
        }

        // Each side may decline a losing recapture, folded right-to-left.
        let mut delta_sum = 0;
        for &delta in deltas.iter().rev() {
            delta_sum = (delta - delta_sum).max(0);
        }
        self.see_base(c, mv) - delta_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_name(name).unwrap()
    }

    #[test]
    fn test_free_capture() {
        let bd = Board::parse_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::capture(sq("e4"), sq("d5"), PieceType::Pawn, PieceType::Pawn);
        assert_eq!(bd.see(mv), 100);
        assert!(bd.see_ge(mv, 100));
        assert!(!bd.see_ge(mv, 101));
    }

    #[test]
    fn test_defended_pawn() {
        // Queen takes a pawn defended by a pawn: loses queen for pawn.
        let bd = Board::parse_fen("4k3/2p5/3p4/8/3Q4/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::capture(sq("d4"), sq("d6"), PieceType::Queen, PieceType::Pawn);
        assert_eq!(bd.see(mv), 100 - 900);
        assert!(!bd.see_ge(mv, 0));
        assert!(bd.see_ge(mv, -800));
    }

    #[test]
    fn test_xray_recapture() {
        // Rook takes on e5; the rook behind it on e1 backs the exchange up.
        let bd = Board::parse_fen("4k3/8/4q3/4p3/8/8/4R3/4RK2 w - - 0 1").unwrap();
        let mv = Move::capture(sq("e2"), sq("e5"), PieceType::Rook, PieceType::Pawn);
        // The backing rook on e1 makes Qxe5 a losing recapture, so the queen
        // declines and the exchange nets the pawn.
        assert_eq!(bd.see(mv), 100);
        assert!(bd.see_ge(mv, 100));
    }

    #[test]
    fn test_see_ge_matches_see() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            for mv in &bd.generate_moves(crate::board::movegen::GenMode::ALL) {
                let exact = bd.see(*mv);
                for threshold in [-900, -450, -100, -1, 0, 1, 100, 450] {
                    assert_eq!(
                        bd.see_ge(*mv, threshold),
                        exact >= threshold,
                        "fen: {fen} mv: {mv} threshold: {threshold} exact: {exact}"
                    );
                }
                // Monotonicity in the threshold.
                if bd.see_ge(*mv, 1) {
                    assert!(bd.see_ge(*mv, 0), "fen: {fen} mv: {mv}");
                }
            }
        }
    }

    #[test]
    fn test_quiet_move_into_attack() {
        // A quiet rook move to a square attacked by a pawn loses the rook.
        let bd = Board::parse_fen("4k3/8/2p5/8/3R4/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::quiet(sq("d4"), sq("d5"), PieceType::Rook);
        assert_eq!(bd.see(mv), -450);
        assert!(!bd.see_ge(mv, 0));
    }
}
