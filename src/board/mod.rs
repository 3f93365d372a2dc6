//! Board representation: piece placement, castling and en-passant state,
//! incremental Zobrist hashing, and the immutable `forward` transition.
//!
//! Squares follow the rotated FEN convention (bit 0 = h1). The board is a
//! value type: `forward(mv)` returns a new board and never mutates in place.

pub mod attack_tables;
pub mod cuckoo;
pub mod history;
pub mod masks;
pub mod movegen;
pub mod see;
pub mod types;
pub mod zobrist;

use std::error::Error;
use std::fmt;

use self::masks::{castle_info, pawn_info};
use self::types::piece::ALL_PIECE_TYPES;
use self::types::{Color, Move, MoveList, PieceType, Square, SquareSet};
use self::zobrist::{
    latent_src, manifest_src, turn_src, Hash, LatentZobristSrc, ManifestZobristSrc,
};

pub use self::history::BoardHistory;

/// Errors from FEN or move-string parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    InvalidFen(&'static str),
    UnknownMove(String),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::InvalidFen(reason) => write!(f, "invalid FEN: {reason}"),
            BoardError::UnknownMove(name) => write!(f, "unknown move: {name}"),
        }
    }
}

impl Error for BoardError {}

/// One side's piece placement with incremental full and pawn-only hashes.
#[derive(Clone)]
pub struct Manifest {
    hash: Hash,
    pawn_hash: Hash,
    planes: [SquareSet; 6],
    all: SquareSet,
}

impl Manifest {
    fn new() -> Self {
        Manifest {
            hash: 0,
            pawn_hash: 0,
            planes: [SquareSet::EMPTY; 6],
            all: SquareSet::EMPTY,
        }
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> Hash {
        self.pawn_hash
    }

    #[inline]
    #[must_use]
    pub fn all(&self) -> SquareSet {
        self.all
    }

    #[inline]
    #[must_use]
    pub fn plane(&self, pt: PieceType) -> SquareSet {
        self.planes[pt.index()]
    }

    #[inline]
    #[must_use]
    pub fn pawn(&self) -> SquareSet {
        self.plane(PieceType::Pawn)
    }

    #[inline]
    #[must_use]
    pub fn knight(&self) -> SquareSet {
        self.plane(PieceType::Knight)
    }

    #[inline]
    #[must_use]
    pub fn bishop(&self) -> SquareSet {
        self.plane(PieceType::Bishop)
    }

    #[inline]
    #[must_use]
    pub fn rook(&self) -> SquareSet {
        self.plane(PieceType::Rook)
    }

    #[inline]
    #[must_use]
    pub fn queen(&self) -> SquareSet {
        self.plane(PieceType::Queen)
    }

    #[inline]
    #[must_use]
    pub fn king(&self) -> SquareSet {
        self.plane(PieceType::King)
    }

    /// Piece type occupying `sq`; defaults to pawn for empty squares, so
    /// callers must check membership in `all()` first.
    #[must_use]
    pub fn occ(&self, sq: Square) -> PieceType {
        if self.planes[PieceType::Knight.index()].is_member(sq) {
            return PieceType::Knight;
        }
        if self.planes[PieceType::Bishop.index()].is_member(sq) {
            return PieceType::Bishop;
        }
        if self.planes[PieceType::Rook.index()].is_member(sq) {
            return PieceType::Rook;
        }
        if self.planes[PieceType::Queen.index()].is_member(sq) {
            return PieceType::Queen;
        }
        if self.planes[PieceType::King.index()].is_member(sq) {
            return PieceType::King;
        }
        PieceType::Pawn
    }

    fn add_piece(&mut self, src: &ManifestZobristSrc, pt: PieceType, sq: Square) {
        let key = src.get(pt, sq);
        self.hash ^= key;
        if pt == PieceType::Pawn {
            self.pawn_hash ^= key;
        }
        self.planes[pt.index()].insert(sq);
        self.all.insert(sq);
    }

    fn remove_piece(&mut self, src: &ManifestZobristSrc, pt: PieceType, sq: Square) {
        let key = src.get(pt, sq);
        self.hash ^= key;
        if pt == PieceType::Pawn {
            self.pawn_hash ^= key;
        }
        self.planes[pt.index()].remove(sq);
        self.all.remove(sq);
    }
}

/// Both sides' manifests.
#[derive(Clone)]
pub struct SidedManifest {
    pub white: Manifest,
    pub black: Manifest,
}

impl SidedManifest {
    fn new() -> Self {
        SidedManifest {
            white: Manifest::new(),
            black: Manifest::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn us(&self, c: Color) -> &Manifest {
        match c {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    #[inline]
    #[must_use]
    pub fn them(&self, c: Color) -> &Manifest {
        self.us(c.other())
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.white.hash() ^ self.black.hash()
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> Hash {
        self.white.pawn_hash() ^ self.black.pawn_hash()
    }

    #[inline]
    #[must_use]
    pub fn occupancy(&self) -> SquareSet {
        self.white.all() | self.black.all()
    }

    fn add_piece(&mut self, c: Color, pt: PieceType, sq: Square) {
        let src = manifest_src(c);
        match c {
            Color::White => self.white.add_piece(src, pt, sq),
            Color::Black => self.black.add_piece(src, pt, sq),
        }
    }

    fn remove_piece(&mut self, c: Color, pt: PieceType, sq: Square) {
        let src = manifest_src(c);
        match c {
            Color::White => self.white.remove_piece(src, pt, sq),
            Color::Black => self.black.remove_piece(src, pt, sq),
        }
    }
}

/// One side's castling rights and en-passant target, hashed incrementally.
#[derive(Clone)]
pub struct Latent {
    hash: Hash,
    oo: bool,
    ooo: bool,
    ep_mask: SquareSet,
}

impl Latent {
    fn new(src: &LatentZobristSrc) -> Self {
        // Rights start set, matching the hash contributions below.
        Latent {
            hash: src.oo() ^ src.ooo(),
            oo: true,
            ooo: true,
            ep_mask: SquareSet::EMPTY,
        }
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn oo(&self) -> bool {
        self.oo
    }

    #[inline]
    #[must_use]
    pub fn ooo(&self) -> bool {
        self.ooo
    }

    #[inline]
    #[must_use]
    pub fn ep_mask(&self) -> SquareSet {
        self.ep_mask
    }

    fn set_oo(&mut self, src: &LatentZobristSrc, value: bool) {
        if self.oo != value {
            self.hash ^= src.oo();
            self.oo = value;
        }
    }

    fn set_ooo(&mut self, src: &LatentZobristSrc, value: bool) {
        if self.ooo != value {
            self.hash ^= src.ooo();
            self.ooo = value;
        }
    }

    fn set_ep_mask(&mut self, src: &LatentZobristSrc, sq: Square) {
        self.clear_ep_mask(src);
        self.hash ^= src.ep(sq);
        self.ep_mask = SquareSet::of(sq);
    }

    fn clear_ep_mask(&mut self, src: &LatentZobristSrc) {
        if self.ep_mask.any() {
            self.hash ^= src.ep(self.ep_mask.item());
            self.ep_mask = SquareSet::EMPTY;
        }
    }
}

/// Both sides' latent state plus the move counters.
#[derive(Clone)]
pub struct SidedLatent {
    pub white: Latent,
    pub black: Latent,
    pub ply_count: usize,
    pub half_clock: usize,
}

impl SidedLatent {
    fn new() -> Self {
        SidedLatent {
            white: Latent::new(latent_src(Color::White)),
            black: Latent::new(latent_src(Color::Black)),
            ply_count: 0,
            half_clock: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn us(&self, c: Color) -> &Latent {
        match c {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn us_mut(&mut self, c: Color) -> &mut Latent {
        match c {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    #[inline]
    #[must_use]
    pub fn them(&self, c: Color) -> &Latent {
        self.us(c.other())
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Hash {
        let turn = if self.ply_count % 2 == 0 {
            turn_src(Color::White)
        } else {
            turn_src(Color::Black)
        };
        self.white.hash() ^ self.black.hash() ^ turn
    }
}

/// A chess position.
#[derive(Clone)]
pub struct Board {
    pub man: SidedManifest,
    pub lat: SidedLatent,
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Board {
    #[must_use]
    pub fn empty() -> Self {
        Board {
            man: SidedManifest::new(),
            lat: SidedLatent::new(),
        }
    }

    #[must_use]
    pub fn start_pos() -> Self {
        Board::parse_fen(START_FEN).expect("start position FEN is valid")
    }

    #[inline]
    #[must_use]
    pub fn turn(&self) -> Color {
        if self.lat.ply_count % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.man.hash() ^ self.lat.hash()
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> Hash {
        self.man.pawn_hash()
    }

    #[inline]
    #[must_use]
    pub fn occupancy(&self) -> SquareSet {
        self.man.occupancy()
    }

    #[inline]
    #[must_use]
    pub fn king_sq(&self, c: Color) -> Square {
        self.man.us(c).king().item()
    }

    #[inline]
    #[must_use]
    pub fn is_rule50_draw(&self) -> bool {
        self.lat.half_clock >= 100
    }

    /// Attack set of the given piece from `sq` under `occ`.
    #[must_use]
    pub fn attacks_of(pt: PieceType, c: Color, sq: Square, occ: SquareSet) -> SquareSet {
        match pt {
            PieceType::Pawn => attack_tables::pawn_attacks(c, sq),
            PieceType::Knight => attack_tables::knight_attacks(sq),
            PieceType::Bishop => attack_tables::bishop_attacks(sq, occ),
            PieceType::Rook => attack_tables::rook_attacks(sq, occ),
            PieceType::Queen => attack_tables::queen_attacks(sq, occ),
            PieceType::King => attack_tables::king_attacks(sq),
        }
    }

    /// Checkers of `c`'s king under the given occupancy, plus the slider rays
    /// between the checkers and the king.
    #[must_use]
    pub fn checkers(&self, c: Color, occ: SquareSet) -> (SquareSet, SquareSet) {
        let king = self.king_sq(c);
        let them = self.man.them(c);

        let b_check_mask = attack_tables::bishop_attacks(king, occ);
        let r_check_mask = attack_tables::rook_attacks(king, occ);
        let n_check_mask = attack_tables::knight_attacks(king);
        let p_check_mask = attack_tables::pawn_attacks(c, king);
        let q_check_mask = b_check_mask | r_check_mask;

        let b_checkers = b_check_mask & (them.bishop() | them.queen());
        let r_checkers = r_check_mask & (them.rook() | them.queen());

        let mut checker_rays = SquareSet::EMPTY;
        for sq in b_checkers {
            checker_rays |= attack_tables::bishop_attacks(sq, occ) & b_check_mask;
        }
        for sq in r_checkers {
            checker_rays |= attack_tables::rook_attacks(sq, occ) & r_check_mask;
        }

        let checkers = (b_check_mask & them.bishop() & occ)
            | (r_check_mask & them.rook() & occ)
            | (n_check_mask & them.knight() & occ)
            | (p_check_mask & them.pawn() & occ)
            | (q_check_mask & them.queen() & occ);
        (checkers, checker_rays)
    }

    #[must_use]
    pub fn is_check_for(&self, c: Color) -> bool {
        self.checkers(c, self.occupancy()).0.any()
    }

    #[must_use]
    pub fn is_check(&self) -> bool {
        self.is_check_for(self.turn())
    }

    /// Squares `c`'s king may not step onto: opponent attacks computed with
    /// our king removed from the occupancy, so the king cannot hide behind
    /// itself along a slider ray.
    #[must_use]
    pub fn king_danger(&self, c: Color) -> SquareSet {
        let occ = self.occupancy() & !self.man.us(c).king();
        let them = self.man.them(c);
        let mut danger = SquareSet::EMPTY;
        for sq in them.pawn() {
            danger |= attack_tables::pawn_attacks(c.other(), sq);
        }
        for sq in them.knight() {
            danger |= attack_tables::knight_attacks(sq);
        }
        for sq in them.king() {
            danger |= attack_tables::king_attacks(sq);
        }
        for sq in them.rook() {
            danger |= attack_tables::rook_attacks(sq, occ);
        }
        for sq in them.bishop() {
            danger |= attack_tables::bishop_attacks(sq, occ);
        }
        for sq in them.queen() {
            danger |= attack_tables::queen_attacks(sq, occ);
        }
        danger
    }

    /// Our pieces pinned to our king by an enemy slider.
    #[must_use]
    pub fn pinned(&self, c: Color) -> SquareSet {
        let occ = self.occupancy();
        let king = self.king_sq(c);
        let them = self.man.them(c);

        let k_x_diag = attack_tables::bishop_attacks(king, SquareSet::EMPTY);
        let k_x_hori = attack_tables::rook_attacks(king, SquareSet::EMPTY);
        let b_check_mask = attack_tables::bishop_attacks(king, occ);
        let r_check_mask = attack_tables::rook_attacks(king, occ);

        let mut pinned = SquareSet::EMPTY;
        for sq in k_x_hori & (them.queen() | them.rook()) {
            pinned |= r_check_mask & attack_tables::rook_attacks(sq, occ) & self.man.us(c).all();
        }
        for sq in k_x_diag & (them.queen() | them.bishop()) {
            pinned |= b_check_mask & attack_tables::bishop_attacks(sq, occ) & self.man.us(c).all();
        }
        pinned
    }

    /// Enemy pieces attacked by a cheaper piece of `c` (pawns hit any
    /// non-pawn, minors hit rooks and queens, rooks hit queens).
    #[must_use]
    pub fn threat_mask(&self, c: Color) -> SquareSet {
        let occ = self.occupancy();
        let us = self.man.us(c);
        let them = self.man.them(c);

        let mut threats = SquareSet::EMPTY;
        let mut vulnerable = them.all();

        vulnerable &= !them.pawn();
        let mut pawn_attacks = SquareSet::EMPTY;
        for sq in us.pawn() {
            pawn_attacks |= attack_tables::pawn_attacks(c, sq);
        }
        threats |= pawn_attacks & vulnerable;

        vulnerable &= !(them.knight() | them.bishop());
        let mut minor_attacks = SquareSet::EMPTY;
        for sq in us.knight() {
            minor_attacks |= attack_tables::knight_attacks(sq);
        }
        for sq in us.bishop() {
            minor_attacks |= attack_tables::bishop_attacks(sq, occ);
        }
        threats |= minor_attacks & vulnerable;

        vulnerable &= !them.rook();
        let mut rook_attacks = SquareSet::EMPTY;
        for sq in us.rook() {
            rook_attacks |= attack_tables::rook_attacks(sq, occ);
        }
        threats |= rook_attacks & vulnerable;

        threats
    }

    #[must_use]
    pub fn us_threat_mask(&self) -> SquareSet {
        self.threat_mask(self.turn())
    }

    #[must_use]
    pub fn them_threat_mask(&self) -> SquareSet {
        self.threat_mask(self.turn().other())
    }

    /// Whether the move lands the piece where it attacks a more valuable
    /// enemy piece (same hierarchy as `threat_mask`).
    #[must_use]
    pub fn creates_threat(&self, mv: Move) -> bool {
        let c = self.turn();
        let them = self.man.them(c);
        let vulnerable = match mv.piece() {
            PieceType::Pawn => them.all() & !them.pawn(),
            PieceType::Knight | PieceType::Bishop => them.rook() | them.queen(),
            PieceType::Rook => them.queen(),
            _ => return false,
        };
        if vulnerable.none() {
            return false;
        }
        let occ = self.occupancy().excluding(mv.from()).with(mv.to());
        (Board::attacks_of(mv.piece(), c, mv.to(), occ) & vulnerable).any()
    }

    #[must_use]
    pub fn has_non_pawn_material(&self) -> bool {
        let us = self.man.us(self.turn());
        (us.knight() | us.bishop() | us.rook() | us.queen()).any()
    }

    /// A quiet pawn push with no enemy pawn in its passer fan.
    #[must_use]
    pub fn is_passed_push(&self, mv: Move) -> bool {
        let c = self.turn();
        mv.piece() == PieceType::Pawn
            && !mv.is_capture()
            && (self.man.them(c).pawn() & attack_tables::passer_mask(c, mv.to())).none()
    }

    #[must_use]
    pub fn num_pieces(&self) -> usize {
        self.occupancy().count()
    }

    /// Bare kings, or king versus king and a single minor.
    #[must_use]
    pub fn is_trivially_drawn(&self) -> bool {
        let n = self.num_pieces();
        n == 2
            || (n == 3
                && (self.man.white.knight()
                    | self.man.white.bishop()
                    | self.man.black.knight()
                    | self.man.black.bishop())
                .any())
    }

    /// Game phase in [0, 1]: 1 at full material, 0 in pawn endings.
    #[must_use]
    pub fn phase(&self) -> f32 {
        const START_POS_VALUE: i32 = 24;
        let mut value = 0;
        for pt in ALL_PIECE_TYPES {
            let count = (self.man.white.plane(pt) | self.man.black.plane(pt)).count() as i32;
            value += pt.phase_value() * count;
        }
        value.min(START_POS_VALUE) as f32 / START_POS_VALUE as f32
    }

    /// Play a move (or the null move), returning the successor position.
    #[must_use]
    pub fn forward(&self, mv: Move) -> Board {
        let c = self.turn();
        let us_castle = castle_info(c);
        let them_castle = castle_info(c.other());
        let us_latent_src = latent_src(c);
        let them_latent_src = latent_src(c.other());

        let mut next = self.clone();
        if mv.is_null() {
            debug_assert!(!self.is_check());
        } else if mv.is_castle_ooo(c) {
            let lat = next.lat.us_mut(c);
            lat.set_oo(us_latent_src, false);
            lat.set_ooo(us_latent_src, false);
            next.man.remove_piece(c, PieceType::King, us_castle.start_king);
            next.man.remove_piece(c, PieceType::Rook, us_castle.ooo_rook);
            next.man.add_piece(c, PieceType::King, us_castle.after_ooo_king);
            next.man.add_piece(c, PieceType::Rook, us_castle.after_ooo_rook);
        } else if mv.is_castle_oo(c) {
            let lat = next.lat.us_mut(c);
            lat.set_oo(us_latent_src, false);
            lat.set_ooo(us_latent_src, false);
            next.man.remove_piece(c, PieceType::King, us_castle.start_king);
            next.man.remove_piece(c, PieceType::Rook, us_castle.oo_rook);
            next.man.add_piece(c, PieceType::King, us_castle.after_oo_king);
            next.man.add_piece(c, PieceType::Rook, us_castle.after_oo_rook);
        } else {
            next.man.remove_piece(c, mv.piece(), mv.from());
            if mv.is_promotion_for(c) {
                next.man.add_piece(c, mv.promoted(), mv.to());
            } else {
                next.man.add_piece(c, mv.piece(), mv.to());
            }
            if mv.is_capture() {
                next.man.remove_piece(c.other(), mv.captured(), mv.to());
            } else if mv.is_enpassant() {
                next.man.remove_piece(c.other(), PieceType::Pawn, mv.enpassant_sq());
            } else if mv.is_pawn_double(c) {
                let ep = attack_tables::pawn_pushes(c.other(), mv.to(), SquareSet::EMPTY).item();
                if (self.man.them(c).pawn() & attack_tables::pawn_attacks(c, ep)).any() {
                    next.lat.us_mut(c).set_ep_mask(us_latent_src, ep);
                }
            }
            if mv.from() == us_castle.start_king {
                let lat = next.lat.us_mut(c);
                lat.set_oo(us_latent_src, false);
                lat.set_ooo(us_latent_src, false);
            } else if mv.from() == us_castle.oo_rook {
                next.lat.us_mut(c).set_oo(us_latent_src, false);
            } else if mv.from() == us_castle.ooo_rook {
                next.lat.us_mut(c).set_ooo(us_latent_src, false);
            }
            if mv.to() == them_castle.oo_rook {
                next.lat.us_mut(c.other()).set_oo(them_latent_src, false);
            } else if mv.to() == them_castle.ooo_rook {
                next.lat.us_mut(c.other()).set_ooo(them_latent_src, false);
            }
        }
        next.lat.us_mut(c.other()).clear_ep_mask(them_latent_src);
        next.lat.ply_count += 1;
        next.lat.half_clock += 1;
        if mv.is_capture() || mv.piece() == PieceType::Pawn {
            next.lat.half_clock = 0;
        }
        next
    }

    /// The color-swapped, rank-flipped position.
    #[must_use]
    pub fn mirrored(&self) -> Board {
        let mut mirror = Board::empty();
        for pt in ALL_PIECE_TYPES {
            for sq in self.man.white.plane(pt).mirrored() {
                mirror.man.add_piece(Color::Black, pt, sq);
            }
            for sq in self.man.black.plane(pt).mirrored() {
                mirror.man.add_piece(Color::White, pt, sq);
            }
        }
        let w_src = latent_src(Color::White);
        let b_src = latent_src(Color::Black);
        mirror.lat.white.set_oo(w_src, self.lat.black.oo());
        mirror.lat.white.set_ooo(w_src, self.lat.black.ooo());
        mirror.lat.black.set_oo(b_src, self.lat.white.oo());
        mirror.lat.black.set_ooo(b_src, self.lat.white.ooo());
        if self.lat.black.ep_mask().any() {
            mirror
                .lat
                .white
                .set_ep_mask(w_src, self.lat.black.ep_mask().mirrored().item());
        }
        if self.lat.white.ep_mask().any() {
            mirror
                .lat
                .black
                .set_ep_mask(b_src, self.lat.white.ep_mask().mirrored().item());
        }
        mirror.lat.ply_count = self.lat.ply_count ^ 1;
        mirror.lat.half_clock = self.lat.half_clock;
        mirror
    }

    /// Serialize to Forsyth-Edwards Notation.
    #[must_use]
    pub fn fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file_label in 0..8 {
                let sq = Square::from_file_rank(7 - file_label, rank);
                let (color, present) = if self.man.white.all().is_member(sq) {
                    (Color::White, true)
                } else if self.man.black.all().is_member(sq) {
                    (Color::Black, true)
                } else {
                    (Color::White, false)
                };
                if present {
                    if empty != 0 {
                        fen.push_str(&empty.to_string());
                        empty = 0;
                    }
                    let letter = self.man.us(color).occ(sq).letter();
                    fen.push(if color == Color::White {
                        letter.to_ascii_uppercase()
                    } else {
                        letter
                    });
                } else {
                    empty += 1;
                }
            }
            if empty != 0 {
                fen.push_str(&empty.to_string());
            }
            if rank != 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.turn() == Color::White { 'w' } else { 'b' });

        fen.push(' ');
        let mut rights = String::new();
        if self.lat.white.oo() {
            rights.push('K');
        }
        if self.lat.white.ooo() {
            rights.push('Q');
        }
        if self.lat.black.oo() {
            rights.push('k');
        }
        if self.lat.black.ooo() {
            rights.push('q');
        }
        fen.push_str(if rights.is_empty() { "-" } else { &rights });

        fen.push(' ');
        let ep = self.lat.them(self.turn()).ep_mask();
        if ep.any() {
            fen.push_str(&ep.item().to_string());
        } else {
            fen.push('-');
        }

        fen.push_str(&format!(
            " {} {}",
            self.lat.half_clock,
            1 + self.lat.ply_count / 2
        ));
        fen
    }

    /// Parse a FEN string. The prior position is untouched on failure.
    pub fn parse_fen(fen: &str) -> Result<Board, BoardError> {
        let tokens: Vec<&str> = fen.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(BoardError::InvalidFen("expected at least four fields"));
        }

        let mut board = Board::empty();

        let ranks: Vec<&str> = tokens[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(BoardError::InvalidFen("expected eight ranks"));
        }
        for (rank_label, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_label;
            let mut file_label = 0usize;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file_label += skip as usize;
                } else {
                    let pt = PieceType::from_letter(ch)
                        .ok_or(BoardError::InvalidFen("unknown piece letter"))?;
                    if file_label >= 8 {
                        return Err(BoardError::InvalidFen("rank overflow"));
                    }
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    let sq = Square::from_file_rank(7 - file_label, rank);
                    board.man.add_piece(color, pt, sq);
                    file_label += 1;
                }
            }
            if file_label != 8 {
                return Err(BoardError::InvalidFen("rank underflow"));
            }
        }

        if board.man.white.king().count() != 1 || board.man.black.king().count() != 1 {
            return Err(BoardError::InvalidFen("each side needs exactly one king"));
        }

        let turn = match tokens[1] {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(BoardError::InvalidFen("bad side to move")),
        };

        // Rights hold only while king and rook sit on their home squares.
        let rights = tokens[2];
        for (c, ch_oo, ch_ooo) in [(Color::White, 'K', 'Q'), (Color::Black, 'k', 'q')] {
            let info = castle_info(c);
            let src = latent_src(c);
            let man = board.man.us(c);
            let king_home = man.king().is_member(info.start_king);
            let oo = rights.contains(ch_oo) && king_home && man.rook().is_member(info.oo_rook);
            let ooo = rights.contains(ch_ooo) && king_home && man.rook().is_member(info.ooo_rook);
            board.lat.us_mut(c).set_oo(src, oo);
            board.lat.us_mut(c).set_ooo(src, ooo);
        }

        let fullmove: usize = tokens.get(5).and_then(|t| t.parse().ok()).unwrap_or(1);
        board.lat.ply_count = 2 * fullmove.saturating_sub(1) + turn.index();
        board.lat.half_clock = tokens.get(4).and_then(|t| t.parse().ok()).unwrap_or(0);

        if tokens[3] != "-" {
            let ep =
                Square::from_name(tokens[3]).ok_or(BoardError::InvalidFen("bad ep square"))?;
            // Keep the ep square only when a capture is actually possible.
            if (board.man.us(turn).pawn() & attack_tables::pawn_attacks(turn.other(), ep)).any() {
                let mover = turn.other();
                board.lat.us_mut(mover).set_ep_mask(latent_src(mover), ep);
            }
        }

        Ok(board)
    }

    /// Apply a sequence of UCI move names, accumulating the position history.
    pub fn after_uci_moves(&self, moves: &str) -> Result<(BoardHistory, Board), BoardError> {
        let mut history = BoardHistory::new();
        let mut bd = self.clone();
        for name in moves.split_whitespace() {
            let list: MoveList = bd.generate_moves(movegen::GenMode::ALL);
            let found = list
                .iter()
                .copied()
                .find(|mv| mv.uci_name(bd.turn()) == name)
                .ok_or_else(|| BoardError::UnknownMove(name.to_string()))?;
            history.push(bd.hash());
            bd = bd.forward(found);
        }
        Ok((history, bd))
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_properties() {
        let bd = Board::start_pos();
        assert_eq!(bd.turn(), Color::White);
        assert_eq!(bd.num_pieces(), 32);
        assert_eq!(bd.king_sq(Color::White).to_string(), "e1");
        assert_eq!(bd.king_sq(Color::Black).to_string(), "e8");
        assert!(!bd.is_check());
        assert!((bd.phase() - 1.0).abs() < f32::EPSILON);
        assert_eq!(bd.fen(), START_FEN);
    }

    #[test]
    fn test_fen_round_trip_hash() {
        let fens = [
            START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            let round = Board::parse_fen(&bd.fen()).unwrap();
            assert_eq!(round.hash(), bd.hash(), "fen: {fen}");
            assert_eq!(round.fen(), bd.fen());
        }
    }

    #[test]
    fn test_mirror_involution() {
        let bd = Board::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(bd.mirrored().mirrored().hash(), bd.hash());
        assert_ne!(bd.mirrored().hash(), bd.hash());
        assert_eq!(bd.mirrored().turn(), Color::Black);
    }

    #[test]
    fn test_null_move_changes_hash() {
        let bd = Board::start_pos();
        let null = bd.forward(Move::null());
        assert_ne!(null.hash(), bd.hash());
        assert_eq!(null.turn(), Color::Black);
    }

    #[test]
    fn test_forward_simple_move() {
        let bd = Board::start_pos();
        let e4 = Move::quiet(
            Square::from_name("e2").unwrap(),
            Square::from_name("e4").unwrap(),
            PieceType::Pawn,
        );
        let next = bd.forward(e4);
        // The en-passant square is only tracked (and printed) when an enemy
        // pawn could actually capture, which is not the case here.
        assert_eq!(
            next.fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_ep_square_requires_adjacent_pawn() {
        // No black pawn can capture on e3, so the ep square is dropped.
        let bd = Board::start_pos().forward(Move::quiet(
            Square::from_name("a2").unwrap(),
            Square::from_name("a4").unwrap(),
            PieceType::Pawn,
        ));
        assert!(bd.lat.them(bd.turn()).ep_mask().none());
    }

    #[test]
    fn test_castle_forward() {
        let bd =
            Board::parse_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let oo = Move::capture(
            Square::from_name("e1").unwrap(),
            Square::from_name("h1").unwrap(),
            PieceType::King,
            PieceType::Rook,
        );
        let next = bd.forward(oo);
        assert_eq!(next.king_sq(Color::White).to_string(), "g1");
        assert!(next.man.white.rook().is_member(Square::from_name("f1").unwrap()));
        assert!(!next.lat.white.oo());
        assert!(!next.lat.white.ooo());
    }

    #[test]
    fn test_rule50_reset() {
        let bd = Board::start_pos();
        let knight = Move::quiet(
            Square::from_name("g1").unwrap(),
            Square::from_name("f3").unwrap(),
            PieceType::Knight,
        );
        assert_eq!(bd.forward(knight).lat.half_clock, 1);
        let pawn = Move::quiet(
            Square::from_name("e2").unwrap(),
            Square::from_name("e3").unwrap(),
            PieceType::Pawn,
        );
        assert_eq!(bd.forward(pawn).lat.half_clock, 0);
    }

    #[test]
    fn test_invalid_fens() {
        assert!(Board::parse_fen("").is_err());
        assert!(Board::parse_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Board::parse_fen("rnbqkbnr/pppppppp/8/8/8/8 w KQkq - 0 1").is_err());
    }

    #[test]
    fn test_threat_mask() {
        // A white pawn on e4 threatens a knight on d5.
        let bd = Board::parse_fen("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let threats = bd.us_threat_mask();
        assert!(threats.is_member(Square::from_name("d5").unwrap()));
    }

    #[test]
    fn test_trivially_drawn() {
        assert!(Board::parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1")
            .unwrap()
            .is_trivially_drawn());
        assert!(Board::parse_fen("4k3/8/8/8/8/8/8/3NK3 w - - 0 1")
            .unwrap()
            .is_trivially_drawn());
        assert!(!Board::parse_fen("4k3/8/8/8/8/8/8/3RK3 w - - 0 1")
            .unwrap()
            .is_trivially_drawn());
    }
}
