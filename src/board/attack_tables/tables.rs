//! Stepper, pawn and geometry tables.

use once_cell::sync::Lazy;

use crate::board::types::{Color, Square, SquareSet};

fn stepper_table(deltas: &[(i32, i32)]) -> [u64; 64] {
    let mut table = [0u64; 64];
    for (idx, mask) in table.iter_mut().enumerate() {
        let file = (idx % 8) as i32;
        let rank = (idx / 8) as i32;
        for &(df, dr) in deltas {
            let f = file + df;
            let r = rank + dr;
            if (0..8).contains(&f) && (0..8).contains(&r) {
                *mask |= 1u64 << (r * 8 + f);
            }
        }
    }
    table
}

pub(super) static KNIGHT_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    stepper_table(&[
        (1, 2),
        (2, 1),
        (2, -1),
        (1, -2),
        (-1, -2),
        (-2, -1),
        (-2, 1),
        (-1, 2),
    ])
});

pub(super) static KING_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    stepper_table(&[
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ])
});

pub(super) static PAWN_ATTACKS: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    [
        stepper_table(&[(-1, 1), (1, 1)]),
        stepper_table(&[(-1, -1), (1, -1)]),
    ]
});

/// Single-step push targets; doubles are derived with occupancy masking.
static PAWN_STEPS: Lazy<[[u64; 64]; 2]> =
    Lazy::new(|| [stepper_table(&[(0, 1)]), stepper_table(&[(0, -1)])]);

pub(super) fn pawn_pushes(c: Color, sq: Square, occ: SquareSet) -> SquareSet {
    let single = PAWN_STEPS[c.index()][sq.index()] & !occ.0;
    let double = match c {
        Color::White => {
            if sq.rank() == 1 {
                (single << 8) & !occ.0
            } else {
                0
            }
        }
        Color::Black => {
            if sq.rank() == 6 {
                (single >> 8) & !occ.0
            } else {
                0
            }
        }
    };
    SquareSet(single | double)
}

pub(super) static PASSER_MASKS: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 2];
    for idx in 0..64 {
        let file = (idx % 8) as i32;
        let rank = (idx / 8) as i32;
        for df in -1..=1 {
            let f = file + df;
            if !(0..8).contains(&f) {
                continue;
            }
            for r in (rank + 1)..8 {
                table[0][idx] |= 1u64 << (r * 8 + f);
            }
            for r in 0..rank {
                table[1][idx] |= 1u64 << (r * 8 + f);
            }
        }
    }
    table
});

pub(super) static RAY_BETWEEN: Lazy<Box<[[u64; 64]; 64]>> = Lazy::new(|| {
    let mut table = Box::new([[0u64; 64]; 64]);
    for from in 0..64usize {
        let ff = (from % 8) as i32;
        let fr = (from / 8) as i32;
        for &(df, dr) in &[
            (1, 0),
            (-1, 0),
            (0, 1),
            (0, -1),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ] {
            let mut between = 0u64;
            let mut f = ff + df;
            let mut r = fr + dr;
            while (0..8).contains(&f) && (0..8).contains(&r) {
                let to = (r * 8 + f) as usize;
                table[from][to] = between;
                between |= 1u64 << to;
                f += df;
                r += dr;
            }
        }
    }
    table
});
