//! Settled pieces and the row indexes over them.
//!
//! Pieces live in an arena keyed by [`PieceId`]. The per-row indexes store ids
//! only, so splitting or removing a piece never leaves a dangling alias.

use std::collections::{BTreeMap, BTreeSet};

use crate::piece::{Motion, Occupancy, Tetrimino, FIELD_WIDTH};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct PieceId(u32);

/// Whether a settled piece is currently allowed to fall.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Support {
    Rigid,
    Loose,
}

/// Outcome of one loose-fall pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Fall {
    pub moved: usize,
    pub settled: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Pile {
    pieces: BTreeMap<PieceId, Tetrimino>,
    rigid: BTreeSet<PieceId>,
    loose: BTreeSet<PieceId>,
    pending: Vec<Tetrimino>,
    row_pieces: BTreeMap<i32, BTreeSet<PieceId>>,
    row_columns: BTreeMap<i32, BTreeSet<i32>>,
    full_rows: BTreeSet<i32>,
    last_full: Option<i32>,
    next_id: u32,
}

impl Occupancy for Pile {
    fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.row_columns.get(&y).is_some_and(|cols| cols.contains(&x))
    }
}

impl Pile {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn get(&self, id: PieceId) -> Option<&Tetrimino> {
        self.pieces.get(&id)
    }

    /// Every live piece with its support class, in id order.
    pub fn pieces(&self) -> impl Iterator<Item = (PieceId, &Tetrimino, Support)> + '_ {
        self.pieces.iter().map(|(&id, piece)| {
            let support = if self.loose.contains(&id) {
                Support::Loose
            } else {
                Support::Rigid
            };
            (id, piece, support)
        })
    }

    /// Fragments removed by the last clear, kept for display until dropped.
    pub fn pending(&self) -> &[Tetrimino] {
        &self.pending
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn rigid_count(&self) -> usize {
        self.rigid.len()
    }

    pub fn loose_count(&self) -> usize {
        self.loose.len()
    }

    pub fn has_loose(&self) -> bool {
        !self.loose.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn full_rows(&self) -> &BTreeSet<i32> {
        &self.full_rows
    }

    pub fn has_full_rows(&self) -> bool {
        !self.full_rows.is_empty()
    }

    /// Deepest row ever cleared in this pile.
    pub fn last_full(&self) -> Option<i32> {
        self.last_full
    }

    pub fn is_row_full(&self, y: i32) -> bool {
        self.full_rows.contains(&y)
    }

    pub fn filled_in_row(&self, y: i32) -> usize {
        self.row_columns.get(&y).map_or(0, BTreeSet::len)
    }

    pub fn pieces_in_row(&self, y: i32) -> impl Iterator<Item = PieceId> + '_ {
        self.row_pieces.get(&y).into_iter().flatten().copied()
    }

    /// Rows holding at least one tile, top to bottom.
    pub fn occupied_rows(&self) -> impl Iterator<Item = i32> + '_ {
        self.row_columns.keys().copied()
    }

    /// True if anything occupies `row` or any row above it.
    pub fn reaches(&self, row: i32) -> bool {
        self.row_columns.range(..=row).next().is_some()
    }

    pub fn total_tiles(&self) -> usize {
        self.row_columns.values().map(BTreeSet::len).sum()
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Takes ownership of a locked piece as rigid and indexes its tiles.
    pub fn insert(&mut self, piece: Tetrimino) -> Option<PieceId> {
        if piece.is_empty() {
            return None;
        }
        let id = PieceId(self.next_id);
        self.next_id += 1;
        self.index(id, &piece);
        self.pieces.insert(id, piece);
        self.rigid.insert(id);
        Some(id)
    }

    fn index(&mut self, id: PieceId, piece: &Tetrimino) {
        for tile in piece.tiles() {
            self.row_pieces.entry(tile.y).or_default().insert(id);
            let columns = self.row_columns.entry(tile.y).or_default();
            let fresh = columns.insert(tile.x);
            debug_assert!(fresh, "cell ({}, {}) occupied twice", tile.x, tile.y);
            if columns.len() == FIELD_WIDTH as usize {
                self.full_rows.insert(tile.y);
            }
        }
    }

    fn unindex(&mut self, id: PieceId, piece: &Tetrimino) {
        for tile in piece.tiles() {
            if let Some(ids) = self.row_pieces.get_mut(&tile.y) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.row_pieces.remove(&tile.y);
                }
            }
            if let Some(columns) = self.row_columns.get_mut(&tile.y) {
                columns.remove(&tile.x);
                if columns.is_empty() {
                    self.row_columns.remove(&tile.y);
                }
            }
            self.full_rows.remove(&tile.y);
        }
    }

    fn remove(&mut self, id: PieceId) -> Option<Tetrimino> {
        let piece = self.pieces.remove(&id)?;
        self.rigid.remove(&id);
        self.loose.remove(&id);
        self.unindex(id, &piece);
        Some(piece)
    }

    /// Splits every piece crossing a full row. Remainders come back as new
    /// rigid pieces, the row fragments move to pending. Returns the cleared rows.
    pub fn clear_full_rows(&mut self) -> Vec<i32> {
        let rows: Vec<i32> = self.full_rows.iter().copied().collect();
        for &row in &rows {
            let ids: Vec<PieceId> = self.pieces_in_row(row).collect();
            for id in ids {
                let Some(piece) = self.remove(id) else {
                    continue;
                };
                let split = piece.split(row);
                log::debug!(
                    "row {row}: split {id:?} into upper={} lower={} cleared={}",
                    split.upper.as_ref().map_or(0, Tetrimino::len),
                    split.lower.as_ref().map_or(0, Tetrimino::len),
                    split.cleared.len()
                );
                for remainder in [split.upper, split.lower].into_iter().flatten() {
                    self.insert(remainder);
                }
                self.pending.push(split.cleared);
            }
            self.last_full = Some(self.last_full.map_or(row, |deepest| deepest.max(row)));
        }
        rows
    }

    /// Forgets the fragments removed by the last clear.
    pub fn drop_pending(&mut self) -> usize {
        std::mem::take(&mut self.pending).len()
    }

    /// Reclassifies rigid pieces near cleared rows that can fall as loose.
    pub fn find_loose(&mut self) -> usize {
        let Some(deepest) = self.last_full else {
            return 0;
        };
        let candidates: BTreeSet<PieceId> = self
            .row_pieces
            .range(..=deepest + 1)
            .flat_map(|(_, ids)| ids.iter().copied())
            .filter(|id| self.rigid.contains(id))
            .collect();
        let mut loosened = 0;
        for id in candidates {
            let can_fall = self
                .pieces
                .get(&id)
                .is_some_and(|piece| piece.can_move(Motion::Down, self));
            if can_fall {
                self.rigid.remove(&id);
                self.loose.insert(id);
                loosened += 1;
            }
        }
        loosened
    }

    /// Drops every loose piece one row, deepest first, and settles the ones
    /// that can fall no further.
    pub fn fall_loose(&mut self) -> Fall {
        let mut order: Vec<(i32, PieceId)> = self
            .loose
            .iter()
            .filter_map(|&id| Some((self.pieces.get(&id)?.bottom()?, id)))
            .collect();
        order.sort_by(|a, b| b.cmp(a));

        let mut fall = Fall::default();
        for (_, id) in order {
            let Some(mut piece) = self.pieces.remove(&id) else {
                continue;
            };
            if piece.can_move(Motion::Down, self) {
                self.unindex(id, &piece);
                piece.apply(Motion::Down);
                self.index(id, &piece);
                fall.moved += 1;
            }
            let resting = !piece.can_move(Motion::Down, self);
            self.pieces.insert(id, piece);
            if resting {
                self.loose.remove(&id);
                self.rigid.insert(id);
                fall.settled += 1;
            }
        }
        fall
    }
}
