use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::piece::{Motion, Occupancy, Shape, Tetrimino, Tile, COLOR_COUNT};

// ============================================================================
// Anchors
// ============================================================================

pub const SPAWN_POINT: Tile = Tile::new(5, 4);
/// Display position of the queued piece, right of the field.
pub const NEXT_ANCHOR: Tile = Tile::new(13, 4);
/// Display position of the held piece, left of the field.
pub const HOLD_ANCHOR: Tile = Tile::new(-4, 4);

/// A pivot left of this column kicks right when a rotation is blocked.
const KICK_RIGHT_BELOW: i32 = 2;
/// A pivot right of this column kicks left when a rotation is blocked.
const KICK_LEFT_ABOVE: i32 = 7;

// ============================================================================
// Piece Provider Trait
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PieceDraw {
    pub shape: Shape,
    /// Quarter turns applied at spawn.
    pub turns: u8,
    pub color: u8,
}

impl PieceDraw {
    pub const fn new(shape: Shape, turns: u8, color: u8) -> Self {
        Self { shape, turns, color }
    }

    pub fn build(self, anchor: Tile) -> Tetrimino {
        Tetrimino::new(self.shape, self.color, anchor, self.turns)
    }
}

pub trait PieceProvider {
    fn next_piece(&mut self) -> PieceDraw;
}

/// Uniform choice of shape, orientation and color.
pub struct RandomPieceProvider {
    rng: StdRng,
}

impl RandomPieceProvider {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPieceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceProvider for RandomPieceProvider {
    fn next_piece(&mut self) -> PieceDraw {
        let shape = Shape::ALL[self.rng.gen_range(0..Shape::ALL.len())];
        PieceDraw {
            shape,
            turns: self.rng.gen_range(0..4),
            color: self.rng.gen_range(0..COLOR_COUNT),
        }
    }
}

pub struct SequencePieceProvider {
    pieces: Vec<PieceDraw>,
    index: usize,
}

impl SequencePieceProvider {
    pub fn new(pieces: Vec<PieceDraw>) -> Self {
        Self { pieces, index: 0 }
    }

    /// Unrotated pieces of the given shapes, color taken from the position.
    pub fn of_shapes(shapes: &[Shape]) -> Self {
        let pieces = shapes
            .iter()
            .enumerate()
            .map(|(i, &shape)| PieceDraw::new(shape, 0, (i % COLOR_COUNT as usize) as u8))
            .collect();
        Self::new(pieces)
    }
}

impl PieceProvider for SequencePieceProvider {
    fn next_piece(&mut self) -> PieceDraw {
        let piece = self.pieces[self.index % self.pieces.len()];
        self.index += 1;
        piece
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn motion(self) -> Motion {
        match self {
            Side::Left => Motion::Left,
            Side::Right => Motion::Right,
        }
    }

    fn slot(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Owns the falling, queued and held pieces.
#[derive(Clone, Debug)]
pub struct Controller {
    active: Option<Tetrimino>,
    next: Option<Tetrimino>,
    held: Option<Tetrimino>,
    /// Auto-repeat counters per side; zero while the key is up.
    repeat: [u32; 2],
    repeat_period: u32,
}

impl Controller {
    pub fn new(repeat_period: u32) -> Self {
        Self {
            active: None,
            next: None,
            held: None,
            repeat: [0; 2],
            repeat_period: repeat_period.max(1),
        }
    }

    /// Fresh active and next pieces; nothing held.
    pub fn reset(&mut self, provider: &mut dyn PieceProvider) {
        self.active = Some(provider.next_piece().build(SPAWN_POINT));
        self.next = Some(provider.next_piece().build(NEXT_ANCHOR));
        self.held = None;
        self.repeat = [0; 2];
    }

    pub fn active(&self) -> Option<&Tetrimino> {
        self.active.as_ref()
    }

    pub fn next(&self) -> Option<&Tetrimino> {
        self.next.as_ref()
    }

    pub fn held(&self) -> Option<&Tetrimino> {
        self.held.as_ref()
    }

    /// Replaces the falling piece; used to stage positions directly.
    pub fn set_active(&mut self, piece: Tetrimino) {
        self.active = Some(piece);
    }

    pub fn ensure_next(&mut self, provider: &mut dyn PieceProvider) {
        if self.next.is_none() {
            self.next = Some(provider.next_piece().build(NEXT_ANCHOR));
        }
    }

    pub fn take_active(&mut self) -> Option<Tetrimino> {
        self.active.take()
    }

    /// Moves `next` (or a fresh piece) onto the spawn point.
    pub fn promote_next(&mut self, provider: &mut dyn PieceProvider) {
        let mut piece = self
            .next
            .take()
            .unwrap_or_else(|| provider.next_piece().build(SPAWN_POINT));
        piece.jump_to(SPAWN_POINT);
        self.active = Some(piece);
    }

    pub fn active_overlaps(&self, field: &impl Occupancy) -> bool {
        self.active.as_ref().is_some_and(|piece| piece.overlaps(field))
    }

    pub fn try_move(&mut self, motion: Motion, field: &impl Occupancy) -> bool {
        match self.active.as_mut() {
            Some(piece) if piece.can_move(motion, field) => {
                piece.apply(motion);
                true
            }
            _ => false,
        }
    }

    /// Rotates in place, or after a single one-column kick away from a near
    /// wall. A rotation that still does not fit leaves the piece untouched.
    pub fn rotate(&mut self, field: &impl Occupancy) -> bool {
        let Some(piece) = self.active.as_mut() else {
            return false;
        };
        if piece.can_move(Motion::Rotate, field) {
            piece.apply(Motion::Rotate);
            return true;
        }
        let Some(pivot) = piece.pivot() else {
            return false;
        };
        let kick = if pivot.x < KICK_RIGHT_BELOW {
            Motion::Right
        } else if pivot.x > KICK_LEFT_ABOVE {
            Motion::Left
        } else {
            return false;
        };
        if !piece.can_move(kick, field) {
            return false;
        }
        let mut kicked = piece.clone();
        kicked.apply(kick);
        if !kicked.can_move(Motion::Rotate, field) {
            return false;
        }
        kicked.apply(Motion::Rotate);
        *piece = kicked;
        true
    }

    /// Swaps the falling piece with the held one. With nothing held yet the
    /// queued piece takes over and the queue refills on the next gravity tick.
    pub fn hold(&mut self, provider: &mut dyn PieceProvider) -> bool {
        let Some(current) = self.active.take() else {
            return false;
        };
        let mut incoming = match self.held.take() {
            Some(held) => held,
            None => self
                .next
                .take()
                .unwrap_or_else(|| provider.next_piece().build(SPAWN_POINT)),
        };
        incoming.jump_to(SPAWN_POINT);
        let mut outgoing = current;
        outgoing.jump_to(HOLD_ANCHOR);
        self.active = Some(incoming);
        self.held = Some(outgoing);
        true
    }

    pub fn press(&mut self, side: Side) {
        self.repeat[side.slot()] = 1;
    }

    pub fn release(&mut self, side: Side) {
        self.repeat[side.slot()] = 0;
    }

    pub fn release_all(&mut self) {
        self.repeat = [0; 2];
    }

    pub fn is_pressed(&self, side: Side) -> bool {
        self.repeat[side.slot()] > 0
    }

    /// Advances the held-key counters by one frame and moves the piece on
    /// the frames that fall on the repeat period. Returns the columns moved.
    pub fn auto_repeat(&mut self, field: &impl Occupancy) -> u32 {
        let mut moved = 0;
        for side in [Side::Left, Side::Right] {
            let slot = side.slot();
            if self.repeat[slot] == 0 {
                continue;
            }
            self.repeat[slot] += 1;
            let due = (self.repeat[slot] - 2) % self.repeat_period == 0;
            if due && self.try_move(side.motion(), field) {
                moved += 1;
            }
        }
        moved
    }
}
