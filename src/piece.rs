use std::collections::BTreeSet;

// ============================================================================
// Playfield Geometry
// ============================================================================

pub const FIELD_WIDTH: i32 = 10;
/// Index of the bottom row. Rows grow downward and have no upper bound.
pub const FIELD_BOTTOM: i32 = 23;
pub const FIELD_HEIGHT: i32 = FIELD_BOTTOM + 1;
pub const COLOR_COUNT: u8 = 7;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Where this tile lands after `motion`, rotating about `pivot`.
    pub fn moved(self, motion: Motion, pivot: Tile) -> Tile {
        match motion.offset() {
            Some((dx, dy)) => Tile::new(self.x + dx, self.y + dy),
            None => Tile::new(pivot.x - (self.y - pivot.y), pivot.y + (self.x - pivot.x)),
        }
    }

    pub fn in_field(self) -> bool {
        (0..FIELD_WIDTH).contains(&self.x) && self.y <= FIELD_BOTTOM
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Motion {
    Down,
    Left,
    Right,
    /// Quarter turn about the pivot tile.
    Rotate,
}

impl Motion {
    pub const fn offset(self) -> Option<(i32, i32)> {
        match self {
            Motion::Down => Some((0, 1)),
            Motion::Left => Some((-1, 0)),
            Motion::Right => Some((1, 0)),
            Motion::Rotate => None,
        }
    }
}

/// Collision oracle a piece is tested against.
pub trait Occupancy {
    fn is_occupied(&self, x: i32, y: i32) -> bool;
}

// ============================================================================
// Shapes
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::I,
        Shape::O,
        Shape::T,
        Shape::S,
        Shape::Z,
        Shape::J,
        Shape::L,
    ];

    /// Tile offsets from the pivot; the pivot is always first.
    pub const fn template(self) -> [(i32, i32); 4] {
        match self {
            Shape::I => [(0, 0), (0, -1), (0, 1), (0, 2)],
            Shape::O => [(0, 0), (1, 0), (1, 1), (0, 1)],
            Shape::T => [(0, 0), (-1, 0), (1, 0), (0, 1)],
            Shape::S => [(0, 0), (1, 0), (0, 1), (-1, 1)],
            Shape::Z => [(0, 0), (-1, 0), (0, 1), (1, 1)],
            Shape::J => [(0, 0), (0, -1), (0, 1), (-1, 1)],
            Shape::L => [(0, 0), (0, -1), (0, 1), (1, 1)],
        }
    }
}

// ============================================================================
// Tetrimino
// ============================================================================

/// A rigid group of tiles. Splitting can leave it with fewer than four.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tetrimino {
    tiles: Vec<Tile>,
    shape: Shape,
    color: u8,
}

/// Result of cutting a piece along one row.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Split {
    pub upper: Option<Tetrimino>,
    pub lower: Option<Tetrimino>,
    /// Exactly the tiles that sat on the cut row.
    pub cleared: Tetrimino,
}

impl Tetrimino {
    /// Builds `shape` with its pivot on `anchor`, pre-rotated `turns` quarter turns.
    pub fn new(shape: Shape, color: u8, anchor: Tile, turns: u8) -> Self {
        let tiles = shape
            .template()
            .iter()
            .map(|&(dx, dy)| Tile::new(anchor.x + dx, anchor.y + dy))
            .collect();
        let mut piece = Self {
            tiles,
            shape,
            color: color % COLOR_COUNT,
        };
        for _ in 0..turns % 4 {
            piece.apply(Motion::Rotate);
        }
        piece
    }

    pub fn from_tiles(tiles: Vec<Tile>, shape: Shape, color: u8) -> Self {
        Self {
            tiles,
            shape,
            color: color % COLOR_COUNT,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn color(&self) -> u8 {
        self.color
    }

    pub fn pivot(&self) -> Option<Tile> {
        self.tiles.first().copied()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.tiles.iter().any(|t| t.x == x && t.y == y)
    }

    pub fn rows(&self) -> BTreeSet<i32> {
        self.tiles.iter().map(|t| t.y).collect()
    }

    /// Deepest row the piece reaches (largest y).
    pub fn bottom(&self) -> Option<i32> {
        self.tiles.iter().map(|t| t.y).max()
    }

    /// Translates the piece so its pivot sits on `anchor`.
    pub fn jump_to(&mut self, anchor: Tile) {
        let Some(pivot) = self.pivot() else {
            return;
        };
        let (dx, dy) = (anchor.x - pivot.x, anchor.y - pivot.y);
        for tile in &mut self.tiles {
            tile.x += dx;
            tile.y += dy;
        }
    }

    /// Applies `motion` unconditionally.
    pub fn apply(&mut self, motion: Motion) {
        let Some(pivot) = self.pivot() else {
            return;
        };
        for tile in &mut self.tiles {
            *tile = tile.moved(motion, pivot);
        }
    }

    pub fn can_move(&self, motion: Motion, field: &impl Occupancy) -> bool {
        let Some(pivot) = self.pivot() else {
            return false;
        };
        self.tiles.iter().all(|tile| {
            let dest = tile.moved(motion, pivot);
            self.contains(dest.x, dest.y) || (dest.in_field() && !field.is_occupied(dest.x, dest.y))
        })
    }

    /// True if any tile sits on an occupied cell of `field`.
    pub fn overlaps(&self, field: &impl Occupancy) -> bool {
        self.tiles.iter().any(|t| field.is_occupied(t.x, t.y))
    }

    /// Cuts the piece along `row`. Tiles on the row never survive in a remainder.
    pub fn split(self, row: i32) -> Split {
        let (shape, color) = (self.shape, self.color);
        let mut upper = Vec::new();
        let mut lower = Vec::new();
        let mut cleared = Vec::new();
        for tile in self.tiles {
            match tile.y.cmp(&row) {
                std::cmp::Ordering::Less => upper.push(tile),
                std::cmp::Ordering::Greater => lower.push(tile),
                std::cmp::Ordering::Equal => cleared.push(tile),
            }
        }
        let keep = |tiles: Vec<Tile>| (!tiles.is_empty()).then(|| Tetrimino::from_tiles(tiles, shape, color));
        Split {
            upper: keep(upper),
            lower: keep(lower),
            cleared: Tetrimino::from_tiles(cleared, shape, color),
        }
    }

    /// Orthogonally adjacent tile pairs. Renderers draw these as the joins
    /// that keep a piece visibly in one block.
    pub fn hinges(&self) -> Vec<(Tile, Tile)> {
        let mut found = Vec::new();
        for (i, a) in self.tiles.iter().enumerate() {
            for b in &self.tiles[i + 1..] {
                if (a.x - b.x).abs() + (a.y - b.y).abs() == 1 {
                    found.push((*a, *b));
                }
            }
        }
        found
    }
}
