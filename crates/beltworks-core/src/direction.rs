//! Compass directions and tile coordinates.
//!
//! Directions are ordered clockwise (Right, Down, Left, Up) so that rotating
//! by +90° is `(d + 1) % 4` and by −90° is `(d + 3) % 4`. Belt headings,
//! curve resolution and rail-path rotation all build on these two rotations.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the four compass directions, clockwise order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    Down = 1,
    Left = 2,
    Up = 3,
}

/// All four directions, in clockwise order. Iteration order matters for
/// determinism: every neighbor scan in the crate walks this array.
pub const DIRECTIONS: [Direction; 4] = [
    Direction::Right,
    Direction::Down,
    Direction::Left,
    Direction::Up,
];

impl Direction {
    /// Rotate 90° clockwise.
    pub fn rotate_cw(self) -> Self {
        Self::from_index((self as u8 + 1) % 4)
    }

    /// Rotate 90° counterclockwise.
    pub fn rotate_ccw(self) -> Self {
        Self::from_index((self as u8 + 3) % 4)
    }

    /// The opposite direction.
    pub fn opposite(self) -> Self {
        Self::from_index((self as u8 + 2) % 4)
    }

    fn from_index(i: u8) -> Self {
        match i {
            0 => Direction::Right,
            1 => Direction::Down,
            2 => Direction::Left,
            _ => Direction::Up,
        }
    }

    /// Unit tile offset of this direction. Y grows downward.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }
}

// ---------------------------------------------------------------------------
// TilePos
// ---------------------------------------------------------------------------

/// An integer tile position on the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile in the given direction.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The direction leading from `self` to an adjacent `other`, if the two
    /// tiles share an edge.
    pub fn bearing_to(self, other: TilePos) -> Option<Direction> {
        match (other.x - self.x, other.y - self.y) {
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (0, -1) => Some(Direction::Up),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two parallel item rails within a line, named relative to the
/// direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Left = 0,
    Right = 1,
}

/// Both sides, in index order.
pub const SIDES: [Side; 2] = [Side::Left, Side::Right];

impl Side {
    pub fn index(self) -> usize {
        self as usize
    }
}

// ===========================================================================
// Tests
// ===========================================================================
