use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::infra::Position;

/// Static wall grid shared by every state of a level.
///
/// Cells outside the grid count as walls. The content fingerprint is computed
/// once so that states can hash their wall grid without walking it.
#[derive(Clone, Debug)]
pub struct Map {
    pub width: i32,
    pub height: i32,
    walls: Vec<bool>,
    fingerprint: u64,
}

impl Map {
    pub fn new(height: i32, width: i32) -> Self {
        let size = (height.max(0) * width.max(0)) as usize;
        Self::from_cells(height, width, vec![false; size])
    }

    pub fn from_walls(height: i32, width: i32, walls: impl IntoIterator<Item = Position>) -> Self {
        let mut map = Self::new(height, width);
        for pos in walls {
            if let Some(index) = map.index(&pos) {
                map.walls[index] = true;
            }
        }
        map.refresh_fingerprint();
        map
    }

    fn from_cells(height: i32, width: i32, walls: Vec<bool>) -> Self {
        let mut map = Self {
            width,
            height,
            walls,
            fingerprint: 0,
        };
        map.refresh_fingerprint();
        map
    }

    fn refresh_fingerprint(&mut self) {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.walls.hash(&mut hasher);
        self.fingerprint = hasher.finish();
    }

    fn index(&self, pos: &Position) -> Option<usize> {
        if pos.row < 0 || pos.row >= self.height || pos.col < 0 || pos.col >= self.width {
            return None;
        }
        Some((pos.row * self.width + pos.col) as usize)
    }

    pub fn contains(&self, pos: &Position) -> bool {
        self.index(pos).is_some()
    }

    pub fn is_wall(&self, pos: &Position) -> bool {
        self.index(pos).is_none_or(|index| self.walls[index])
    }

    /// Copy of this grid with additional cells turned into walls.
    pub fn with_extra_walls(&self, cells: impl IntoIterator<Item = Position>) -> Self {
        let mut walls = self.walls.clone();
        for pos in cells {
            if let Some(index) = self.index(&pos) {
                walls[index] = true;
            }
        }
        Self::from_cells(self.height, self.width, walls)
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    /// Every cell that is not a wall, row-major.
    pub fn floor_cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height)
            .flat_map(move |row| (0..self.width).map(move |col| Position::new(row, col)))
            .filter(|pos| !self.is_wall(pos))
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.width == other.width
            && self.height == other.height
            && self.walls == other.walls
    }
}

impl Eq for Map {}

impl Hash for Map {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}
