use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::infra::Position;
use crate::state::Map;

/// Distance reported between cells the wall grid keeps apart.
pub const UNREACHABLE: u32 = u32::MAX / 4;

/// Cost between two cells, queried by the heuristics.
pub trait DistanceOracle {
    fn distance(&self, from: Position, to: Position) -> u32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl DistanceOracle for Manhattan {
    fn distance(&self, from: Position, to: Position) -> u32 {
        from.distance(&to).unsigned_abs()
    }
}

/// True shortest-path distances over the static wall grid.
///
/// A breadth-first distance field is computed the first time a cell is used
/// as a source and kept for the rest of the run.
pub struct WallDistances {
    map: Arc<Map>,
    fields: RefCell<HashMap<Position, Vec<u32>>>,
}

impl WallDistances {
    pub fn new(map: Arc<Map>) -> Self {
        Self {
            map,
            fields: RefCell::new(HashMap::new()),
        }
    }

    fn index(&self, pos: &Position) -> Option<usize> {
        self.map
            .contains(pos)
            .then(|| (pos.row * self.map.width + pos.col) as usize)
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn flood(&self, source: Position) -> Vec<u32> {
        let mut field = vec![UNREACHABLE; self.map.len()];
        let Some(start) = self.index(&source) else {
            return field;
        };
        field[start] = 0;

        let mut queue = VecDeque::from([source]);
        while let Some(current) = queue.pop_front() {
            let Some(index) = self.index(&current) else {
                continue;
            };
            let next_distance = field[index] + 1;
            for neighbor in current.neighbors() {
                if self.map.is_wall(&neighbor) {
                    continue;
                }
                let Some(n) = self.index(&neighbor) else {
                    continue;
                };
                if field[n] == UNREACHABLE {
                    field[n] = next_distance;
                    queue.push_back(neighbor);
                }
            }
        }
        field
    }

    /// Number of cached distance fields.
    pub fn cached_sources(&self) -> usize {
        self.fields.borrow().len()
    }
}

impl DistanceOracle for WallDistances {
    fn distance(&self, from: Position, to: Position) -> u32 {
        if from == to {
            return 0;
        }
        let Some(target) = self.index(&to) else {
            return UNREACHABLE;
        };
        let mut fields = self.fields.borrow_mut();
        let field = fields.entry(from).or_insert_with(|| self.flood(from));
        field[target]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maze() -> Arc<Map> {
        // +++++
        // +   +
        // +++ +
        // +   +
        // +++++
        let mut walls: Vec<Position> = (0..5)
            .flat_map(|i| {
                [
                    Position::new(0, i),
                    Position::new(4, i),
                    Position::new(i, 0),
                    Position::new(i, 4),
                ]
            })
            .collect();
        walls.extend([Position::new(2, 1), Position::new(2, 2)]);
        Arc::new(Map::from_walls(5, 5, walls))
    }

    #[test]
    fn test_manhattan() {
        let d = Manhattan.distance(Position::new(1, 1), Position::new(3, 4));
        assert_eq!(d, 5);
    }

    #[test]
    fn test_wall_distances_walk_around_walls() {
        let oracle = WallDistances::new(maze());
        let from = Position::new(1, 1);
        let to = Position::new(3, 1);
        assert_eq!(Manhattan.distance(from, to), 2);
        assert_eq!(oracle.distance(from, to), 6);
        assert_eq!(oracle.distance(from, from), 0);
    }

    #[test]
    fn test_unreachable_and_cache() {
        let oracle = WallDistances::new(maze());
        assert_eq!(oracle.distance(Position::new(1, 1), Position::new(0, 0)), UNREACHABLE);
        oracle.distance(Position::new(1, 1), Position::new(3, 3));
        assert_eq!(oracle.cached_sources(), 1);
    }
}
