use std::collections::{BTreeMap, BTreeSet};

use crate::infra::Position;
use crate::state::{BoxMap, GoalMap, Map};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("level is empty")]
    Empty,
    #[error("invalid color line {line:?}")]
    InvalidColorLine { line: String },
    #[error("unexpected character {ch:?} at ({row}, {col})")]
    UnknownCharacter { row: usize, col: usize, ch: char },
    #[error("encountered a second agent ({id}) in a level without colors")]
    SecondAgent { id: usize },
    #[error("agent {id} appears more than once")]
    DuplicateAgent { id: usize },
    #[error("agent {id} has no color")]
    AgentWithoutColor { id: usize },
    #[error("agent ids must be contiguous, agent {id} is missing")]
    MissingAgent { id: usize },
    #[error("level has no agent")]
    NoAgent,
}

/// A parsed level: static walls, agent start cells indexed by agent id, boxes,
/// goals and which agent may move which box letter.
#[derive(Debug, Clone)]
pub struct Level {
    pub walls: Map,
    pub agents: Vec<Position>,
    pub boxes: BoxMap,
    pub goals: GoalMap,
    /// Box letter (uppercase) -> owning agent. Letters missing here belong to
    /// nobody and never move.
    pub box_owner: BTreeMap<char, usize>,
}

struct ColorLine {
    agents: Vec<usize>,
    letters: Vec<char>,
}

fn parse_color_line(line: &str) -> Result<ColorLine, ParseError> {
    let invalid = || ParseError::InvalidColorLine {
        line: line.to_string(),
    };
    let (color, items) = line.split_once(':').ok_or_else(invalid)?;
    if color.is_empty() || !color.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }

    let mut parsed = ColorLine {
        agents: Vec::new(),
        letters: Vec::new(),
    };
    for item in items.split(',') {
        let mut chars = item.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => parsed.agents.push(c as usize - '0' as usize),
            (Some(c), None) if c.is_ascii_uppercase() => parsed.letters.push(c),
            _ => return Err(invalid()),
        }
    }
    Ok(parsed)
}

impl Level {
    /// Parses judge level text. Reading stops at the first empty line after
    /// the grid has started.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r')).peekable();

        let mut color_lines = Vec::new();
        while let Some(line) = lines.peek() {
            if !line.contains(':') {
                break;
            }
            color_lines.push(parse_color_line(line)?);
            lines.next();
        }
        let colored = !color_lines.is_empty();

        let mut wall_cells = Vec::new();
        let mut agent_cells: BTreeMap<usize, Position> = BTreeMap::new();
        let mut boxes = BoxMap::new();
        let mut goals = GoalMap::new();
        let mut height = 0usize;
        let mut width = 0usize;

        for (row, line) in lines.enumerate() {
            if line.is_empty() {
                break;
            }
            height = row + 1;
            width = width.max(line.chars().count());
            for (col, ch) in line.chars().enumerate() {
                let pos = Position::new(row as i32, col as i32);
                match ch {
                    '+' => wall_cells.push(pos),
                    ' ' => {}
                    '0'..='9' => {
                        let id = ch as usize - '0' as usize;
                        if !colored && !agent_cells.is_empty() {
                            return Err(ParseError::SecondAgent { id });
                        }
                        if agent_cells.insert(id, pos).is_some() {
                            return Err(ParseError::DuplicateAgent { id });
                        }
                    }
                    'A'..='Z' => {
                        boxes.insert(pos, ch);
                    }
                    'a'..='z' => {
                        goals.insert(pos, ch);
                    }
                    _ => return Err(ParseError::UnknownCharacter { row, col, ch }),
                }
            }
        }

        if height == 0 {
            return Err(ParseError::Empty);
        }
        if agent_cells.is_empty() {
            return Err(ParseError::NoAgent);
        }
        let agents: Vec<Position> = agent_cells.values().copied().collect();
        if let Some(id) = (0..agents.len()).find(|id| !agent_cells.contains_key(id)) {
            return Err(ParseError::MissingAgent { id });
        }

        let box_owner = if colored {
            let mut colored_agents = BTreeSet::new();
            let mut owner = BTreeMap::new();
            for color in &color_lines {
                colored_agents.extend(color.agents.iter().copied());
                let Some(&first) = color.agents.iter().min() else {
                    continue;
                };
                for &letter in &color.letters {
                    owner.entry(letter).or_insert(first);
                }
            }
            if let Some(&id) = agent_cells.keys().find(|id| !colored_agents.contains(id)) {
                return Err(ParseError::AgentWithoutColor { id });
            }
            owner
        } else {
            boxes
                .values()
                .chain(goals.values())
                .map(|c| (c.to_ascii_uppercase(), 0))
                .collect()
        };

        Ok(Level {
            walls: Map::from_walls(height as i32, width as i32, wall_cells),
            agents,
            boxes,
            goals,
            box_owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_agent_level() {
        let level = Level::parse("+++++\n+0Aa+\n+++++\n").unwrap();
        assert_eq!(level.agents, vec![Position::new(1, 1)]);
        assert_eq!(level.boxes.get(&Position::new(1, 2)), Some(&'A'));
        assert_eq!(level.goals.get(&Position::new(1, 3)), Some(&'a'));
        assert_eq!(level.box_owner.get(&'A'), Some(&0));
        assert!(level.walls.is_wall(&Position::new(0, 0)));
        assert!(!level.walls.is_wall(&Position::new(1, 1)));
        assert_eq!((level.walls.height, level.walls.width), (3, 5));
    }

    #[test]
    fn test_second_agent_without_colors_is_rejected() {
        let err = Level::parse("+++++\n+0 1+\n+++++\n").unwrap_err();
        assert_eq!(err, ParseError::SecondAgent { id: 1 });
    }

    #[test]
    fn test_colors_assign_boxes_to_lowest_agent() {
        let text = "red: 0, 2, A\nblue: 1, B\ngreen: C\n+++++++\n+0A1B2C+\n+ab    +\n+++++++\n";
        let level = Level::parse(text).unwrap();
        assert_eq!(level.agents.len(), 3);
        assert_eq!(level.box_owner.get(&'A'), Some(&0));
        assert_eq!(level.box_owner.get(&'B'), Some(&1));
        assert_eq!(level.box_owner.get(&'C'), None);
    }

    #[test]
    fn test_invalid_color_line() {
        let err = Level::parse("Red: 0\n+++\n+0+\n+++\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidColorLine { .. }));
        let err = Level::parse("red: 0, AB\n+++\n+0+\n+++\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidColorLine { .. }));
    }

    #[test]
    fn test_agent_must_have_color() {
        let err = Level::parse("red: 0\n+++++\n+0 1+\n+++++\n").unwrap_err();
        assert_eq!(err, ParseError::AgentWithoutColor { id: 1 });
    }

    #[test]
    fn test_unknown_character() {
        let err = Level::parse("+++\n+0#\n+++\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownCharacter {
                row: 1,
                col: 2,
                ch: '#'
            }
        );
    }

    #[test]
    fn test_reading_stops_at_blank_line() {
        let level = Level::parse("+++\n+0+\n+++\n\n+1+\n").unwrap();
        assert_eq!(level.walls.height, 3);
        assert_eq!(level.agents.len(), 1);
    }

    #[test]
    fn test_missing_agent_id() {
        let err = Level::parse("red: 0, 2\n+++++\n+0 2+\n+++++\n").unwrap_err();
        assert_eq!(err, ParseError::MissingAgent { id: 1 });
        assert_eq!(Level::parse("+++\n+ +\n+++\n").unwrap_err(), ParseError::NoAgent);
        assert_eq!(Level::parse("").unwrap_err(), ParseError::Empty);
    }
}
