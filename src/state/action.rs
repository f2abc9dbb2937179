use std::fmt;
use std::sync::LazyLock;

use crate::infra::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Push,
    Pull,
    NoOp,
}

/// A grounded action. `agent_dir` is absent only for `NoOp`, `box_dir` is
/// present only for `Push` and `Pull`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub kind: ActionKind,
    pub agent_dir: Option<Direction>,
    pub box_dir: Option<Direction>,
}

impl Action {
    pub const NOOP: Action = Action {
        kind: ActionKind::NoOp,
        agent_dir: None,
        box_dir: None,
    };

    pub fn move_to(dir: Direction) -> Self {
        Self {
            kind: ActionKind::Move,
            agent_dir: Some(dir),
            box_dir: None,
        }
    }

    /// `None` when pushing back into the agent's own cell.
    pub fn push(agent_dir: Direction, box_dir: Direction) -> Option<Self> {
        (box_dir != agent_dir.opposite()).then_some(Self {
            kind: ActionKind::Push,
            agent_dir: Some(agent_dir),
            box_dir: Some(box_dir),
        })
    }

    /// `None` when the box would be pulled from the cell the agent moves into.
    pub fn pull(agent_dir: Direction, box_dir: Direction) -> Option<Self> {
        (box_dir != agent_dir).then_some(Self {
            kind: ActionKind::Pull,
            agent_dir: Some(agent_dir),
            box_dir: Some(box_dir),
        })
    }

    pub fn is_noop(&self) -> bool {
        self.kind == ActionKind::NoOp
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.agent_dir, self.box_dir) {
            (ActionKind::NoOp, _, _) => f.write_str("NoOp"),
            (kind, Some(agent_dir), Some(box_dir)) => {
                write!(f, "{:?}({},{})", kind, agent_dir, box_dir)
            }
            (kind, Some(agent_dir), None) => write!(f, "{:?}({})", kind, agent_dir),
            (kind, None, _) => write!(f, "{:?}", kind),
        }
    }
}

/// Every physically possible grounded action, enumerated once.
pub static ALL_ACTIONS: LazyLock<Vec<Action>> = LazyLock::new(|| {
    let mut actions = Vec::new();
    for agent_dir in Direction::ALL {
        actions.push(Action::move_to(agent_dir));
        for box_dir in Direction::ALL {
            actions.extend(Action::push(agent_dir, box_dir));
            actions.extend(Action::pull(agent_dir, box_dir));
        }
    }
    actions
});

/// Formats a joint action the way the judge expects it: `[a0,a1,...]`.
pub fn joint_action_line(actions: &[Action]) -> String {
    let parts: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
    format!("[{}]", parts.join(","))
}
