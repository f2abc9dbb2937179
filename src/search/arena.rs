use crate::state::State;

/// Stable handle of a state registered in a [`StateArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

struct Node {
    state: State,
    parent: Option<NodeId>,
}

/// Owns every state one search generated. Parent links are indices, so plan
/// extraction is an index walk and the whole graph is freed at once.
#[derive(Default)]
pub struct StateArena {
    nodes: Vec<Node>,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: State, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node { state, parent });
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> &State {
        &self.nodes[id.0].state
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// States from the root (exclusive) to `leaf` (inclusive).
    pub fn extract_plan(&self, leaf: NodeId) -> Vec<State> {
        let mut plan = Vec::new();
        let mut current = leaf;
        while let Some(parent) = self.parent(current) {
            plan.push(self.get(current).clone());
            current = parent;
        }
        plan.reverse();
        plan
    }
}
