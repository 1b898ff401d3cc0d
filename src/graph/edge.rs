//! Edges of the constraint graph.

use crate::core::constraint::NumericalConstraint;
use crate::core::error::{EdgeId, StateId};
use crate::validation::validator::PathValidator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of motion an edge describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Motion without any object in hand.
    #[default]
    Transit,
    /// Motion carrying a grasped object.
    Transfer,
    /// Approach and closing on a handle.
    Grasp,
    /// Opening and retreat from a handle.
    Release,
}

/// Everything needed to create an edge.
#[derive(Debug, Clone)]
pub struct EdgeDefinition {
    /// Edge name.
    pub name: String,
    /// Source state.
    pub from: StateId,
    /// Target state.
    pub to: StateId,
    /// Kind of motion.
    pub kind: EdgeKind,
    /// Relative weight used by random edge selection.
    pub weight: u32,
    /// State the motion lies in; defaults to `from`.
    pub state: Option<StateId>,
    /// Constraints that hold while traversing the edge.
    pub path_constraints: Vec<NumericalConstraint>,
}

impl EdgeDefinition {
    /// Create a transit edge of weight 1.
    pub fn new(name: impl Into<String>, from: StateId, to: StateId) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            kind: EdgeKind::default(),
            weight: 1,
            state: None,
            path_constraints: Vec::new(),
        }
    }

    /// Set the kind of motion.
    pub fn kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the selection weight. Zero means never selected.
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the state the motion lies in.
    pub fn in_state(mut self, state: StateId) -> Self {
        self.state = Some(state);
        self
    }

    /// Add a path constraint.
    pub fn path_constraint(mut self, constraint: NumericalConstraint) -> Self {
        self.path_constraints.push(constraint);
        self
    }
}

/// Directed transition between two states.
///
/// Holds plain indices of its states. The dedicated path validator is built
/// on first use by the owning graph.
pub struct Edge {
    id: EdgeId,
    name: String,
    kind: EdgeKind,
    from: StateId,
    to: StateId,
    state: StateId,
    weight: u32,
    path_constraints: Vec<NumericalConstraint>,
    validator: Mutex<Option<Box<dyn PathValidator>>>,
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("state", &self.state)
            .field("weight", &self.weight)
            .field("path_constraints", &self.path_constraints.len())
            .field("validator", &self.has_validator())
            .finish()
    }
}

impl Edge {
    pub(crate) fn new(id: EdgeId, definition: EdgeDefinition) -> Self {
        Self {
            id,
            state: definition.state.unwrap_or(definition.from),
            name: definition.name,
            kind: definition.kind,
            from: definition.from,
            to: definition.to,
            weight: definition.weight,
            path_constraints: definition.path_constraints,
            validator: Mutex::new(None),
        }
    }

    /// Edge identifier.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Edge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of motion.
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Source state.
    pub fn from(&self) -> StateId {
        self.from
    }

    /// Target state.
    pub fn to(&self) -> StateId {
        self.to
    }

    /// State the motion lies in.
    pub fn state(&self) -> StateId {
        self.state
    }

    /// Selection weight.
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Constraints that hold while traversing the edge.
    pub fn path_constraints(&self) -> &[NumericalConstraint] {
        &self.path_constraints
    }

    /// Whether the dedicated validator has been built.
    pub fn has_validator(&self) -> bool {
        self.validator.lock().is_some()
    }

    pub(crate) fn validator_slot(&self) -> &Mutex<Option<Box<dyn PathValidator>>> {
        &self.validator
    }
}
