//! Constraint graph structure.
//!
//! The ConstraintGraph is the central data structure: it owns the node
//! selectors, their states and the edges leaving each state. Everything is
//! stored in arenas addressed by [`NodeSelectorId`], [`StateId`] and
//! [`EdgeId`], so edges refer to their states by index only. The graph is
//! built once and then shared read-only; only obstacle registration goes
//! through interior locks.

use crate::core::constraint::{ConfigProjector, NumericalConstraint};
use crate::core::error::{
    ConstraintError, ConstraintResult, EdgeId, GraphError, GraphResult, NodeSelectorId, StateId,
};
use crate::core::path::SegmentConstraints;
use crate::core::robot::Robot;
use crate::core::types::Configuration;
use crate::graph::edge::{Edge, EdgeDefinition};
use crate::graph::settings::GraphSettings;
use crate::validation::validator::{Obstacle, PathValidator, ValidatorFactory};
use indexmap::IndexMap;
use log::{debug, info};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Group of states differing along one independent choice.
#[derive(Debug, Clone)]
pub struct NodeSelector {
    id: NodeSelectorId,
    name: String,
    states: Vec<StateId>,
}

impl NodeSelector {
    /// Selector identifier.
    pub fn id(&self) -> NodeSelectorId {
        self.id
    }

    /// Selector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// States of the selector in declaration order.
    pub fn states(&self) -> &[StateId] {
        &self.states
    }
}

/// Class of configurations satisfying a set of constraints.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    name: String,
    selector: NodeSelectorId,
    constraints: Vec<NumericalConstraint>,
    edges: Vec<EdgeId>,
}

impl State {
    /// State identifier.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// State name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selector the state belongs to.
    pub fn selector(&self) -> NodeSelectorId {
        self.selector
    }

    /// Membership constraints, on top of the graph global constraints.
    pub fn constraints(&self) -> &[NumericalConstraint] {
        &self.constraints
    }

    /// Outgoing edges in creation order.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// Manipulation constraint graph.
///
/// Selectors keep their insertion order, which is the classification
/// priority of [`ConstraintGraph::get_state`].
pub struct ConstraintGraph {
    name: String,
    robot: Arc<dyn Robot>,
    selectors: IndexMap<String, NodeSelector>,
    states: Vec<State>,
    edges: Vec<Edge>,
    global_constraints: Vec<NumericalConstraint>,
    settings: GraphSettings,
    validator_factory: ValidatorFactory,
    // Lock order: `obstacles` before any edge validator slot.
    obstacles: Mutex<Vec<Obstacle>>,
}

impl fmt::Debug for ConstraintGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintGraph")
            .field("name", &self.name)
            .field("robot", &self.robot.name())
            .field("selectors", &self.selectors.len())
            .field("states", &self.states.len())
            .field("edges", &self.edges.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ConstraintGraph {
    /// Create an empty graph for `robot`.
    ///
    /// `validator_factory` builds the dedicated validator of each edge the
    /// first time a path along that edge is validated.
    pub fn new(
        name: impl Into<String>,
        robot: Arc<dyn Robot>,
        validator_factory: ValidatorFactory,
    ) -> Self {
        Self {
            name: name.into(),
            robot,
            selectors: IndexMap::new(),
            states: Vec::new(),
            edges: Vec::new(),
            global_constraints: Vec::new(),
            settings: GraphSettings::default(),
            validator_factory,
            obstacles: Mutex::new(Vec::new()),
        }
    }

    /// Replace the projection settings.
    pub fn with_settings(mut self, settings: GraphSettings) -> GraphResult<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    /// Graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Robot the graph plans for.
    pub fn robot(&self) -> &Arc<dyn Robot> {
        &self.robot
    }

    /// Current projection settings.
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    // ========================================================================
    // Topology authoring
    // ========================================================================

    /// Add a constraint every state and every path must satisfy.
    pub fn add_global_constraint(&mut self, constraint: NumericalConstraint) {
        self.global_constraints.push(constraint);
    }

    /// Global constraints in insertion order.
    pub fn global_constraints(&self) -> &[NumericalConstraint] {
        &self.global_constraints
    }

    /// Append a node selector.
    pub fn create_node_selector(&mut self, name: impl Into<String>) -> GraphResult<NodeSelectorId> {
        let name = name.into();
        if self.selectors.contains_key(&name) {
            return Err(GraphError::DuplicateNodeSelector(name));
        }
        let id = NodeSelectorId(self.selectors.len());
        self.selectors.insert(
            name.clone(),
            NodeSelector {
                id,
                name,
                states: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Append a state to `selector`.
    pub fn create_state(
        &mut self,
        selector: NodeSelectorId,
        name: impl Into<String>,
        constraints: Vec<NumericalConstraint>,
    ) -> GraphResult<StateId> {
        let id = StateId(self.states.len());
        let (_, group) = self
            .selectors
            .get_index_mut(selector.0)
            .ok_or(GraphError::UnknownNodeSelector(selector))?;
        group.states.push(id);
        self.states.push(State {
            id,
            name: name.into(),
            selector,
            constraints,
            edges: Vec::new(),
        });
        Ok(id)
    }

    /// Add an edge leaving `definition.from`.
    pub fn create_edge(&mut self, definition: EdgeDefinition) -> GraphResult<EdgeId> {
        self.state(definition.from)?;
        self.state(definition.to)?;
        if let Some(state) = definition.state {
            self.state(state)?;
        }

        let id = EdgeId(self.edges.len());
        let from = definition.from;
        self.edges.push(Edge::new(id, definition));
        self.states[from.0].edges.push(id);
        Ok(id)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get a node selector by identifier.
    pub fn node_selector(&self, id: NodeSelectorId) -> GraphResult<&NodeSelector> {
        self.selectors
            .get_index(id.0)
            .map(|(_, selector)| selector)
            .ok_or(GraphError::UnknownNodeSelector(id))
    }

    /// Get a node selector by name.
    pub fn node_selector_by_name(&self, name: &str) -> GraphResult<&NodeSelector> {
        self.selectors
            .get(name)
            .ok_or_else(|| GraphError::NodeSelectorNotFound(name.to_string()))
    }

    /// Node selectors in declaration order.
    pub fn node_selectors(&self) -> impl Iterator<Item = &NodeSelector> {
        self.selectors.values()
    }

    /// Get a state by identifier.
    pub fn state(&self, id: StateId) -> GraphResult<&State> {
        self.states.get(id.0).ok_or(GraphError::StateNotFound(id))
    }

    /// Get a state by name.
    pub fn state_by_name(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|state| state.name == name)
    }

    /// All states in creation order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Get an edge by identifier.
    pub fn edge(&self, id: EdgeId) -> GraphResult<&Edge> {
        self.edges.get(id.0).ok_or(GraphError::EdgeNotFound(id))
    }

    /// Get an edge by name.
    pub fn edge_by_name(&self, name: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.name() == name)
    }

    /// All edges in creation order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Whether `q` satisfies the global and the membership constraints of
    /// `state` within the error threshold.
    pub fn state_contains(&self, state: StateId, q: &Configuration) -> GraphResult<bool> {
        self.check_dimension(q)?;
        let state = self.state(state)?;
        let error = self
            .membership_error(state, q)
            .map_err(|error| constraint_error(state.name(), error))?;
        let threshold = self.settings.error_threshold;
        Ok(error <= threshold * threshold)
    }

    /// First state, in declaration order, containing `q`.
    ///
    /// A state whose constraints cannot be evaluated at `q` does not
    /// contain it.
    pub fn get_state(&self, q: &Configuration) -> GraphResult<StateId> {
        self.check_dimension(q)?;
        let threshold = self.settings.error_threshold * self.settings.error_threshold;

        for selector in self.selectors.values() {
            for &id in &selector.states {
                let state = &self.states[id.0];
                match self.membership_error(state, q) {
                    Ok(error) if error <= threshold => return Ok(id),
                    Ok(_) => {}
                    Err(error) => {
                        debug!("State '{}' cannot be evaluated at {}: {}", state.name, q, error);
                    }
                }
            }
        }

        Err(GraphError::ClassificationFailure {
            configuration: q.clone(),
        })
    }

    fn membership_error(&self, state: &State, q: &Configuration) -> ConstraintResult<f64> {
        let mut error = 0.0;
        for constraint in self.global_constraints.iter().chain(state.constraints.iter()) {
            error += constraint.residual(q)?.iter().map(|r| r * r).sum::<f64>();
        }
        Ok(error)
    }

    fn check_dimension(&self, q: &Configuration) -> GraphResult<()> {
        let expected = self.robot.config_size();
        if q.len() != expected {
            return Err(GraphError::DimensionMismatch {
                expected,
                got: q.len(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Edge selection
    // ========================================================================

    /// Draw one outgoing edge per state, proportionally to edge weights.
    pub fn choose_edge<R: Rng + ?Sized>(
        &self,
        states: &[StateId],
        rng: &mut R,
    ) -> GraphResult<Vec<EdgeId>> {
        let mut chosen = Vec::with_capacity(states.len());
        for &id in states {
            let state = self.state(id)?;
            let candidates: Vec<&Edge> = state
                .edges
                .iter()
                .map(|edge| &self.edges[edge.0])
                .filter(|edge| edge.weight() > 0)
                .collect();

            // Summed in u64 so that u32::MAX weights cannot overflow.
            let distribution =
                WeightedIndex::new(candidates.iter().map(|edge| u64::from(edge.weight())))
                    .map_err(|_| GraphError::NoOutgoingEdge {
                        state: state.name.clone(),
                    })?;
            chosen.push(candidates[distribution.sample(rng)].id());
        }
        Ok(chosen)
    }

    // ========================================================================
    // Constraint factories
    // ========================================================================

    fn projector(&self, name: String) -> ConfigProjector {
        let mut projector = ConfigProjector::new(
            name,
            self.settings.max_iterations,
            self.settings.error_threshold,
        );
        projector.extend(self.global_constraints.iter().cloned());
        projector
    }

    /// Projector onto the intersection of `states`.
    pub fn config_constraint(&self, states: &[StateId]) -> GraphResult<ConfigProjector> {
        let names = states
            .iter()
            .map(|&id| self.state(id).map(State::name))
            .collect::<GraphResult<Vec<_>>>()?;
        let mut projector = self.projector(format!("config({})", names.join(", ")));
        for &id in states {
            projector.extend(self.states[id.0].constraints.iter().cloned());
        }
        Ok(projector)
    }

    /// Projector onto the targets of `edges`, restricted to the leaf of the
    /// edge constraints passing through `q`.
    pub fn leaf_config_constraint(
        &self,
        edges: &[EdgeId],
        q: &Configuration,
    ) -> GraphResult<ConfigProjector> {
        self.check_dimension(q)?;
        let mut projector = self.projector(format!("leaf({})", self.edge_names(edges)?));
        for &id in edges {
            let edge = &self.edges[id.0];
            projector.extend(self.states[edge.to().0].constraints.iter().cloned());
            projector.extend(edge.path_constraints().iter().cloned());
        }
        update_leaf(projector, q)
    }

    /// Projector keeping motions along `edges` on the leaf through `q`.
    pub fn path_constraint(
        &self,
        edges: &[EdgeId],
        q: &Configuration,
    ) -> GraphResult<ConfigProjector> {
        self.check_dimension(q)?;
        let mut projector = self.projector(format!("path({})", self.edge_names(edges)?));
        for &id in edges {
            projector.extend(self.edges[id.0].path_constraints().iter().cloned());
        }
        update_leaf(projector, q)
    }

    /// Constraint tag of a segment planned along `edge` from `q`.
    pub fn edge_constraints(&self, edge: EdgeId, q: &Configuration) -> GraphResult<SegmentConstraints> {
        let projector = self.path_constraint(&[edge], q)?;
        Ok(SegmentConstraints::Edge {
            edge,
            projector: Arc::new(projector),
        })
    }

    fn edge_names(&self, edges: &[EdgeId]) -> GraphResult<String> {
        let names = edges
            .iter()
            .map(|&id| self.edge(id).map(Edge::name))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(names.join(", "))
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Iteration bound of every projector built by the graph.
    pub fn max_iterations(&self) -> usize {
        self.settings.max_iterations
    }

    /// Set the iteration bound.
    pub fn set_max_iterations(&mut self, iterations: usize) -> GraphResult<()> {
        let settings = self.settings.with_max_iterations(iterations);
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Error threshold of every projector built by the graph.
    pub fn error_threshold(&self) -> f64 {
        self.settings.error_threshold
    }

    /// Set the error threshold.
    pub fn set_error_threshold(&mut self, threshold: f64) -> GraphResult<()> {
        let settings = self.settings.with_error_threshold(threshold);
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    // ========================================================================
    // Edge validators
    // ========================================================================

    /// Register an obstacle with every edge validator, present and future.
    pub fn add_obstacle(&self, obstacle: Obstacle) {
        let mut obstacles = self.obstacles.lock();
        for edge in &self.edges {
            if let Some(validator) = edge.validator_slot().lock().as_mut() {
                validator.add_obstacle(obstacle.clone());
            }
        }
        info!("Registered obstacle '{}' on graph '{}'", obstacle.name, self.name);
        obstacles.push(obstacle);
    }

    /// Obstacles registered so far.
    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.obstacles.lock().clone()
    }

    /// Dedicated validator of `edge`, built on first access.
    pub fn edge_path_validator(&self, edge: EdgeId) -> GraphResult<MappedMutexGuard<'_, dyn PathValidator>> {
        let edge = self.edge(edge)?;
        let obstacles = self.obstacles.lock();
        let slot = edge.validator_slot().lock();
        Ok(MutexGuard::map(slot, |slot| {
            slot.get_or_insert_with(|| {
                debug!(
                    "Building validator for edge '{}' with {} obstacle(s)",
                    edge.name(),
                    obstacles.len()
                );
                let mut validator = (self.validator_factory)(edge);
                for obstacle in obstacles.iter() {
                    validator.add_obstacle(obstacle.clone());
                }
                validator
            })
            .as_mut()
        }))
    }
}

fn constraint_error(name: &str, error: ConstraintError) -> GraphError {
    GraphError::Constraint {
        name: name.to_string(),
        error: error.to_string(),
    }
}

fn update_leaf(mut projector: ConfigProjector, q: &Configuration) -> GraphResult<ConfigProjector> {
    projector
        .update_right_hand_side(q)
        .map_err(|error| constraint_error(projector.name(), error))?;
    Ok(projector)
}

impl fmt::Display for ConstraintGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph '{}' ({})", self.name, self.robot.name())?;
        for selector in self.selectors.values() {
            writeln!(f, "  NodeSelector '{}'", selector.name)?;
            for &id in &selector.states {
                let state = &self.states[id.0];
                writeln!(f, "    State '{}'", state.name)?;
                for &edge in &state.edges {
                    let edge = &self.edges[edge.0];
                    writeln!(
                        f,
                        "      Edge '{}' -> '{}' ({:?}, weight {})",
                        edge.name(),
                        self.states[edge.to().0].name,
                        edge.kind(),
                        edge.weight()
                    )?;
                }
            }
        }
        Ok(())
    }
}
