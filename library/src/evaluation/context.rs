//! Evaluation context: dirty tracking, result caches and the frame stack.

use log::{debug, error, trace, warn};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use uuid::Uuid;

use super::prepared::PreparedGraph;
use super::query::GraphQuery;
use super::report::{EvaluationFailure, EvaluationReport};
use super::state::NodeState;
use crate::config::EvalConfig;
use crate::error::{EvalError, ExecError};
use crate::model::node::NodeId;
use crate::model::value::Value;
use crate::util::timing::ScopedTimer;

/// Value and state caches of one evaluation level.
///
/// `graph` overrides the context's own snapshot while a function body runs
/// in this frame. Ignored inputs are per frame so a nested execution of a
/// node never replaces the entries that shield it in the base frame.
#[derive(Default)]
struct Frame {
    values: HashMap<NodeId, Value>,
    states: HashMap<NodeId, NodeState>,
    ignored_inputs: HashSet<(NodeId, usize)>,
    graph: Option<Rc<PreparedGraph>>,
}

impl Frame {
    fn new(graph: Option<Rc<PreparedGraph>>) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }
}

/// Owns everything needed to evaluate one graph incrementally.
///
/// The context only stores node ids; the graph itself is passed to
/// [`prepare`](Self::prepare) and [`evaluate`](Self::evaluate).
pub struct EvalContext {
    id: Uuid,
    config: EvalConfig,
    destinies: Vec<NodeId>,
    dirty_sources: HashSet<NodeId>,
    topo_dirty: bool,
    prepared: Option<Rc<PreparedGraph>>,
    /// `frames[0]` is the base frame; the last one is active.
    frames: Vec<Frame>,
    messages: HashMap<NodeId, String>,
    busy: bool,
    preparing: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl EvalContext {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            destinies: Vec::new(),
            dirty_sources: HashSet::new(),
            topo_dirty: true,
            prepared: None,
            frames: vec![Frame::default()],
            messages: HashMap::new(),
            busy: false,
            preparing: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    // --- Destinies and dirtiness ---

    pub fn add_destiny(&mut self, id: NodeId) {
        if !self.destinies.contains(&id) {
            self.destinies.push(id);
            self.topo_dirty = true;
        }
    }

    pub fn clear_destinies(&mut self) {
        if !self.destinies.is_empty() {
            self.destinies.clear();
            self.topo_dirty = true;
        }
    }

    pub fn destinies(&self) -> &[NodeId] {
        &self.destinies
    }

    /// Mark `id` dirty now; its dependents are dirtied by the next prepare.
    pub fn add_dirty_source(&mut self, id: NodeId) {
        self.dirty_sources.insert(id);
        self.mark_dirty(id);
    }

    /// Nodes never evaluated in the active frame count as dirty.
    pub fn is_dirty(&self, id: NodeId) -> bool {
        matches!(self.state_of(id), None | Some(NodeState::Dirty))
    }

    pub fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.frame().states.get(&id).copied()
    }

    pub fn message_of(&self, id: NodeId) -> Option<&str> {
        self.messages.get(&id).map(String::as_str)
    }

    /// Last computed value, only while the node is `Normal`.
    pub fn cached_value(&self, id: NodeId) -> Option<&Value> {
        let frame = self.frame();
        match frame.states.get(&id) {
            Some(NodeState::Normal) => frame.values.get(&id),
            _ => None,
        }
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Number of frames pushed above the base frame.
    pub fn frame_depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn prepared_graph(&self) -> Option<Rc<PreparedGraph>> {
        self.prepared.clone()
    }

    pub fn is_input_ignored(&self, node: NodeId, slot: usize) -> bool {
        self.frame().ignored_inputs.contains(&(node, slot))
    }

    pub fn input_count(&self, node: NodeId) -> usize {
        self.active_graph()
            .and_then(|graph| graph.node(node).map(|n| n.inputs.len()))
            .unwrap_or(0)
    }

    pub fn is_input_connected(&self, node: NodeId, slot: usize) -> bool {
        self.active_graph()
            .is_some_and(|graph| graph.input_source(node, slot).is_some())
    }

    /// Drop every cache, message and the snapshot. Error states only clear
    /// through this or a fresh dirty mark.
    pub fn reset(&mut self) -> Result<(), EvalError> {
        if self.busy {
            warn!("Evaluation is running, cannot reset context {}", self.id);
            return Err(EvalError::busy("cannot reset while an evaluation is running"));
        }
        self.dirty_sources.clear();
        self.topo_dirty = true;
        self.prepared = None;
        self.frames = vec![Frame::default()];
        self.messages.clear();
        debug!("Context {} reset", self.id);
        Ok(())
    }

    // --- Prepare ---

    /// Bring the snapshot and the dirty flags up to date with `graph`.
    ///
    /// Returns whether anything changed since the last pass. A nested call is
    /// a no-op; a call during evaluation is refused.
    pub fn prepare(&mut self, graph: &mut dyn GraphQuery) -> Result<bool, EvalError> {
        if self.preparing {
            return Ok(false);
        }
        if self.busy {
            warn!("Evaluation is running, cannot prepare context {}", self.id);
            return Err(EvalError::busy("cannot prepare while an evaluation is running"));
        }
        self.preparing = true;
        // Prepare hooks may panic; clear the flag before unwinding further.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.prepare_pass(graph)));
        self.preparing = false;
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn prepare_pass(&mut self, graph: &mut dyn GraphQuery) -> Result<bool, EvalError> {
        let _timer = ScopedTimer::debug_lazy(|| format!("prepare context {}", self.id));

        let changes = graph.take_changes();
        let mut changed = !changes.is_empty();
        if changes.topology_changed {
            self.topo_dirty = true;
        }
        for id in changes.dirty {
            self.add_dirty_source(id);
        }

        if self.topo_dirty || self.prepared.is_none() {
            self.prepared = None;
            let rebuilt = PreparedGraph::build(graph, &self.destinies)?;
            self.prepared = Some(Rc::new(rebuilt));
            self.topo_dirty = false;
            changed = true;
        }

        changed |= self.propagate_dirty(graph)?;

        if let Some(mut snapshot) = self.prepared.take() {
            let refreshed = self.refresh_nodes(Rc::make_mut(&mut snapshot), graph);
            self.prepared = Some(snapshot);
            changed |= refreshed?;
        }

        if self.config.collect_garbage {
            self.collect_garbage(graph);
        }
        Ok(changed)
    }

    fn propagate_dirty(&mut self, graph: &mut dyn GraphQuery) -> Result<bool, EvalError> {
        if self.dirty_sources.is_empty() {
            return Ok(false);
        }
        let sources: Vec<NodeId> = self.dirty_sources.drain().collect();
        for id in &sources {
            trace!("dirty source: {}", id);
            self.mark_dirty(*id);
        }

        let downstream = graph.traverse_downstream(&sources)?;
        for traversed in downstream {
            if self.is_dirty(traversed.id) {
                continue;
            }
            let dirty = traversed.inputs.iter().enumerate().any(|(slot, source)| {
                !self.frames[0].ignored_inputs.contains(&(traversed.id, slot))
                    && source.is_some_and(|source| self.is_dirty(source))
            });
            if dirty {
                if let Some(node) = graph.resolve(traversed.id) {
                    trace!("mark {} dirty", node.name());
                }
                self.mark_dirty(traversed.id);
            }
        }
        Ok(true)
    }

    /// Re-freeze parameters, run node prepare hooks, refresh executors and
    /// dirty every node with a dirty input or extra dependency.
    fn refresh_nodes(
        &mut self,
        snapshot: &mut PreparedGraph,
        graph: &mut dyn GraphQuery,
    ) -> Result<bool, EvalError> {
        let mut changed = false;
        for position in 0..snapshot.len() {
            let Some((id, inputs)) = snapshot.node_at(position).map(|n| (n.id, n.inputs.clone()))
            else {
                continue;
            };
            let mut dirty = self.is_dirty(id);

            let node = graph.resolve_mut(id).ok_or_else(|| {
                EvalError::malformed(format!("prepared node {} no longer exists", id))
            })?;
            let refrozen = if node.parameters_changed() {
                Some(node.freeze_parameters())
            } else {
                None
            };
            let hook_dirty = node.prepare();
            let executor = node.executor();
            let extra_dependencies = node.extra_dependencies();

            if refrozen.is_some() || hook_dirty {
                dirty = true;
                changed = true;
            }
            if let Some(prepared) = snapshot.node_at_mut(position) {
                if let Some(parameters) = refrozen {
                    prepared.parameters = Rc::new(parameters);
                }
                prepared.executor = executor;
            }

            if !dirty {
                dirty = inputs.iter().enumerate().any(|(slot, source)| {
                    !self.frames[0].ignored_inputs.contains(&(id, slot))
                        && source
                            .and_then(|position| snapshot.node_at(position))
                            .is_some_and(|source| self.is_dirty(source.id))
                });
            }
            if !dirty {
                // Unknown extra dependencies do not count as dirty.
                dirty = extra_dependencies
                    .iter()
                    .any(|dependency| self.state_of(*dependency) == Some(NodeState::Dirty));
            }
            if dirty {
                self.mark_dirty(id);
            }
        }
        Ok(changed)
    }

    fn collect_garbage(&mut self, graph: &dyn GraphQuery) {
        let base = &mut self.frames[0];
        let before = base.states.len() + base.values.len();
        base.values.retain(|id, _| graph.resolve(*id).is_some());
        base.states.retain(|id, _| graph.resolve(*id).is_some());
        base.ignored_inputs
            .retain(|(id, _)| graph.resolve(*id).is_some());
        let removed = before - (base.states.len() + base.values.len());
        self.messages.retain(|id, _| graph.resolve(*id).is_some());
        if removed > 0 {
            debug!("Purged {} cache entries of deleted nodes", removed);
        }
    }

    // --- Pull API ---

    /// Value of `node` in the active frame, computing it if needed.
    pub fn get_result(&mut self, node: NodeId) -> Result<Value, ExecError> {
        let graph = self
            .active_graph()
            .ok_or_else(|| ExecError::failure("graph has not been prepared"))?;
        let prepared = graph.node(node).ok_or_else(|| {
            ExecError::failure(format!("node {} is not part of the prepared graph", node))
        })?;

        match self.state_of(node) {
            Some(NodeState::Normal) => {
                if let Some(value) = self.frame().values.get(&node) {
                    if self.config.trace_values {
                        trace!("cached {} -> {}", prepared.name, value);
                    }
                    return Ok(value.clone());
                }
            }
            Some(NodeState::Busy) => {
                return Err(ExecError::failure(format!(
                    "{} is already being evaluated",
                    prepared.name
                )));
            }
            _ => {}
        }

        self.frame_mut().ignored_inputs.retain(|(id, _)| *id != node);
        self.set_state(node, NodeState::Busy);

        let depth = self.frames.len();
        let result = prepared.executor.execute(&prepared.parameters, self);
        self.restore_depth(depth, &prepared.name);

        match result {
            Ok(value) => {
                if self.config.trace_values {
                    trace!("eval {} -> {}", prepared.name, value);
                }
                self.frame_mut().values.insert(node, value.clone());
                self.set_state(node, NodeState::Normal);
                self.messages.remove(&node);
                Ok(value)
            }
            Err(ExecError::Source(message)) => {
                self.set_state(node, NodeState::SourceError);
                self.messages.insert(node, message.clone());
                Err(ExecError::Source(message))
            }
            Err(ExecError::Failure(message)) => {
                self.set_state(node, NodeState::Error);
                let wrapped = format!("error evaluating {}: {}", prepared.name, message);
                self.messages.insert(node, message);
                Err(ExecError::Source(wrapped))
            }
        }
    }

    /// Value flowing into `slot` of `node`; `Value::None` when unconnected.
    pub fn fetch_input(&mut self, node: NodeId, slot: usize) -> Result<Value, ExecError> {
        let graph = self
            .active_graph()
            .ok_or_else(|| ExecError::failure("graph has not been prepared"))?;
        let prepared = graph.node(node).ok_or_else(|| {
            ExecError::failure(format!("node {} is not part of the prepared graph", node))
        })?;
        let source = prepared.inputs.get(slot).ok_or_else(|| {
            ExecError::failure(format!("{} has no input slot {}", prepared.name, slot))
        })?;
        match source.and_then(|position| graph.node_at(position)) {
            Some(source) => self.get_result(source.id),
            None => Ok(Value::None),
        }
    }

    pub fn ignore_input(&mut self, node: NodeId, slot: usize) {
        self.frame_mut().ignored_inputs.insert((node, slot));
    }

    // --- Frames ---

    /// Install fresh caches for a nested evaluation of the same graph.
    pub fn push(&mut self) {
        let graph = self.frame().graph.clone();
        self.frames.push(Frame::new(graph));
    }

    /// Install fresh caches for evaluating `body` instead of the context's graph.
    pub fn push_graph(&mut self, body: Rc<PreparedGraph>) {
        self.frames.push(Frame::new(Some(body)));
    }

    pub fn pop(&mut self) -> Result<(), EvalError> {
        if self.frames.len() <= 1 {
            return Err(EvalError::FrameUnderflow);
        }
        self.frames.pop();
        Ok(())
    }

    /// Seed `node` in the active frame as computed.
    pub fn put_value(&mut self, node: NodeId, value: Value) {
        let frame = self.frame_mut();
        frame.values.insert(node, value);
        frame.states.insert(node, NodeState::Normal);
    }

    /// Evaluate `output` of `body` in a fresh frame with `arguments` seeded.
    pub fn invoke(
        &mut self,
        body: Rc<PreparedGraph>,
        arguments: &[(NodeId, Value)],
        output: NodeId,
    ) -> Result<Value, ExecError> {
        if self.frame_depth() >= self.config.max_call_depth {
            return Err(ExecError::source(format!(
                "maximum call depth of {} exceeded",
                self.config.max_call_depth
            )));
        }
        self.push_graph(body);
        for (placeholder, value) in arguments {
            self.put_value(*placeholder, value.clone());
        }
        let result = self.get_result(output);
        self.pop()?;
        result
    }

    // --- Evaluate ---

    /// Prepare, then pull every dirty destiny.
    ///
    /// Execution failures do not make this return `Err`; they end the pull
    /// and are described in the report. A panicking executor counts as a
    /// failure: the nodes it left Busy are demoted to Error. `Err` means the
    /// graph could not be prepared or an evaluation is already running.
    ///
    /// Messages are not cleared here. A failed node keeps its message through
    /// passes that do not recompute it, until it is dirtied or the context
    /// is reset.
    pub fn evaluate(&mut self, graph: &mut dyn GraphQuery) -> Result<EvaluationReport, EvalError> {
        if self.busy {
            warn!("Evaluation is running, cannot evaluate context {}", self.id);
            return Err(EvalError::busy("an evaluation is already running"));
        }
        let _timer = ScopedTimer::debug_lazy(|| format!("evaluate context {}", self.id));

        self.prepare(graph)?;

        let mut report = EvaluationReport::default();
        let Some(prepared) = self.prepared.clone() else {
            return Ok(report);
        };
        let dirty: Vec<NodeId> = self
            .destinies
            .iter()
            .copied()
            .filter(|destiny| prepared.contains(*destiny) && self.is_dirty(*destiny))
            .collect();
        if dirty.is_empty() {
            return Ok(report);
        }

        graph.set_read_only(true);
        self.busy = true;
        let mut aborted = None;
        for destiny in dirty {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.get_result(destiny)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    aborted = Some(message.clone());
                    Err(ExecError::failure(format!("panicked: {}", message)))
                });
            match outcome {
                Ok(_) => report.pulled.push(destiny),
                Err(err) => {
                    error!("Caught failure while evaluating {}: {}", destiny, err);
                    report.failure = Some(EvaluationFailure {
                        destiny,
                        error: err,
                    });
                    break;
                }
            }
        }
        if self.frames.len() > 1 {
            warn!("{} frames left on the stack after evaluation", self.frames.len() - 1);
            self.frames.truncate(1);
        }
        report.demoted = self.demote_busy(aborted.as_deref().unwrap_or("evaluation aborted"));
        self.busy = false;
        graph.set_read_only(false);
        Ok(report)
    }

    fn demote_busy(&mut self, reason: &str) -> Vec<NodeId> {
        let mut demoted: Vec<NodeId> = self.frames[0]
            .states
            .iter()
            .filter(|(_, state)| **state == NodeState::Busy)
            .map(|(id, _)| *id)
            .collect();
        demoted.sort();
        for id in &demoted {
            self.frames[0].states.insert(*id, NodeState::Error);
            self.messages
                .entry(*id)
                .or_insert_with(|| reason.to_string());
        }
        demoted
    }

    // --- Helpers ---

    fn frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn active_graph(&self) -> Option<Rc<PreparedGraph>> {
        self.frame().graph.clone().or_else(|| self.prepared.clone())
    }

    fn set_state(&mut self, id: NodeId, state: NodeState) {
        let frame = self.frame_mut();
        if state != NodeState::Normal {
            frame.values.remove(&id);
        }
        frame.states.insert(id, state);
    }

    fn mark_dirty(&mut self, id: NodeId) {
        self.set_state(id, NodeState::Dirty);
        self.messages.remove(&id);
    }

    /// Executors must leave the stack as they found it.
    fn restore_depth(&mut self, depth: usize, name: &str) {
        if self.frames.len() > depth {
            warn!(
                "{} left {} frames pushed, dropping them",
                name,
                self.frames.len() - depth
            );
            self.frames.truncate(depth);
        }
        while self.frames.len() < depth {
            warn!("{} popped a frame it did not push", name);
            let graph = self.frame().graph.clone();
            self.frames.push(Frame::new(graph));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
