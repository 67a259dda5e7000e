/// Workflow graph definition and compilation
///
/// A graph is a set of steps plus exactly one outgoing edge per step: either a
/// direct edge or a router with the list of targets it may return. Compiling
/// builds a petgraph DiGraph to validate the wiring once, up front. Cycles are
/// allowed; the routers are trusted to eventually reach `Next::End`.

use crate::error::{GraphError, WorkflowError};
use crate::workflow::types::{Next, SessionState, StepId};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::HashMap;

/// Pure decision function run on the post-merge state
pub type Router = fn(&SessionState) -> Next;

/// Outgoing edge of a step
#[derive(Clone)]
pub enum Edge {
    /// Always go to the target
    Direct(Next),
    /// Ask the router; it may only return one of `targets`
    Conditional { router: Router, targets: Vec<Next> },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(next) => f.debug_tuple("Direct").field(next).finish(),
            Edge::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("targets", targets)
                .finish_non_exhaustive(),
        }
    }
}

impl Edge {
    fn targets(&self) -> Vec<Next> {
        match self {
            Edge::Direct(next) => vec![*next],
            Edge::Conditional { targets, .. } => targets.clone(),
        }
    }
}

/// Incremental graph definition
#[derive(Debug, Default)]
pub struct GraphBuilder {
    steps: Vec<StepId>,
    edges: HashMap<StepId, Edge>,
    entry: Option<StepId>,
    errors: Vec<GraphError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(mut self, step: StepId) -> Self {
        if self.steps.contains(&step) {
            self.errors.push(GraphError::DuplicateStep(step));
        } else {
            self.steps.push(step);
        }
        self
    }

    /// Step the synthetic start node leads to
    pub fn set_entry(mut self, step: StepId) -> Self {
        self.entry = Some(step);
        self
    }

    pub fn add_edge(self, from: StepId, to: Next) -> Self {
        self.insert_edge(from, Edge::Direct(to))
    }

    pub fn add_conditional_edge(self, from: StepId, router: Router, targets: &[Next]) -> Self {
        self.insert_edge(
            from,
            Edge::Conditional {
                router,
                targets: targets.to_vec(),
            },
        )
    }

    fn insert_edge(mut self, from: StepId, edge: Edge) -> Self {
        if self.edges.insert(from, edge).is_some() {
            self.errors.push(GraphError::DuplicateEdge(from));
        }
        self
    }

    /// Validate the wiring and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        if !self.steps.contains(&entry) {
            return Err(GraphError::UnknownStep(entry));
        }

        tracing::debug!("🏗️ Compiling workflow graph with {} steps", self.steps.len());

        let mut graph: DiGraph<Next, ()> = DiGraph::new();
        let mut index: HashMap<Next, NodeIndex> = HashMap::new();
        for step in &self.steps {
            index.insert(Next::Step(*step), graph.add_node(Next::Step(*step)));
        }
        let end_index = graph.add_node(Next::End);
        index.insert(Next::End, end_index);

        for step in &self.steps {
            let edge = self.edges.get(step).ok_or(GraphError::MissingEdge(*step))?;
            for target in edge.targets() {
                let to = match index.get(&target) {
                    Some(to) => *to,
                    None => match target {
                        Next::Step(unknown) => return Err(GraphError::UnknownStep(unknown)),
                        Next::End => end_index,
                    },
                };
                graph.add_edge(index[&Next::Step(*step)], to, ());
                tracing::debug!("  🔗 Added edge: '{}' → '{}'", step, target);
            }
        }
        if let Some(from) = self.edges.keys().find(|from| !self.steps.contains(from)) {
            return Err(GraphError::UnknownStep(*from));
        }

        let entry_index = index[&Next::Step(entry)];
        let mut reachable = Vec::new();
        let mut dfs = Dfs::new(&graph, entry_index);
        while let Some(node) = dfs.next(&graph) {
            reachable.push(graph[node]);
        }
        if let Some(step) = self
            .steps
            .iter()
            .find(|step| !reachable.contains(&Next::Step(**step)))
        {
            return Err(GraphError::Unreachable(*step));
        }
        if !has_path_connecting(&graph, entry_index, end_index, None) {
            return Err(GraphError::NoTermination);
        }

        tracing::debug!("✅ Workflow graph validated (entry: {})", entry);

        Ok(CompiledGraph {
            entry,
            edges: self.edges,
        })
    }
}

/// Validated, immutable workflow graph
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    entry: StepId,
    edges: HashMap<StepId, Edge>,
}

impl CompiledGraph {
    pub fn entry(&self) -> StepId {
        self.entry
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.edges.contains_key(&step)
    }

    /// Decide where control goes after `step`, given the post-merge state
    pub fn next_after(&self, step: StepId, state: &SessionState) -> Result<Next, WorkflowError> {
        let edge = self.edges.get(&step).ok_or_else(|| {
            WorkflowError::MalformedState(format!("step '{}' is not part of the graph", step))
        })?;

        match edge {
            Edge::Direct(next) => Ok(*next),
            Edge::Conditional { router, targets } => {
                let next = router(state);
                if targets.contains(&next) {
                    Ok(next)
                } else {
                    Err(WorkflowError::MalformedState(format!(
                        "router after '{}' returned undeclared target '{}'",
                        step, next
                    )))
                }
            }
        }
    }
}
