//! Dependency graph over phase ids, built on `petgraph`.
//!
//! Edges point from a dependency to its dependent, so a topological order is
//! an execution order and its reverse is a rollback order.

use std::collections::{HashMap, HashSet, VecDeque};

use gantry_core::PhaseId;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::PlanError;
use crate::phase::PhaseSpec;
use crate::plan::Plan;

/// Directed graph of phase dependencies.
#[derive(Debug, Clone)]
pub struct PhaseGraph {
    graph: DiGraph<PhaseId, ()>,
    index: HashMap<PhaseId, NodeIndex>,
}

impl PhaseGraph {
    /// Build a graph from `(id, dependencies)` pairs.
    ///
    /// Fails on duplicate ids and on dependencies naming unknown phases. Cycles
    /// are accepted here; use [`find_cycle`](Self::find_cycle) to detect them.
    pub fn new<'a, I>(phases: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = (&'a PhaseId, &'a [PhaseId])>,
    {
        let phases: Vec<_> = phases.into_iter().collect();
        let mut graph = DiGraph::with_capacity(phases.len(), phases.len());
        let mut index = HashMap::with_capacity(phases.len());

        for (id, _) in &phases {
            if index.contains_key(*id) {
                return Err(PlanError::DuplicatePhase((*id).clone()));
            }
            index.insert((*id).clone(), graph.add_node((*id).clone()));
        }

        for (id, dependencies) in &phases {
            let to = index[*id];
            for dependency in *dependencies {
                let from = index
                    .get(dependency)
                    .ok_or_else(|| PlanError::InvalidReference {
                        phase: (*id).clone(),
                        dependency: dependency.clone(),
                    })?;
                graph.update_edge(*from, to, ());
            }
        }

        Ok(Self { graph, index })
    }

    /// Build from phase declarations.
    pub fn from_specs(specs: &[PhaseSpec]) -> Result<Self, PlanError> {
        Self::new(specs.iter().map(|s| (&s.id, s.dependencies.as_slice())))
    }

    /// Build from a plan's phases.
    pub fn from_plan(plan: &Plan) -> Result<Self, PlanError> {
        Self::new(plan.phases.iter().map(|p| (p.id(), p.dependencies())))
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` for a graph with no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns `true` if the graph contains at least one cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        algo::is_cyclic_directed(&self.graph)
    }

    /// One cycle in dependency order, first id repeated at the end.
    ///
    /// Nodes are explored in insertion order, so the reported cycle is stable.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<PhaseId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::New; self.graph.node_count()];
        for root in self.graph.node_indices() {
            if marks[root.index()] != Mark::New {
                continue;
            }
            // Iterative DFS keeping the current path and each frame's pending successors.
            let mut path: Vec<NodeIndex> = vec![root];
            let mut pending: Vec<Vec<NodeIndex>> = vec![self.ordered_successors(root)];
            marks[root.index()] = Mark::OnPath;

            while let Some(frame) = pending.last_mut() {
                if let Some(next) = frame.pop() {
                    match marks[next.index()] {
                        Mark::New => {
                            marks[next.index()] = Mark::OnPath;
                            path.push(next);
                            pending.push(self.ordered_successors(next));
                        }
                        Mark::OnPath => {
                            let start = path.iter().position(|&n| n == next).unwrap_or(0);
                            let mut cycle: Vec<PhaseId> = path[start..]
                                .iter()
                                .map(|&n| self.graph[n].clone())
                                .collect();
                            cycle.push(self.graph[next].clone());
                            return Some(cycle);
                        }
                        Mark::Done => {}
                    }
                } else {
                    pending.pop();
                    if let Some(done) = path.pop() {
                        marks[done.index()] = Mark::Done;
                    }
                }
            }
        }
        None
    }

    /// Successors sorted so that `pop()` yields them in insertion order.
    fn ordered_successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut next: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        next.sort_by(|a, b| b.cmp(a));
        next
    }

    /// Phases ordered so that every dependency precedes its dependents.
    pub fn topological_order(&self) -> Result<Vec<PhaseId>, PlanError> {
        let sorted = algo::toposort(&self.graph, None).map_err(|_| self.cycle_error())?;
        Ok(sorted.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    /// Group phases into levels (Kahn's algorithm): every phase in a level
    /// depends only on phases in earlier levels.
    pub fn levels(&self) -> Result<Vec<Vec<PhaseId>>, PlanError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();
        let mut levels = Vec::new();
        let mut visited = 0;

        while !ready.is_empty() {
            let mut current: Vec<NodeIndex> = ready.drain(..).collect();
            current.sort();
            visited += current.len();
            for &node in &current {
                for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    in_degree[next.index()] -= 1;
                    if in_degree[next.index()] == 0 {
                        ready.push_back(next);
                    }
                }
            }
            levels.push(current.into_iter().map(|n| self.graph[n].clone()).collect());
        }

        if visited == self.graph.node_count() {
            Ok(levels)
        } else {
            Err(self.cycle_error())
        }
    }

    /// Direct dependencies of `id`.
    #[must_use]
    pub fn dependencies(&self, id: &PhaseId) -> Vec<PhaseId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Phases that directly depend on `id`.
    #[must_use]
    pub fn dependents(&self, id: &PhaseId) -> Vec<PhaseId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Every phase reachable from `id` through dependent edges, excluding `id`.
    #[must_use]
    pub fn transitive_dependents(&self, id: &PhaseId) -> HashSet<PhaseId> {
        let mut seen = HashSet::new();
        let Some(&start) = self.index.get(id) else {
            return seen;
        };
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if seen.insert(self.graph[next].clone()) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Phases with no dependencies.
    #[must_use]
    pub fn entry_phases(&self) -> Vec<PhaseId> {
        self.graph
            .externals(Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    fn neighbors(&self, id: &PhaseId, direction: Direction) -> Vec<PhaseId> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
        out.sort();
        out.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    fn cycle_error(&self) -> PlanError {
        PlanError::CyclicDependency {
            cycle: self.find_cycle().unwrap_or_default(),
        }
    }
}
