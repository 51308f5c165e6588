//! In-memory snapshot of the dependency graph
//!
//! Materialized from storage for audits and traversal queries. Uses
//! petgraph for graph operations. Edges run predecessor -> successor.
//!
//! This type never enforces acyclicity itself; it can hold whatever the
//! store contains, which is exactly what the integrity audit needs.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::id::TaskRef;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency graph contains a cycle: {}", format_cycle(.0))]
    Cycle(Vec<TaskRef>),
}

fn format_cycle(cycle: &[TaskRef]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A snapshot of tasks and their dependency edges
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph; edge direction is pred -> succ
    graph: DiGraph<TaskRef, ()>,

    /// Map from TaskRef to node index
    node_map: HashMap<TaskRef, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Adds a task node (no-op if already present)
    pub fn add_task(&mut self, task: TaskRef) {
        if !self.node_map.contains_key(&task) {
            let idx = self.graph.add_node(task.clone());
            self.node_map.insert(task, idx);
        }
    }

    /// Removes a task node and all its edges
    pub fn remove_task(&mut self, task: &TaskRef) -> bool {
        if let Some(idx) = self.node_map.remove(task) {
            self.graph.remove_node(idx);
            // petgraph may reuse indices after removal, so rebuild the map
            self.rebuild_node_map();
            true
        } else {
            false
        }
    }

    fn rebuild_node_map(&mut self) {
        self.node_map.clear();
        for idx in self.graph.node_indices() {
            if let Some(task) = self.graph.node_weight(idx) {
                self.node_map.insert(task.clone(), idx);
            }
        }
    }

    /// Adds an edge pred -> succ, creating missing endpoint nodes
    ///
    /// The snapshot accepts any edge, including cycle-closing ones; callers
    /// that need validation run it against the live store first.
    pub fn add_edge(&mut self, pred: TaskRef, succ: TaskRef) {
        self.add_task(pred.clone());
        self.add_task(succ.clone());
        let pred_idx = self.node_map[&pred];
        let succ_idx = self.node_map[&succ];
        if self.graph.find_edge(pred_idx, succ_idx).is_none() {
            self.graph.add_edge(pred_idx, succ_idx, ());
        }
    }

    /// Removes an edge pred -> succ
    pub fn remove_edge(&mut self, pred: &TaskRef, succ: &TaskRef) -> bool {
        let (Some(&pred_idx), Some(&succ_idx)) =
            (self.node_map.get(pred), self.node_map.get(succ))
        else {
            return false;
        };

        if let Some(edge) = self.graph.find_edge(pred_idx, succ_idx) {
            self.graph.remove_edge(edge);
            true
        } else {
            false
        }
    }

    /// Returns the direct predecessors of a task
    pub fn predecessors(&self, task: &TaskRef) -> Vec<TaskRef> {
        self.neighbors(task, petgraph::Direction::Incoming)
    }

    /// Returns the direct successors of a task
    pub fn successors(&self, task: &TaskRef) -> Vec<TaskRef> {
        self.neighbors(task, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, task: &TaskRef, direction: petgraph::Direction) -> Vec<TaskRef> {
        let Some(&idx) = self.node_map.get(task) else {
            return vec![];
        };

        self.graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task: &TaskRef) -> bool {
        self.node_map.contains_key(task)
    }

    /// Returns the number of tasks in the graph
    pub fn task_count(&self) -> usize {
        self.node_map.len()
    }

    /// Returns the number of edges in the graph
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if the graph has no tasks
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Returns all tasks in topological order (predecessors first)
    pub fn topological_order(&self) -> Result<Vec<TaskRef>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(_) => Err(GraphError::Cycle(self.find_cycle().unwrap_or_default())),
        }
    }

    /// Finds one cycle in the graph, if any exists
    ///
    /// Returns the cycle as a task sequence where each task has an edge to
    /// the next and the last has an edge back to the first.
    pub fn find_cycle(&self) -> Option<Vec<TaskRef>> {
        let mut colors: HashMap<NodeIndex, Color> = self
            .graph
            .node_indices()
            .map(|idx| (idx, Color::White))
            .collect();

        for start in self.graph.node_indices() {
            if colors[&start] != Color::White {
                continue;
            }

            let mut path: Vec<NodeIndex> = Vec::new();
            if let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path) {
                return Some(cycle);
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<TaskRef>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for next in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            match colors.get(&next).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    // Back edge: the cycle is the path suffix from `next`
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    return Some(
                        path[start..]
                            .iter()
                            .filter_map(|&n| self.graph.node_weight(n).cloned())
                            .collect(),
                    );
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_cycle(next, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        colors.insert(node, Color::Black);
        path.pop();
        None
    }
}

/// DFS node state for cycle search
#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectId;

    fn make_ref(number: i64) -> TaskRef {
        ProjectId::new("p-test").unwrap().task(number)
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.task_count(), 0);
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn add_edge_creates_nodes() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);

        graph.add_edge(a.clone(), b.clone());

        assert_eq!(graph.task_count(), 2);
        assert_eq!(graph.successors(&a), vec![b.clone()]);
        assert_eq!(graph.predecessors(&b), vec![a]);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(a, b);

        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn remove_edge() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);

        graph.add_edge(a.clone(), b.clone());

        assert!(graph.remove_edge(&a, &b));
        assert!(!graph.remove_edge(&a, &b));
        assert!(graph.successors(&a).is_empty());
    }

    #[test]
    fn remove_task_drops_its_edges() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);
        let c = make_ref(3);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(b.clone(), c.clone());

        assert!(graph.remove_task(&b));
        assert!(!graph.contains(&b));
        assert!(graph.successors(&a).is_empty());
        assert!(graph.predecessors(&c).is_empty());
    }

    #[test]
    fn finds_simple_cycle() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(b, a);

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.len(), 2);
    }

    #[test]
    fn finds_longer_cycle() {
        let mut graph = DependencyGraph::new();
        let refs: Vec<_> = (1..=4).map(make_ref).collect();

        graph.add_edge(refs[0].clone(), refs[1].clone());
        graph.add_edge(refs[1].clone(), refs[2].clone());
        graph.add_edge(refs[2].clone(), refs[3].clone());
        graph.add_edge(refs[3].clone(), refs[1].clone());

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.len(), 3); // 2 -> 3 -> 4 -> back to 2
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);
        let c = make_ref(3);
        let d = make_ref(4);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(a.clone(), c.clone());
        graph.add_edge(b, d.clone());
        graph.add_edge(c, d);

        assert!(graph.find_cycle().is_none());
        assert!(graph.topological_order().is_ok());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);

        // The store rejects self-loops, but the snapshot must survive one.
        graph.add_task(a.clone());
        let idx = graph.node_map[&a];
        graph.graph.add_edge(idx, idx, ());

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec![a]);
    }

    #[test]
    fn topological_order_respects_edges() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);
        let c = make_ref(3);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(b.clone(), c.clone());

        let order = graph.topological_order().unwrap();
        let pos = |t: &TaskRef| order.iter().position(|x| x == t).unwrap();

        assert!(pos(&a) < pos(&b));
        assert!(pos(&b) < pos(&c));
    }

    #[test]
    fn topological_order_reports_cycle() {
        let mut graph = DependencyGraph::new();
        let a = make_ref(1);
        let b = make_ref(2);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(b, a);

        assert!(matches!(
            graph.topological_order(),
            Err(GraphError::Cycle(_))
        ));
    }

    #[test]
    fn cross_project_edges_share_one_graph() {
        let mut graph = DependencyGraph::new();
        let a = ProjectId::new("alpha").unwrap().task(1);
        let b = ProjectId::new("beta").unwrap().task(1);
        let c = ProjectId::new("alpha").unwrap().task(2);

        graph.add_edge(a.clone(), b.clone());
        graph.add_edge(b.clone(), c.clone());
        graph.add_edge(c, a);

        assert!(graph.find_cycle().is_some());
    }
}
