// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A directed graph of string vertex ids with cycle detection and a stable
//! topological sort.
//!
//! Used by workflow submission to validate a spec's job `requires` edges
//! before any job is persisted (spec §4.1).

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate vertex: {0}")]
    DuplicateVertex(String),

    #[error("vertex not found: {0}")]
    VertexNotFound(String),

    #[error("dependency cycle detected")]
    Cycle,
}

impl GraphError {
    /// Maps onto the behavioral kinds named in spec §7; callers at the
    /// service boundary convert every subsystem error through this.
    pub fn into_core_error(self) -> cw_core::CoreError {
        match self {
            GraphError::DuplicateVertex(id) => cw_core::CoreError::DuplicateVertex(id),
            GraphError::VertexNotFound(id) => cw_core::CoreError::UnknownJobRef(id),
            GraphError::Cycle => cw_core::CoreError::Cycle,
        }
    }
}

/// A directed graph keyed by vertex id, each recording its parent ids.
///
/// Insertion order is preserved (backed by [`IndexMap`]) since
/// [`Dag::topo_sort`] breaks ties between equally-ready vertices by the
/// order they were added.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    vertices: IndexMap<String, Vec<String>>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Record `id` and its parent list verbatim. Fails with
    /// [`GraphError::DuplicateVertex`] if `id` is already present; parents
    /// need not exist yet (callers add all vertices before `validate`).
    pub fn add_vertex(&mut self, id: impl Into<String>, parents: Vec<String>) -> Result<(), GraphError> {
        let id = id.into();
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        self.vertices.insert(id, parents);
        Ok(())
    }

    /// Fails with [`GraphError::VertexNotFound`] if any recorded parent id
    /// is not itself a known vertex.
    pub fn validate(&self) -> Result<(), GraphError> {
        for parents in self.vertices.values() {
            for parent in parents {
                if !self.vertices.contains_key(parent) {
                    return Err(GraphError::VertexNotFound(parent.clone()));
                }
            }
        }
        Ok(())
    }

    /// DFS with gray/black coloring. Assumes `validate` already passed;
    /// unknown parents are treated as absent edges.
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: HashMap<&str, Color> =
            self.vertices.keys().map(|k| (k.as_str(), Color::White)).collect();

        fn visit<'a>(
            id: &'a str,
            vertices: &'a IndexMap<String, Vec<String>>,
            colors: &mut HashMap<&'a str, Color>,
        ) -> bool {
            match colors.get(id) {
                Some(Color::Gray) => return true,
                Some(Color::Black) => return false,
                _ => {}
            }
            colors.insert(id, Color::Gray);
            if let Some(parents) = vertices.get(id) {
                for parent in parents {
                    if let Some((key, _)) = vertices.get_key_value(parent.as_str()) {
                        if visit(key.as_str(), vertices, colors) {
                            return true;
                        }
                    }
                }
            }
            colors.insert(id, Color::Black);
            false
        }

        for id in self.vertices.keys() {
            if visit(id.as_str(), &self.vertices, &mut colors) {
                return true;
            }
        }
        false
    }

    /// Kahn's algorithm. Seeds the queue with in-degree-zero vertices in
    /// insertion order; on emitting a vertex, decrements its children's
    /// in-degree and enqueues any that reach zero. Fails with
    /// [`GraphError::Cycle`] if the emitted count ends up short of the
    /// vertex count (including the degenerate case of a non-empty graph
    /// with no zero-in-degree vertex at all).
    pub fn topo_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(self.vertices.len());
        let mut children: HashMap<&str, Vec<&str>> = HashMap::with_capacity(self.vertices.len());
        for id in self.vertices.keys() {
            in_degree.insert(id.as_str(), 0);
            children.entry(id.as_str()).or_default();
        }
        for (id, parents) in &self.vertices {
            let known: HashSet<&str> =
                parents.iter().map(String::as_str).filter(|p| self.vertices.contains_key(*p)).collect();
            in_degree.insert(id.as_str(), known.len());
            for parent in known {
                children.entry(parent).or_default().push(id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .vertices
            .keys()
            .map(String::as_str)
            .filter(|id| in_degree[id] == 0)
            .collect();

        if queue.is_empty() && !self.vertices.is_empty() {
            return Err(GraphError::Cycle);
        }

        let mut out = Vec::with_capacity(self.vertices.len());
        while let Some(id) = queue.pop_front() {
            out.push(id.to_string());
            if let Some(kids) = children.get(id) {
                for &kid in kids {
                    if let Some(degree) = in_degree.get_mut(kid) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(kid);
                        }
                    }
                }
            }
        }

        if out.len() != self.vertices.len() {
            return Err(GraphError::Cycle);
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_sorts_in_order() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec![]).unwrap();
        dag.add_vertex("b", vec!["a".into()]).unwrap();
        dag.add_vertex("c", vec!["b".into()]).unwrap();
        assert_eq!(dag.topo_sort().unwrap(), vec!["a", "b", "c"]);
        assert!(!dag.has_cycle());
    }

    #[test]
    fn duplicate_vertex_rejected() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec![]).unwrap();
        assert_eq!(dag.add_vertex("a", vec![]), Err(GraphError::DuplicateVertex("a".into())));
    }

    #[test]
    fn validate_rejects_unknown_parent() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec!["ghost".into()]).unwrap();
        assert_eq!(dag.validate(), Err(GraphError::VertexNotFound("ghost".into())));
    }

    #[test]
    fn direct_cycle_detected() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec!["b".into()]).unwrap();
        dag.add_vertex("b", vec!["a".into()]).unwrap();
        assert!(dag.has_cycle());
        assert_eq!(dag.topo_sort(), Err(GraphError::Cycle));
    }

    #[test]
    fn ties_break_in_insertion_order() {
        let mut dag = Dag::new();
        dag.add_vertex("z", vec![]).unwrap();
        dag.add_vertex("a", vec![]).unwrap();
        dag.add_vertex("m", vec![]).unwrap();
        assert_eq!(dag.topo_sort().unwrap(), vec!["z", "a", "m"]);
    }

    #[test]
    fn diamond_respects_all_parents() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec![]).unwrap();
        dag.add_vertex("b", vec!["a".into()]).unwrap();
        dag.add_vertex("c", vec!["a".into()]).unwrap();
        dag.add_vertex("d", vec!["b".into(), "c".into()]).unwrap();
        let order = dag.topo_sort().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn has_cycle_agrees_with_topo_sort() {
        let mut dag = Dag::new();
        dag.add_vertex("a", vec!["c".into()]).unwrap();
        dag.add_vertex("b", vec!["a".into()]).unwrap();
        dag.add_vertex("c", vec!["b".into()]).unwrap();
        assert_eq!(dag.has_cycle(), dag.topo_sort().is_err());
    }
}
