//! Dependency tracking between columns
//!
//! An edge runs from a precedent (a column a formula reads) to its dependent
//! (the calculated column owning the formula). Names may refer to columns that
//! are not defined yet.

use ahash::{AHashMap, AHashSet};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

/// Dependency graph for calculated columns
///
/// Tracks which columns depend on which other columns, enabling cycle
/// rejection and ordered recalculation. Neighbour sets are ordered so cycle
/// paths come out the same on every run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DependencyGraph {
    /// Column → columns that depend on it (dependents)
    dependents: AHashMap<String, BTreeSet<String>>,
    /// Column → columns it depends on (precedents)
    precedents: AHashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(column, referenced columns)` pairs
    pub fn from_formulas<'a, I, R>(formulas: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, R)>,
        R: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::new();
        for (column, references) in formulas {
            graph.set_precedents(column, references);
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: &str, dependent: &str) {
        self.dependents
            .entry(precedent.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.precedents
            .entry(dependent.to_string())
            .or_default()
            .insert(precedent.to_string());
    }

    /// Replace the precedents of a column
    pub fn set_precedents<'a, R>(&mut self, dependent: &str, precedents: R)
    where
        R: IntoIterator<Item = &'a str>,
    {
        self.clear_precedents(dependent);
        for precedent in precedents {
            self.add_dependency(precedent, dependent);
        }
    }

    /// Remove the edges into a column, keeping columns that depend on it
    pub fn clear_precedents(&mut self, column: &str) {
        if let Some(precedents) = self.precedents.remove(column) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(column);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Columns that read the given column directly
    pub fn dependents(&self, column: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependents
            .get(column)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Columns the given column reads directly
    pub fn precedents(&self, column: &str) -> impl Iterator<Item = &str> + '_ {
        self.precedents
            .get(column)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether the column has an edge in either direction
    pub fn contains(&self, column: &str) -> bool {
        self.dependents.contains_key(column) || self.precedents.contains_key(column)
    }

    /// Whether there are no edges at all
    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Find a cycle reachable from `start` by following precedents
    ///
    /// The returned path starts and ends with the same column, e.g.
    /// `["B", "A", "B"]` when B reads A and A reads B.
    ///
    /// Depth-first over an explicit stack, so long chains of columns cannot
    /// exhaust the call stack.
    pub fn find_cycle_from<'a>(&'a self, start: &'a str) -> Option<Vec<String>> {
        let mut visited: AHashSet<&str> = AHashSet::new();
        visited.insert(start);

        // The current path, each column with the precedents still to visit
        let mut stack: Vec<(&str, Vec<&str>)> = vec![(start, self.unvisited_precedents(start))];
        let mut on_path: AHashMap<&str, usize> = AHashMap::new();
        on_path.insert(start, 0);

        while let Some((_, pending)) = stack.last_mut() {
            let Some(next) = pending.pop() else {
                if let Some((column, _)) = stack.pop() {
                    on_path.remove(column);
                }
                continue;
            };

            if let Some(&pos) = on_path.get(next) {
                let mut path: Vec<String> =
                    stack[pos..].iter().map(|(column, _)| column.to_string()).collect();
                path.push(next.to_string());
                return Some(path);
            }
            if visited.insert(next) {
                on_path.insert(next, stack.len());
                stack.push((next, self.unvisited_precedents(next)));
            }
        }

        None
    }

    /// Precedents in visiting order, last to be visited first
    fn unvisited_precedents(&self, column: &str) -> Vec<&str> {
        let mut precedents: Vec<&str> = self.precedents(column).collect();
        precedents.reverse();
        precedents
    }

    /// The changed columns plus everything that transitively reads them
    pub fn affected_by<'a, I>(&self, changed: I) -> AHashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut affected = AHashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for column in changed {
            if affected.insert(column.to_string()) {
                queue.push_back(column);
            }
        }

        while let Some(column) = queue.pop_front() {
            for dependent in self.dependents(column) {
                if affected.insert(dependent.to_string()) {
                    queue.push_back(dependent);
                }
            }
        }

        affected
    }

    /// Order `columns` so every column comes after its precedents
    ///
    /// Kahn's algorithm restricted to `columns`; among columns that are ready
    /// at the same time the lowest `rank` goes first. Columns left over by a
    /// cycle (which the registry never admits) are appended in rank order.
    pub fn topological_order<F>(&self, columns: &AHashSet<String>, rank: F) -> Vec<String>
    where
        F: Fn(&str) -> u64,
    {
        let mut in_degree: AHashMap<&str, usize> = columns
            .iter()
            .map(|column| {
                let degree = self
                    .precedents(column)
                    .filter(|p| columns.contains(*p))
                    .count();
                (column.as_str(), degree)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(u64, &str)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(column, _)| Reverse((rank(column), *column)))
            .collect();

        let mut order = Vec::with_capacity(columns.len());
        while let Some(Reverse((_, column))) = ready.pop() {
            order.push(column.to_string());
            for dependent in self.dependents(column) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((rank(dependent), dependent)));
                    }
                }
            }
        }

        if order.len() < columns.len() {
            let mut leftover: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(column, _)| *column)
                .collect();
            tracing::warn!(columns = ?leftover, "dependency cycle while ordering columns");
            leftover.sort_by_key(|column| (rank(column), *column));
            order.extend(leftover.into_iter().map(str::to_string));
        }

        order
    }
}
