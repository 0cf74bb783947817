//! Dependency sorting.

use std::{collections::HashMap, hash::Hash};

use indexmap::IndexMap;

/// Outcome of [`topological_sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sorted<N> {
    /// Nodes in dependency-first order.
    pub ordered: Vec<N>,
    /// Nodes that could not be placed because of a cycle.
    pub cyclic: Vec<N>,
}

/// Sort the nodes of an edge list `(dependent, dependency)` so that every node
/// comes after everything it depends on.
///
/// Kahn's algorithm. Ties are broken by the order in which the nodes are first
/// seen in `edges`, so the result is reproducible for a given edge list. Nodes
/// on a cycle, or only reachable through one, end up in `cyclic`.
pub fn topological_sort<N, I>(edges: I) -> Sorted<N>
where
    N: Clone + Eq + Hash,
    I: IntoIterator<Item = (N, N)>,
{
    let mut in_degree: IndexMap<N, usize> = IndexMap::new();
    let mut dependencies: HashMap<N, Vec<N>> = HashMap::new();
    let mut dependents: Vec<N> = vec![];

    for (dependent, dependency) in edges {
        *in_degree.entry(dependency.clone()).or_insert(0) += 1;
        match dependencies.get_mut(&dependent) {
            Some(list) => list.push(dependency),
            None => {
                dependencies.insert(dependent.clone(), vec![dependency]);
                dependents.push(dependent);
            }
        }
    }

    let mut ordered: Vec<N> = dependents
        .into_iter()
        .filter(|node| !in_degree.contains_key(node))
        .collect();
    let mut next = 0;
    while next < ordered.len() {
        if let Some(list) = dependencies.get(&ordered[next]) {
            for dependency in list {
                if let Some(count) = in_degree.get_mut(dependency) {
                    *count -= 1;
                    if *count == 0 {
                        ordered.push(dependency.clone());
                    }
                }
            }
        }
        next += 1;
    }

    let mut cyclic: Vec<N> = in_degree
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(node, _)| node)
        .collect();

    ordered.reverse();
    cyclic.reverse();
    Sorted { ordered, cyclic }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_dependency_first() {
        let sorted = topological_sort(vec![("c", "b"), ("b", "a")]);
        assert_eq!(sorted.ordered, vec!["a", "b", "c"]);
        assert!(sorted.cyclic.is_empty());
    }

    #[test]
    fn diamond() {
        let sorted = topological_sort(vec![("d", "b"), ("d", "c"), ("b", "a"), ("c", "a")]);
        assert_eq!(sorted.ordered, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn cycles_and_what_hangs_below_them() {
        let sorted = topological_sort(vec![("top", "x"), ("x", "y"), ("y", "x"), ("y", "z")]);
        assert_eq!(sorted.ordered, vec!["top"]);
        assert_eq!(sorted.cyclic, vec!["z", "y", "x"]);
    }

    #[test]
    fn self_loop_is_cyclic() {
        let sorted = topological_sort(vec![("a", "a")]);
        assert!(sorted.ordered.is_empty());
        assert_eq!(sorted.cyclic, vec!["a"]);
    }

    #[test]
    fn empty() {
        let sorted = topological_sort(Vec::<(u32, u32)>::new());
        assert!(sorted.ordered.is_empty());
        assert!(sorted.cyclic.is_empty());
    }
}
