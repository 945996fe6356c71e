//! Dependency graph construction and circular reference detection.
//!
//! Each line that names another line's binding gets an edge to that line.
//! Module names never become edges; they resolve against the module set.
//! A depth-first search over an explicit path stack finds back-edges so the
//! evaluator can report a cycle instead of a plain undefined reference.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::Line;
use super::deps::extract_dependencies;
use super::line::parse_line;

/// Adjacency from a line index to the indices it depends on, in insertion order.
pub type DependencyGraph = BTreeMap<usize, Vec<usize>>;

/// Build the dependency graph for a list of lines.
///
/// Dependencies are re-extracted from the raw text. When several lines bind
/// the same name, the last one wins.
pub fn build_graph(lines: &[Line]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let mut name_to_line: HashMap<&str, usize> = HashMap::new();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(name) = parse_line(&line.raw_expression).bound_name {
            name_to_line.insert(name, idx);
        }
        graph.insert(idx, Vec::new());
    }

    for (idx, line) in lines.iter().enumerate() {
        let deps = extract_dependencies(parse_line(&line.raw_expression).expression);
        let edges = graph.entry(idx).or_default();
        for dep in deps {
            if let Some(&target) = name_to_line.get(dep.as_str())
                && !edges.contains(&target)
            {
                edges.push(target);
            }
        }
    }

    graph
}

/// Find one back-edge in the graph, as `(ancestor, current)`.
///
/// Lines are visited in index order and neighbors in insertion order, so
/// the result is deterministic.
pub fn detect_cycle(graph: &DependencyGraph) -> Option<(usize, usize)> {
    cycle_path(graph).and_then(|path| back_edge(&path))
}

/// Find one cycle and return the path that closes it.
///
/// The path starts and ends with the same line index, e.g. `[0, 1, 0]`.
pub fn cycle_path(graph: &DependencyGraph) -> Option<Vec<usize>> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut visiting: HashSet<usize> = HashSet::new();
    let mut path: Vec<usize> = Vec::new();
    // Next neighbor to try, one entry per node on `path`.
    let mut cursor: Vec<usize> = Vec::new();

    for &start in graph.keys() {
        if !visited.insert(start) {
            continue;
        }
        path.push(start);
        visiting.insert(start);
        cursor.push(0);

        while let Some(&node) = path.last() {
            let neighbors = graph.get(&node).map_or(&[][..], Vec::as_slice);
            let Some(slot) = cursor.last_mut() else {
                break;
            };
            let Some(&next) = neighbors.get(*slot) else {
                path.pop();
                cursor.pop();
                visiting.remove(&node);
                continue;
            };
            *slot += 1;

            if visiting.contains(&next) {
                let pos = path.iter().position(|&n| n == next)?;
                let mut cycle = path[pos..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            if visited.insert(next) {
                path.push(next);
                visiting.insert(next);
                cursor.push(0);
            }
        }
    }
    None
}

/// Every cycle in the graph, found by repeatedly breaking the reported back-edge.
pub fn all_cycles(graph: &DependencyGraph) -> Vec<Vec<usize>> {
    let mut graph = graph.clone();
    let mut cycles = Vec::new();

    while let Some(path) = cycle_path(&graph) {
        let Some((ancestor, current)) = back_edge(&path) else {
            break;
        };
        if let Some(edges) = graph.get_mut(&current) {
            edges.retain(|&n| n != ancestor);
        }
        cycles.push(path);
    }

    cycles
}

fn back_edge(path: &[usize]) -> Option<(usize, usize)> {
    let ancestor = *path.last()?;
    let current = *path.get(path.len().checked_sub(2)?)?;
    Some((ancestor, current))
}
