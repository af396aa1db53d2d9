//! Dependency graph checks run before a module is initialized.

use std::collections::{HashMap, HashSet};

use super::state::ModuleState;

/// Find a dependency cycle reachable from `candidate`.
///
/// `edges` holds the dependencies of every other known module; the candidate's
/// own `dependencies` take precedence over any entry for it in `edges`. The
/// returned path starts and ends with the same name, e.g. `[b, a, b]`.
pub fn find_cycle(
    candidate: &str,
    dependencies: &[String],
    edges: &HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    let mut path: Vec<String> = vec![candidate.to_string()];
    let mut on_path: HashSet<String> = HashSet::from([candidate.to_string()]);
    let mut done: HashSet<String> = HashSet::new();
    // (node, index of the next neighbour to visit)
    let mut stack: Vec<(String, usize)> = vec![(candidate.to_string(), 0)];

    while let Some((node, next)) = stack.last_mut() {
        let deps = neighbours(node, candidate, dependencies, edges);
        if *next >= deps.len() {
            let node = node.clone();
            stack.pop();
            path.pop();
            on_path.remove(&node);
            done.insert(node);
            continue;
        }

        let dep = deps[*next].clone();
        *next += 1;

        if on_path.contains(&dep) {
            let start = path.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(dep);
            return Some(cycle);
        }
        if done.contains(&dep) {
            continue;
        }
        path.push(dep.clone());
        on_path.insert(dep.clone());
        stack.push((dep, 0));
    }

    None
}

fn neighbours<'a>(
    name: &str,
    candidate: &str,
    dependencies: &'a [String],
    edges: &'a HashMap<String, Vec<String>>,
) -> &'a [String] {
    if name == candidate {
        dependencies
    } else {
        edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Declared dependencies that are not registered in at least the
/// `Initialized` state.
pub fn missing_dependencies<F>(dependencies: &[String], state_of: F) -> Vec<String>
where
    F: Fn(&str) -> Option<ModuleState>,
{
    dependencies
        .iter()
        .filter(|dep| !state_of(dep).map(|s| s.is_initialized()).unwrap_or(false))
        .cloned()
        .collect()
}
