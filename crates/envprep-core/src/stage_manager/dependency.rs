use std::collections::{BTreeSet, HashMap};

use crate::kernel::error::Result;
use crate::stage_manager::error::PrepareSystemError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order `items` so that every item comes after the items supplying the
/// keys it depends on.
///
/// Dependencies for which `can_ignore` returns true, keys nobody in `items`
/// supplies, and self-dependencies are skipped. The order is deterministic:
/// items are visited in input order and their dependencies in sorted key
/// order, so among several valid orders the one closest to the input wins.
/// When no order exists the error names the keys on the cycle.
pub fn toposort<T, K, D, I>(items: Vec<T>, key: K, depends_on: D, can_ignore: I) -> Result<Vec<T>>
where
    K: Fn(&T) -> String,
    D: Fn(&T) -> BTreeSet<String>,
    I: Fn(&str) -> bool,
{
    let keys: Vec<String> = items.iter().map(&key).collect();
    let mut index_by_key: HashMap<&str, usize> = HashMap::with_capacity(keys.len());
    for (index, item_key) in keys.iter().enumerate() {
        index_by_key.entry(item_key.as_str()).or_insert(index);
    }

    let edges: Vec<Vec<usize>> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            depends_on(item)
                .iter()
                .filter(|dep| !can_ignore(dep.as_str()))
                .filter_map(|dep| index_by_key.get(dep.as_str()).copied())
                .filter(|&dep_index| dep_index != index)
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; items.len()];
    let mut order = Vec::with_capacity(items.len());
    let mut path = Vec::new();
    for start in 0..items.len() {
        visit(start, &edges, &mut marks, &mut path, &mut order, &keys)?;
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

fn visit(
    index: usize,
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
    keys: &[String],
) -> Result<()> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let cycle_start = path.iter().position(|&i| i == index).unwrap_or(0);
            let cycle: Vec<String> = path[cycle_start..]
                .iter()
                .map(|&i| keys[i].clone())
                .collect();
            return Err(PrepareSystemError::DependencyCycle { keys: cycle }.into());
        }
        Mark::Unvisited => {}
    }

    marks[index] = Mark::InProgress;
    path.push(index);
    for &dep in &edges[index] {
        visit(dep, edges, marks, path, order, keys)?;
    }
    path.pop();
    marks[index] = Mark::Done;
    order.push(index);
    Ok(())
}
