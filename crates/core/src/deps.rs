#![forbid(unsafe_code)]

use crate::task::Task;

/// Marks blocked/blocking pairs within `tasks`.
///
/// A dependency only counts when both ends are still open. Each dependency
/// resolves to the first task carrying that uuid.
pub fn dependency_scan(tasks: &mut [Task]) {
    for task in tasks.iter_mut() {
        task.is_blocked = false;
        task.is_blocking = false;
    }

    let mut edges = Vec::new();
    for (left_idx, left) in tasks.iter().enumerate() {
        for dep in left.dependency_uuids() {
            let Some(right_idx) = tasks.iter().position(|right| right.uuid() == dep) else {
                continue;
            };
            if !left.status().is_closed() && !tasks[right_idx].status().is_closed() {
                edges.push((left_idx, right_idx));
            }
        }
    }

    for (left_idx, right_idx) in edges {
        tasks[left_idx].is_blocked = true;
        tasks[right_idx].is_blocking = true;
    }
}
