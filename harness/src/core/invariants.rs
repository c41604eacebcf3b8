//! Semantic manifest invariants not expressible via JSON Schema.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::manifest::{Manifest, is_valid_task_id};

/// Check semantic invariants not expressible in JSON Schema:
/// - Task ids match the id pattern and are unique
/// - Every `dependsOn` target exists and is not the task itself
/// - The dependency graph is acyclic
pub fn validate_invariants(manifest: &Manifest) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (idx, task) in manifest.tasks.iter().enumerate() {
        if !is_valid_task_id(&task.id) {
            errors.push(format!("tasks.{idx}.id: invalid task id '{}'", task.id));
        }
        if !seen.insert(task.id.as_str()) {
            errors.push(format!("tasks.{idx}.id: duplicate task id '{}'", task.id));
        }
    }

    for (idx, task) in manifest.tasks.iter().enumerate() {
        for dep in &task.depends_on {
            if dep == &task.id {
                errors.push(format!("tasks.{idx}.dependsOn: '{}' depends on itself", task.id));
            } else if !seen.contains(dep.as_str()) {
                errors.push(format!(
                    "tasks.{idx}.dependsOn: '{}' depends on unknown task '{dep}'",
                    task.id
                ));
            }
        }
    }

    // Cycle check only makes sense once every edge points at a real task.
    if errors.is_empty() {
        let cyclic = tasks_in_cycles(manifest);
        if !cyclic.is_empty() {
            errors.push(format!("dependency cycle among tasks: {}", cyclic.join(", ")));
        }
    }

    errors
}

/// Kahn's algorithm: whatever cannot be topologically ordered sits on (or behind) a cycle.
/// Returned ids follow manifest order.
fn tasks_in_cycles(manifest: &Manifest) -> Vec<String> {
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in &manifest.tasks {
        let unique_deps: HashSet<&str> = task.depends_on.iter().map(String::as_str).collect();
        indegree.insert(task.id.as_str(), unique_deps.len());
        for dep in unique_deps {
            dependents.entry(dep).or_default().push(task.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = manifest
        .tasks
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| indegree.get(id) == Some(&0))
        .collect();
    let mut ordered = HashSet::new();
    while let Some(id) = queue.pop_front() {
        ordered.insert(id);
        for next in dependents.get(id).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(next) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    manifest
        .tasks
        .iter()
        .filter(|t| !ordered.contains(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manifest, task, task_after};

    #[test]
    fn valid_chain_has_no_errors() {
        let m = manifest(vec![task("T001"), task_after("T002", &["T001"])]);
        assert!(validate_invariants(&m).is_empty());
    }

    #[test]
    fn reports_duplicates_and_unknown_dependencies() {
        let m = manifest(vec![
            task("T001"),
            task("T001"),
            task_after("T002", &["T404"]),
        ]);
        let errors = validate_invariants(&m);
        assert!(errors.iter().any(|e| e.contains("duplicate task id 'T001'")));
        assert!(errors.iter().any(|e| e.contains("unknown task 'T404'")));
    }

    #[test]
    fn reports_self_dependency() {
        let m = manifest(vec![task_after("T001", &["T001"])]);
        let errors = validate_invariants(&m);
        assert_eq!(errors, vec!["tasks.0.dependsOn: 'T001' depends on itself".to_string()]);
    }

    #[test]
    fn reports_cycle_members() {
        let m = manifest(vec![
            task("T001"),
            task_after("T002", &["T001", "T004"]),
            task_after("T003", &["T002"]),
            task_after("T004", &["T003"]),
        ]);
        let errors = validate_invariants(&m);
        assert_eq!(
            errors,
            vec!["dependency cycle among tasks: T002, T003, T004".to_string()]
        );
    }

    #[test]
    fn duplicate_dependency_entries_do_not_fake_a_cycle() {
        let m = manifest(vec![task("T001"), task_after("T002", &["T001", "T001"])]);
        assert!(validate_invariants(&m).is_empty());
    }
}
