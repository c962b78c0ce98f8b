use crate::support::task;
use cvforge::pipeline::{ExecutionPlan, TaskSpec};
use proptest::prelude::*;
use std::collections::HashMap;

/// Random DAG: task `i` may depend on any `j < i`. Declaration order is
/// shuffled so the generator's numbering says nothing about execution order.
fn dag() -> impl Strategy<Value = Vec<TaskSpec>> {
    (1usize..16)
        .prop_flat_map(|n| {
            let edges = (0..n)
                .map(|i| proptest::collection::vec(any::<bool>(), i))
                .collect::<Vec<_>>();
            (edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
        .prop_map(|(edges, declared)| {
            declared
                .into_iter()
                .map(|i| {
                    let upstream: Vec<String> = edges[i]
                        .iter()
                        .enumerate()
                        .filter(|(_, on)| **on)
                        .map(|(j, _)| format!("t{}", j))
                        .collect();
                    let refs: Vec<&str> = upstream.iter().map(String::as_str).collect();
                    task(&format!("t{}", i), "w", &refs)
                })
                .collect()
        })
}

fn positions(plan: &ExecutionPlan) -> HashMap<String, usize> {
    plan.order()
        .into_iter()
        .enumerate()
        .map(|(i, spec)| (spec.name.clone(), i))
        .collect()
}

proptest! {
    #[test]
    fn every_task_runs_after_its_upstream(tasks in dag()) {
        let plan = ExecutionPlan::new(tasks.clone()).unwrap();
        let position = positions(&plan);
        prop_assert_eq!(position.len(), tasks.len());
        for spec in &tasks {
            for up in &spec.upstream {
                prop_assert!(position[up] < position[&spec.name]);
            }
        }
    }

    #[test]
    fn stages_only_depend_on_earlier_stages(tasks in dag()) {
        let plan = ExecutionPlan::new(tasks).unwrap();
        let stage_of: HashMap<String, usize> = plan
            .stages()
            .into_iter()
            .enumerate()
            .flat_map(|(i, stage)| stage.into_iter().map(move |spec| (spec.name.clone(), i)))
            .collect();
        for spec in plan.tasks() {
            for up in &spec.upstream {
                prop_assert!(stage_of[up] < stage_of[&spec.name]);
            }
            // A task sits in the earliest stage its upstream allows.
            let earliest = spec.upstream.iter().map(|up| stage_of[up] + 1).max().unwrap_or(0);
            prop_assert_eq!(stage_of[&spec.name], earliest);
        }
    }

    #[test]
    fn order_is_deterministic(tasks in dag()) {
        let first: Vec<String> = ExecutionPlan::new(tasks.clone())
            .unwrap()
            .order()
            .into_iter()
            .map(|s| s.name.clone())
            .collect();
        let second: Vec<String> = ExecutionPlan::new(tasks)
            .unwrap()
            .order()
            .into_iter()
            .map(|s| s.name.clone())
            .collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn back_edge_is_reported_as_cycle(tasks in dag(), pick in any::<prop::sample::Index>()) {
        // Pick a task with upstream and make its first upstream depend on it.
        let with_upstream: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.upstream.is_empty())
            .map(|(i, _)| i)
            .collect();
        prop_assume!(!with_upstream.is_empty());
        let child = with_upstream[pick.index(with_upstream.len())];
        let child_name = tasks[child].name.clone();
        let parent_name = tasks[child].upstream[0].clone();

        let mut tasks = tasks;
        if let Some(parent) = tasks.iter_mut().find(|t| t.name == parent_name) {
            parent.upstream.push(child_name);
        }
        let err = ExecutionPlan::new(tasks).unwrap_err();
        prop_assert!(err.to_string().contains("cycle detected"), "{}", err);
    }
}
