//! Task graph: structural validation and deterministic ordering.

use super::template;
use super::TaskSpec;
use crate::agent::Agent;
use crate::error::ApiError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Validated tasks plus their execution order, independent of any agents.
///
/// Ordering is Kahn's algorithm run in rounds: each round takes every task
/// whose upstream tasks are all placed, in declaration order. A round is a
/// stage; the order is the stages concatenated.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    tasks: Vec<TaskSpec>,
    index: HashMap<String, usize>,
    stages: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    pub fn new(tasks: Vec<TaskSpec>) -> Result<Self, ApiError> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                return Err(ApiError::ConfigError(format!(
                    "task #{} has an empty name",
                    i + 1
                )));
            }
            if index.insert(task.name.clone(), i).is_some() {
                return Err(ApiError::ConfigError(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
        }

        let mut upstream: Vec<Vec<usize>> = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let mut deps = Vec::with_capacity(task.upstream.len());
            for dep in &task.upstream {
                let &d = index.get(dep).ok_or_else(|| {
                    ApiError::ConfigError(format!(
                        "task '{}' depends on undeclared task '{}'",
                        task.name, dep
                    ))
                })?;
                if deps.contains(&d) {
                    return Err(ApiError::ConfigError(format!(
                        "task '{}' lists upstream '{}' twice",
                        task.name, dep
                    )));
                }
                deps.push(d);
            }
            upstream.push(deps);
        }

        let stages = kahn_stages(&tasks, &upstream)?;
        Ok(Self {
            tasks,
            index,
            stages,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Tasks in execution order.
    pub fn order(&self) -> Vec<&TaskSpec> {
        self.stages
            .iter()
            .flatten()
            .map(|&i| &self.tasks[i])
            .collect()
    }

    /// Dependency levels: every task's upstream lies in an earlier stage.
    pub fn stages(&self) -> Vec<Vec<&TaskSpec>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|&i| &self.tasks[i]).collect())
            .collect()
    }

    /// Keep only `targets` and their transitive upstream tasks.
    pub fn restrict_to<S: AsRef<str>>(&self, targets: &[S]) -> Result<ExecutionPlan, ApiError> {
        let mut keep = BTreeSet::new();
        let mut frontier = Vec::new();
        for target in targets {
            let target = target.as_ref();
            let task = self.task(target).ok_or_else(|| {
                ApiError::ConfigError(format!("unknown target task '{}'", target))
            })?;
            frontier.push(task);
        }
        while let Some(task) = frontier.pop() {
            if keep.insert(task.name.clone()) {
                for dep in &task.upstream {
                    if let Some(up) = self.task(dep) {
                        frontier.push(up);
                    }
                }
            }
        }
        let tasks = self
            .tasks
            .iter()
            .filter(|t| keep.contains(&t.name))
            .cloned()
            .collect();
        ExecutionPlan::new(tasks)
    }

    /// Run inputs referenced by templates but not supplied.
    pub fn missing_inputs<'a, I>(&self, inputs: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: BTreeSet<&str> = inputs.into_iter().collect();
        let mut missing = Vec::new();
        for task in self.order() {
            let templates = std::iter::once(task.prompt.as_str()).chain(
                task.capability_calls
                    .iter()
                    .flat_map(|c| std::iter::once(c.argument.as_str()).chain(c.secondary.as_deref())),
            );
            for template in templates {
                for name in template::placeholders(template) {
                    let entry = (task.name.clone(), name.to_string());
                    if !available.contains(name) && !missing.contains(&entry) {
                        missing.push(entry);
                    }
                }
            }
        }
        missing
    }
}

fn kahn_stages(tasks: &[TaskSpec], upstream: &[Vec<usize>]) -> Result<Vec<Vec<usize>>, ApiError> {
    let mut remaining: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, deps) in upstream.iter().enumerate() {
        for &d in deps {
            downstream[d].push(i);
        }
    }

    let mut placed = vec![false; tasks.len()];
    let mut stages = Vec::new();
    let mut ready: Vec<usize> = (0..tasks.len()).filter(|&i| remaining[i] == 0).collect();
    let mut placed_count = 0;

    while !ready.is_empty() {
        ready.sort_unstable();
        let mut next = Vec::new();
        for &i in &ready {
            placed[i] = true;
            placed_count += 1;
            for &child in &downstream[i] {
                remaining[child] -= 1;
                if remaining[child] == 0 {
                    next.push(child);
                }
            }
        }
        stages.push(std::mem::take(&mut ready));
        ready = next;
    }

    if placed_count < tasks.len() {
        let cycle = find_cycle(tasks, upstream, &placed);
        return Err(ApiError::ConfigError(format!("cycle detected: {}", cycle)));
    }
    Ok(stages)
}

/// Every unplaced task has an unplaced upstream task, so walking upstream
/// edges from one must revisit a task. The revisited stretch, reversed into
/// execution direction and rotated to start at the earliest declared task, is
/// the reported cycle.
fn find_cycle(tasks: &[TaskSpec], upstream: &[Vec<usize>], placed: &[bool]) -> String {
    let Some(start) = (0..tasks.len()).find(|&i| !placed[i]) else {
        return String::new();
    };
    let mut path = vec![start];
    let mut current = start;
    let cycle = loop {
        let Some(&next) = upstream[current].iter().find(|&&d| !placed[d]) else {
            break vec![current];
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            break path[pos..].to_vec();
        }
        path.push(next);
        current = next;
    };

    let mut cycle: Vec<usize> = cycle.into_iter().rev().collect();
    if let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &i)| i)
        .map(|(pos, _)| pos)
    {
        cycle.rotate_left(min_pos);
    }
    let mut names: Vec<&str> = cycle.iter().map(|&i| tasks[i].name.as_str()).collect();
    if let Some(&first) = names.first() {
        names.push(first);
    }
    names.join(" -> ")
}

/// An [`ExecutionPlan`] bound to the agents that execute it.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    plan: ExecutionPlan,
    agents: BTreeMap<String, Arc<Agent>>,
}

impl TaskGraph {
    /// Validate tasks against agents: names, dependencies, agent references,
    /// capability bindings and acyclicity.
    pub fn build(tasks: Vec<TaskSpec>, agents: Vec<Arc<Agent>>) -> Result<Self, ApiError> {
        Self::from_plan(ExecutionPlan::new(tasks)?, agents)
    }

    pub fn from_plan(plan: ExecutionPlan, agents: Vec<Arc<Agent>>) -> Result<Self, ApiError> {
        let mut by_id = BTreeMap::new();
        for agent in agents {
            let id = agent.id().to_string();
            if by_id.insert(id.clone(), agent).is_some() {
                return Err(ApiError::ConfigError(format!("duplicate agent id '{}'", id)));
            }
        }

        for task in plan.tasks() {
            let agent = by_id.get(&task.agent).ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "task '{}' references unknown agent '{}'",
                    task.name, task.agent
                ))
            })?;
            for call in &task.capability_calls {
                if !agent.capabilities().contains(&call.capability) {
                    return Err(ApiError::ConfigError(format!(
                        "task '{}' calls capability '{}', which agent '{}' does not hold",
                        task.name,
                        call.capability,
                        agent.id()
                    )));
                }
            }
        }

        Ok(Self {
            plan,
            agents: by_id,
        })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn order(&self) -> Vec<&TaskSpec> {
        self.plan.order()
    }

    pub fn stages(&self) -> Vec<Vec<&TaskSpec>> {
        self.plan.stages()
    }

    pub fn agent_for(&self, task: &TaskSpec) -> Option<&Arc<Agent>> {
        self.agents.get(&task.agent)
    }
}
