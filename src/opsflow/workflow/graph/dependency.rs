//! Dependency graph and concurrency waves

use std::collections::{HashMap, HashSet};

use crate::adk::error::WorkflowError;
use crate::opsflow::workflow::types::WorkflowStep;

/// Directed graph of step ids built from `depends_on` edges.
///
/// Construction computes the waves up front, so a cyclic graph never
/// exists as a value.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step ids in declaration order
    nodes: Vec<String>,
    /// id -> ids it depends on
    dependencies: HashMap<String, Vec<String>>,
    waves: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph for a step list
    pub fn build(steps: &[WorkflowStep]) -> Result<Self, WorkflowError> {
        let mut nodes = Vec::with_capacity(steps.len());
        let mut seen = HashSet::new();
        for step in steps {
            if !seen.insert(step.id.as_str()) {
                return Err(WorkflowError::DuplicateStepId(step.id.clone()));
            }
            nodes.push(step.id.clone());
        }

        let mut dependencies = HashMap::new();
        for step in steps {
            let mut deps = Vec::new();
            for dep in step.depends_on.to_vec() {
                if !seen.contains(dep.as_str()) {
                    return Err(WorkflowError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep,
                    });
                }
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            dependencies.insert(step.id.clone(), deps);
        }

        let waves = compute_waves(&nodes, &dependencies)?;

        Ok(Self {
            nodes,
            dependencies,
            waves,
        })
    }

    /// Ordered waves; every dependency of a step in wave k is in a wave < k
    pub fn parallel_groups(&self) -> &[Vec<String>] {
        &self.waves
    }

    /// Dependencies declared by a step
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies
            .get(id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Iterative zero-in-degree extraction; each round becomes one wave.
fn compute_waves(
    nodes: &[String],
    dependencies: &HashMap<String, Vec<String>>,
) -> Result<Vec<Vec<String>>, WorkflowError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for id in nodes {
        let deps = dependencies.get(id).map(|d| d.as_slice()).unwrap_or(&[]);
        in_degree.insert(id.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut waves = Vec::new();
    let mut placed = 0;

    loop {
        // Declaration order inside a wave keeps submission order deterministic
        let wave: Vec<&str> = nodes
            .iter()
            .map(|id| id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        if wave.is_empty() {
            break;
        }

        for id in &wave {
            in_degree.remove(id);
            if let Some(children) = dependents.get(id) {
                for child in children {
                    if let Some(deg) = in_degree.get_mut(child) {
                        *deg -= 1;
                    }
                }
            }
        }

        placed += wave.len();
        waves.push(wave.into_iter().map(String::from).collect());
    }

    if placed != nodes.len() {
        let cycle: Vec<String> = nodes
            .iter()
            .filter(|id| in_degree.contains_key(id.as_str()))
            .cloned()
            .collect();
        return Err(WorkflowError::CircularDependency(cycle));
    }

    Ok(waves)
}
