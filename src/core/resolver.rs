//! Dependency resolution
//!
//! Computes the build order with a depth-first topological sort over the
//! registry. Dependencies that name no registry entry are assumed to be
//! provided by the host and are reported, not resolved.

use std::collections::HashMap;

use crate::core::registry::Registry;
use crate::error::ResolverError;

/// DFS marking state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Result of resolving a registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOrder {
    /// Package identifiers, dependencies strictly before dependents
    pub order: Vec<String>,
    /// Dependency names not defined in the registry, in discovery order
    pub external: Vec<String>,
}

impl ResolvedOrder {
    /// Position of a package in the order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

/// Dependency graph over a registry
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    registry: &'a Registry,
}

impl<'a> DependencyGraph<'a> {
    /// Create a graph view of the registry
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Compute the build order
    ///
    /// Every registry entry appears exactly once, roots included. Roots are
    /// visited in declaration order, dependencies in their declared order.
    pub fn topological_sort(&self) -> Result<ResolvedOrder, ResolverError> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path = Vec::new();
        let mut resolved = ResolvedOrder::default();

        for spec in self.registry.iter() {
            if !marks.contains_key(spec.name.as_str()) {
                self.visit(&spec.name, &mut marks, &mut path, &mut resolved)?;
            }
        }

        Ok(resolved)
    }

    fn visit(
        &self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<String>,
        resolved: &mut ResolvedOrder,
    ) -> Result<(), ResolverError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = path.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(name.to_string());
                return Err(ResolverError::CircularDependency {
                    package: name.to_string(),
                    cycle,
                });
            }
            None => {}
        }

        let Some(spec) = self.registry.get(name) else {
            if !resolved.external.iter().any(|e| e == name) {
                tracing::warn!("Dependency {name} not found in registry, assuming it is already satisfied");
                resolved.external.push(name.to_string());
            }
            return Ok(());
        };

        marks.insert(name, Mark::InProgress);
        path.push(name.to_string());

        for dep in &spec.dependencies {
            self.visit(dep, marks, path, resolved)?;
        }

        path.pop();
        marks.insert(name, Mark::Done);
        resolved.order.push(name.to_string());

        Ok(())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }
}

/// Resolve the build order of a registry
pub fn resolve(registry: &Registry) -> Result<ResolvedOrder, ResolverError> {
    DependencyGraph::new(registry).topological_sort()
}
