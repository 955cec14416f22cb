//! Order command implementation
//!
//! Implements `cxx-packer order`: resolve the registry and print the build
//! order. Nothing is cloned, built or written.

use std::path::Path;

use anyhow::{Context, Result};

use super::load_registry;
use crate::core::registry::Registry;
use crate::core::resolver::{resolve, ResolvedOrder};

/// Execute the order command
pub fn execute(project_dir: &Path, registry: Option<&Path>) -> Result<()> {
    let registry = load_registry(project_dir, registry)?;
    let resolved = resolve(&registry).context("Failed to resolve the build order")?;
    print!("{}", render(&registry, &resolved));
    Ok(())
}

/// Numbered order with each package's dependencies
pub fn render(registry: &Registry, resolved: &ResolvedOrder) -> String {
    let mut out = String::new();
    for (index, name) in resolved.order.iter().enumerate() {
        let deps = registry
            .get(name)
            .map(|spec| spec.dependencies.join(", "))
            .unwrap_or_default();
        if deps.is_empty() {
            out.push_str(&format!("{:>2}. {name}\n", index + 1));
        } else {
            out.push_str(&format!("{:>2}. {name} (after: {deps})\n", index + 1));
        }
    }
    if !resolved.external.is_empty() {
        out.push_str(&format!(
            "\nExternally satisfied: {}\n",
            resolved.external.join(", ")
        ));
    }
    out
}
