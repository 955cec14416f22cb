//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    use crate::core::registry::{PackageSpec, Registry};

    /// Generate a valid package name (lowercase alphanumeric with hyphens)
    pub fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,30}[a-z0-9]?".prop_filter("Name must not be empty", |s| !s.is_empty())
    }

    /// Generate a git source URL
    pub fn source_url() -> impl Strategy<Value = String> {
        (
            prop_oneof!["https://github.com", "https://gitlab.com"],
            "[a-z][a-z0-9-]{2,12}",
            package_name(),
        )
            .prop_map(|(host, owner, name)| format!("{host}/{owner}/{name}"))
    }

    /// Generate a `-D` define pair
    pub fn define() -> impl Strategy<Value = (String, String)> {
        (
            "[A-Za-z][A-Za-z0-9_]{0,20}",
            prop_oneof!["ON", "OFF", "TRUE", "FALSE", "[0-9]{1,3}"],
        )
    }

    /// Generate an acyclic registry of up to `max` packages
    ///
    /// Package `pN` may only depend on `pM` with `M < N`, plus an occasional
    /// dependency that names nothing in the registry. Declaration order is
    /// shuffled so the resolver cannot rely on it.
    pub fn arb_registry_dag(max: usize) -> impl Strategy<Value = Registry> {
        (1..=max.max(1))
            .prop_flat_map(|n| {
                let edges = proptest::collection::vec(
                    (proptest::collection::vec(any::<prop::sample::Index>(), 0..3), any::<bool>()),
                    n,
                );
                (Just(n), edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
            })
            .prop_map(|(n, edges, declaration)| {
                let specs: Vec<PackageSpec> = (0..n)
                    .map(|i| {
                        let (picks, external) = &edges[i];
                        let mut deps: Vec<String> = Vec::new();
                        if i > 0 {
                            for pick in picks {
                                let dep = format!("p{}", pick.index(i));
                                if !deps.contains(&dep) {
                                    deps.push(dep);
                                }
                            }
                        }
                        if *external {
                            deps.push(format!("sys{i}"));
                        }
                        let mut spec = PackageSpec::new(&format!("https://example.com/p{i}"))
                            .expect("generated url is valid");
                        spec.dependencies = deps;
                        spec
                    })
                    .collect();

                let shuffled = declaration.iter().map(|&i| specs[i].clone()).collect();
                Registry::new(shuffled).expect("generated names are unique")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::registry::package_name_from_url;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_package_name_generator(name in package_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn test_source_url_yields_identifier(url in source_url()) {
            let name = package_name_from_url(&url).unwrap();
            prop_assert!(url.ends_with(&name));
        }

        #[test]
        fn test_registry_dag_has_no_self_edges(reg in arb_registry_dag(8)) {
            for spec in reg.iter() {
                prop_assert!(!spec.dependencies.contains(&spec.name));
            }
        }
    }
}
