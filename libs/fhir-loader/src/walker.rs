//! Dependency graph traversal.

use crate::cache::PackageCache;
use crate::error::Result;
use ember_package::{FhirPackage, PackageId};
use std::collections::HashSet;
use std::sync::Arc;

/// Orders a root package and its transitive dependencies.
///
/// Traversal is depth-first pre-order: a package precedes its dependencies, and dependencies
/// are visited in manifest declaration order. Every identity appears at most once, which also
/// breaks cycles and self references.
#[derive(Debug, Clone, Copy)]
pub struct DependencyWalker {
    recursive: bool,
}

impl DependencyWalker {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    pub async fn resolve_all(
        &self,
        root: Arc<FhirPackage>,
        cache: &mut PackageCache,
    ) -> Result<Vec<Arc<FhirPackage>>> {
        if !self.recursive {
            return Ok(vec![root]);
        }

        let mut visited: HashSet<PackageId> = HashSet::new();
        let mut ordered = Vec::new();
        visited.insert(root.id());

        // Stack of pending dependency lists; each frame is consumed front to back.
        let mut stack = vec![root.manifest.dependency_ids().into_iter()];
        ordered.push(root);

        while let Some(frame) = stack.last_mut() {
            let Some(dependency) = frame.next() else {
                stack.pop();
                continue;
            };

            if !visited.insert(dependency.clone()) {
                continue;
            }

            let package = cache.get_or_load(&dependency).await?;
            if !visited.insert(package.id()) && package.id() != dependency {
                tracing::trace!(requested = %dependency, resolved = %package.id(), "Dependency already visited");
                continue;
            }

            tracing::debug!(package = %package.id(), depth = stack.len(), "Visiting dependency");
            stack.push(package.manifest.dependency_ids().into_iter());
            ordered.push(package);
        }

        tracing::info!(count = ordered.len(), "Resolved package dependencies");
        Ok(ordered)
    }
}
