//! Path resolution from the graph root.

use crate::entity::EntityHandle;

/// Resolve a slash-separated component path from `root`.
///
/// Each segment names a direct child (searched across the current entity's
/// relationships). A segment that does not resolve folds back to the root
/// rather than erroring; callers treat "couldn't find the component" as
/// "operate on the root". The empty path resolves to the root.
pub fn resolve_path(root: &EntityHandle, path: &str) -> EntityHandle {
    let mut current = root.clone();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let next = current.read().find_child(segment);
        match next {
            Some(child) => current = child,
            None => {
                tracing::debug!(
                    path = %path,
                    segment = %segment,
                    "path segment not found, falling back to graph root"
                );
                return root.clone();
            }
        }
    }
    current
}
