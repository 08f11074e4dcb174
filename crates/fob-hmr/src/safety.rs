//! Decides whether a rebuild may be applied as a fast HMR update.
//!
//! A changed asset is unsafe to re-run in place when one of its dependencies
//! leads into a bundle group: the bundle holding the target is loaded on
//! demand and may not be written yet when the client re-evaluates the asset.
//! One such dependency anywhere in the change set makes the whole update
//! unsafe.

use crate::graph::{BundleGraph, ChangedAssets, Dependency};

/// `true` when no changed asset depends on a lazily loaded bundle group.
pub fn is_safe_for_fast_update(changed_assets: &ChangedAssets, graph: &dyn BundleGraph) -> bool {
    find_unsafe_dependency(changed_assets, graph).is_none()
}

/// The first dependency found that crosses into a bundle group.
///
/// Which one is returned depends on scan order; whether one is returned does not.
pub fn find_unsafe_dependency(
    changed_assets: &ChangedAssets,
    graph: &dyn BundleGraph,
) -> Option<Dependency> {
    changed_assets.keys().find_map(|asset_id| {
        graph.dependencies(asset_id).into_iter().find(|dependency| {
            graph
                .resolve_external_dependency(dependency)
                .is_some_and(|resolution| resolution.is_bundle_group())
        })
    })
}
