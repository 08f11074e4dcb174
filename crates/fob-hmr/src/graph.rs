//! Bundle graph query interface.
//!
//! The build pipeline owns the real bundle graph; the orchestrator only needs
//! to ask it a handful of questions. [`BundleGraph`] is that narrow surface,
//! and [`MemoryBundleGraph`] is a plain in-memory implementation used by the
//! directory pipeline and by tests.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Stable identifier of an asset inside a bundle graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single source asset as seen after transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub file_path: PathBuf,
    /// Output type, e.g. `js` or `css`.
    pub asset_type: String,
    /// Generated code, when the pipeline kept it in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Arc<str>>,
}

impl Asset {
    pub fn new(id: impl Into<AssetId>, file_path: impl Into<PathBuf>, asset_type: &str) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            asset_type: asset_type.to_string(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<Arc<str>>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Assets touched by a rebuild, keyed by id in the order the pipeline reported them.
pub type ChangedAssets = IndexMap<AssetId, Asset>;

/// An edge from an asset to whatever its specifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub source_asset_id: AssetId,
    pub specifier: String,
}

impl Dependency {
    pub fn new(source: impl Into<AssetId>, specifier: impl Into<String>) -> Self {
        let source_asset_id = source.into();
        let specifier = specifier.into();
        Self {
            id: format!("{}:{}", source_asset_id, specifier),
            source_asset_id,
            specifier,
        }
    }
}

/// A set of bundles loaded together on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleGroup {
    pub entry_asset_id: AssetId,
    pub target: String,
}

/// Where a dependency leads once resolved outside its own asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalResolution {
    /// Resolved to an asset within the already loaded bundle set.
    Asset { asset_id: AssetId },
    /// Resolved into a lazily loaded bundle group.
    BundleGroup { group: BundleGroup },
}

impl ExternalResolution {
    pub fn is_bundle_group(&self) -> bool {
        matches!(self, ExternalResolution::BundleGroup { .. })
    }
}

/// An emitted output bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    /// Output type, e.g. `js`, `css` or `html`.
    pub bundle_type: String,
    /// Path relative to the dist directory.
    pub name: String,
    pub is_entry: bool,
}

/// Queries the orchestrator makes against a finalized bundle graph.
pub trait BundleGraph: Send + Sync + fmt::Debug {
    /// Direct dependencies of an asset, in source order.
    fn dependencies(&self, asset: &AssetId) -> Vec<Dependency>;

    /// Resolve a dependency outside of its asset, if it leaves it at all.
    fn resolve_external_dependency(&self, dependency: &Dependency) -> Option<ExternalResolution>;

    /// All bundles written for this build.
    fn bundles(&self) -> Vec<Bundle>;

    fn asset(&self, id: &AssetId) -> Option<Asset>;
}

/// In-memory [`BundleGraph`].
#[derive(Debug, Default, Clone)]
pub struct MemoryBundleGraph {
    assets: IndexMap<AssetId, Asset>,
    dependencies: FxHashMap<AssetId, Vec<Dependency>>,
    resolutions: FxHashMap<String, ExternalResolution>,
    bundles: Vec<Bundle>,
}

impl MemoryBundleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_asset(&mut self, asset: Asset) -> &mut Self {
        self.assets.insert(asset.id.clone(), asset);
        self
    }

    /// Record a dependency and, optionally, where it resolves externally.
    pub fn add_dependency(
        &mut self,
        dependency: Dependency,
        resolution: Option<ExternalResolution>,
    ) -> &mut Self {
        if let Some(resolution) = resolution {
            self.resolutions.insert(dependency.id.clone(), resolution);
        }
        self.dependencies
            .entry(dependency.source_asset_id.clone())
            .or_default()
            .push(dependency);
        self
    }

    pub fn add_bundle(&mut self, bundle: Bundle) -> &mut Self {
        self.bundles.push(bundle);
        self
    }
}

impl BundleGraph for MemoryBundleGraph {
    fn dependencies(&self, asset: &AssetId) -> Vec<Dependency> {
        self.dependencies.get(asset).cloned().unwrap_or_default()
    }

    fn resolve_external_dependency(&self, dependency: &Dependency) -> Option<ExternalResolution> {
        self.resolutions.get(&dependency.id).cloned()
    }

    fn bundles(&self) -> Vec<Bundle> {
        self.bundles.clone()
    }

    fn asset(&self, id: &AssetId) -> Option<Asset> {
        self.assets.get(id).cloned()
    }
}
