//! A "build pipeline" over an already-built output directory.
//!
//! Every file in the directory is one asset and one bundle; HTML files are
//! entries. JavaScript files are scanned for relative imports so dynamic
//! `import()`s show up as bundle-group dependencies, which is what decides
//! whether a change can be pushed as a fast update.

use crate::watcher::FileChange;
use fob_hmr::{
    Asset, AssetId, BuildEvent, Bundle, BundleGraph, BundleGroup, ChangedAssets, Dependency,
    Diagnostic, ExternalResolution, FileSystem, MemoryBundleGraph, ProgressPhase,
};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Asset types whose contents are pushed to clients with an update.
const TEXT_TYPES: &[&str] = &["js", "mjs", "css", "html"];

const ORIGIN: &str = "fob-serve";

pub struct DirectoryPipeline {
    dist_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl DirectoryPipeline {
    pub fn new(dist_dir: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { dist_dir, fs }
    }

    pub fn dist_dir(&self) -> &Path {
        &self.dist_dir
    }

    /// Read the directory into a bundle graph.
    pub async fn scan(&self) -> io::Result<MemoryBundleGraph> {
        let mut graph = MemoryBundleGraph::new();
        let files = self.fs.read_dir_recursive(&self.dist_dir).await?;

        for relative in files {
            let id = asset_id(&relative);
            let asset_type = relative
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
                .to_string();

            graph
                .add_asset(Asset::new(
                    id.as_str(),
                    self.dist_dir.join(&relative),
                    &asset_type,
                ))
                .add_bundle(Bundle {
                    id: id.clone(),
                    bundle_type: asset_type.clone(),
                    name: id.clone(),
                    is_entry: asset_type == "html",
                });

            if matches!(asset_type.as_str(), "js" | "mjs") {
                let source = self.fs.read_file(&self.dist_dir.join(&relative)).await?;
                for import in scan_imports(&String::from_utf8_lossy(&source)) {
                    let Some(target) = resolve_relative(&id, &import.specifier) else {
                        continue;
                    };
                    let resolution = if import.dynamic {
                        ExternalResolution::BundleGroup {
                            group: BundleGroup {
                                entry_asset_id: AssetId::new(target),
                                target: "browser".to_string(),
                            },
                        }
                    } else {
                        ExternalResolution::Asset {
                            asset_id: AssetId::new(target),
                        }
                    };
                    graph.add_dependency(
                        Dependency::new(id.as_str(), import.specifier),
                        Some(resolution),
                    );
                }
            }
        }

        Ok(graph)
    }

    /// Events for one rebuild triggered by `changes`, in pipeline order.
    pub async fn build(&self, changes: &[FileChange]) -> Vec<BuildEvent> {
        let started = Instant::now();
        let mut events = vec![BuildEvent::BuildStart];

        let graph = match self.scan().await {
            Ok(graph) => Arc::new(graph),
            Err(e) => {
                events.push(BuildEvent::BuildFailure {
                    diagnostics: vec![
                        Diagnostic::new(format!(
                            "Failed to read {}: {}",
                            self.dist_dir.display(),
                            e
                        ))
                        .with_origin(ORIGIN)
                        .with_file(self.dist_dir.clone()),
                    ],
                });
                return events;
            }
        };

        let changed_assets = self.changed_assets(changes, &graph).await;
        let graph: Arc<dyn BundleGraph> = graph;

        events.push(BuildEvent::BuildProgress(ProgressPhase::Bundled {
            changed_assets: changed_assets.clone(),
            graph: graph.clone(),
        }));
        events.push(BuildEvent::BuildSuccess {
            graph,
            changed_assets,
            build_time: started.elapsed(),
        });
        events
    }

    async fn changed_assets(
        &self,
        changes: &[FileChange],
        graph: &MemoryBundleGraph,
    ) -> ChangedAssets {
        let mut changed = ChangedAssets::new();

        for change in changes {
            if matches!(change, FileChange::Removed(_)) {
                continue;
            }
            let path = change.path();
            let relative = path.strip_prefix(&self.dist_dir).unwrap_or(path);
            let id = AssetId::new(asset_id(relative));

            let Some(mut asset) = graph.asset(&id) else {
                continue;
            };
            if TEXT_TYPES.contains(&asset.asset_type.as_str()) {
                if let Ok(content) = self.fs.read_file(&asset.file_path).await {
                    asset = asset.with_output(&*String::from_utf8_lossy(&content));
                }
            }
            changed.insert(id, asset);
        }

        changed
    }
}

/// Asset id for a path relative to the dist dir: `/`-separated.
fn asset_id(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A relative import found in a JavaScript file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Import {
    specifier: String,
    dynamic: bool,
}

/// Find `import("./x")` and `from "./x"` specifiers. Bare specifiers are skipped.
fn scan_imports(source: &str) -> Vec<Import> {
    let mut imports = Vec::new();

    for (marker, dynamic) in [("import(", true), ("from", false)] {
        let mut rest = source;
        while let Some(pos) = rest.find(marker) {
            rest = &rest[pos + marker.len()..];
            if let Some(specifier) = leading_string_literal(rest) {
                if specifier.starts_with("./") || specifier.starts_with("../") {
                    imports.push(Import {
                        specifier: specifier.to_string(),
                        dynamic,
                    });
                }
            }
        }
    }

    imports
}

/// The contents of a quoted literal at the start of `s`, after whitespace.
fn leading_string_literal(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    let quote = trimmed.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'))?;
    let body = &trimmed[1..];
    let end = body.find(quote)?;
    Some(&body[..end])
}

/// Resolve `specifier` against the directory of asset `from`.
fn resolve_relative(from: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = from.split('/').collect();
    parts.pop();

    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }

    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_imports_finds_static_and_dynamic() {
        let source = r#"
            import { a } from "./a.js";
            import React from 'react';
            const page = () => import( './pages/about.js');
        "#;
        let imports = scan_imports(source);

        assert!(imports.contains(&Import {
            specifier: "./pages/about.js".into(),
            dynamic: true
        }));
        assert!(imports.contains(&Import {
            specifier: "./a.js".into(),
            dynamic: false
        }));
        assert_eq!(imports.len(), 2);
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("index.js", "./chunk.js").as_deref(),
            Some("chunk.js")
        );
        assert_eq!(
            resolve_relative("pages/about.js", "../shared/x.js").as_deref(),
            Some("shared/x.js")
        );
        assert_eq!(resolve_relative("index.js", "../../x.js"), None);
    }

    #[test]
    fn test_asset_id_uses_forward_slashes() {
        assert_eq!(asset_id(Path::new("a/b/c.js")), "a/b/c.js");
    }
}
