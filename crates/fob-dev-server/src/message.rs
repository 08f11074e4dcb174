//! Messages pushed to connected HMR clients.
//!
//! Each message is one JSON object per SSE `data:` frame, tagged by `type`.

use fob_hmr::{Diagnostic, UpdateEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HmrMessage {
    /// Re-apply these assets in place.
    Update { assets: Vec<HmrAsset> },
    /// The last build failed; show the diagnostics.
    Error { diagnostics: Vec<Diagnostic> },
}

/// One changed asset as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrAsset {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Generated code when the pipeline kept it; the client re-fetches otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Specifiers this asset depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
}

impl HmrMessage {
    pub fn update(event: UpdateEvent<'_>) -> Self {
        let assets = event
            .changed_assets
            .values()
            .map(|asset| HmrAsset {
                id: asset.id.to_string(),
                asset_type: asset.asset_type.clone(),
                output: asset.output.as_deref().map(str::to_string),
                deps: event
                    .graph
                    .dependencies(&asset.id)
                    .into_iter()
                    .map(|dep| dep.specifier)
                    .collect(),
            })
            .collect();
        HmrMessage::Update { assets }
    }

    pub fn error(diagnostics: &[Diagnostic]) -> Self {
        HmrMessage::Error {
            diagnostics: diagnostics.to_vec(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HmrMessage::Error { .. })
    }
}
