use crate::core::models::{Asset, AssetKind, Compilation};
use crate::core::plugin::{Plugin, PluginContext};
use crate::utils::{KilnError, Result};

/// Emits a JSON map from logical asset names to their emitted paths
pub struct ManifestPlugin {
    filename: String,
}

impl ManifestPlugin {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        "manifest"
    }

    fn on_emit(&self, _context: &PluginContext, compilation: &mut Compilation) -> Result<()> {
        let manifest = serde_json::to_string_pretty(&compilation.manifest())
            .map_err(|e| KilnError::plugin(self.name(), e.to_string()))?;

        compilation.emit(Asset::new(
            self.filename.clone(),
            self.filename.clone(),
            manifest.into_bytes(),
            AssetKind::Manifest,
        ))
    }
}
