// Built-in post-build plugins

pub mod clean_plugin;
pub mod css_extract_plugin;
pub mod html_plugin;
pub mod manifest_plugin;

pub use clean_plugin::CleanPlugin;
pub use css_extract_plugin::CssExtractPlugin;
pub use html_plugin::HtmlPlugin;
pub use manifest_plugin::ManifestPlugin;

use crate::core::models::PluginSpec;
use crate::core::plugin::Plugin;
use std::sync::Arc;

/// Instantiate the plugin described by a resolved [`PluginSpec`]
pub fn from_spec(spec: &PluginSpec) -> Arc<dyn Plugin> {
    match spec {
        PluginSpec::Html(options) => Arc::new(HtmlPlugin::new(options.clone())),
        PluginSpec::ExtractCss { filename } => Arc::new(CssExtractPlugin::new(filename.clone())),
        PluginSpec::Clean => Arc::new(CleanPlugin),
        PluginSpec::Manifest { filename } => Arc::new(ManifestPlugin::new(filename.clone())),
    }
}
