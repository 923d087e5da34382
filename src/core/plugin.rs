// Plugin system for Kiln
// Post-build plugins hook into the compilation lifecycle

use crate::core::models::{BuildResult, BuildSettings, Compilation};
use crate::utils::Result;
use std::path::Path;
use std::sync::Arc;

/// Context provided to plugins during execution
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub settings: BuildSettings,
}

impl PluginContext {
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn outdir(&self) -> &Path {
        &self.settings.output.path
    }
}

/// Main plugin trait that all plugins must implement
///
/// Hooks run in this order for every build:
/// - `on_build_start` before any source is read
/// - `on_compile` once every entry has been transformed
/// - `on_emit` before assets are written, to add or replace assets
/// - `on_after_emit` once assets are on disk
/// - `on_build_end` with the final result
pub trait Plugin: Send + Sync {
    /// Unique name for this plugin
    fn name(&self) -> &str;

    fn on_build_start(&self, _context: &PluginContext) -> Result<()> {
        Ok(())
    }

    fn on_compile(&self, _context: &PluginContext, _compilation: &mut Compilation) -> Result<()> {
        Ok(())
    }

    fn on_emit(&self, _context: &PluginContext, _compilation: &mut Compilation) -> Result<()> {
        Ok(())
    }

    fn on_after_emit(&self, _context: &PluginContext, _compilation: &Compilation) -> Result<()> {
        Ok(())
    }

    fn on_build_end(&self, _context: &PluginContext, _result: &BuildResult) -> Result<()> {
        Ok(())
    }
}

/// Manages plugin registration and execution
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn on_build_start(&self, context: &PluginContext) -> Result<()> {
        for plugin in &self.plugins {
            plugin.on_build_start(context)?;
        }
        Ok(())
    }

    pub fn on_compile(&self, context: &PluginContext, compilation: &mut Compilation) -> Result<()> {
        for plugin in &self.plugins {
            plugin.on_compile(context, compilation)?;
        }
        Ok(())
    }

    /// Plugins run in registration order; later plugins see earlier emissions
    pub fn on_emit(&self, context: &PluginContext, compilation: &mut Compilation) -> Result<()> {
        for plugin in &self.plugins {
            plugin.on_emit(context, compilation)?;
        }
        Ok(())
    }

    pub fn on_after_emit(&self, context: &PluginContext, compilation: &Compilation) -> Result<()> {
        for plugin in &self.plugins {
            plugin.on_after_emit(context, compilation)?;
        }
        Ok(())
    }

    pub fn on_build_end(&self, context: &PluginContext, result: &BuildResult) -> Result<()> {
        for plugin in &self.plugins {
            plugin.on_build_end(context, result)?;
        }
        Ok(())
    }
}
