use crate::core::models::*;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write_bytes(&self, path: &Path, content: &[u8]) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// Options for one script transform pass
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Lowering target such as `es2015`; `None` keeps the input syntax
    pub target: Option<String>,
    pub minify: bool,
    pub source_map: bool,
}

/// Result of transforming a single script source
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub code: String,
    /// Source map JSON for `code`, relative to the input file
    pub map: Option<String>,
    pub warnings: Vec<String>,
}

/// JavaScript linting and transformation interface
#[async_trait]
pub trait ScriptProcessor: Send + Sync {
    async fn lint(&self, source: &str, path: &Path) -> Result<()>;
    async fn transform(&self, source: &str, path: &Path, options: &ScriptOptions) -> Result<ScriptOutput>;
}

/// Sass compilation and CSS post-processing interface
#[async_trait]
pub trait StyleProcessor: Send + Sync {
    async fn compile_sass(&self, content: &str, path: &Path) -> Result<String>;
    async fn post_process(
        &self,
        css: &str,
        path: &Path,
        targets: &BrowserTargets,
        minify: bool,
    ) -> Result<String>;
}

/// Image optimization interface
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    async fn optimize(
        &self,
        bytes: Vec<u8>,
        path: &Path,
        options: &ImageOptimizeOptions,
    ) -> Result<Vec<u8>>;
}

/// Build service interface
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn build(&mut self, settings: &BuildSettings) -> Result<BuildResult>;
}
