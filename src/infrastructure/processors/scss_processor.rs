use crate::utils::{ErrorContext, KilnError, Logger, Result, Timer};
use std::path::Path;

/// SCSS/SASS compiler using the grass crate
///
/// Imports resolve relative to the compiled file, then against the extra
/// load paths.
#[derive(Clone, Default)]
pub struct ScssProcessor {
    load_paths: Vec<std::path::PathBuf>,
}

impl ScssProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }

    /// Compile SCSS/SASS to expanded CSS; minification happens in post-processing
    pub fn compile(&self, content: &str, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        let _timer = Timer::start(&format!("Compiling SCSS {}", file_name));
        Logger::debug(&format!("🎨 Compiling SCSS: {}", file_name));

        let syntax = if path.extension().and_then(|s| s.to_str()) == Some("sass") {
            grass::InputSyntax::Sass
        } else {
            grass::InputSyntax::Scss
        };

        let mut options = grass::Options::default()
            .input_syntax(syntax)
            .style(grass::OutputStyle::Expanded);

        if let Some(parent) = path.parent() {
            options = options.load_path(parent);
        }
        for load_path in &self.load_paths {
            options = options.load_path(load_path);
        }

        grass::from_string(content.to_string(), &options).map_err(|e| {
            KilnError::parse_with_context(
                format!("SCSS compilation failed: {}", e),
                ErrorContext::new().with_file(path.to_path_buf()),
            )
        })
    }
}
