use crate::core::models::Compilation;
use crate::core::plugin::{Plugin, PluginContext};
use crate::utils::{KilnError, Logger, Result};
use walkdir::WalkDir;

/// Removes files in the output directory that the current build did not emit
pub struct CleanPlugin;

impl Plugin for CleanPlugin {
    fn name(&self) -> &str {
        "clean"
    }

    fn on_after_emit(&self, context: &PluginContext, compilation: &Compilation) -> Result<()> {
        let outdir = context.outdir();
        if !outdir.is_dir() {
            return Ok(());
        }

        let mut removed = 0;
        for entry in WalkDir::new(outdir).min_depth(1).contents_first(true) {
            let entry = entry.map_err(|e| KilnError::plugin(self.name(), e.to_string()))?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                // only succeeds when empty
                let _ = std::fs::remove_dir(path);
                continue;
            }

            let relative = match path.strip_prefix(outdir) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            if !compilation.contains(relative) {
                std::fs::remove_file(path).map_err(|e| {
                    KilnError::plugin(self.name(), format!("cannot remove {}: {}", path.display(), e))
                })?;
                removed += 1;
            }
        }

        if removed > 0 {
            Logger::info(&format!("🧹 Removed {} stale file(s)", removed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::BuildDescriptor;
    use crate::core::models::{Asset, AssetKind, BuildMode};
    use tempfile::tempdir;

    #[test]
    fn test_removes_only_stale_files() {
        let dir = tempdir().unwrap();
        let settings = BuildDescriptor::new(dir.path()).resolve(BuildMode::Production);
        let outdir = settings.output.path.clone();

        std::fs::create_dir_all(outdir.join("assets/old")).unwrap();
        std::fs::write(outdir.join("app.new.js"), "new").unwrap();
        std::fs::write(outdir.join("app.old.js"), "old").unwrap();
        std::fs::write(outdir.join("assets/old/font.woff"), "old").unwrap();
        std::fs::write(dir.path().join("outside.txt"), "keep").unwrap();

        let mut compilation = Compilation::new();
        compilation.emit(Asset::new("app.js", "app.new.js", b"new".to_vec(), AssetKind::Script)).unwrap();

        CleanPlugin
            .on_after_emit(&PluginContext::new(settings), &compilation)
            .unwrap();

        assert!(outdir.join("app.new.js").exists());
        assert!(!outdir.join("app.old.js").exists());
        assert!(!outdir.join("assets").exists());
        assert!(outdir.exists());
        assert!(dir.path().join("outside.txt").exists());
    }

    #[test]
    fn test_missing_outdir_is_fine() {
        let dir = tempdir().unwrap();
        let settings = BuildDescriptor::new(dir.path().join("nothing")).resolve(BuildMode::Development);

        assert!(CleanPlugin
            .on_after_emit(&PluginContext::new(settings), &Compilation::new())
            .is_ok());
    }
}
