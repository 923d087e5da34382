use crate::core::descriptor::BuildDescriptor;
use crate::core::models::EntryPoint;
use crate::utils::{KilnError, Logger, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kiln.config.json";

/// Configuration file format (kiln.config.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KilnConfig {
    /// Entry name to source files, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<BTreeMap<String, Vec<String>>>,

    /// Output directory (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdir: Option<String>,

    /// Source directory (default: "src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcdir: Option<String>,

    /// Page title for the generated HTML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTML template path (default: "src/index.html")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Extra `<meta name=... content=...>` tags, merged over the defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, String>>,

    /// Images up to this many bytes are inlined as data URIs (default: 8192)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<usize>,

    /// Path segments excluded from script and style rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// Enable/disable source maps (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,
}

/// Config loader that supports config files with CLI override
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `kiln.config.json` from the project root if it exists
    pub fn load_from_file(root: &Path) -> Result<Option<KilnConfig>> {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            Logger::debug(&format!("No {} found, using defaults", CONFIG_FILE));
            return Ok(None);
        }

        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(&config_path)?;
        let config: KilnConfig = serde_json::from_str(&content)
            .map_err(|e| KilnError::config(format!("Failed to parse {}: {}", CONFIG_FILE, e)))?;

        Ok(Some(config))
    }

    /// Merge file config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(
        file_config: Option<KilnConfig>,
        root: PathBuf,
        outdir: Option<&str>,
        source_maps: Option<bool>,
    ) -> BuildDescriptor {
        let config = file_config.unwrap_or_default();
        let mut descriptor = BuildDescriptor::new(root);

        if let Some(dir) = outdir.map(str::to_string).or(config.outdir) {
            descriptor.output_dir = PathBuf::from(dir);
        }
        if let Some(srcdir) = config.srcdir {
            descriptor.source_dir = PathBuf::from(srcdir);
        }
        if let Some(entries) = config.entry {
            descriptor.entries = entries
                .into_iter()
                .map(|(name, sources)| {
                    EntryPoint::new(name, sources.into_iter().map(PathBuf::from).collect())
                })
                .collect();
        }
        if let Some(title) = config.title {
            descriptor.html.title = title;
        }
        if let Some(template) = config.template {
            descriptor.html.template = PathBuf::from(template);
        }
        if let Some(meta) = config.meta {
            descriptor.html.meta.extend(meta);
        }
        if let Some(limit) = config.inline_limit {
            descriptor.inline_limit = limit;
        }
        if let Some(exclude) = config.exclude {
            descriptor.exclude = exclude;
        }
        if let Some(enabled) = source_maps.or(config.source_maps) {
            descriptor.source_maps = enabled;
        }

        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::BuildMode;

    #[test]
    fn test_load_from_file_not_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load_from_file(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_from_file_valid() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            r#"{"outdir": "build", "inlineLimit": 1024, "entry": {"main": ["src/main.js"]}}"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.outdir.as_deref(), Some("build"));
        assert_eq!(config.inline_limit, Some(1024));
        assert_eq!(config.entry.unwrap()["main"], vec!["src/main.js".to_string()]);
    }

    #[test]
    fn test_load_from_file_rejects_unknown_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), r#"{"outDirectory": "x"}"#).unwrap();

        let err = ConfigLoader::load_from_file(temp_dir.path()).unwrap_err();
        assert!(matches!(err, KilnError::Config(_)));
    }

    #[test]
    fn test_merge_with_cli_override() {
        let file_config = KilnConfig {
            outdir: Some("build".to_string()),
            source_maps: Some(false),
            title: Some("Shop".to_string()),
            ..Default::default()
        };

        let descriptor = ConfigLoader::merge_with_cli(
            Some(file_config),
            PathBuf::from("/srv/app"),
            Some("public"),
            None,
        );

        assert_eq!(descriptor.output_dir, PathBuf::from("public"));
        assert!(!descriptor.source_maps);
        assert_eq!(descriptor.html.title, "Shop");

        let settings = descriptor.resolve(BuildMode::Production);
        assert_eq!(settings.output.path, PathBuf::from("/srv/app/public"));
    }

    #[test]
    fn test_merge_without_file_keeps_defaults() {
        let descriptor = ConfigLoader::merge_with_cli(None, PathBuf::from("/srv/app"), None, None);
        assert_eq!(descriptor, BuildDescriptor::new("/srv/app"));
    }

    #[test]
    fn test_meta_merges_over_defaults() {
        let mut meta = BTreeMap::new();
        meta.insert("theme-color".to_string(), "#000000".to_string());
        meta.insert("description".to_string(), "demo".to_string());

        let descriptor = ConfigLoader::merge_with_cli(
            Some(KilnConfig {
                meta: Some(meta),
                ..Default::default()
            }),
            PathBuf::from("."),
            None,
            None,
        );

        assert_eq!(descriptor.html.meta["theme-color"], "#000000");
        assert_eq!(descriptor.html.meta["description"], "demo");
        assert!(descriptor.html.meta.contains_key("viewport"));
    }
}
