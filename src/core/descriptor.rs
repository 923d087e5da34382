//! Build configuration descriptor
//!
//! Maps a [`BuildMode`] plus the fixed project layout to the immutable
//! [`BuildSettings`] consumed by the build service. Resolution does no I/O,
//! so resolving twice with the same inputs yields equal settings.

use crate::core::models::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SCRIPT_FILENAME: &str = "[name].[hash].js";
pub const STYLE_FILENAME: &str = "assets/[name].[hash].css";
pub const DEV_ASSET_FILENAME: &str = "[name].[ext]";
pub const PROD_ASSET_FILENAME: &str = "[name].[hash].[ext]";
pub const DEFAULT_INLINE_LIMIT: usize = 8192;
pub const DEFAULT_TRANSPILE_TARGET: &str = "es2015";

/// Project layout and options that do not depend on the build mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub root: PathBuf,
    /// Relative to `root`
    pub source_dir: PathBuf,
    /// Relative to `root` unless absolute
    pub output_dir: PathBuf,
    /// Entry sources are relative to `root`
    pub entries: Vec<EntryPoint>,
    pub html: HtmlOptions,
    pub inline_limit: usize,
    pub exclude: Vec<String>,
    pub source_maps: bool,
    pub public_path: String,
}

impl BuildDescriptor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert(
            "viewport".to_string(),
            "width=device-width, initial-scale=1, shrink-to-fit=no".to_string(),
        );
        meta.insert("theme-color".to_string(), "#4285f4".to_string());

        Self {
            root: root.into(),
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("dist"),
            entries: vec![EntryPoint::new(
                "app",
                vec![
                    PathBuf::from("src/assets/scss/app.scss"),
                    PathBuf::from("src/assets/js/app.js"),
                ],
            )],
            html: HtmlOptions {
                title: "Custom template".to_string(),
                template: PathBuf::from("src/index.html"),
                filename: "index.html".to_string(),
                meta,
            },
            inline_limit: DEFAULT_INLINE_LIMIT,
            exclude: vec!["node_modules".to_string(), "bower_components".to_string()],
            source_maps: true,
            public_path: String::new(),
        }
    }

    /// Resolve the settings for one build invocation
    pub fn resolve(&self, mode: BuildMode) -> BuildSettings {
        let asset_filename = if mode.is_development() {
            NameTemplate::new(DEV_ASSET_FILENAME)
        } else {
            NameTemplate::new(PROD_ASSET_FILENAME)
        };

        let output_path = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.root.join(&self.output_dir)
        };

        let entries = self
            .entries
            .iter()
            .map(|entry| {
                EntryPoint::new(
                    entry.name.clone(),
                    entry.sources.iter().map(|s| self.root.join(s)).collect(),
                )
            })
            .collect();

        BuildSettings {
            mode,
            root: self.root.clone(),
            source_dir: self.root.join(&self.source_dir),
            watch: mode.is_development(),
            source_maps: self.source_maps,
            minify: !mode.is_development(),
            entries,
            output: OutputSettings {
                path: output_path,
                filename: NameTemplate::new(SCRIPT_FILENAME),
                public_path: self.public_path.clone(),
            },
            rules: self.rules(asset_filename),
            plugins: self.plugins(),
            dev_server: DevServerSettings {
                overlay: true,
                content_base: self.root.join(&self.source_dir),
                disable_host_check: true,
            },
        }
    }

    fn rules(&self, asset_filename: NameTemplate) -> Vec<TransformRule> {
        let css_targets = BrowserTargets::default();

        vec![
            TransformRule {
                name: "scripts".to_string(),
                kind: RuleKind::Script,
                test: ExtensionPattern::new(&["js", "mjs"]),
                exclude: self.exclude.clone(),
                steps: vec![
                    TransformStep::Lint,
                    TransformStep::Transpile {
                        target: DEFAULT_TRANSPILE_TARGET.to_string(),
                    },
                ],
            },
            TransformRule {
                name: "sass".to_string(),
                kind: RuleKind::Style,
                test: ExtensionPattern::new(&["scss", "sass"]),
                exclude: self.exclude.clone(),
                steps: vec![
                    TransformStep::CompileSass,
                    TransformStep::PostProcessCss {
                        targets: css_targets.clone(),
                    },
                    TransformStep::ExtractCss,
                ],
            },
            TransformRule {
                name: "css".to_string(),
                kind: RuleKind::Style,
                test: ExtensionPattern::new(&["css"]),
                exclude: self.exclude.clone(),
                steps: vec![
                    TransformStep::PostProcessCss {
                        targets: css_targets,
                    },
                    TransformStep::ExtractCss,
                ],
            },
            TransformRule {
                name: "fonts".to_string(),
                kind: RuleKind::Font,
                test: ExtensionPattern::new(&["woff", "woff2", "eot", "ttf", "otf"]),
                exclude: Vec::new(),
                steps: vec![TransformStep::EmitFile {
                    name: asset_filename.clone(),
                    output_path: PathBuf::from("assets/fonts"),
                    public_path: "../assets/fonts".to_string(),
                }],
            },
            TransformRule {
                name: "images".to_string(),
                kind: RuleKind::Image,
                test: ExtensionPattern::new(&["jpg", "jpeg", "png", "gif", "svg"]),
                exclude: Vec::new(),
                steps: vec![
                    TransformStep::OptimizeImage(ImageOptimizeOptions::default()),
                    TransformStep::InlineSmall {
                        limit: self.inline_limit,
                    },
                    TransformStep::EmitFile {
                        name: asset_filename,
                        output_path: PathBuf::from("assets/images"),
                        public_path: "../assets/images".to_string(),
                    },
                ],
            },
        ]
    }

    fn plugins(&self) -> Vec<PluginSpec> {
        let mut html = self.html.clone();
        html.template = self.root.join(&html.template);

        vec![
            PluginSpec::Html(html),
            PluginSpec::ExtractCss {
                filename: NameTemplate::new(STYLE_FILENAME),
            },
            PluginSpec::Clean,
            PluginSpec::Manifest {
                filename: "manifest.json".to_string(),
            },
        ]
    }
}

impl Default for BuildDescriptor {
    fn default() -> Self {
        Self::new(".")
    }
}
