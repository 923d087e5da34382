use crate::utils::{content_hash, KilnError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Development or production; selects naming, minification and watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn is_development(&self) -> bool {
        matches!(self, BuildMode::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(KilnError::config(format!(
                "unknown build mode '{}' (expected development or production)",
                other
            ))),
        }
    }
}

/// A named bundle and the source files concatenated into it, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub name: String,
    pub sources: Vec<PathBuf>,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, sources: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }
}

/// Output filename template with `[name]`, `[hash]` and `[ext]` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_hashed(&self) -> bool {
        self.0.contains("[hash]")
    }

    pub fn has_name(&self) -> bool {
        self.0.contains("[name]")
    }

    pub fn render(&self, name: &str, ext: &str, content: &[u8]) -> String {
        let mut rendered = self.0.replace("[ext]", ext);
        if self.is_hashed() {
            rendered = rendered.replace("[hash]", &content_hash(content));
        }
        rendered.replace("[name]", name)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSettings {
    pub path: PathBuf,
    pub filename: NameTemplate,
    pub public_path: String,
}

/// Set of file extensions a rule applies to, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtensionPattern {
    extensions: BTreeSet<String>,
}

impl ExtensionPattern {
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn matches(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    pub fn overlaps(&self, other: &ExtensionPattern) -> bool {
        !self.extensions.is_disjoint(&other.extensions)
    }
}

/// Lowercased final extension, ignoring any `?query` or `#fragment` suffix
pub fn extension_of(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let file_name = strip_query(file_name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Resolve `.` and `..` lexically, without touching the file system
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub fn strip_query(reference: &str) -> &str {
    let end = reference
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(reference.len());
    &reference[..end]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOptimizeOptions {
    pub gif_interlaced: bool,
    pub jpeg_quality: u8,
    /// 1 (slowest, smallest) to 11 (fastest)
    pub png_speed: u8,
    pub svg_remove_title: bool,
    pub svg_remove_comments: bool,
}

impl Default for ImageOptimizeOptions {
    fn default() -> Self {
        Self {
            gif_interlaced: false,
            jpeg_quality: 75,
            png_speed: 2,
            svg_remove_title: true,
            svg_remove_comments: true,
        }
    }
}

/// Browser floor handed to the CSS post-processor, as major versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserTargets {
    pub chrome: u32,
    pub firefox: u32,
    pub safari: u32,
    pub edge: u32,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: 61,
            firefox: 60,
            safari: 11,
            edge: 79,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TransformStep {
    Lint,
    Transpile {
        target: String,
    },
    CompileSass,
    PostProcessCss {
        targets: BrowserTargets,
    },
    ExtractCss,
    OptimizeImage(ImageOptimizeOptions),
    InlineSmall {
        limit: usize,
    },
    EmitFile {
        name: NameTemplate,
        output_path: PathBuf,
        public_path: String,
    },
}

impl TransformStep {
    pub fn label(&self) -> &'static str {
        match self {
            TransformStep::Lint => "lint",
            TransformStep::Transpile { .. } => "transpile",
            TransformStep::CompileSass => "compile-sass",
            TransformStep::PostProcessCss { .. } => "postprocess-css",
            TransformStep::ExtractCss => "extract-css",
            TransformStep::OptimizeImage(_) => "optimize-image",
            TransformStep::InlineSmall { .. } => "inline-small",
            TransformStep::EmitFile { .. } => "emit-file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Script,
    Style,
    Font,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformRule {
    pub name: String,
    pub kind: RuleKind,
    pub test: ExtensionPattern,
    /// Path segments that exclude a file from this rule
    pub exclude: Vec<String>,
    pub steps: Vec<TransformStep>,
}

impl TransformRule {
    pub fn matches(&self, path: &Path) -> bool {
        if !self.test.matches(path) {
            return false;
        }

        !path.components().any(|component| {
            let segment = component.as_os_str().to_string_lossy();
            self.exclude.iter().any(|excluded| segment == excluded.as_str())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlOptions {
    pub title: String,
    pub template: PathBuf,
    pub filename: String,
    pub meta: BTreeMap<String, String>,
}

/// Post-build plugins, run in declaration order within each hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "plugin", rename_all = "snake_case")]
pub enum PluginSpec {
    Html(HtmlOptions),
    ExtractCss { filename: NameTemplate },
    Clean,
    Manifest { filename: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevServerSettings {
    pub overlay: bool,
    pub content_base: PathBuf,
    pub disable_host_check: bool,
}

/// Fully resolved, immutable settings for one build invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    pub mode: BuildMode,
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub watch: bool,
    pub source_maps: bool,
    pub minify: bool,
    pub entries: Vec<EntryPoint>,
    pub output: OutputSettings,
    pub rules: Vec<TransformRule>,
    pub plugins: Vec<PluginSpec>,
    pub dev_server: DevServerSettings,
}

impl BuildSettings {
    /// The single rule that applies to `path`, if any
    pub fn rule_for(&self, path: &Path) -> Option<&TransformRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn style_filename(&self) -> Option<&NameTemplate> {
        self.plugins.iter().find_map(|plugin| match plugin {
            PluginSpec::ExtractCss { filename } => Some(filename),
            _ => None,
        })
    }

    pub fn validate(&self) -> crate::utils::Result<()> {
        // stale-file cleanup deletes anything under the output directory
        let output = normalize_path(&self.output.path);
        for (what, protected) in [("project root", &self.root), ("source directory", &self.source_dir)] {
            if normalize_path(protected).starts_with(&output) {
                return Err(KilnError::config(format!(
                    "output directory {} contains the {} {}",
                    self.output.path.display(),
                    what,
                    protected.display()
                )));
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            for other in &self.rules[i + 1..] {
                if rule.test.overlaps(&other.test) {
                    return Err(KilnError::config(format!(
                        "rules '{}' and '{}' both match some extensions",
                        rule.name, other.name
                    )));
                }
            }
        }

        let mut names = BTreeSet::new();
        for entry in &self.entries {
            if entry.sources.is_empty() {
                return Err(KilnError::config(format!(
                    "entry '{}' has no source files",
                    entry.name
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(KilnError::config(format!(
                    "entry '{}' is declared twice",
                    entry.name
                )));
            }
        }

        let mut templates = vec![&self.output.filename];
        templates.extend(self.style_filename());
        for rule in &self.rules {
            for step in &rule.steps {
                if let TransformStep::EmitFile { name, .. } = step {
                    templates.push(name);
                }
            }
        }
        if let Some(bad) = templates.into_iter().find(|t| !t.has_name()) {
            return Err(KilnError::config(format!(
                "output template '{}' has no [name] placeholder",
                bad
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    SourceMap,
    Stylesheet,
    Font,
    Image,
    Html,
    Manifest,
}

/// A file to be written under the output directory
#[derive(Debug, Clone)]
pub struct Asset {
    /// Manifest key, e.g. `app.js` or `assets/img/logo.png` (path under the source directory)
    pub logical_name: String,
    /// Path relative to the output directory
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub kind: AssetKind,
}

impl Asset {
    pub fn new(
        logical_name: impl Into<String>,
        path: impl Into<PathBuf>,
        content: Vec<u8>,
        kind: AssetKind,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            path: path.into(),
            content,
            kind,
        }
    }

    /// Forward-slash relative path, as written into HTML and the manifest
    pub fn url_path(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Stylesheet text collected for an entry before extraction
#[derive(Debug, Clone, Default)]
pub struct CollectedStyles {
    pub entry: String,
    pub css: String,
}

/// Mutable state shared by the pipeline and plugins during one build
#[derive(Debug, Default)]
pub struct Compilation {
    assets: BTreeMap<PathBuf, Asset>,
    pub styles: Vec<CollectedStyles>,
    pub warnings: Vec<String>,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset. Emitting identical content to the same path again is a
    /// no-op; different content on one path, or one logical name on two
    /// paths, is a conflict.
    pub fn emit(&mut self, asset: Asset) -> crate::utils::Result<()> {
        if let Some(existing) = self.assets.get(&asset.path) {
            if existing.content != asset.content {
                return Err(KilnError::build(format!(
                    "conflict: '{}' and '{}' emit different content to {}",
                    existing.logical_name,
                    asset.logical_name,
                    asset.url_path()
                )));
            }
        }

        if let Some(other) = self
            .assets
            .values()
            .find(|a| a.logical_name == asset.logical_name && a.path != asset.path)
        {
            return Err(KilnError::build(format!(
                "conflict: '{}' is emitted to both {} and {}",
                asset.logical_name,
                other.url_path(),
                asset.url_path()
            )));
        }

        self.assets.insert(asset.path.clone(), asset);
        Ok(())
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn assets_of(&self, kind: AssetKind) -> impl Iterator<Item = &Asset> {
        self.assets.values().filter(move |asset| asset.kind == kind)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.assets.contains_key(path)
    }

    /// Logical name to output path for every asset except manifests
    pub fn manifest(&self) -> BTreeMap<String, String> {
        self.assets
            .values()
            .filter(|asset| asset.kind != AssetKind::Manifest)
            .map(|asset| (asset.logical_name.clone(), asset.url_path()))
            .collect()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size: usize,
    pub kind: AssetKind,
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub scripts_processed: usize,
    pub styles_processed: usize,
    pub assets_processed: usize,
    pub build_time: Duration,
    pub output_files: Vec<OutputFile>,
    pub manifest: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub success: bool,
}
