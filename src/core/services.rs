use crate::core::{
    interfaces::*,
    models::*,
    plugin::{Plugin, PluginContext, PluginManager},
};
use crate::infrastructure::{
    style_injection, AssetProcessor, BundlePiece, ImageProcessor, LightningCssProcessor,
    OxcScriptProcessor, ScriptBundler, ScssProcessor, TokioFileSystemService,
};
use crate::plugins;
use crate::utils::{KilnError, Logger, Result, Timer};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

// url("a"), url('a') or url(a)
static CSS_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).unwrap()
});

enum AssetOutcome {
    Inline(String),
    Emitted { url: String, asset: Asset },
}

#[derive(Default)]
struct BuildCounters {
    scripts: usize,
    styles: usize,
    assets: usize,
}

/// Runs the transform rules of a [`BuildSettings`] over its entry points
pub struct KilnBuildService {
    fs_service: Arc<dyn FileSystemService>,
    script_processor: Arc<dyn ScriptProcessor>,
    style_processor: Arc<dyn StyleProcessor>,
    image_optimizer: Arc<dyn ImageOptimizer>,
    plugin_manager: PluginManager,
}

impl KilnBuildService {
    pub fn new(
        fs_service: Arc<dyn FileSystemService>,
        script_processor: Arc<dyn ScriptProcessor>,
        style_processor: Arc<dyn StyleProcessor>,
        image_optimizer: Arc<dyn ImageOptimizer>,
    ) -> Self {
        Self {
            fs_service,
            script_processor,
            style_processor,
            image_optimizer,
            plugin_manager: PluginManager::new(),
        }
    }

    /// Default processors plus one plugin per [`PluginSpec`] in `settings`
    pub fn from_settings(settings: &BuildSettings) -> Self {
        let scss = ScssProcessor::new().with_load_path(&settings.source_dir);

        let mut service = Self::new(
            Arc::new(TokioFileSystemService),
            Arc::new(OxcScriptProcessor::new()),
            Arc::new(LightningCssProcessor::with_scss(scss)),
            Arc::new(ImageProcessor::new()),
        );

        for spec in &settings.plugins {
            service = service.with_plugin(plugins::from_spec(spec));
        }
        service
    }

    /// Register a plugin with the build service
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugin_manager.register(plugin);
        self
    }

    pub fn plugin_manager(&self) -> &PluginManager {
        &self.plugin_manager
    }

    fn label(settings: &BuildSettings, path: &Path) -> String {
        forward_slashes(path.strip_prefix(&settings.root).unwrap_or(path))
    }

    /// Manifest key of a font or image: its path under the source directory,
    /// so files sharing a base name stay distinct
    fn asset_logical_name(settings: &BuildSettings, path: &Path) -> String {
        let path = normalize_path(path);
        let source_dir = normalize_path(&settings.source_dir);
        let root = normalize_path(&settings.root);
        let relative = path
            .strip_prefix(&source_dir)
            .or_else(|_| path.strip_prefix(&root))
            .unwrap_or(&path);
        forward_slashes(relative)
    }

    fn step_not_applicable(rule: &TransformRule, step: &TransformStep) -> KilnError {
        KilnError::transform(
            rule.name.clone(),
            format!("step '{}' cannot run in a {:?} rule", step.label(), rule.kind),
        )
    }

    async fn process_entry(
        &self,
        settings: &BuildSettings,
        entry: &EntryPoint,
        compilation: &mut Compilation,
        counters: &mut BuildCounters,
    ) -> Result<()> {
        Logger::processing_entry(&entry.name, entry.sources.len());

        let mut pieces = Vec::new();
        let mut extracted_css = String::new();
        let mut injected_css = String::new();

        for source in &entry.sources {
            let rule = settings
                .rule_for(source)
                .ok_or_else(|| KilnError::NoRule(source.clone()))?;
            let label = Self::label(settings, source);
            Logger::processing_file(&label, &rule.name);

            match rule.kind {
                RuleKind::Script => {
                    let piece = self.process_script(settings, rule, source, label).await?;
                    for warning in &piece.output.warnings {
                        compilation.warn(warning.clone());
                    }
                    pieces.push(piece);
                    counters.scripts += 1;
                }
                RuleKind::Style => {
                    let (css, extract) = self
                        .process_style(settings, rule, source, compilation, counters)
                        .await?;
                    let target = if extract {
                        &mut extracted_css
                    } else {
                        &mut injected_css
                    };
                    target.push_str(&css);
                    if !target.ends_with('\n') {
                        target.push('\n');
                    }
                    counters.styles += 1;
                }
                RuleKind::Font | RuleKind::Image => {
                    if let AssetOutcome::Emitted { asset, .. } =
                        self.process_file_asset(settings, rule, source, false).await?
                    {
                        compilation.emit(asset)?;
                    }
                    counters.assets += 1;
                }
            }
        }

        if !injected_css.is_empty() {
            pieces.push(BundlePiece {
                label: format!("{} styles", entry.name),
                output: ScriptOutput {
                    code: style_injection(&injected_css)?,
                    map: None,
                    warnings: Vec::new(),
                },
                source: injected_css,
            });
        }

        if !pieces.is_empty() {
            self.emit_script_bundle(settings, entry, &pieces, compilation)?;
        }

        if !extracted_css.is_empty() {
            compilation.styles.push(CollectedStyles {
                entry: entry.name.clone(),
                css: extracted_css,
            });
        }

        Ok(())
    }

    async fn process_script(
        &self,
        settings: &BuildSettings,
        rule: &TransformRule,
        source: &Path,
        label: String,
    ) -> Result<BundlePiece> {
        let content = self.fs_service.read_file(source).await?;
        let mut options = ScriptOptions {
            target: None,
            minify: settings.minify,
            source_map: settings.source_maps,
        };

        for step in &rule.steps {
            match step {
                TransformStep::Lint => self.script_processor.lint(&content, source).await?,
                TransformStep::Transpile { target } => options.target = Some(target.clone()),
                other => return Err(Self::step_not_applicable(rule, other)),
            }
        }

        let output = self
            .script_processor
            .transform(&content, source, &options)
            .await?;

        Ok(BundlePiece {
            label,
            source: content,
            output,
        })
    }

    /// Returns the processed CSS and whether it is extracted to a stylesheet
    async fn process_style(
        &self,
        settings: &BuildSettings,
        rule: &TransformRule,
        source: &Path,
        compilation: &mut Compilation,
        counters: &mut BuildCounters,
    ) -> Result<(String, bool)> {
        let mut css = self.fs_service.read_file(source).await?;
        let mut extract = false;

        for step in &rule.steps {
            match step {
                TransformStep::CompileSass => {
                    css = self.style_processor.compile_sass(&css, source).await?;
                }
                TransformStep::PostProcessCss { targets } => {
                    css = self
                        .style_processor
                        .post_process(&css, source, targets, settings.minify)
                        .await?;
                }
                TransformStep::ExtractCss => extract = true,
                other => return Err(Self::step_not_applicable(rule, other)),
            }
        }

        let css = self
            .rewrite_references(settings, source, &css, compilation, counters)
            .await?;
        Ok((css, extract))
    }

    fn resolve_reference(&self, settings: &BuildSettings, source: &Path, reference: &str) -> Option<PathBuf> {
        // `~pkg/file` points into node_modules
        if let Some(module_path) = reference.strip_prefix('~') {
            let candidate = normalize_path(&settings.root.join("node_modules").join(module_path));
            return self.fs_service.file_exists(&candidate).then_some(candidate);
        }

        let candidates = [
            source.parent().map(|dir| dir.join(reference)),
            Some(settings.source_dir.join(reference)),
        ];
        candidates
            .into_iter()
            .flatten()
            .map(|candidate| normalize_path(&candidate))
            .find(|candidate| self.fs_service.file_exists(candidate))
    }

    /// Run referenced fonts and images through their rules and rewrite `url()`s
    async fn rewrite_references(
        &self,
        settings: &BuildSettings,
        source: &Path,
        css: &str,
        compilation: &mut Compilation,
        counters: &mut BuildCounters,
    ) -> Result<String> {
        let label = Self::label(settings, source);

        let mut references: Vec<String> = Vec::new();
        for caps in CSS_URL_REGEX.captures_iter(css) {
            let reference = reference_of(&caps);
            if !AssetProcessor::is_external_reference(reference)
                && !references.iter().any(|r| r == reference)
            {
                references.push(reference.to_string());
            }
        }

        let mut jobs = Vec::new();
        for reference in &references {
            let clean = strip_query(reference);
            match self.resolve_reference(settings, source, clean) {
                Some(path) => match settings.rule_for(&path) {
                    Some(rule) if matches!(rule.kind, RuleKind::Font | RuleKind::Image) => {
                        jobs.push((reference.clone(), path, rule));
                    }
                    _ => compilation.warn(format!(
                        "{} referenced from {} has no asset rule; left unchanged",
                        reference, label
                    )),
                },
                None => compilation.warn(format!(
                    "{} referenced from {} was not found; left unchanged",
                    reference, label
                )),
            }
        }

        let outcomes = join_all(
            jobs.iter()
                .map(|(_, path, rule)| self.process_file_asset(settings, rule, path, true)),
        )
        .await;

        let mut replacements: HashMap<String, String> = HashMap::new();
        for ((reference, _, _), outcome) in jobs.iter().zip(outcomes) {
            counters.assets += 1;
            let replacement = match outcome? {
                AssetOutcome::Inline(uri) => uri,
                AssetOutcome::Emitted { url, asset } => {
                    compilation.emit(asset)?;
                    // keep `?#iefix` style suffixes
                    format!("{}{}", url, &reference[strip_query(reference).len()..])
                }
            };
            replacements.insert(reference.clone(), replacement);
        }

        if replacements.is_empty() {
            return Ok(css.to_string());
        }

        let rewritten = CSS_URL_REGEX.replace_all(css, |caps: &Captures| {
            match replacements.get(reference_of(caps)) {
                Some(new_url) => format!("url(\"{}\")", new_url),
                None => caps[0].to_string(),
            }
        });
        Ok(rewritten.into_owned())
    }

    async fn process_file_asset(
        &self,
        settings: &BuildSettings,
        rule: &TransformRule,
        path: &Path,
        allow_inline: bool,
    ) -> Result<AssetOutcome> {
        let mut bytes = self.fs_service.read_bytes(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                KilnError::transform(rule.name.clone(), format!("invalid file name {}", path.display()))
            })?;
        let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));

        for step in &rule.steps {
            match step {
                TransformStep::OptimizeImage(options) => {
                    bytes = self.image_optimizer.optimize(bytes, path, options).await?;
                }
                TransformStep::InlineSmall { limit } => {
                    if allow_inline && bytes.len() <= *limit {
                        return Ok(AssetOutcome::Inline(AssetProcessor::data_uri(&bytes, path)));
                    }
                }
                TransformStep::EmitFile {
                    name,
                    output_path,
                    public_path,
                } => {
                    let out_name = name.render(stem, ext, &bytes);
                    let kind = if rule.kind == RuleKind::Font {
                        AssetKind::Font
                    } else {
                        AssetKind::Image
                    };

                    return Ok(AssetOutcome::Emitted {
                        url: AssetProcessor::public_url(public_path, &out_name),
                        asset: Asset::new(
                            Self::asset_logical_name(settings, path),
                            output_path.join(&out_name),
                            bytes,
                            kind,
                        ),
                    });
                }
                other => return Err(Self::step_not_applicable(rule, other)),
            }
        }

        Err(KilnError::transform(
            rule.name.clone(),
            format!("{} produced no output", path.display()),
        ))
    }

    fn emit_script_bundle(
        &self,
        settings: &BuildSettings,
        entry: &EntryPoint,
        pieces: &[BundlePiece],
        compilation: &mut Compilation,
    ) -> Result<()> {
        let bundler = ScriptBundler::new(!settings.minify, settings.source_maps);
        let bundle = bundler.assemble(pieces, None)?;

        let file_name = settings
            .output
            .filename
            .render(&entry.name, "js", bundle.code.as_bytes());
        let mut code = bundle.code;

        if let Some(map) = bundle.map {
            let map_name = format!("{}.map", file_name);
            let map_file = Path::new(&map_name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| map_name.clone());
            code.push_str(&format!("//# sourceMappingURL={}\n", map_file));
            compilation.emit(Asset::new(
                format!("{}.js.map", entry.name),
                map_name,
                map,
                AssetKind::SourceMap,
            ))?;
        }

        compilation.emit(Asset::new(
            format!("{}.js", entry.name),
            file_name,
            code.into_bytes(),
            AssetKind::Script,
        ))
    }

    async fn write_assets(&self, settings: &BuildSettings, compilation: &Compilation) -> Result<Vec<OutputFile>> {
        let _timer = Timer::start("Writing output files");
        self.fs_service.create_directory(&settings.output.path).await?;

        let mut output_files = Vec::new();
        for asset in compilation.assets() {
            let path = settings.output.path.join(&asset.path);
            self.fs_service.write_bytes(&path, &asset.content).await?;
            Logger::emitted(&asset.url_path(), asset.content.len());

            output_files.push(OutputFile {
                path,
                size: asset.content.len(),
                kind: asset.kind,
            });
        }

        Ok(output_files)
    }
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn reference_of<'c>(caps: &Captures<'c>) -> &'c str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or("")
}

#[async_trait::async_trait]
impl BuildService for KilnBuildService {
    async fn build(&mut self, settings: &BuildSettings) -> Result<BuildResult> {
        settings.validate()?;

        let build_start = Instant::now();
        let outdir = settings.output.path.display().to_string();
        Logger::build_start(settings.mode.as_str(), &settings.root.display().to_string(), &outdir);

        let context = PluginContext::new(settings.clone());
        self.plugin_manager.on_build_start(&context)?;

        let mut compilation = Compilation::new();
        let mut counters = BuildCounters::default();
        {
            let _timer = Timer::start("Processing entries");
            for entry in &settings.entries {
                self.process_entry(settings, entry, &mut compilation, &mut counters)
                    .await?;
            }
        }

        self.plugin_manager.on_compile(&context, &mut compilation)?;
        self.plugin_manager.on_emit(&context, &mut compilation)?;

        let output_files = self.write_assets(settings, &compilation).await?;

        self.plugin_manager.on_after_emit(&context, &compilation)?;

        for warning in &compilation.warnings {
            Logger::warn(warning);
        }

        let result = BuildResult {
            scripts_processed: counters.scripts,
            styles_processed: counters.styles,
            assets_processed: counters.assets,
            build_time: build_start.elapsed(),
            output_files,
            manifest: compilation.manifest(),
            warnings: compilation.warnings.clone(),
            success: true,
        };

        Logger::build_complete(
            result.output_files.len(),
            result.warnings.len(),
            result.build_time,
            &outdir,
        );

        self.plugin_manager.on_build_end(&context, &result)?;
        Ok(result)
    }
}
