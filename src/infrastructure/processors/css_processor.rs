use crate::core::interfaces::StyleProcessor;
use crate::core::models::BrowserTargets;
use crate::infrastructure::processors::ScssProcessor;
use crate::utils::{Logger, Result, Timer};
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use std::path::Path;

/// Sass compilation (grass) followed by prefixing and minification (Lightning CSS)
#[derive(Clone, Default)]
pub struct LightningCssProcessor {
    scss: ScssProcessor,
}

impl LightningCssProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scss(scss: ScssProcessor) -> Self {
        Self { scss }
    }

    fn targets(targets: &BrowserTargets) -> Targets {
        // Lightning CSS packs versions as major << 16 | minor << 8 | patch
        Targets::from(Browsers {
            chrome: Some(targets.chrome << 16),
            firefox: Some(targets.firefox << 16),
            safari: Some(targets.safari << 16),
            edge: Some(targets.edge << 16),
            ..Browsers::default()
        })
    }

    pub fn process(css: &str, path: &Path, targets: &BrowserTargets, minify: bool) -> std::result::Result<String, String> {
        let mut stylesheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: path.display().to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        stylesheet
            .minify(MinifyOptions {
                targets: Self::targets(targets),
                ..MinifyOptions::default()
            })
            .map_err(|e| e.to_string())?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify,
                targets: Self::targets(targets),
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;

        Ok(printed.code)
    }

    fn fallback_minify(content: &str, minify: bool) -> String {
        if minify {
            content
                .lines()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("")
        } else {
            content.to_string()
        }
    }
}

#[async_trait::async_trait]
impl StyleProcessor for LightningCssProcessor {
    async fn compile_sass(&self, content: &str, path: &Path) -> Result<String> {
        self.scss.compile(content, path)
    }

    async fn post_process(
        &self,
        css: &str,
        path: &Path,
        targets: &BrowserTargets,
        minify: bool,
    ) -> Result<String> {
        let _timer = Timer::start(&format!(
            "Processing CSS {}",
            path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown")
        ));

        match Self::process(css, path, targets, minify) {
            Ok(code) => Ok(code),
            Err(message) => {
                Logger::warn(&format!(
                    "CSS processing failed for {} ({}), using fallback minification",
                    path.display(),
                    message
                ));
                Ok(Self::fallback_minify(css, minify))
            }
        }
    }
}
