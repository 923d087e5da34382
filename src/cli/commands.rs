use crate::core::{interfaces::BuildService, models::*, services::KilnBuildService};
use crate::utils::{ConfigLoader, KilnWatcher, Logger, Result, WatchConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Kiln - mode-aware asset pipeline for scripts, styles, fonts and images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project (development builds keep watching)
    Build {
        /// development or production
        #[arg(short, long, default_value = "development")]
        mode: BuildMode,
        /// Root directory
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Output directory (overrides kiln.config.json)
        #[arg(short, long)]
        outdir: Option<String>,
        /// Build once even in development mode
        #[arg(long)]
        no_watch: bool,
    },
    /// Print the resolved build settings as JSON
    Inspect {
        #[arg(short, long, default_value = "development")]
        mode: BuildMode,
        #[arg(short, long, default_value = ".")]
        root: String,
    },
    /// Show pipeline information
    Info,
}

#[derive(Default)]
pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        Logger::init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Build {
                mode,
                root,
                outdir,
                no_watch,
            } => self.handle_build_command(mode, &root, outdir.as_deref(), no_watch).await,
            Commands::Inspect { mode, root } => self.handle_inspect_command(mode, &root),
            Commands::Info => {
                self.handle_info_command();
                Ok(())
            }
        }
    }

    fn resolve_settings(&self, mode: BuildMode, root: &str, outdir: Option<&str>) -> Result<BuildSettings> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| PathBuf::from(root));
        let file_config = ConfigLoader::load_from_file(&root)?;
        let descriptor = ConfigLoader::merge_with_cli(file_config, root, outdir, None);

        let settings = descriptor.resolve(mode);
        settings.validate()?;
        Ok(settings)
    }

    async fn handle_build_command(
        &self,
        mode: BuildMode,
        root: &str,
        outdir: Option<&str>,
        no_watch: bool,
    ) -> Result<()> {
        let mut settings = self.resolve_settings(mode, root, outdir)?;
        if no_watch {
            settings.watch = false;
        }

        let mut build_service = KilnBuildService::from_settings(&settings);

        if settings.watch {
            let watcher = KilnWatcher::new(WatchConfig::for_settings(&settings), settings.clone());
            return watcher.watch(&mut build_service).await;
        }

        let result = build_service.build(&settings).await?;
        Logger::info(&format!(
            "📦 {} scripts, {} styles, {} assets → {} files",
            result.scripts_processed,
            result.styles_processed,
            result.assets_processed,
            result.output_files.len()
        ));
        Ok(())
    }

    fn handle_inspect_command(&self, mode: BuildMode, root: &str) -> Result<()> {
        let settings = self.resolve_settings(mode, root, None)?;
        println!("{}", serde_json::to_string_pretty(&settings)?);
        Ok(())
    }

    fn handle_info_command(&self) {
        tracing::info!("🔥 Kiln v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("══════════════════════════════════════");
        tracing::info!("🏗️  Pipeline:");
        tracing::info!("  • Scripts: oxc lint, transpile and minify, bundled per entry");
        tracing::info!("  • Styles: grass for Sass, Lightning CSS for prefixing and minification");
        tracing::info!("  • Fonts and images: optimized, inlined when small, emitted otherwise");
        tracing::info!("");
        tracing::info!("🎯 Modes:");
        tracing::info!("  • development: readable output, stable asset names, watch");
        tracing::info!("  • production: minified output, content-hashed names");
        tracing::info!("");
        tracing::info!("🔌 Plugins: html, extract-css, clean, manifest");
    }
}
