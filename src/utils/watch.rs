// Watch mode: rebuild on source changes

use crate::core::interfaces::BuildService;
use crate::core::models::BuildSettings;
use crate::utils::config_loader::CONFIG_FILE;
use crate::utils::{KilnError, Logger, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

/// Configuration for watch mode
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Paths to watch for changes
    pub watch_paths: Vec<PathBuf>,
    /// Debounce delay in milliseconds
    pub debounce_ms: u64,
    pub verbose: bool,
}

impl WatchConfig {
    /// Watch the source directory. Config file changes need a restart.
    pub fn for_settings(settings: &BuildSettings) -> Self {
        Self {
            watch_paths: vec![settings.source_dir.clone()],
            ..Self::default()
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_paths: vec![PathBuf::from("src")],
            debounce_ms: 100,
            verbose: false,
        }
    }
}

/// File watcher that monitors changes and triggers full rebuilds
pub struct KilnWatcher {
    config: WatchConfig,
    settings: BuildSettings,
}

impl KilnWatcher {
    pub fn new(config: WatchConfig, settings: BuildSettings) -> Self {
        Self { config, settings }
    }

    /// Run an initial build, then rebuild on every debounced batch of changes until Ctrl+C
    pub async fn watch<B: BuildService>(&self, build_service: &mut B) -> Result<()> {
        Logger::info("👀 Watch mode started - monitoring for changes...");
        Logger::info(&format!(
            "   Watching: {}",
            self.config
                .watch_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        Logger::info("   Press Ctrl+C to stop");
        if self.settings.root.join(CONFIG_FILE).exists() {
            Logger::info(&format!("   Restart to apply changes to {}", CONFIG_FILE));
        }

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| KilnError::Watch(format!("Failed to create watcher: {}", e)))?;

        for path in &self.config.watch_paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(|e| KilnError::Watch(format!("Failed to watch {}: {}", path.display(), e)))?;
            }
        }

        match build_service.build(&self.settings).await {
            Ok(_) => Logger::info("✅ Initial build complete"),
            Err(e) => Logger::error(&format!("Initial build failed:\n{}", e.format_detailed())),
        }

        self.process_events(rx, build_service).await
    }

    async fn process_events<B: BuildService>(
        &self,
        rx: Receiver<Event>,
        build_service: &mut B,
    ) -> Result<()> {
        let mut changed_files = HashSet::new();
        let mut last_change_time = Instant::now();
        let debounce_duration = Duration::from_millis(self.config.debounce_ms);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(()).await;
        });

        loop {
            if shutdown_rx.try_recv().is_ok() {
                Logger::info("👋 Stopping watch mode...");
                break;
            }

            // the std receiver blocks, so keep the timeout short
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => {
                    if self.should_ignore_event(&event) {
                        continue;
                    }
                    for path in &event.paths {
                        if self.is_source_file(path) {
                            changed_files.insert(path.clone());
                            last_change_time = Instant::now();

                            if self.config.verbose {
                                Logger::debug(&format!("Changed: {}", path.display()));
                            }
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if !changed_files.is_empty() && last_change_time.elapsed() >= debounce_duration {
                        self.trigger_rebuild(&changed_files, build_service).await;
                        changed_files.clear();
                    }
                    tokio::task::yield_now().await;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    Logger::warn("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn trigger_rebuild<B: BuildService>(&self, changed_files: &HashSet<PathBuf>, build_service: &mut B) {
        Logger::info(&format!("🔄 Rebuilding... ({} files changed)", changed_files.len()));

        let start = Instant::now();
        match build_service.build(&self.settings).await {
            Ok(result) => Logger::info(&format!(
                "✅ Rebuild complete in {:.0}ms ({} scripts, {} styles, {} assets)",
                start.elapsed().as_millis(),
                result.scripts_processed,
                result.styles_processed,
                result.assets_processed
            )),
            Err(e) => Logger::error(&format!("Rebuild failed:\n{}", e.format_detailed())),
        }
    }

    fn should_ignore_event(&self, event: &Event) -> bool {
        match &event.kind {
            EventKind::Access(_) | EventKind::Other => true,
            _ => event.paths.iter().all(|p| self.is_ignored_path(p)),
        }
    }

    fn is_ignored_path(&self, path: &Path) -> bool {
        if path.starts_with(&self.settings.output.path) {
            return true;
        }
        let path_str = path.to_string_lossy();
        path.components().any(|c| {
            let segment = c.as_os_str();
            segment == ".git" || segment == "node_modules"
        }) || path_str.ends_with('~')
            || path_str.ends_with(".swp")
            || path_str.ends_with(".tmp")
    }

    /// Anything a rule handles, or the HTML template
    fn is_source_file(&self, path: &Path) -> bool {
        if self.is_ignored_path(path) {
            return false;
        }
        if self.settings.rule_for(path).is_some() {
            return true;
        }
        self.settings.plugins.iter().any(|spec| match spec {
            crate::core::models::PluginSpec::Html(options) => options.template == path,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::BuildDescriptor;
    use crate::core::models::BuildMode;

    fn watcher() -> KilnWatcher {
        let settings = BuildDescriptor::new("/srv/app").resolve(BuildMode::Development);
        KilnWatcher::new(WatchConfig::for_settings(&settings), settings)
    }

    #[test]
    fn test_watch_config_default() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce_ms, 100);
        assert!(!config.verbose);
    }

    #[test]
    fn test_watch_paths_follow_settings() {
        let watcher = watcher();
        assert_eq!(
            watcher.config.watch_paths,
            vec![PathBuf::from("/srv/app/src")]
        );
    }

    #[test]
    fn test_is_source_file() {
        let watcher = watcher();

        assert!(watcher.is_source_file(Path::new("/srv/app/src/assets/js/app.js")));
        assert!(watcher.is_source_file(Path::new("/srv/app/src/assets/scss/_vars.scss")));
        assert!(watcher.is_source_file(Path::new("/srv/app/src/assets/img/logo.png")));
        assert!(watcher.is_source_file(Path::new("/srv/app/src/index.html")));
        assert!(!watcher.is_source_file(Path::new("/srv/app/src/README.md")));
        assert!(!watcher.is_source_file(Path::new("/srv/app/dist/app.js")));
        assert!(!watcher.is_source_file(Path::new("/srv/app/src/app.js.swp")));
    }

    #[test]
    fn test_config_file_does_not_trigger_rebuild() {
        let watcher = watcher();
        assert!(!watcher.is_source_file(Path::new("/srv/app/kiln.config.json")));
        assert!(!watcher
            .config
            .watch_paths
            .iter()
            .any(|path| path.ends_with(CONFIG_FILE)));
    }
}
