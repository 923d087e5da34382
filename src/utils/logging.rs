use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` overrides the default filter.
    pub fn init() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kiln=info"));

        // already initialized is fine
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(mode: &str, root: &str, outdir: &str) {
        info!("🔥 Kiln - {} build", mode);
        info!("═══════════════════════════════════════");
        info!("📁 Input: {}", root);
        info!("📦 Output: {}", outdir);
    }

    pub fn processing_entry(name: &str, sources: usize) {
        info!("📦 Entry '{}' ({} sources)", name, sources);
    }

    pub fn processing_file(name: &str, rule: &str) {
        debug!("⚡ Processing: {} ({})", name, rule);
    }

    pub fn emitted(path: &str, size: usize) {
        debug!("💾 Emitted {} ({} bytes)", path, size);
    }

    pub fn build_complete(files: usize, warnings: usize, build_time: std::time::Duration, outdir: &str) {
        info!("");
        info!("📊 Build Statistics:");
        info!("  • Files emitted: {}", files);
        info!("  • Warnings: {}", warnings);
        info!("  • Build time: {:.2?}", build_time);
        info!("  • Output directory: {}", outdir);
        info!("✅ Build completed successfully!");
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
