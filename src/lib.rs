// Kiln - mode-aware asset pipeline
pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod plugins;
pub mod utils;
