// Shared utilities module
pub mod config_loader;
pub mod errors;
pub mod hashing;
pub mod logging;
pub mod watch;

pub use config_loader::*;
pub use errors::*;
pub use hashing::*;
pub use logging::*;
pub use watch::*;
