// Core domain layer
pub mod descriptor;
pub mod interfaces;
pub mod models;
pub mod plugin;
pub mod services;

pub use descriptor::*;
pub use interfaces::*;
pub use models::*;
pub use plugin::*;
pub use services::*;
