// Transform step processors
pub mod asset_processor;
pub mod bundle;
pub mod css_processor;
pub mod image_processor;
pub mod js_processor;
pub mod scss_processor;

pub use asset_processor::*;
pub use bundle::*;
pub use css_processor::*;
pub use image_processor::*;
pub use js_processor::*;
pub use scss_processor::*;
