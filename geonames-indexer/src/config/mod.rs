//! Configuration and dependency wiring for the GeoNames indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::Settings;
