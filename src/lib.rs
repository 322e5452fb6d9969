pub mod analyzer;
pub mod compare;
pub mod config;
pub mod error;
pub mod handler;
pub mod loader;
pub mod model;
pub mod scan;

pub use config::Config;
pub use error::{LoadError, ScanError};
pub use handler::{handle_json, Handler};
pub use model::{Message, Module, Package, PackageGraph};
pub use scan::{run_source, ScanConfig};
