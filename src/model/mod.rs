//! Core data types for the dependency graph and the result stream.
//!
//! - [`Module`] - A versioned unit of source distribution
//! - [`Package`] - A loaded package and its import edges
//! - [`PackageGraph`] - Everything loaded for one scan session
//! - [`Message`] - One entry of the scan-result stream
//!
//! # Example
//!
//! ```
//! use vulnscan::model::{Module, Package, PackageGraph};
//!
//! let mut graph = PackageGraph::new(None);
//! graph.insert_modules(vec![Module::main("example.com/app")]);
//! graph.insert_packages(vec![
//!     Package::new("example.com/app").top_level().with_imports(["fmt"]),
//!     Package::new("fmt"),
//! ]);
//!
//! assert_eq!(graph.dependency_count(&graph.top_level()), 1);
//! ```

mod graph;
mod message;

pub use graph::*;
pub use message::*;
