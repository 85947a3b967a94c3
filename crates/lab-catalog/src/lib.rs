//! Reference catalog collaborator for the lifecycle engine.
//!
//! The engine consumes test and parameter definitions through the
//! [`ReferenceCatalog`] trait and never mutates them.

pub mod catalog;
pub mod error;
pub mod loaders;

pub use catalog::{InMemoryCatalog, ReferenceCatalog};
pub use error::CatalogError;
pub use loaders::{
    PARAMETERS_FILE, TESTS_FILE, load_catalog_dir, load_catalog_json, load_parameters_csv,
    load_tests_csv,
};
