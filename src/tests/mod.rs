//! Unit and integration tests for the Seitenwerk backend.
//!
//! ## Test Modules
//!
//! - **paginator_tests**: label sequences for every type, mode and scope
//! - **locking_tests**: lock timeout boundaries, takeover and purging
//! - **document_tests**: document tree, reference index and metadata file format
//! - **ruleset_tests**: ruleset parsing and the ruleset cache
//! - **process_tests**: process directory layout and metadata backups
//! - **images_tests**: reconciliation of pages with image files
//! - **editor_tests**: the structure tree editor and its session states
//! - **api_tests**: HTTP endpoints end to end
//! - **error_tests**: error mapping and validation helpers
//! - **config_tests**: configuration defaults and validation
//! - **db_tests**: process registry
//!
//! `fixtures` holds the shared test ruleset, a process on disk and a
//! recording preview scaler.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test editor_tests
//! ```


pub mod config_tests;
pub mod document_tests;
pub mod editor_tests;
