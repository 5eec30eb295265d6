//! # Seitenwerk Backend Library
//!
//! Core library of Seitenwerk, the metadata and pagination editing backend for
//! library digitization processes. A process owns an XML metadata file holding a
//! logical structure tree and a physical sequence of pages, plus a set of image
//! folders on disk. Seitenwerk loads that tree into a session-scoped editor, keeps
//! it consistent with the images, and writes it back under an advisory per-process
//! lock.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP surface for the editor operations
//! - **SQLx**: process registry and statistics in SQLite
//! - **roxmltree / quick-xml**: metadata files and rulesets
//! - **image / reqwest**: preview rendering (embedded or via a content server)
//!
//! ## Core Components
//!
//! - [`paginator`]: page label sequence generator (arabic, roman, foliation, ...)
//! - [`images`]: reconciliation of page elements with image files, preview scaling
//! - [`editor`]: the stateful structure tree editor and its session state machine
//! - [`locking`]: advisory single-editor lock table with timeout
//! - [`document`]: arena-based document tree and the metadata file format
//! - [`ruleset`]: allowed structure and metadata types
//! - [`process`]: per-process directory layout and metadata file IO
//! - [`config`], [`error`], [`metrics`], [`state`], [`db`], [`types`], [`routes`]

pub mod config;
pub mod db;
pub mod document;
pub mod editor;
pub mod error;
pub mod images;
pub mod locking;
pub mod metrics;
pub mod paginator;
pub mod process;
pub mod routes;
pub mod ruleset;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
