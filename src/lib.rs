//! assembly-catalog-link: CAD assembly structure meets the parts catalog.
//!
//! Reads the component hierarchy of a CAD assembly, turns it into a bill of
//! materials and a display tree, and reconciles components with parts in a
//! remote inventory catalog through a fixed set of metadata templates.
//!
//! # Architecture
//!
//! The CAD application and the catalog server sit behind traits, so the core
//! never talks to either directly:
//!
//! - [`assembly::AssemblyHost`]: the active design plus user notices
//! - [`catalog::Catalog`]: list/create/update calls against the catalog
//! - [`report::ErrorSink`]: where remote failures are reported
//!
//! A [`session::Session`] owns the catalog client and its caches for one
//! connection.
//!
//! # Modules
//!
//! - [`assembly`]: design model and snapshot-backed host
//! - [`bom`]: BOM aggregation and CSV export
//! - [`tree`]: flat, parent-linked component tree
//! - [`catalog`]: templates, cached references and part resolution
//! - [`session`]: per-connection caches and lazy client creation
//! - [`report`]: error reporting
//! - [`config`]: configuration loading and validation
//! - [`error`]: configuration error types
//! - [`mcp`]: MCP protocol server exposing the above as tools

pub mod assembly;
pub mod bom;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mcp;
pub mod report;
pub mod session;
pub mod tree;
