//! Photolake Storage - lake storage adapters
//!
//! Provides:
//! - A filesystem-backed lake where every lake is a directory under a root
//!
//! ## Modules
//!
//! - [`directory`] - [`DirectoryLakeProvider`], the `IStorageProvider` adapter

pub mod directory;

pub use directory::DirectoryLakeProvider;
