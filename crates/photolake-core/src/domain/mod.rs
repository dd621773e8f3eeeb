//! Domain entities and business logic
//!
//! This module contains the core domain types for Photolake:
//! - Newtypes for content hashes, document and album identifiers, lake names
//! - Photo records and their size variants
//! - Albums (ordered lists of photo hashes)
//! - The `State` document and its pure transitions
//! - Domain-specific error types

pub mod album;
pub mod errors;
pub mod newtypes;
pub mod photo;
pub mod state;

// Re-export commonly used types
pub use album::Album;
pub use errors::DomainError;
pub use newtypes::*;
pub use photo::{FitMode, Photo, PhotoSize, ResizeSpec};
pub use state::State;
