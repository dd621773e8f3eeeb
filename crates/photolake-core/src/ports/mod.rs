//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IStorageProvider`] - Remote object storage (the "lake")
//! - [`IImageTranscoder`] - Producing resized variants of a photo
//! - [`IGalleryRenderer`] - Publishing gallery output from a finalized state

pub mod gallery_renderer;
pub mod image_transcoder;
pub mod storage_provider;

pub use gallery_renderer::IGalleryRenderer;
pub use image_transcoder::IImageTranscoder;
pub use storage_provider::{IStorageProvider, StorageError};
