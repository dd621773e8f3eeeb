//! Photolake Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `State`, `Album`, `Photo`, `PhotoSize`
//! - **Port definitions** - Traits for adapters: `IStorageProvider`,
//!   `IImageTranscoder`, `IGalleryRenderer`
//! - **Configuration** - Typed YAML configuration with defaults and validation
//!
//! # Architecture
//!
//! The domain module is pure: every state transition takes a `State` by value
//! and returns the updated value, so the model can be tested without any
//! locking or I/O. Callers that share a `State` across tasks own the lock.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
