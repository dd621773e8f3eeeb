//! Photolake Imaging - size variant production
//!
//! Implements the `IImageTranscoder` port with the `image` crate. Decoding
//! and resampling are CPU-bound and run on the blocking thread pool.

pub mod transcoder;

pub use transcoder::ImageTranscoder;
