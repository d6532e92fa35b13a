// lib.rs - H.264 test bitstream generator library
//! Bit-exact H.264 Annex B test bitstream generation.
//!
//! The heart of the crate is [`BitstreamWriter`], an MSB-first bit packer
//! with Exp-Golomb coding and transparent emulation prevention. On top of it
//! [`H264Generator`] lays out SPS, PPS, slice and end-of-stream NAL units from
//! an immutable [`StreamConfig`].

pub mod bitstream;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod nal;
pub mod output;
pub mod syntax;


// Decoding helpers shared with the integration suites.
#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod test_support;

// Re-export main public API
pub use bitstream::{BitstreamWriter, EscapeState};
pub use config::{PpsConfig, SliceHeader, SliceKind, SpsConfig, StreamConfig};
pub use error::{H264GenError, Result};
pub use generator::{GeneratedStream, H264Generator, StreamStats, UnitReport};
pub use nal::{NalUnitType, StartCodeMode};
pub use syntax::{FieldValue, SyntaxElement};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LIBRARY_NAME: &str = "H.264 Test Generator";

/// Get library version and build information
pub fn version_info() -> String {
    format!("{} v{}", LIBRARY_NAME, VERSION)
}
