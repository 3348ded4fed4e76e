//! Errors reported by the light engine.

use thiserror::Error;

/// Errors reported by the light engine and its configuration.
#[derive(Debug, Error)]
pub enum LightError {
    /// Light was about to cross between two voxels that are not face neighbours.
    ///
    /// This means the packed coordinate arithmetic is corrupted; it is never recovered.
    #[error("light was spread in illegal direction {dx}, {dy}, {dz}")]
    IllegalDirection {
        /// Sign of the X delta.
        dx: i32,
        /// Sign of the Y delta.
        dy: i32,
        /// Sign of the Z delta.
        dz: i32,
    },
    /// A light level or emission outside 0-15.
    #[error("light level {0} is outside 0..=15")]
    InvalidLightLevel(u8),
    /// A persisted light array with the wrong length.
    #[error("light data must be 2048 bytes, got {0}")]
    InvalidDataLayerLength(usize),
    /// The configuration failed validation.
    #[error("invalid light config: {0}")]
    InvalidConfig(&'static str),
    /// The configuration file could not be read.
    #[error("failed to read light config: {0}")]
    ConfigIo(#[from] std::io::Error),
    /// The configuration file could not be parsed.
    #[error("failed to parse light config: {0}")]
    ConfigParse(String),
}
