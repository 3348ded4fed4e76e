//! Light arrays for chunk sections.
//!
//! Light values are stored as 4-bit values (0-15), packed as two values per byte.
//! For a 16x16x16 section, this requires 2048 bytes (4096 blocks / 2).

use crate::error::LightError;

/// The number of bytes needed to store light data for a 16x16x16 section.
pub const LAYER_SIZE: usize = 2048;

/// Bytes covering one horizontal 16x16 layer.
const LAYER_SLICE: usize = 128;

/// Nibble storage for one section of one light layer.
///
/// Homogeneous layers cost nothing until the first differing write.
#[derive(Debug, Clone)]
pub enum DataLayer {
    /// All blocks in the section have the same light level (0-15).
    Homogeneous(u8),
    /// Blocks have different light levels, stored as packed nibbles.
    Heterogeneous(Box<[u8; LAYER_SIZE]>),
}

#[inline]
const fn nibble_index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

#[inline]
const fn packed(level: u8) -> u8 {
    (level & 0x0F) | ((level & 0x0F) << 4)
}

impl DataLayer {
    /// A dark layer.
    #[must_use]
    pub const fn new() -> Self {
        Self::Homogeneous(0)
    }

    /// A layer with every block at `level`.
    #[must_use]
    pub const fn filled(level: u8) -> Self {
        debug_assert!(level <= 15, "Light level must be 0-15");
        Self::Homogeneous(level)
    }

    /// Builds a layer from its 2048-byte wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LightError> {
        let data: [u8; LAYER_SIZE] = bytes
            .try_into()
            .map_err(|_| LightError::InvalidDataLayerLength(bytes.len()))?;
        let first = data[0];
        if data.iter().all(|&b| b == first) && first >> 4 == first & 0x0F {
            return Ok(Self::Homogeneous(first & 0x0F));
        }
        Ok(Self::Heterogeneous(Box::new(data)))
    }

    /// Light level at section-relative coordinates (0-15 each).
    #[must_use]
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        debug_assert!(x < 16 && y < 16 && z < 16, "Coordinates must be 0-15");
        self.get_index(nibble_index(x, y, z))
    }

    /// Light level at a nibble index (`y * 256 + z * 16 + x`).
    #[must_use]
    #[inline]
    pub fn get_index(&self, index: usize) -> u8 {
        match self {
            Self::Homogeneous(level) => *level,
            Self::Heterogeneous(data) => {
                let shift = (index & 1) << 2;
                (data[index >> 1] >> shift) & 0x0F
            }
        }
    }

    /// Sets the light level at section-relative coordinates.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, level: u8) {
        debug_assert!(x < 16 && y < 16 && z < 16, "Coordinates must be 0-15");
        self.set_index(nibble_index(x, y, z), level);
    }

    /// Sets the light level at a nibble index.
    ///
    /// Upgrades a homogeneous layer to heterogeneous on the first differing write.
    #[inline]
    pub fn set_index(&mut self, index: usize, level: u8) {
        debug_assert!(level <= 15, "Light level must be 0-15");
        if let Self::Homogeneous(current) = *self {
            if current == level {
                return;
            }
            *self = Self::Heterogeneous(Box::new([packed(current); LAYER_SIZE]));
        }
        if let Self::Heterogeneous(data) = self {
            let byte = &mut data[index >> 1];
            if index & 1 == 1 {
                *byte = (*byte & 0x0F) | ((level & 0x0F) << 4);
            } else {
                *byte = (*byte & 0xF0) | (level & 0x0F);
            }
        }
    }

    /// Whether every block holds `level`.
    #[must_use]
    pub fn is_uniform(&self, level: u8) -> bool {
        match self {
            Self::Homogeneous(current) => *current == level,
            Self::Heterogeneous(data) => data.iter().all(|&b| b == packed(level)),
        }
    }

    /// The 2048-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Homogeneous(level) => vec![packed(*level); LAYER_SIZE],
            Self::Heterogeneous(data) => data.to_vec(),
        }
    }

    /// A layer whose every horizontal slice equals this layer's bottom slice.
    ///
    /// Used to extend sky light straight down into a freshly created section.
    #[must_use]
    pub fn repeat_first_layer(&self) -> Self {
        match self {
            Self::Homogeneous(level) => Self::Homogeneous(*level),
            Self::Heterogeneous(data) => {
                let mut out = Box::new([0u8; LAYER_SIZE]);
                for chunk in out.chunks_exact_mut(LAYER_SLICE) {
                    chunk.copy_from_slice(&data[..LAYER_SLICE]);
                }
                let repeated = Self::Heterogeneous(out);
                let first = repeated.get_index(0);
                if repeated.is_uniform(first) {
                    Self::Homogeneous(first)
                } else {
                    repeated
                }
            }
        }
    }
}

impl Default for DataLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DataLayer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Homogeneous(a), Self::Homogeneous(b)) => a == b,
            (Self::Homogeneous(level), layer) | (layer, Self::Homogeneous(level)) => {
                layer.is_uniform(*level)
            }
            (Self::Heterogeneous(a), Self::Heterogeneous(b)) => a == b,
        }
    }
}

impl Eq for DataLayer {}
