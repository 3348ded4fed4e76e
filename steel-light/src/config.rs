//! Light engine configuration.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use steel_utils::block_pos::{MAX_BLOCK_Y, MIN_BLOCK_Y};

use crate::error::LightError;

/// Configuration for one dimension's light engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Lowest section Y of the dimension's build height.
    pub min_section_y: i32,
    /// Number of sections in the build height.
    pub section_count: u32,
    /// Whether the dimension has block light.
    pub has_block_light: bool,
    /// Whether the dimension has sky light.
    pub has_sky_light: bool,
    /// Queue size from which removed sections are cleared by scanning their voxels.
    pub bulk_clear_threshold: usize,
    /// Number of queued tasks that triggers a batched update.
    pub task_per_batch: usize,
}

impl LightConfig {
    /// Parses a JSON5 config, filling missing fields with defaults.
    pub fn from_json5_str(source: &str) -> Result<Self, LightError> {
        let config: Self =
            serde_json5::from_str(source).map_err(|e| LightError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON5 config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LightError> {
        let source = fs::read_to_string(path)?;
        Self::from_json5_str(&source)
    }

    /// Checks that the values describe a usable dimension.
    pub fn validate(&self) -> Result<(), LightError> {
        if self.section_count == 0 {
            return Err(LightError::InvalidConfig("Section count must be at least 1"));
        }
        // Light sections extend one past the build height and every block in them must
        // fit the packed block Y field.
        let min_light_y = (i64::from(self.min_section_y) - 1) * 16;
        let max_light_y = (i64::from(self.min_section_y) + i64::from(self.section_count) + 1) * 16;
        if min_light_y < i64::from(MIN_BLOCK_Y) || max_light_y > i64::from(MAX_BLOCK_Y) + 1 {
            return Err(LightError::InvalidConfig(
                "Build height does not fit the packed block Y range",
            ));
        }
        if self.bulk_clear_threshold == 0 {
            return Err(LightError::InvalidConfig("Bulk clear threshold must be at least 1"));
        }
        if self.task_per_batch == 0 {
            return Err(LightError::InvalidConfig("Task batch size must be at least 1"));
        }
        Ok(())
    }

    /// One past the highest section Y of the build height.
    #[must_use]
    pub fn max_section_y(&self) -> i32 {
        self.min_section_y + self.section_count as i32
    }

    /// Lowest section that can hold light (one below the build height).
    #[must_use]
    pub fn min_light_section(&self) -> i32 {
        self.min_section_y - 1
    }

    /// Number of sections that can hold light.
    #[must_use]
    pub fn light_section_count(&self) -> i32 {
        self.section_count as i32 + 2
    }

    /// One past the highest section that can hold light.
    #[must_use]
    pub fn max_light_section(&self) -> i32 {
        self.min_light_section() + self.light_section_count()
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_section_y: -4,
            section_count: 24,
            has_block_light: true,
            has_sky_light: true,
            bulk_clear_threshold: 8192,
            task_per_batch: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LightConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_light_section(), -5);
        assert_eq!(config.light_section_count(), 26);
        assert_eq!(config.max_light_section(), 21);
        assert_eq!(config.max_section_y(), 20);
    }

    #[test]
    fn test_json5_partial_override() {
        let config = LightConfig::from_json5_str(
            "{ min_section_y: 0, section_count: 16, has_sky_light: false, // nether\n }",
        )
        .expect("valid config");
        assert_eq!(config.min_section_y, 0);
        assert_eq!(config.section_count, 16);
        assert!(!config.has_sky_light);
        assert!(config.has_block_light);
        assert_eq!(config.bulk_clear_threshold, 8192);
    }

    #[test]
    fn test_rejects_empty_height() {
        let config = LightConfig {
            section_count: 0,
            ..LightConfig::default()
        };
        assert!(matches!(config.validate(), Err(LightError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_height_beyond_block_y() {
        let config = LightConfig {
            min_section_y: 0,
            section_count: 200,
            ..LightConfig::default()
        };
        assert!(matches!(config.validate(), Err(LightError::InvalidConfig(_))));

        // Light sections -128..128 cover block Y -2048..2047 exactly.
        let widest = LightConfig {
            min_section_y: -127,
            section_count: 254,
            ..LightConfig::default()
        };
        assert!(widest.validate().is_ok());
        assert_eq!(widest.min_light_section() * 16, MIN_BLOCK_Y);
        assert_eq!(widest.max_light_section() * 16 - 1, MAX_BLOCK_Y);

        let one_too_low = LightConfig {
            min_section_y: -128,
            ..widest.clone()
        };
        assert!(one_too_low.validate().is_err());
        let one_too_high = LightConfig {
            section_count: 255,
            ..widest
        };
        assert!(one_too_high.validate().is_err());
    }

    #[test]
    fn test_rejects_unparseable() {
        assert!(matches!(
            LightConfig::from_json5_str("{ section_count: \"lots\" }"),
            Err(LightError::ConfigParse(_))
        ));
    }
}
