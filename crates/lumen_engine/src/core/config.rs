//! # Unified Configuration System
//!
//! Configuration for the renderer core: shader precision, color management,
//! and the device budgets that feed shader-variant parameter derivation.
//!
//! Configurations are plain serde-serializable structs with sensible
//! defaults, loadable from RON files for tooling and test fixtures.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read from disk
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file contents could not be parsed as RON
    #[error("failed to parse config file: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Shader precision requested for generated programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// Low precision, for constrained devices
    Low,
    /// Medium precision
    Medium,
    /// Full precision (default)
    High,
}

impl Precision {
    /// Token used in generated shader text and program cache keys
    pub fn token(self) -> &'static str {
        match self {
            Self::Low => "lowp",
            Self::Medium => "mediump",
            Self::High => "highp",
        }
    }
}

/// Tone-mapping operator applied in generated fragment shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneMapping {
    /// No tone mapping; colors pass through
    None,
    /// Simple linear exposure multiply
    Linear,
    /// Reinhard operator
    Reinhard,
    /// Filmic curve (Uncharted 2 style)
    Filmic,
    /// ACES filmic approximation
    AcesFilmic,
    /// Application-registered operator the core cannot generate text for
    ///
    /// Shader text assembly rejects this with a fatal error; it exists so
    /// applications with custom post chains can tag materials without the
    /// core silently mis-rendering them.
    Custom(u32),
}

/// Output color space for the final fragment color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    /// No conversion; framebuffer is linear
    Linear,
    /// Encode to sRGB on output
    Srgb,
    /// Application-registered color space the core cannot generate text for
    Custom(u32),
}

/// Device budgets consumed by parameter derivation
///
/// These mirror what a graphics device reports at startup. Parameter
/// derivation clamps against them rather than trusting scene content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceLimits {
    /// Number of texture units available to a single program
    pub max_textures: u32,
    /// Number of vec4 vertex-shader uniform slots
    pub max_vertex_uniforms: u32,
}

impl DeviceLimits {
    /// How many skinning bones fit in the vertex uniform budget
    ///
    /// Each bone consumes one 4x4 matrix (4 vec4 slots); 20 slots are
    /// reserved for the standard transform/lighting uniforms.
    pub fn max_bones(&self) -> u32 {
        let reserved = 20;
        let available = self.max_vertex_uniforms.saturating_sub(reserved);
        available / 4
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_textures: 16,
            max_vertex_uniforms: 1024,
        }
    }
}

/// # Renderer Configuration
///
/// Top-level configuration for the renderer core. Every field participates in
/// program cache keys, so two renderers with different configs never share
/// compiled variants by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Requested shader precision
    pub precision: Precision,
    /// Tone-mapping operator for tone-mapped materials
    pub tone_mapping: ToneMapping,
    /// Exposure multiplier fed to the tone-mapping operator
    ///
    /// Plain uniform data: changing it re-uploads a value but never
    /// invalidates compiled variants.
    pub tone_mapping_exposure: f32,
    /// Output color space of the default framebuffer
    pub output_color_space: ColorSpace,
    /// Device budgets reported by the graphics device
    pub limits: DeviceLimits,
}

impl RendererConfig {
    /// Load a renderer configuration from a RON file
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&text)?)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            precision: Precision::High,
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
            output_color_space: ColorSpace::Srgb,
            limits: DeviceLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_high_precision_srgb() {
        let config = RendererConfig::default();
        assert_eq!(config.precision, Precision::High);
        assert_eq!(config.output_color_space, ColorSpace::Srgb);
    }

    #[test]
    fn bone_budget_reserves_transform_slots() {
        let limits = DeviceLimits {
            max_textures: 16,
            max_vertex_uniforms: 1024,
        };
        assert_eq!(limits.max_bones(), 251);

        let tiny = DeviceLimits {
            max_textures: 8,
            max_vertex_uniforms: 16,
        };
        assert_eq!(tiny.max_bones(), 0);
    }

    #[test]
    fn config_round_trips_through_ron() {
        let config = RendererConfig::default();
        let text = ron::to_string(&config).expect("serialize");
        let parsed: RendererConfig = ron::from_str(&text).expect("parse");
        assert_eq!(parsed.precision, config.precision);
        assert_eq!(parsed.tone_mapping, config.tone_mapping);
    }
}
