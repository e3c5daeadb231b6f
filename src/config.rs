use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decision::{DecisionConfig, DecisionEngine};
use crate::detection;
use crate::detection::circles::BlobParams;
use crate::detection::contours::ChainApprox;
use crate::detection::filter::FilterBounds;
use crate::detection::morphology::MorphologyConfig;
use crate::detection::preprocessing::{BlurKind, HsvRanges, Interpolation};
use crate::error::ConfigError;
use crate::models::Range;

/// Which stages follow color segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    /// Bounding box of all foreground; heading only
    #[default]
    Plain,
    /// Largest blob, reported with position, radius and proximity
    Circle,
    /// Largest filtered contour, reported with position, area and proximity
    Contour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    /// Tuned hue range for this alliance's targets
    pub fn hue_range(self) -> Range {
        match self {
            Alliance::Red => Range::new(0.0, 22.0),
            Alliance::Blue => Range::new(96.0, 109.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    pub width: u32,
    pub height: u32,
    pub interpolation: Interpolation,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 90,
            interpolation: Interpolation::Cubic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    pub kind: BlurKind,
    pub radius: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kind: BlurKind::Gaussian,
            radius: 3.8472440561712458,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// When set, replaces `hue` with the alliance preset.
    pub alliance: Option<Alliance>,
    pub hue: Range,
    pub saturation: Range,
    pub value: Range,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            alliance: None,
            hue: Alliance::Red.hue_range(),
            saturation: Range::new(76.17461099255837, 254.73577810920378),
            value: Range::new(64.20863309352518, 254.14949555665729),
        }
    }
}

impl ThresholdConfig {
    pub fn ranges(&self) -> HsvRanges {
        HsvRanges {
            hue: self.alliance.map_or(self.hue, Alliance::hue_range),
            saturation: self.saturation,
            value: self.value,
        }
    }
}

/// Optional erode and dilate passes, applied in that order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologySection {
    pub erode: Option<MorphologyConfig>,
    pub dilate: Option<MorphologyConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    pub approximation: ChainApprox,
}

/// Everything needed to build a pipeline and a decision engine
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration reproducing the tuned deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub variant: PipelineVariant,
    pub resize: ResizeConfig,
    /// Second resize applied to the first one's output; absent skips it.
    pub rescale: Option<ResizeConfig>,
    /// Absent disables blurring.
    pub blur: Option<BlurConfig>,
    pub threshold: ThresholdConfig,
    pub morphology: MorphologySection,
    pub blobs: BlobParams,
    pub filter: FilterBounds,
    pub contours: ContourConfig,
    pub decision: DecisionConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::default(),
            resize: ResizeConfig::default(),
            rescale: None,
            blur: Some(BlurConfig::default()),
            threshold: ThresholdConfig::default(),
            morphology: MorphologySection::default(),
            blobs: BlobParams::default(),
            filter: FilterBounds::default(),
            contours: ContourConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl VisionConfig {
    /// Tuned settings for a variant
    ///
    /// Plain and circle share the defaults. Contour reproduces its own
    /// deployment: upscaled to 640x480 and a wider orange threshold, with all
    /// contours kept and only large ones accepted.
    pub fn preset(variant: PipelineVariant) -> Self {
        match variant {
            PipelineVariant::Plain | PipelineVariant::Circle => Self {
                variant,
                ..Self::default()
            },
            PipelineVariant::Contour => Self {
                variant,
                rescale: Some(ResizeConfig {
                    width: 640,
                    height: 480,
                    interpolation: Interpolation::Cubic,
                }),
                blur: Some(BlurConfig {
                    kind: BlurKind::Gaussian,
                    radius: 4.2042079272570945,
                }),
                threshold: ThresholdConfig {
                    alliance: None,
                    hue: Range::new(0.0, 39.7269673396296),
                    saturation: Range::new(38.2194208155433, 255.0),
                    value: Range::new(76.43884928535215, 255.0),
                },
                filter: FilterBounds {
                    min_area: 5000.0,
                    external_only: false,
                    ..FilterBounds::default()
                },
                ..Self::default()
            },
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Run every check that would otherwise fail at construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        detection::pipeline_builder(self)?.build()?;
        DecisionEngine::new(self.variant, &self.decision)?;
        Ok(())
    }
}
