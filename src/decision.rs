use serde::{Deserialize, Serialize};

use crate::config::PipelineVariant;
use crate::error::ConfigError;
use crate::models::Shape;
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    /// Nothing to steer towards
    None,
    Left,
    Center,
    Right,
}

/// Numeric value published for each heading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingCodes {
    pub left: f64,
    pub center: f64,
    pub right: f64,
    pub none: f64,
}

impl HeadingCodes {
    /// Deployed defaults: the plain variant reports center as 0, the shape
    /// variants as 2 so that it differs from "nothing seen".
    pub fn for_variant(variant: PipelineVariant) -> Self {
        let center = match variant {
            PipelineVariant::Plain => 0.0,
            PipelineVariant::Circle | PipelineVariant::Contour => 2.0,
        };
        Self {
            left: -1.0,
            center,
            right: 1.0,
            none: 0.0,
        }
    }

    pub fn code(&self, heading: Heading) -> f64 {
        match heading {
            Heading::None => self.none,
            Heading::Left => self.left,
            Heading::Center => self.center,
            Heading::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// `cx` below `width * left_frac` steers left.
    pub left_frac: f64,
    /// `cx` above `width * right_frac` steers right.
    pub right_frac: f64,
    /// `cy` past `height * bottom_frac`, near the bottom edge, counts as close.
    pub bottom_frac: f64,
    /// Overrides the per-variant defaults.
    pub codes: Option<HeadingCodes>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            left_frac: 0.48,
            right_frac: 0.52,
            bottom_frac: 0.9,
            codes: None,
        }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("decision.left_frac", self.left_frac),
            ("decision.right_frac", self.right_frac),
            ("decision.bottom_frac", self.bottom_frac),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { field, value });
            }
        }
        if self.left_frac >= self.right_frac {
            return Err(ConfigError::ThresholdOrder {
                left: self.left_frac,
                right: self.right_frac,
            });
        }
        Ok(())
    }
}

/// Telemetry key for the candidate size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKey {
    /// `r`: circle radius
    Radius,
    /// `size`: contour area
    Area,
}

impl SizeKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeKey::Radius => "r",
            SizeKey::Area => "size",
        }
    }
}

/// Which signals a variant reports besides the heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signals {
    HeadingOnly,
    /// Position, size and proximity of the candidate
    Target(SizeKey),
}

impl Signals {
    pub fn for_variant(variant: PipelineVariant) -> Self {
        match variant {
            PipelineVariant::Plain => Signals::HeadingOnly,
            PipelineVariant::Circle => Signals::Target(SizeKey::Radius),
            PipelineVariant::Contour => Signals::Target(SizeKey::Area),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub heading: Heading,
    /// Candidate center in resized-frame coordinates
    pub position: Option<(f64, f64)>,
    pub size: Option<f64>,
    /// `None` when the variant does not evaluate proximity.
    pub proximity: Option<bool>,
}

/// Reduces a candidate to a heading and the auxiliary signals
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    left_frac: f64,
    right_frac: f64,
    bottom_frac: f64,
    codes: HeadingCodes,
    signals: Signals,
}

impl DecisionEngine {
    pub fn new(variant: PipelineVariant, config: &DecisionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            left_frac: config.left_frac,
            right_frac: config.right_frac,
            bottom_frac: config.bottom_frac,
            codes: config
                .codes
                .unwrap_or_else(|| HeadingCodes::for_variant(variant)),
            signals: Signals::for_variant(variant),
        })
    }

    pub fn codes(&self) -> &HeadingCodes {
        &self.codes
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    /// The decision for a frame in which nothing was found
    pub fn neutral(&self) -> Decision {
        Decision {
            heading: Heading::None,
            position: None,
            size: None,
            proximity: match self.signals {
                Signals::HeadingOnly => None,
                Signals::Target(_) => Some(false),
            },
        }
    }

    /// `width`/`height` are the dimensions the candidate was found in.
    pub fn decide(&self, candidate: Option<&Shape>, width: u32, height: u32) -> Decision {
        let Some(shape) = candidate else {
            return self.neutral();
        };

        let (cx, cy) = shape.center();
        let w = width as f64;
        // cx == 0 is what an empty bounding box reports; it never steers left.
        let heading = if cx > 0.0 && cx < w * self.left_frac {
            Heading::Left
        } else if cx > w * self.right_frac {
            Heading::Right
        } else {
            Heading::Center
        };

        match self.signals {
            Signals::HeadingOnly => Decision {
                heading,
                position: None,
                size: None,
                proximity: None,
            },
            Signals::Target(_) => Decision {
                heading,
                position: Some((cx, cy)),
                size: Some(shape.size()),
                proximity: Some(cy > height as f64 * self.bottom_frac),
            },
        }
    }

    /// Publish `heading`, plus `x`, `y`, the size key and `bottom` for target variants.
    ///
    /// Absent position and size are not published.
    pub fn publish(&self, decision: &Decision, sink: &mut dyn TelemetrySink) {
        sink.publish("heading", self.codes.code(decision.heading));
        if let Signals::Target(size_key) = self.signals {
            if let Some((x, y)) = decision.position {
                sink.publish("x", x);
                sink.publish("y", y);
            }
            if let Some(size) = decision.size {
                sink.publish(size_key.as_str(), size);
            }
            let bottom = decision.proximity.unwrap_or(false);
            sink.publish("bottom", if bottom { 1.0 } else { 0.0 });
        }
        sink.flush();
    }
}
