pub mod config;
pub mod decision;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod telemetry;
pub mod tracker;

pub use config::{Alliance, PipelineVariant, VisionConfig};
pub use decision::{Decision, DecisionConfig, DecisionEngine, Heading, HeadingCodes};
pub use error::{ConfigError, ProcessingError, SourceError};
pub use models::{BoundingBox, Circle, Contour, Frame, Mask, Range, Shape};
pub use pipeline::{DataKind, DebugConfig, Pipeline, PipelineBuilder, PipelineData, ProcessedFrame, Stage};
pub use source::{FrameSource, ImageFileSource, LatestFrameSource};
pub use telemetry::{JsonLinesSink, LogSink, RecordingSink, TelemetrySink};
pub use tracker::{LoopStats, Tracker};
