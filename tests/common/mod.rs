mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from headingcam for tests
pub use headingcam::{
    Decision, Frame, Heading, PipelineVariant, RecordingSink, Tracker, VisionConfig,
};
