use std::path::PathBuf;
use std::time::Instant;

use crate::config::VisionConfig;
use crate::decision::{Decision, DecisionEngine, Heading};
use crate::detection;
use crate::error::{ConfigError, ProcessingError, SourceError};
use crate::models::Frame;
use crate::pipeline::Pipeline;
use crate::source::FrameSource;
use crate::telemetry::TelemetrySink;

/// Counters for one run of the control loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames taken from the source
    pub frames: usize,
    /// Frames whose processing failed and got the neutral decision
    pub failed: usize,
    /// Frames in which a candidate was found
    pub acquired: usize,
}

/// Frame in, decision out: a pipeline paired with a decision engine
pub struct Tracker {
    pipeline: Pipeline,
    engine: DecisionEngine,
}

impl Tracker {
    pub fn new(pipeline: Pipeline, engine: DecisionEngine) -> Self {
        Self { pipeline, engine }
    }

    pub fn from_config(config: &VisionConfig, debug_out: Option<PathBuf>) -> Result<Self, ConfigError> {
        let pipeline = detection::build_pipeline(config, debug_out)?;
        let engine = DecisionEngine::new(config.variant, &config.decision)?;
        Ok(Self::new(pipeline, engine))
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn process(&self, frame: &Frame) -> Result<Decision, ProcessingError> {
        let processed = self.pipeline.process(frame)?;
        Ok(self
            .engine
            .decide(processed.candidate.as_ref(), processed.width, processed.height))
    }

    /// Process frames until the source ends, an optional frame limit is hit,
    /// or capture fails.
    ///
    /// A frame that fails to process is logged and answered with the neutral
    /// decision; the loop carries on with the next frame.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn TelemetrySink,
        max_frames: Option<usize>,
    ) -> Result<LoopStats, SourceError> {
        let mut stats = LoopStats::default();
        let started = Instant::now();

        while max_frames.is_none_or(|limit| stats.frames < limit) {
            let Some(frame) = source.capture()? else {
                break;
            };
            stats.frames += 1;

            let decision = match self.process(&frame) {
                Ok(decision) => decision,
                Err(e) => {
                    log::warn!("Frame {} failed: {}", frame.index(), e);
                    stats.failed += 1;
                    self.engine.neutral()
                }
            };
            if decision.heading != Heading::None {
                stats.acquired += 1;
            }
            log::debug!("Frame {}: {:?}", frame.index(), decision);
            self.engine.publish(&decision, sink);
        }

        let elapsed = started.elapsed().as_secs_f64();
        if stats.frames > 0 && elapsed > 0.0 {
            log::info!(
                "Processed {} frames ({} failed, {} with a target) at {:.1} fps",
                stats.frames,
                stats.failed,
                stats.acquired,
                stats.frames as f64 / elapsed
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RecordingSink;

    struct Scripted {
        frames: Vec<Result<Frame, SourceError>>,
    }

    impl FrameSource for Scripted {
        fn capture(&mut self) -> Result<Option<Frame>, SourceError> {
            if self.frames.is_empty() {
                return Ok(None);
            }
            self.frames.remove(0).map(Some)
        }
    }

    fn blank(index: usize) -> Frame {
        Frame::new(vec![0; 160 * 90 * 3], 160, 90, 3, index)
    }

    #[test]
    fn test_blank_frame_is_neutral() {
        let tracker = Tracker::from_config(&VisionConfig::default(), None).unwrap();
        let decision = tracker.process(&blank(0)).unwrap();
        assert_eq!(decision.heading, Heading::None);
    }

    #[test]
    fn test_run_survives_malformed_frames() {
        let tracker = Tracker::from_config(&VisionConfig::default(), None).unwrap();
        let mut source = Scripted {
            frames: vec![
                Ok(blank(0)),
                Ok(Frame::new(vec![1, 2, 3], 160, 90, 3, 1)),
                Ok(blank(2)),
            ],
        };
        let mut sink = RecordingSink::new();
        let stats = tracker.run(&mut source, &mut sink, None).unwrap();

        assert_eq!(stats, LoopStats { frames: 3, failed: 1, acquired: 0 });
        assert_eq!(sink.decisions(), 3);
        assert!(sink.entries().iter().all(|(k, v)| k == "heading" && *v == 0.0));
    }

    #[test]
    fn test_run_stops_at_frame_limit() {
        let tracker = Tracker::from_config(&VisionConfig::default(), None).unwrap();
        let mut source = Scripted {
            frames: (0..5).map(|i| Ok(blank(i))).collect(),
        };
        let mut sink = RecordingSink::new();
        let stats = tracker.run(&mut source, &mut sink, Some(2)).unwrap();
        assert_eq!(stats.frames, 2);
        assert_eq!(source.frames.len(), 3);
    }

    #[test]
    fn test_capture_error_ends_the_loop() {
        let tracker = Tracker::from_config(&VisionConfig::default(), None).unwrap();
        let mut source = Scripted {
            frames: vec![
                Ok(blank(0)),
                Err(SourceError::Io {
                    path: PathBuf::from("camera"),
                    source: std::io::Error::other("unplugged"),
                }),
                Ok(blank(2)),
            ],
        };
        let mut sink = RecordingSink::new();
        assert!(tracker.run(&mut source, &mut sink, None).is_err());
        assert_eq!(sink.decisions(), 1);
    }
}
