use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{ConfigError, ProcessingError};
use crate::models::{Frame, Mask, Shape};

/// The kind of artifact a stage consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Image,
    Mask,
    Shapes,
    Candidate,
}

/// Data that flows through the pipeline
/// Each variant is the artifact one stage hands to the next
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineData {
    Image(RgbImage),
    Mask(Mask),
    Shapes(Vec<Shape>),
    Candidate(Option<Shape>),
}

impl PipelineData {
    pub fn kind(&self) -> DataKind {
        match self {
            PipelineData::Image(_) => DataKind::Image,
            PipelineData::Mask(_) => DataKind::Mask,
            PipelineData::Shapes(_) => DataKind::Shapes,
            PipelineData::Candidate(_) => DataKind::Candidate,
        }
    }

    /// Raster dimensions, for the variants that carry a raster
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            PipelineData::Image(image) => Some(image.dimensions()),
            PipelineData::Mask(mask) => Some(mask.dimensions()),
            _ => None,
        }
    }

    pub fn into_image(self, stage: &str) -> Result<RgbImage, ProcessingError> {
        match self {
            PipelineData::Image(image) => Ok(image),
            other => Err(other.mismatch(stage, DataKind::Image)),
        }
    }

    pub fn into_mask(self, stage: &str) -> Result<Mask, ProcessingError> {
        match self {
            PipelineData::Mask(mask) => Ok(mask),
            other => Err(other.mismatch(stage, DataKind::Mask)),
        }
    }

    pub fn into_shapes(self, stage: &str) -> Result<Vec<Shape>, ProcessingError> {
        match self {
            PipelineData::Shapes(shapes) => Ok(shapes),
            other => Err(other.mismatch(stage, DataKind::Shapes)),
        }
    }

    pub fn into_candidate(self, stage: &str) -> Result<Option<Shape>, ProcessingError> {
        match self {
            PipelineData::Candidate(candidate) => Ok(candidate),
            other => Err(other.mismatch(stage, DataKind::Candidate)),
        }
    }

    fn mismatch(&self, stage: &str, expected: DataKind) -> ProcessingError {
        ProcessingError::UnexpectedInput {
            stage: stage.to_string(),
            expected,
            actual: self.kind(),
        }
    }

    fn summary(&self) -> String {
        match self {
            PipelineData::Image(image) => format!("{}x{} image", image.width(), image.height()),
            PipelineData::Mask(mask) => format!("{}x{} mask", mask.width(), mask.height()),
            PipelineData::Shapes(shapes) => format!("{} shapes", shapes.len()),
            PipelineData::Candidate(Some(_)) => "candidate".to_string(),
            PipelineData::Candidate(None) => "no candidate".to_string(),
        }
    }
}

/// Trait that all pipeline stages must implement
///
/// A stage is a pure function of its input and its own immutable
/// configuration: same input, same output, nothing remembered in between.
pub trait Stage: Send + Sync {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError>;

    /// Human-readable name for this stage (used in logs and debug output)
    fn name(&self) -> &str;

    fn input(&self) -> DataKind;

    fn output(&self) -> DataKind;
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Result of running every stage on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub candidate: Option<Shape>,
    /// Dimensions of the last raster produced, i.e. the space `candidate` lives in.
    pub width: u32,
    pub height: u32,
}

/// Composable pipeline builder
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    debug: Option<DebugConfig>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            debug: None,
        }
    }

    /// Add a processing stage to the pipeline
    pub fn add_stage(self, stage: impl Stage + 'static) -> Self {
        self.add_stage_boxed(Box::new(stage))
    }

    pub fn add_stage_boxed(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: output_dir.clone(),
            source,
        };
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir).map_err(io_error)?;
            if entries.next().is_some() {
                return Err(ConfigError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(io_error)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Check that every stage accepts what the previous one yields and that
    /// the chain starts at an image and ends at a candidate.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let mut current = DataKind::Image;
        for stage in &self.stages {
            if stage.input() != current {
                return Err(ConfigError::StageMismatch {
                    stage: stage.name().to_string(),
                    expected: stage.input(),
                    actual: current,
                });
            }
            current = stage.output();
        }
        if current != DataKind::Candidate {
            return Err(ConfigError::MissingSelector(current));
        }

        Ok(Pipeline {
            stages: self.stages,
            debug: self.debug,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered, fixed list of stages run once per frame
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage on `frame` and return the selected candidate
    pub fn process(&self, frame: &Frame) -> Result<ProcessedFrame, ProcessingError> {
        let image = frame.to_rgb()?;
        let (mut width, mut height) = image.dimensions();
        let mut data = PipelineData::Image(image);
        self.save_debug(frame.index(), 0, "input", &data)?;

        for (idx, stage) in self.stages.iter().enumerate() {
            log::trace!("Running stage: {} ({})", stage.name(), data.summary());
            data = stage.process(data)?;
            if let Some((w, h)) = data.dimensions() {
                width = w;
                height = h;
            }
            log::trace!("  → {}", data.summary());
            self.save_debug(frame.index(), idx + 1, stage.name(), &data)?;
        }

        let candidate = data.into_candidate("pipeline output")?;
        Ok(ProcessedFrame {
            candidate,
            width,
            height,
        })
    }

    /// Run the pipeline but stop after `num_stages` stages (useful for debugging)
    pub fn process_partial(
        &self,
        frame: &Frame,
        num_stages: usize,
    ) -> Result<PipelineData, ProcessingError> {
        let mut data = PipelineData::Image(frame.to_rgb()?);
        for stage in self.stages.iter().take(num_stages) {
            data = stage.process(data)?;
        }
        Ok(data)
    }

    /// Save raster outputs as `<dir>/<frame>/<NN>_<stage>.png` in debug mode
    fn save_debug(
        &self,
        frame_index: usize,
        stage_index: usize,
        stage_name: &str,
        data: &PipelineData,
    ) -> Result<(), ProcessingError> {
        let Some(debug) = &self.debug else {
            return Ok(());
        };

        let frame_dir = debug.output_dir.join(format!("{:05}", frame_index));
        let filename = format!(
            "{:02}_{}.png",
            stage_index,
            stage_name.to_lowercase().replace(' ', "_")
        );
        let output_path = frame_dir.join(filename);

        let result = match data {
            PipelineData::Image(image) => create_and_save(&frame_dir, || image.save(&output_path)),
            PipelineData::Mask(mask) => create_and_save(&frame_dir, || mask.save(&output_path)),
            _ => return Ok(()),
        };

        result.map_err(|message| ProcessingError::DebugOutput {
            path: output_path.clone(),
            message,
        })?;
        log::debug!("Debug: saved {}", output_path.display());
        Ok(())
    }
}

fn create_and_save(
    dir: &Path,
    save: impl FnOnce() -> image::ImageResult<()>,
) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    save().map_err(|e| e.to_string())
}
