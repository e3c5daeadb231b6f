pub mod circles;
pub mod contours;
pub mod filter;
pub mod morphology;
pub mod preprocessing;
pub mod steps;

use std::path::PathBuf;

use crate::config::{PipelineVariant, VisionConfig};
use crate::error::ConfigError;
use crate::pipeline::{Pipeline, PipelineBuilder};
use morphology::Morphology;
use preprocessing::BlurFilter;
use steps::*;

/// Assemble the stage list for `config.variant`, validating every stage setting
///
/// - plain: resize, blur, threshold, bounding box
/// - circle: resize, blur, threshold, erode, dilate, find blobs, select largest
/// - contour: resize, blur, threshold, erode, dilate, find contours, filter, select largest
///
/// A second resize, blur, erode and dilate are only added when configured.
pub fn pipeline_builder(config: &VisionConfig) -> Result<PipelineBuilder, ConfigError> {
    let resize = &config.resize;
    let mut builder = Pipeline::builder().add_stage(ResizeStep::new(
        resize.width,
        resize.height,
        resize.interpolation,
    )?);
    if let Some(rescale) = &config.rescale {
        builder = builder.add_stage(ResizeStep::new(
            rescale.width,
            rescale.height,
            rescale.interpolation,
        )?);
    }

    if let Some(blur) = &config.blur {
        builder = builder.add_stage(BlurStep {
            filter: BlurFilter::new(blur.kind, blur.radius)?,
        });
    }

    let ranges = config.threshold.ranges();
    ranges.validate()?;
    builder = builder.add_stage(HsvThresholdStep { ranges });

    if let Some(erode) = &config.morphology.erode {
        builder = builder.add_stage(ErodeStep {
            morphology: Morphology::new(erode, "erode")?,
        });
    }
    if let Some(dilate) = &config.morphology.dilate {
        builder = builder.add_stage(DilateStep {
            morphology: Morphology::new(dilate, "dilate")?,
        });
    }

    builder = match config.variant {
        PipelineVariant::Plain => builder.add_stage(BoundingBoxStep),
        PipelineVariant::Circle => {
            config.blobs.validate()?;
            builder
                .add_stage(FindBlobsStep {
                    params: config.blobs.clone(),
                })
                .add_stage(SelectLargestStep)
        }
        PipelineVariant::Contour => {
            config.filter.validate()?;
            builder
                .add_stage(FindContoursStep {
                    external_only: config.filter.external_only,
                    approx: config.contours.approximation,
                })
                .add_stage(FilterContoursStep {
                    bounds: config.filter.clone(),
                })
                .add_stage(SelectLargestStep)
        }
    };

    Ok(builder)
}

/// Build the pipeline, optionally dumping every raster stage to `debug_out`
pub fn build_pipeline(
    config: &VisionConfig,
    debug_out: Option<PathBuf>,
) -> Result<Pipeline, ConfigError> {
    let mut builder = pipeline_builder(config)?;
    if let Some(dir) = debug_out {
        builder = builder.with_debug(dir)?;
    }
    let pipeline = builder.build()?;
    log::debug!("Pipeline stages: {}", pipeline.stage_names().join(" -> "));
    Ok(pipeline)
}
