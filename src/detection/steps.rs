use crate::detection::circles::{self, BlobParams};
use crate::detection::contours::{self, ChainApprox};
use crate::detection::filter::{self, FilterBounds};
use crate::detection::morphology::Morphology;
use crate::detection::preprocessing::{self, BlurFilter, HsvRanges, Interpolation};
use crate::error::{ConfigError, ProcessingError};
use crate::models::{Contour, Shape};
use crate::pipeline::{DataKind, PipelineData, Stage};

/// Scale to a fixed size
pub struct ResizeStep {
    width: u32,
    height: u32,
    interpolation: Interpolation,
}

impl ResizeStep {
    pub fn new(width: u32, height: u32, interpolation: Interpolation) -> Result<Self, ConfigError> {
        for (field, value) in [("resize.width", width), ("resize.height", height)] {
            if value == 0 {
                return Err(ConfigError::NonPositive {
                    field,
                    value: value as f64,
                });
            }
        }
        Ok(Self {
            width,
            height,
            interpolation,
        })
    }
}

impl Stage for ResizeStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let image = data.into_image(self.name())?;
        Ok(PipelineData::Image(preprocessing::resize(
            &image,
            self.width,
            self.height,
            self.interpolation,
        )))
    }

    fn name(&self) -> &str {
        "Resize"
    }

    fn input(&self) -> DataKind {
        DataKind::Image
    }

    fn output(&self) -> DataKind {
        DataKind::Image
    }
}

pub struct BlurStep {
    pub filter: BlurFilter,
}

impl Stage for BlurStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let image = data.into_image(self.name())?;
        Ok(PipelineData::Image(self.filter.apply(&image)))
    }

    fn name(&self) -> &str {
        "Blur"
    }

    fn input(&self) -> DataKind {
        DataKind::Image
    }

    fn output(&self) -> DataKind {
        DataKind::Image
    }
}

/// Keep pixels whose hue, saturation and value all lie in range
pub struct HsvThresholdStep {
    pub ranges: HsvRanges,
}

impl Stage for HsvThresholdStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let image = data.into_image(self.name())?;
        let mask = preprocessing::hsv_threshold(&image, &self.ranges);
        log::trace!(
            "{} foreground pixels",
            mask.pixels().filter(|p| p[0] != 0).count()
        );
        Ok(PipelineData::Mask(mask))
    }

    fn name(&self) -> &str {
        "HSV Threshold"
    }

    fn input(&self) -> DataKind {
        DataKind::Image
    }

    fn output(&self) -> DataKind {
        DataKind::Mask
    }
}

pub struct ErodeStep {
    pub morphology: Morphology,
}

impl Stage for ErodeStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let mask = data.into_mask(self.name())?;
        Ok(PipelineData::Mask(self.morphology.erode(&mask)))
    }

    fn name(&self) -> &str {
        "Erode"
    }

    fn input(&self) -> DataKind {
        DataKind::Mask
    }

    fn output(&self) -> DataKind {
        DataKind::Mask
    }
}

pub struct DilateStep {
    pub morphology: Morphology,
}

impl Stage for DilateStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let mask = data.into_mask(self.name())?;
        Ok(PipelineData::Mask(self.morphology.dilate(&mask)))
    }

    fn name(&self) -> &str {
        "Dilate"
    }

    fn input(&self) -> DataKind {
        DataKind::Mask
    }

    fn output(&self) -> DataKind {
        DataKind::Mask
    }
}

/// One box around all foreground, as a four-corner contour
pub struct BoundingBoxStep;

impl Stage for BoundingBoxStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let mask = data.into_mask(self.name())?;
        let candidate = contours::mask_bounding_box(&mask)
            .map(|bbox| Shape::Contour(Contour::from_bounding_box(bbox)));
        Ok(PipelineData::Candidate(candidate))
    }

    fn name(&self) -> &str {
        "Bounding Box"
    }

    fn input(&self) -> DataKind {
        DataKind::Mask
    }

    fn output(&self) -> DataKind {
        DataKind::Candidate
    }
}

pub struct FindBlobsStep {
    pub params: BlobParams,
}

impl Stage for FindBlobsStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let mask = data.into_mask(self.name())?;
        let blobs = circles::find_blobs(&mask, &self.params);
        log::trace!("Found {} blobs", blobs.len());
        Ok(PipelineData::Shapes(blobs.into_iter().map(Shape::Circle).collect()))
    }

    fn name(&self) -> &str {
        "Find Blobs"
    }

    fn input(&self) -> DataKind {
        DataKind::Mask
    }

    fn output(&self) -> DataKind {
        DataKind::Shapes
    }
}

pub struct FindContoursStep {
    pub external_only: bool,
    pub approx: ChainApprox,
}

impl Stage for FindContoursStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let mask = data.into_mask(self.name())?;
        let found = contours::find_contours(&mask, self.external_only, self.approx);
        log::trace!("Found {} contours", found.len());
        Ok(PipelineData::Shapes(found.into_iter().map(Shape::Contour).collect()))
    }

    fn name(&self) -> &str {
        "Find Contours"
    }

    fn input(&self) -> DataKind {
        DataKind::Mask
    }

    fn output(&self) -> DataKind {
        DataKind::Shapes
    }
}

pub struct FilterContoursStep {
    pub bounds: FilterBounds,
}

impl Stage for FilterContoursStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let shapes = data.into_shapes(self.name())?;
        let total = shapes.len();
        let kept = filter::filter_shapes(shapes, &self.bounds);
        log::trace!("Kept {} of {} contours", kept.len(), total);
        Ok(PipelineData::Shapes(kept))
    }

    fn name(&self) -> &str {
        "Filter Contours"
    }

    fn input(&self) -> DataKind {
        DataKind::Shapes
    }

    fn output(&self) -> DataKind {
        DataKind::Shapes
    }
}

pub struct SelectLargestStep;

impl Stage for SelectLargestStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData, ProcessingError> {
        let shapes = data.into_shapes(self.name())?;
        Ok(PipelineData::Candidate(filter::select_largest(shapes)))
    }

    fn name(&self) -> &str {
        "Select Largest"
    }

    fn input(&self) -> DataKind {
        DataKind::Shapes
    }

    fn output(&self) -> DataKind {
        DataKind::Candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Circle, MASK_FOREGROUND, Mask};
    use image::{Luma, RgbImage};

    #[test]
    fn test_resize_rejects_zero_dimensions() {
        assert!(matches!(
            ResizeStep::new(0, 90, Interpolation::Cubic),
            Err(ConfigError::NonPositive { field: "resize.width", .. })
        ));
        assert!(ResizeStep::new(160, 0, Interpolation::Cubic).is_err());
    }

    #[test]
    fn test_resize_step_output_dimensions() {
        let step = ResizeStep::new(16, 9, Interpolation::Linear).unwrap();
        let out = step
            .process(PipelineData::Image(RgbImage::new(64, 48)))
            .unwrap();
        assert_eq!(out.dimensions(), Some((16, 9)));
    }

    #[test]
    fn test_step_rejects_wrong_input() {
        let result = SelectLargestStep.process(PipelineData::Mask(Mask::new(2, 2)));
        assert!(matches!(
            result,
            Err(ProcessingError::UnexpectedInput { expected: DataKind::Shapes, .. })
        ));
    }

    #[test]
    fn test_bounding_box_step() {
        let mut mask = Mask::new(10, 10);
        assert_eq!(
            BoundingBoxStep.process(PipelineData::Mask(mask.clone())).unwrap(),
            PipelineData::Candidate(None)
        );

        mask.put_pixel(2, 3, Luma([MASK_FOREGROUND]));
        mask.put_pixel(5, 7, Luma([MASK_FOREGROUND]));
        let candidate = BoundingBoxStep
            .process(PipelineData::Mask(mask))
            .unwrap()
            .into_candidate("test")
            .unwrap()
            .unwrap();
        assert_eq!(candidate.center(), (4.0, 5.5));
    }

    #[test]
    fn test_select_largest_step() {
        let shapes = vec![
            Shape::Circle(Circle { x: 1.0, y: 1.0, radius: 5.0 }),
            Shape::Circle(Circle { x: 9.0, y: 9.0, radius: 8.0 }),
        ];
        let out = SelectLargestStep.process(PipelineData::Shapes(shapes)).unwrap();
        assert_eq!(
            out,
            PipelineData::Candidate(Some(Shape::Circle(Circle { x: 9.0, y: 9.0, radius: 8.0 })))
        );
    }
}
