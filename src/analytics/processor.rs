use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::AnalyticsConfig;
use crate::display::DisplaySink;

use super::background::{describe_size, BackgroundModel};
use super::origin::{FrameBounds, Origin, OriginClassifier};
use super::region::{OrientedBox, RegionExtractor};
use super::segment;

pub const REGIONS_WINDOW: &str = "extract_rect";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error(
        "frame size {} does not match background {}",
        describe_size(.actual),
        describe_size(.expected)
    )]
    DimensionMismatch { expected: Size, actual: Size },
    #[error("unsupported frame type {0}, expected 8-bit single channel")]
    UnsupportedFrame(i32),
}

/// One labelled region. Its position in the frame's result is its index.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub index: usize,
    pub origin: Origin,
    pub corners: [[i32; 2]; 4],
    #[serde(skip)]
    pub area: f64,
}

impl Detection {
    fn new(index: usize, bx: &OrientedBox, origin: Origin) -> Self {
        Self {
            index,
            origin,
            corners: bx.corners.map(|p| [p.x, p.y]),
            area: bx.area,
        }
    }
}

pub struct FrameProcessor {
    background: BackgroundModel,
    cutoff: f64,
    extractor: RegionExtractor,
    classifier: OriginClassifier,
    size_checked: bool,
}

impl FrameProcessor {
    pub fn new(config: &AnalyticsConfig, bounds: FrameBounds) -> Self {
        Self {
            background: BackgroundModel::new(config.smoothing_factor),
            cutoff: config.threshold_cutoff,
            extractor: RegionExtractor::new(config.min_contour_area),
            classifier: OriginClassifier::new(bounds, config.tie_break),
            size_checked: false,
        }
    }

    /// Run one grayscale frame through the pipeline.
    ///
    /// The first frame only seeds the background and yields no detections.
    /// When `sink` is given the mask is rendered with the fitted boxes; the
    /// returned detections are the same either way, and a display failure is
    /// only logged.
    pub fn process_frame(
        &mut self,
        frame: &Mat,
        sink: Option<&mut dyn DisplaySink>,
    ) -> Result<Vec<Detection>, PipelineError> {
        if !self.size_checked {
            self.warn_on_bounds_mismatch(frame)?;
        }

        let Some(delta) = self.background.update(frame)? else {
            return Ok(Vec::new());
        };

        let mask = segment::threshold(&delta, self.cutoff)?;
        let boxes = self.extractor.extract(&mask)?;
        let origins = self.classifier.classify(&boxes);

        let detections: Vec<Detection> = boxes
            .iter()
            .zip(origins)
            .enumerate()
            .map(|(index, (bx, origin))| Detection::new(index, bx, origin))
            .collect();

        if let Some(sink) = sink {
            if let Err(e) = render(&mask, &boxes, sink) {
                tracing::warn!(window = REGIONS_WINDOW, error = %e, "display failed, detections kept");
            }
        }

        Ok(detections)
    }

    fn warn_on_bounds_mismatch(&mut self, frame: &Mat) -> Result<(), PipelineError> {
        let bounds = self.classifier.bounds();
        let size = frame.size()?;
        if size.width != bounds.width || size.height != bounds.height {
            tracing::warn!(
                frame = %describe_size(&size),
                configured = %describe_size(&Size::new(bounds.width, bounds.height)),
                "captured frame size differs from configured bounds, edges are checked against the configured size"
            );
        }
        self.size_checked = true;
        Ok(())
    }
}

fn render(mask: &Mat, boxes: &[OrientedBox], sink: &mut dyn DisplaySink) -> opencv::Result<()> {
    let mut canvas = Mat::default();
    imgproc::cvt_color_def(mask, &mut canvas, imgproc::COLOR_GRAY2BGR)?;
    RegionExtractor::draw(&mut canvas, boxes)?;
    sink.show(REGIONS_WINDOW, &canvas)
}
