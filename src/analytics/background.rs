use opencv::{
    core::{self, Mat, Size, CV_64F, CV_8UC1},
    imgproc,
    prelude::*,
};

use super::processor::PipelineError;

/// Running float estimate of the static scene.
///
/// The estimate is seeded from the first frame and then follows the scene
/// by exponential smoothing, `estimate = estimate * (1 - alpha) + frame * alpha`.
/// With a tiny `alpha` a hand passing through stays foreground for its whole
/// visit while slow lighting drift is still absorbed.
pub struct BackgroundModel {
    estimate: Option<Mat>,
    alpha: f64,
}

impl BackgroundModel {
    pub fn new(alpha: f64) -> Self {
        Self {
            estimate: None,
            alpha,
        }
    }

    #[cfg(test)]
    pub fn estimate(&self) -> Option<&Mat> {
        self.estimate.as_ref()
    }

    /// Fold `frame` into the estimate and return `|frame - round(estimate)|`.
    ///
    /// Returns `Ok(None)` on the first call: the estimate is only seeded and
    /// there is nothing meaningful to compare against yet.
    pub fn update(&mut self, frame: &Mat) -> Result<Option<Mat>, PipelineError> {
        if frame.typ() != CV_8UC1 {
            return Err(PipelineError::UnsupportedFrame(frame.typ()));
        }

        let Some(estimate) = self.estimate.as_mut() else {
            let mut seeded = Mat::default();
            frame.convert_to(&mut seeded, CV_64F, 1.0, 0.0)?;
            tracing::debug!(
                width = frame.cols(),
                height = frame.rows(),
                "background estimate seeded"
            );
            self.estimate = Some(seeded);
            return Ok(None);
        };

        let expected = estimate.size()?;
        let actual = frame.size()?;
        if expected != actual {
            return Err(PipelineError::DimensionMismatch { expected, actual });
        }

        imgproc::accumulate_weighted(frame, estimate, self.alpha, &core::no_array())?;

        let mut rounded = Mat::default();
        core::convert_scale_abs(&*estimate, &mut rounded, 1.0, 0.0)?;

        let mut delta = Mat::default();
        core::absdiff(frame, &rounded, &mut delta)?;

        Ok(Some(delta))
    }
}

pub(crate) fn describe_size(size: &Size) -> String {
    format!("{}x{}", size.width, size.height)
}
