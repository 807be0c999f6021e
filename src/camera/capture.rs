use opencv::{
    core::{Mat, CV_16U, CV_8U},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use thiserror::Error;

use crate::config::{CameraConfig, DeviceSpec};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("could not open capture source {0}")]
    NotOpened(String),
    #[error("unsupported capture format {0}, expected 8-bit gray/BGR/BGRA or 16-bit gray")]
    UnsupportedFormat(i32),
}

/// Supplies single-channel 8-bit frames of constant size.
pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Mat>, CaptureError>;

    /// The last frame as captured, before grayscale conversion, if kept.
    fn raw_frame(&self) -> Option<&Mat> {
        None
    }
}

pub struct CameraSource {
    capture: VideoCapture,
    device: String,
    raw: Mat,
}

impl CameraSource {
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let device = config.device.to_string();
        let mut capture = match &config.device {
            DeviceSpec::Index(index) => VideoCapture::new(*index, videoio::CAP_ANY)?,
            DeviceSpec::Path(path) => VideoCapture::from_file(path, videoio::CAP_ANY)?,
        };

        if !capture.is_opened()? {
            return Err(CaptureError::NotOpened(device));
        }

        // Requests only; drivers are free to pick the nearest mode.
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.fps as f64)?;

        tracing::info!(
            device = %device,
            width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
            height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?,
            fps = capture.get(videoio::CAP_PROP_FPS)?,
            "capture opened"
        );

        Ok(Self {
            capture,
            device,
            raw: Mat::default(),
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Mat>, CaptureError> {
        if !self.capture.read(&mut self.raw)? || self.raw.empty() {
            tracing::warn!(device = %self.device, "capture returned no frame");
            return Ok(None);
        }
        to_gray(&self.raw).map(Some)
    }

    fn raw_frame(&self) -> Option<&Mat> {
        (!self.raw.empty()).then_some(&self.raw)
    }
}

/// Reduce a captured frame to 8-bit single channel.
pub(crate) fn to_gray(frame: &Mat) -> Result<Mat, CaptureError> {
    let mut gray = Mat::default();
    match (frame.channels(), frame.depth()) {
        (1, CV_8U) => frame.copy_to(&mut gray)?,
        // Full 16-bit range onto 0..=255.
        (1, CV_16U) => frame.convert_to(&mut gray, CV_8U, 1.0 / 257.0, 0.0)?,
        (3, CV_8U) => imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?,
        (4, CV_8U) => imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGRA2GRAY)?,
        _ => return Err(CaptureError::UnsupportedFormat(frame.typ())),
    }
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_16UC1, CV_32FC1, CV_8UC1, CV_8UC2, CV_8UC3};

    #[test]
    fn test_bgr_frames_become_single_channel() {
        let mut bgr =
            Mat::new_rows_cols_with_default(4, 6, CV_8UC3, Scalar::new(0.0, 0.0, 0.0, 0.0))
                .unwrap();
        imgproc::rectangle(
            &mut bgr,
            Rect::new(2, 1, 1, 1),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let gray = to_gray(&bgr).unwrap();
        assert_eq!(gray.typ(), CV_8UC1);
        assert_eq!(gray.size().unwrap(), bgr.size().unwrap());
        assert_eq!(*gray.at_2d::<u8>(1, 2).unwrap(), 255);
        assert_eq!(*gray.at_2d::<u8>(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_gray_frames_pass_through() {
        let frame = Mat::new_rows_cols_with_default(3, 3, CV_8UC1, Scalar::all(77.0)).unwrap();
        let gray = to_gray(&frame).unwrap();
        assert_eq!(*gray.at_2d::<u8>(2, 2).unwrap(), 77);
    }

    #[test]
    fn test_sixteen_bit_gray_is_scaled_down() {
        let mut frame =
            Mat::new_rows_cols_with_default(2, 2, CV_16UC1, Scalar::all(65535.0)).unwrap();
        *frame.at_2d_mut::<u16>(1, 1).unwrap() = 257 * 100;

        let gray = to_gray(&frame).unwrap();
        assert_eq!(gray.typ(), CV_8UC1);
        assert_eq!(*gray.at_2d::<u8>(0, 0).unwrap(), 255);
        assert_eq!(*gray.at_2d::<u8>(1, 1).unwrap(), 100);
    }

    #[test]
    fn test_other_formats_are_rejected() {
        for typ in [CV_32FC1, CV_8UC2] {
            let frame = Mat::new_rows_cols_with_default(2, 2, typ, Scalar::all(1.0)).unwrap();
            assert!(matches!(
                to_gray(&frame),
                Err(CaptureError::UnsupportedFormat(t)) if t == typ
            ));
        }
    }

    #[test]
    fn test_missing_file_is_not_opened() {
        let config = CameraConfig {
            device: DeviceSpec::Path("/nonexistent/armwatch-test.avi".into()),
            ..CameraConfig::default()
        };
        assert!(CameraSource::open(&config).is_err());
    }
}
