use opencv::{core::Mat, imgproc, Result as CvResult};

const FOREGROUND: f64 = 255.0;

/// Binarize a delta image: 255 where `delta > cutoff`, 0 elsewhere.
pub fn threshold(delta: &Mat, cutoff: f64) -> CvResult<Mat> {
    let mut mask = Mat::default();
    imgproc::threshold(delta, &mut mask, cutoff, FOREGROUND, imgproc::THRESH_BINARY)?;
    Ok(mask)
}
