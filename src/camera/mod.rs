mod capture;

pub use capture::{CameraSource, CaptureError, FrameSource};
