use opencv::{core::Mat, highgui, Result as CvResult};

/// Where annotated frames go for a human to look at. Never feeds back into
/// detection.
pub trait DisplaySink {
    fn show(&mut self, window: &str, image: &Mat) -> CvResult<()>;

    fn exit_requested(&mut self) -> CvResult<bool> {
        Ok(false)
    }
}

/// On-screen windows via HighGUI. Any key press asks the runner to stop.
#[derive(Default)]
pub struct HighGuiSink {
    windows: Vec<String>,
}

impl DisplaySink for HighGuiSink {
    fn show(&mut self, window: &str, image: &Mat) -> CvResult<()> {
        if !self.windows.iter().any(|w| w == window) {
            highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
            self.windows.push(window.to_string());
        }
        highgui::imshow(window, image)
    }

    fn exit_requested(&mut self) -> CvResult<bool> {
        Ok(highgui::wait_key(1)? != -1)
    }
}

impl Drop for HighGuiSink {
    fn drop(&mut self) {
        if !self.windows.is_empty() {
            let _ = highgui::destroy_all_windows();
        }
    }
}
