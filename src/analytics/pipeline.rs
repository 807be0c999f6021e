use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opencv::core::Mat;

use crate::camera::{CameraSource, FrameSource};
use crate::config::{Config, ReportConfig};
use crate::display::{DisplaySink, HighGuiSink};

use super::origin::FrameBounds;
use super::processor::{Detection, FrameProcessor, PipelineError};

const RAW_WINDOW: &str = "raw";
const STATS_INTERVAL: u64 = 300;

#[derive(serde::Serialize)]
struct FrameReport<'a> {
    frame: u64,
    detections: &'a [Detection],
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    ExitRequested,
    Shutdown,
}

pub struct OriginRunner<S: FrameSource> {
    source: S,
    processor: FrameProcessor,
    sink: Option<Box<dyn DisplaySink>>,
    report: ReportConfig,
    frames: u64,
    detections: u64,
}

impl<S: FrameSource> OriginRunner<S> {
    pub fn new(
        source: S,
        processor: FrameProcessor,
        sink: Option<Box<dyn DisplaySink>>,
        report: ReportConfig,
    ) -> Self {
        Self {
            source,
            processor,
            sink,
            report,
            frames: 0,
            detections: 0,
        }
    }

    /// Pull frames until the source ends, the display asks to quit or
    /// `shutdown` is raised. A frame whose size disagrees with the background
    /// aborts the run; any other per-frame failure is logged and skipped.
    pub fn run<W: Write>(
        &mut self,
        out: &mut W,
        shutdown: &AtomicBool,
    ) -> Result<StopReason, Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("origin runner started");

        let reason = loop {
            if shutdown.load(Ordering::Relaxed) {
                break StopReason::Shutdown;
            }

            let Some(frame) = self.source.next_frame()? else {
                break StopReason::EndOfStream;
            };
            self.frames += 1;

            match self.step(&frame) {
                Ok(detections) => {
                    if !detections.is_empty() {
                        self.detections += detections.len() as u64;
                        write_report(out, self.frames, &detections, self.report.json)?;
                    }
                }
                Err(e @ PipelineError::DimensionMismatch { .. }) => return Err(e.into()),
                Err(e) => {
                    tracing::error!(frame = self.frames, error = %e, "frame processing error");
                }
            }

            if self.frames % STATS_INTERVAL == 0 {
                tracing::debug!(
                    frames = self.frames,
                    detections = self.detections,
                    "runner stats"
                );
            }

            if let Some(sink) = self.sink.as_mut() {
                match sink.exit_requested() {
                    Ok(true) => break StopReason::ExitRequested,
                    Ok(false) => {}
                    Err(e) => self.disable_display(&e),
                }
            }
        };

        tracing::info!(
            frames = self.frames,
            detections = self.detections,
            reason = ?reason,
            "origin runner stopped"
        );

        Ok(reason)
    }

    fn step(&mut self, frame: &Mat) -> Result<Vec<Detection>, PipelineError> {
        let Some(sink) = self.sink.as_deref_mut() else {
            return self.processor.process_frame(frame, None);
        };

        let detections = self.processor.process_frame(frame, Some(&mut *sink))?;
        if let Err(e) = sink.show(RAW_WINDOW, self.source.raw_frame().unwrap_or(frame)) {
            self.disable_display(&e);
        }
        Ok(detections)
    }

    fn disable_display(&mut self, error: &opencv::Error) {
        tracing::warn!(error = %error, "display unavailable, continuing without it");
        self.sink = None;
    }
}

/// Known origins are printed one label per line; `json` switches to one
/// line per frame carrying every detection.
fn write_report<W: Write>(
    out: &mut W,
    frame: u64,
    detections: &[Detection],
    json: bool,
) -> io::Result<()> {
    for d in detections {
        tracing::debug!(frame, index = d.index, origin = %d.origin, area = d.area, "region classified");
    }

    if json {
        let line = serde_json::to_string(&FrameReport { frame, detections })?;
        writeln!(out, "{line}")?;
    } else {
        for d in detections.iter().filter(|d| d.origin.is_known()) {
            tracing::info!(frame, index = d.index, origin = %d.origin, "arm detected");
            writeln!(out, "{}", d.origin)?;
        }
    }
    out.flush()
}

pub fn spawn_runner(config: Config, shutdown: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let source = match CameraSource::open(&config.camera) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(device = %config.camera.device, error = %e, "failed to open capture");
                return;
            }
        };

        let bounds = FrameBounds {
            width: config.camera.width,
            height: config.camera.height,
        };
        let processor = FrameProcessor::new(&config.analytics, bounds);
        let sink: Option<Box<dyn DisplaySink>> = if config.display.enabled {
            Some(Box::<HighGuiSink>::default())
        } else {
            None
        };

        let mut runner = OriginRunner::new(source, processor, sink, config.report.clone());
        let stdout = io::stdout();
        if let Err(e) = runner.run(&mut stdout.lock(), &shutdown) {
            tracing::error!(error = %e, "origin runner failed");
        }
    })
}
