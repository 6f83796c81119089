//! Frame loop: read, sample, match, record, annotate, write.
//!
//! Strictly sequential. The carry-over policy in `SampledMatches` depends on
//! frames arriving in index order, so frames are never processed out of order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::annotate::FrameAnnotator;
use crate::config::{CastwatchConfig, LimitSettings};
use crate::detect::{FaceBackend, DEFAULT_TOLERANCE};
use crate::diagnostics::Diagnostics;
use crate::encoder::Encoding;
use crate::ingest::{frames, VideoSource};
use crate::matcher::FaceMatcher;
use crate::sampler::{FrameSampler, Sampled, SampledMatches};
use crate::sink::VideoSink;
use crate::stats::PresenceTable;
use crate::ui::FrameProgress;

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub analyzed_fps: f64,
    pub analysis_height: u32,
    pub tolerance: f32,
    pub highlight_faces: bool,
    pub limits: LimitSettings,
    /// Sleep between frames of live sources so they are not read faster than their fps.
    pub pace_live_sources: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            analyzed_fps: 4.0,
            analysis_height: 360,
            tolerance: DEFAULT_TOLERANCE,
            highlight_faces: false,
            limits: LimitSettings::default(),
            pace_live_sources: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &CastwatchConfig) -> Self {
        Self {
            analyzed_fps: config.analysis.analyzed_fps,
            analysis_height: config.analysis.analysis_height,
            tolerance: config.analysis.tolerance,
            highlight_faces: config.output.highlight_faces,
            limits: config.limits.clone(),
            pace_live_sources: true,
        }
    }
}

/// Why the frame loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    FrameLimit,
    TimeLimit,
    Interrupted,
    /// The source failed mid-stream; frames read so far are kept.
    ReadError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EndOfStream => "end of stream",
            Self::FrameLimit => "frame limit reached",
            Self::TimeLimit => "time limit reached",
            Self::Interrupted => "interrupted",
            Self::ReadError => "source read error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_analyzed: u64,
    /// Analyzed frames whose detection failed and were left out of the table.
    pub frames_failed: u64,
    /// Frames the sink failed to write. The run continues past them.
    pub frames_unwritten: u64,
    pub faces_seen: u64,
    pub unknown_faces: u64,
    pub stop_reason: StopReason,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames read, {} analyzed, {} faces ({} unknown), stopped: {}",
            self.frames_read,
            self.frames_analyzed,
            self.faces_seen,
            self.unknown_faces,
            self.stop_reason
        )?;
        if self.frames_failed > 0 {
            write!(f, ", {} frames failed analysis", self.frames_failed)?;
        }
        if self.frames_unwritten > 0 {
            write!(f, ", {} frames not written", self.frames_unwritten)?;
        }
        Ok(())
    }
}

pub struct RunOutput {
    pub table: PresenceTable,
    pub summary: RunSummary,
}

/// Sleeps off whatever is left of one frame interval since `last`.
pub fn pace_to_fps(last: Instant, fps: f64) {
    if !(fps.is_finite() && fps > 0.0) {
        return;
    }
    let interval = Duration::from_secs_f64(1.0 / fps);
    let elapsed = last.elapsed();
    if elapsed < interval {
        thread::sleep(interval - elapsed);
    }
}

/// Frame index at which `max_seconds` is reached for a stream at `fps`.
fn time_limit_frame(max_seconds: Option<f64>, fps: f64) -> Option<u64> {
    let secs = max_seconds?;
    if !(fps.is_finite() && fps > 0.0) {
        return None;
    }
    Some((secs * fps).ceil() as u64)
}

pub struct Pipeline<'a> {
    backend: &'a mut dyn FaceBackend,
    encodings: &'a [Encoding],
    actors: Vec<String>,
    diagnostics: &'a dyn Diagnostics,
    options: PipelineOptions,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a> Pipeline<'a> {
    /// `actors` fixes the table columns: every name handed to the encoder,
    /// including actors whose photos all failed to encode.
    pub fn new(
        backend: &'a mut dyn FaceBackend,
        encodings: &'a [Encoding],
        actors: Vec<String>,
        diagnostics: &'a dyn Diagnostics,
        options: PipelineOptions,
    ) -> Self {
        Self {
            backend,
            encodings,
            actors,
            diagnostics,
            options,
            stop: None,
        }
    }

    /// Loop exits with `StopReason::Interrupted` once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn run(
        &mut self,
        source: &mut dyn VideoSource,
        sink: &mut dyn VideoSink,
        progress: &FrameProgress,
    ) -> Result<RunOutput> {
        let descriptor = source.descriptor();
        let sampler = FrameSampler::new(
            descriptor.fps,
            self.options.analyzed_fps,
            descriptor.height,
            self.options.analysis_height,
        );
        self.diagnostics.info(&format!("source: {}", descriptor));
        self.diagnostics.verbose(&format!(
            "analyzing every {} frame(s) at scale {:.3}",
            sampler.stride(),
            sampler.scale()
        ));

        let matcher = FaceMatcher::new(self.encodings, self.options.tolerance);
        let annotator = FrameAnnotator::new(self.options.highlight_faces);
        let mut sampled = SampledMatches::new(sampler);
        let mut table = PresenceTable::new(self.actors.iter().cloned());
        let time_limit = time_limit_frame(self.options.limits.max_seconds, descriptor.fps);
        let pace = self.options.pace_live_sources && descriptor.frame_count.is_none();

        let mut summary = RunSummary {
            frames_read: 0,
            frames_analyzed: 0,
            frames_failed: 0,
            frames_unwritten: 0,
            faces_seen: 0,
            unknown_faces: 0,
            stop_reason: StopReason::EndOfStream,
        };
        let mut last_frame_at = Instant::now();
        let mut stream = frames(source);

        loop {
            if self
                .stop
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                summary.stop_reason = StopReason::Interrupted;
                break;
            }
            if self
                .options
                .limits
                .max_frames
                .is_some_and(|max| summary.frames_read >= max)
            {
                summary.stop_reason = StopReason::FrameLimit;
                break;
            }

            let mut frame = match stream.next() {
                Some(Ok(frame)) => frame,
                None => break,
                Some(Err(e)) => {
                    log::warn!(
                        "frame read failed after {} frames, stopping: {:#}",
                        summary.frames_read,
                        e
                    );
                    summary.stop_reason = StopReason::ReadError;
                    break;
                }
            };
            summary.frames_read += 1;

            let backend = &mut *self.backend;
            let step = sampled.advance(frame.index, |sampler| {
                matcher.match_frame(&frame, sampler, backend)
            });
            match step {
                Ok((Sampled::Analyzed, results)) => {
                    summary.frames_analyzed += 1;
                    summary.faces_seen += results.len() as u64;
                    summary.unknown_faces +=
                        results.iter().filter(|r| r.identity.is_unknown()).count() as u64;
                    if let Err(e) = table.record(frame.index, results) {
                        summary.frames_failed += 1;
                        log::warn!("frame {} not recorded: {:#}", frame.index, e);
                    }
                }
                Ok((Sampled::CarriedOver, _)) => {}
                Err(e) => {
                    summary.frames_failed += 1;
                    log::warn!("face analysis failed on frame {}: {:#}", frame.index, e);
                }
            }

            if sink.is_active() {
                annotator.annotate(&mut frame, sampled.current());
                if let Err(e) = sink.write(&frame) {
                    summary.frames_unwritten += 1;
                    log::warn!("frame {} not written: {:#}", frame.index, e);
                }
            }

            progress.set_position(summary.frames_read);
            if summary.frames_read % 100 == 0 {
                match descriptor.progress_percent(summary.frames_read) {
                    Some(pct) => self.diagnostics.verbose(&format!(
                        "frame {} ({:.1}%)",
                        summary.frames_read, pct
                    )),
                    None => self
                        .diagnostics
                        .verbose(&format!("frame {}", summary.frames_read)),
                }
            }

            // The boundary frame itself is still processed.
            if time_limit.is_some_and(|limit| frame.index >= limit) {
                summary.stop_reason = StopReason::TimeLimit;
                break;
            }

            if pace {
                pace_to_fps(last_frame_at, descriptor.fps);
            }
            last_frame_at = Instant::now();
        }

        if let Err(e) = sink.finish() {
            log::warn!("finishing output failed: {:#}", e);
        }
        progress.finish();
        self.diagnostics.info(&format!("run finished: {}", summary));
        Ok(RunOutput { table, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::sink::NullSink;
    use anyhow::anyhow;
    use image::RgbImage;

    use crate::detect::BoundingBox;
    use crate::frame::Frame;

    /// Stub detection, except the `fail_on`-th detection call errors.
    struct FlakyBackend {
        inner: StubBackend,
        calls: u32,
        fail_on: u32,
    }

    impl FaceBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(anyhow!("detector crashed"));
            }
            self.inner.locate_faces(image)
        }

        fn encode_faces(
            &mut self,
            image: &RgbImage,
            faces: &[BoundingBox],
        ) -> Result<Vec<crate::detect::Embedding>> {
            self.inner.encode_faces(image, faces)
        }
    }

    /// Synthetic stream that errors once `fail_after` frames were read.
    struct BrokenSource {
        inner: SyntheticSource,
        read: u64,
        fail_after: u64,
    }

    impl VideoSource for BrokenSource {
        fn descriptor(&self) -> crate::frame::VideoDescriptor {
            self.inner.descriptor()
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.read == self.fail_after {
                return Err(anyhow!("corrupt packet"));
            }
            self.read += 1;
            self.inner.next_frame()
        }
    }

    /// Rejects frames in `reject`, and fails on finish.
    struct RejectingSink {
        reject: std::ops::Range<u64>,
        written: u64,
    }

    impl VideoSink for RejectingSink {
        fn write(&mut self, frame: &Frame) -> Result<()> {
            if self.reject.contains(&frame.index) {
                return Err(anyhow!("disk full"));
            }
            self.written += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn encoding(name: &str, color: [f32; 3]) -> Encoding {
        Encoding {
            name: name.to_string(),
            vector: color.to_vec(),
            source_photo: format!("{name}.jpg").into(),
        }
    }

    fn run(config: SyntheticConfig, options: PipelineOptions) -> RunOutput {
        let encodings = vec![encoding("Red", [1.0, 0.0, 0.0])];
        let mut backend = StubBackend::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut source = SyntheticSource::new(config);
        let mut pipeline = Pipeline::new(
            &mut backend,
            &encodings,
            vec!["Red".to_string(), "Nobody".to_string()],
            &diagnostics,
            options,
        );
        pipeline
            .run(&mut source, &mut NullSink, &FrameProgress::hidden())
            .unwrap()
    }

    #[test]
    fn only_stride_frames_become_rows() {
        let output = run(
            SyntheticConfig {
                frame_count: Some(48),
                ..SyntheticConfig::default()
            },
            PipelineOptions::default(),
        );
        let frames: Vec<u64> = output.table.rows().iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 6, 12, 18, 24, 30, 36, 42]);
        assert!(output.table.rows().iter().all(|r| r.is_present("Red")));
        assert_eq!(output.summary.frames_read, 48);
        assert_eq!(output.summary.frames_analyzed, 8);
        assert_eq!(output.summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(output.table.columns(), ["Unknown", "Red", "Nobody"]);
    }

    #[test]
    fn limits_stop_the_loop() {
        let options = PipelineOptions {
            limits: LimitSettings {
                max_seconds: None,
                max_frames: Some(10),
            },
            ..PipelineOptions::default()
        };
        let output = run(SyntheticConfig::default(), options);
        assert_eq!(output.summary.frames_read, 10);
        assert_eq!(output.summary.stop_reason, StopReason::FrameLimit);

        let options = PipelineOptions {
            limits: LimitSettings {
                max_seconds: Some(1.0),
                max_frames: None,
            },
            ..PipelineOptions::default()
        };
        let output = run(SyntheticConfig::default(), options);
        // Frames 0..=24: the frame at exactly one second is still processed.
        assert_eq!(output.summary.frames_read, 25);
        assert_eq!(output.summary.stop_reason, StopReason::TimeLimit);
        let last = output.table.rows().last().map(|r| r.frame);
        assert_eq!(last, Some(24));
    }

    #[test]
    fn stop_flag_interrupts_before_reading() {
        let encodings = Vec::new();
        let mut backend = StubBackend::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut source = SyntheticSource::new(SyntheticConfig::default());
        let flag = Arc::new(AtomicBool::new(true));
        let output = Pipeline::new(&mut backend, &encodings, Vec::new(), &diagnostics, PipelineOptions::default())
            .with_stop_flag(flag)
            .run(&mut source, &mut NullSink, &FrameProgress::hidden())
            .unwrap();
        assert_eq!(output.summary.frames_read, 0);
        assert_eq!(output.summary.stop_reason, StopReason::Interrupted);
        assert!(output.table.is_empty());
    }

    #[test]
    fn unmatched_faces_count_as_unknown() {
        let output = run(
            SyntheticConfig {
                frame_count: Some(1),
                actors: vec![crate::ingest::SyntheticActor::always([0, 0, 255])],
                ..SyntheticConfig::default()
            },
            PipelineOptions::default(),
        );
        assert_eq!(output.summary.faces_seen, 1);
        assert_eq!(output.summary.unknown_faces, 1);
        assert!(output.table.rows()[0].is_present("Unknown"));
    }

    #[test]
    fn time_limit_rounds_up_to_whole_frames() {
        assert_eq!(time_limit_frame(Some(1.0), 24.0), Some(24));
        assert_eq!(time_limit_frame(Some(0.5), 25.0), Some(13));
        assert_eq!(time_limit_frame(None, 24.0), None);
        assert_eq!(time_limit_frame(Some(1.0), 0.0), None);
    }

    #[test]
    fn failed_detection_skips_the_row_and_continues() {
        let encodings = vec![encoding("Red", [1.0, 0.0, 0.0])];
        let mut backend = FlakyBackend {
            inner: StubBackend::new(),
            calls: 0,
            fail_on: 2,
        };
        let diagnostics = RecordingDiagnostics::new();
        let mut source = SyntheticSource::new(SyntheticConfig {
            frame_count: Some(24),
            ..SyntheticConfig::default()
        });
        let output = Pipeline::new(
            &mut backend,
            &encodings,
            vec!["Red".to_string()],
            &diagnostics,
            PipelineOptions::default(),
        )
        .run(&mut source, &mut NullSink, &FrameProgress::hidden())
        .unwrap();

        let frames: Vec<u64> = output.table.rows().iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 12, 18]);
        assert_eq!(output.summary.frames_read, 24);
        assert_eq!(output.summary.frames_analyzed, 3);
        assert_eq!(output.summary.frames_failed, 1);
        assert_eq!(output.summary.stop_reason, StopReason::EndOfStream);
        assert!(output.summary.to_string().contains("1 frames failed analysis"));
    }

    #[test]
    fn read_error_mid_stream_keeps_earlier_rows() {
        let encodings = vec![encoding("Red", [1.0, 0.0, 0.0])];
        let mut backend = StubBackend::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut source = BrokenSource {
            inner: SyntheticSource::new(SyntheticConfig::default()),
            read: 0,
            fail_after: 14,
        };
        let output = Pipeline::new(
            &mut backend,
            &encodings,
            vec!["Red".to_string()],
            &diagnostics,
            PipelineOptions::default(),
        )
        .run(&mut source, &mut NullSink, &FrameProgress::hidden())
        .unwrap();

        assert_eq!(output.summary.stop_reason, StopReason::ReadError);
        assert_eq!(output.summary.frames_read, 14);
        let frames: Vec<u64> = output.table.rows().iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 6, 12]);
    }

    #[test]
    fn sink_failures_do_not_end_the_run() {
        let encodings = vec![encoding("Red", [1.0, 0.0, 0.0])];
        let mut backend = StubBackend::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut source = SyntheticSource::new(SyntheticConfig {
            frame_count: Some(60),
            ..SyntheticConfig::default()
        });
        let mut sink = RejectingSink {
            reject: 30..33,
            written: 0,
        };
        let output = Pipeline::new(
            &mut backend,
            &encodings,
            vec!["Red".to_string()],
            &diagnostics,
            PipelineOptions::default(),
        )
        .run(&mut source, &mut sink, &FrameProgress::hidden())
        .unwrap();

        assert_eq!(output.summary.frames_read, 60);
        assert_eq!(output.summary.frames_unwritten, 3);
        assert_eq!(sink.written, 57);
        assert_eq!(output.summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(output.table.len(), 10);
        assert!(output.summary.to_string().contains("3 frames not written"));
    }
}
