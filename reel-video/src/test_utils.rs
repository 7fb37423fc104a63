use crate::{
    encoder::{Encoder, EncoderSession},
    error::VideoError,
    settings::VideoSettings,
};
use anyhow::Result;
use reel_core::Frame;
use std::sync::{Arc, Mutex};

/// What a [`RecordingEncoder`] has been given so far.
#[derive(Debug, Default, Clone)]
pub struct Recording {
    pub settings: Option<VideoSettings>,
    pub frames: Vec<Frame>,
    pub finished: bool,
}

/// Keeps frames in memory instead of encoding them.
#[derive(Debug, Default, Clone)]
pub struct RecordingEncoder {
    recording: Arc<Mutex<Recording>>,
    fail_start: bool,
    fail_write_at: Option<usize>,
}

impl RecordingEncoder {
    pub fn failing_to_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    /// Accepts frames until the one at `index` (zero-based), whose write
    /// fails with a broken pipe.
    pub fn failing_at_frame(index: usize) -> Self {
        Self {
            fail_write_at: Some(index),
            ..Default::default()
        }
    }

    pub fn recording(&self) -> Recording {
        self.recording.lock().unwrap().clone()
    }
}

impl Encoder for RecordingEncoder {
    type Session = RecordingSession;

    fn start(&self, settings: &VideoSettings) -> Result<RecordingSession> {
        if self.fail_start {
            return Err(VideoError::Spawn {
                program: "recording-encoder".into(),
                source: std::io::ErrorKind::NotFound.into(),
            }
            .into());
        }
        self.recording.lock().unwrap().settings = Some(settings.clone());
        Ok(RecordingSession {
            recording: self.recording.clone(),
            fail_write_at: self.fail_write_at,
        })
    }
}

pub struct RecordingSession {
    recording: Arc<Mutex<Recording>>,
    fail_write_at: Option<usize>,
}

impl EncoderSession for RecordingSession {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        let index = recording.frames.len();
        if self.fail_write_at == Some(index) {
            return Err(VideoError::Write {
                index,
                source: std::io::ErrorKind::BrokenPipe.into(),
            }
            .into());
        }
        recording.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self) -> Result<()> {
        self.recording.lock().unwrap().finished = true;
        Ok(())
    }
}
