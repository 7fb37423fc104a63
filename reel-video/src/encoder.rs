use crate::{error::VideoError, settings::VideoSettings};
use anyhow::Result;
use reel_core::Frame;
use std::{
    ffi::OsString,
    io::{BufWriter, Write},
    process::{Child, ChildStdin, Command, Stdio},
};

/// Something that can open a streaming video sink.
pub trait Encoder {
    type Session: EncoderSession;

    fn start(&self, settings: &VideoSettings) -> Result<Self::Session>;
}

/// An open video stream. Frames go in one at a time, in order; `finish`
/// flushes the stream and reports whether the file was written.
pub trait EncoderSession {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    fn finish(self) -> Result<()>;
}

/// Pipes raw rgb24 frames into an `ffmpeg` process producing H.264 yuv420p.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: OsString,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
        }
    }
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(settings: &VideoSettings) -> Vec<OsString> {
        let size = format!("{}x{}", settings.width, settings.height);
        let fps = settings.fps.to_string();
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            size.as_str(),
            "-r",
            fps.as_str(),
            "-i",
            "-",
            "-an",
            "-vcodec",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(settings.path.clone().into_os_string());
        args
    }
}

impl Encoder for FfmpegEncoder {
    type Session = FfmpegSession;

    fn start(&self, settings: &VideoSettings) -> Result<FfmpegSession> {
        if let Some(dir) = settings.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                return Err(VideoError::MissingOutputDir(dir.to_path_buf()).into());
            }
        }
        let args = Self::args(settings);
        tracing::debug!(program = ?self.program, ?args, "starting encoder");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| VideoError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdin = child.stdin.take().map(BufWriter::new);
        Ok(FfmpegSession {
            child,
            stdin,
            frames: 0,
        })
    }
}

pub struct FfmpegSession {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    frames: usize,
}

impl EncoderSession for FfmpegSession {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let index = self.frames;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VideoError::Write {
                index,
                source: std::io::ErrorKind::BrokenPipe.into(),
            }
            .into());
        };
        stdin
            .write_all(frame.as_bytes())
            .map_err(|source| VideoError::Write { index, source })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().map_err(|source| VideoError::Write {
                index: self.frames,
                source,
            })?;
        }
        let status = self.child.wait().map_err(VideoError::Wait)?;
        tracing::debug!(%status, frames = self.frames, "encoder exited");
        if !status.success() {
            return Err(VideoError::EncoderFailed(status).into());
        }
        Ok(())
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        // closing stdin lets ffmpeg finalize whatever it already has
        drop(self.stdin.take());
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_describe_raw_input_and_h264_output() {
        let settings = VideoSettings::new("/tmp/out.mp4", 64, 48);
        let args: Vec<String> = FfmpegEncoder::args(&settings)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 64x48 -r 10 -i -"));
        assert!(joined.contains("-vcodec libx264 -pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn missing_output_dir_fails_before_spawning() {
        let settings = VideoSettings::new("/definitely/not/here/out.mp4", 8, 8);
        let err = FfmpegEncoder::new("/definitely/not/here/ffmpeg")
            .start(&settings)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<VideoError>(),
            Some(VideoError::MissingOutputDir(_))
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let settings = VideoSettings::new(std::env::temp_dir().join("never.mp4"), 8, 8);
        let err = FfmpegEncoder::new("/definitely/not/here/ffmpeg")
            .start(&settings)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<VideoError>(),
            Some(VideoError::Spawn { .. })
        ));
    }
}
