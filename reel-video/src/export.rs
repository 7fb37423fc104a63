use crate::{
    encoder::{Encoder, EncoderSession},
    error::VideoError,
    settings::VideoSettings,
};
use anyhow::Result;
use reel_core::Frame;

/// Streams `frames` into a fresh encoder session and returns how many were
/// written. Frames are pulled one at a time; the first error from the
/// sequence, a frame of the wrong size, or the encoder itself ends the export.
/// A partially written file is left in place.
pub fn export_video<E, I>(encoder: &E, settings: &VideoSettings, frames: I) -> Result<usize>
where
    E: Encoder,
    I: IntoIterator<Item = Result<Frame>>,
{
    let mut session = encoder.start(settings)?;
    let expected = settings.frame_shape();
    let mut written = 0;
    for frame in frames {
        let frame = frame?.pad_to_even_height();
        if frame.shape() != expected {
            return Err(VideoError::FrameShape {
                index: written,
                expected,
                actual: frame.shape(),
            }
            .into());
        }
        session.write_frame(&frame)?;
        written += 1;
        tracing::trace!(frame = written, "frame written");
    }
    session.finish()?;
    tracing::info!(frames = written, path = ?settings.path, fps = settings.fps, "video written");
    Ok(written)
}
