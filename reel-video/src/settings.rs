use reel_core::frame::padded_height;
use std::path::PathBuf;

pub const DEFAULT_FPS: u32 = 10;

/// Where the video goes and what every frame in it looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub path: PathBuf,
    pub width: usize,
    /// Always even; yuv420p output cannot have odd dimensions.
    pub height: usize,
    pub fps: u32,
}

impl VideoSettings {
    /// Settings for a `width` x `height` environment at [`DEFAULT_FPS`]. An
    /// odd height is rounded up, frames get padded to match on export.
    pub fn new(path: impl Into<PathBuf>, width: usize, height: usize) -> Self {
        Self {
            path: path.into(),
            width,
            height: padded_height(height),
            fps: DEFAULT_FPS,
        }
    }

    pub fn frame_shape(&self) -> [usize; 3] {
        [self.height, self.width, 3]
    }
}
