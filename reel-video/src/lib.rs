pub mod encoder;
pub mod error;
pub mod export;
pub mod record;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use encoder::{Encoder, EncoderSession, FfmpegEncoder};
pub use error::VideoError;
pub use export::export_video;
pub use record::record_episode;
pub use settings::{DEFAULT_FPS, VideoSettings};
