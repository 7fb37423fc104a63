use std::{ffi::OsString, io, path::PathBuf, process::ExitStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("output directory {0:?} does not exist")]
    MissingOutputDir(PathBuf),
    #[error("failed to start encoder {program:?}")]
    Spawn {
        program: OsString,
        #[source]
        source: io::Error,
    },
    #[error("failed to write frame {index} to the encoder")]
    Write {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("encoder exited with {0}")]
    EncoderFailed(ExitStatus),
    #[error("encoder could not be waited on")]
    Wait(#[source] io::Error),
    #[error("frame {index} is {actual:?}, the video expects {expected:?}")]
    FrameShape {
        index: usize,
        expected: [usize; 3],
        actual: [usize; 3],
    },
}
