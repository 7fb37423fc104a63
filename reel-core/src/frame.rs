use crate::error::FrameError;
use bincode::{Decode, Encode, error::DecodeError};

/// An image in row-major HWC layout with one `u8` per channel.
///
/// Raw simulator observations are RGB frames (`channels == 3`). Observation
/// wrappers produce frames with other shapes, e.g. stacked frames carry
/// `3 * depth` channels.
#[derive(Debug, Clone, PartialEq, Eq, Encode)]
pub struct Frame {
    height: usize,
    width: usize,
    channels: usize,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(
        height: usize,
        width: usize,
        channels: usize,
        pixels: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let expected = height * width * channels;
        if pixels.len() != expected {
            return Err(FrameError::PixelCount {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            height,
            width,
            channels,
            pixels,
        })
    }

    pub fn rgb(height: usize, width: usize, pixels: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(height, width, 3, pixels)
    }

    pub fn filled(height: usize, width: usize, channels: usize, value: u8) -> Self {
        Self {
            height,
            width,
            channels,
            pixels: vec![value; height * width * channels],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, y: usize, x: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.pixels[start..start + self.channels]
    }

    pub fn pixel_mut(&mut self, y: usize, x: usize) -> &mut [u8] {
        let start = (y * self.width + x) * self.channels;
        &mut self.pixels[start..start + self.channels]
    }

    /// Keeps every `factor`-th row and column, starting with the first one.
    pub fn downsample(&self, factor: usize) -> Frame {
        let factor = factor.max(1);
        let height = self.height.div_ceil(factor);
        let width = self.width.div_ceil(factor);
        let mut pixels = Vec::with_capacity(height * width * self.channels);
        for y in (0..self.height).step_by(factor) {
            for x in (0..self.width).step_by(factor) {
                pixels.extend_from_slice(self.pixel(y, x));
            }
        }
        Frame {
            height,
            width,
            channels: self.channels,
            pixels,
        }
    }

    /// Concatenates frames of equal height and width along the channel axis.
    pub fn concat_channels(frames: &[Frame]) -> Result<Frame, FrameError> {
        let Some(first) = frames.first() else {
            return Err(FrameError::Empty);
        };
        let (height, width) = (first.height, first.width);
        if let Some(other) = frames
            .iter()
            .find(|f| f.height != height || f.width != width)
        {
            return Err(FrameError::SizeMismatch {
                expected: (height, width),
                actual: (other.height, other.width),
            });
        }
        let channels = frames.iter().map(|f| f.channels).sum();
        let mut pixels = Vec::with_capacity(height * width * channels);
        for y in 0..height {
            for x in 0..width {
                for frame in frames {
                    pixels.extend_from_slice(frame.pixel(y, x));
                }
            }
        }
        Ok(Frame {
            height,
            width,
            channels,
            pixels,
        })
    }

    /// yuv420p needs an even height; odd frames get one black row appended.
    pub fn pad_to_even_height(self) -> Frame {
        if self.height % 2 == 0 {
            return self;
        }
        let mut pixels = self.pixels;
        pixels.resize(pixels.len() + self.width * self.channels, 0);
        Frame {
            height: self.height + 1,
            width: self.width,
            channels: self.channels,
            pixels,
        }
    }
}

// Decoding goes through `Frame::new` so a frame off the wire always holds as
// many pixels as its shape claims.
impl<C> Decode<C> for Frame {
    fn decode<D: bincode::de::Decoder<Context = C>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let height = usize::decode(decoder)?;
        let width = usize::decode(decoder)?;
        let channels = usize::decode(decoder)?;
        let pixels: Vec<u8> = Vec::decode(decoder)?;
        Frame::new(height, width, channels, pixels)
            .map_err(|err| DecodeError::OtherString(err.to_string()))
    }
}
bincode::impl_borrow_decode!(Frame);

pub fn padded_height(height: usize) -> usize {
    height + height % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: usize, width: usize, channels: usize) -> Frame {
        let pixels = (0..height * width * channels).map(|v| v as u8).collect();
        Frame::new(height, width, channels, pixels).unwrap()
    }

    #[test]
    fn rejects_wrong_pixel_count() {
        let err = Frame::rgb(2, 2, vec![0; 11]).unwrap_err();
        assert_eq!(
            err,
            FrameError::PixelCount {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn downsample_keeps_strided_pixels() {
        let frame = ramp(5, 6, 1);
        let small = frame.downsample(4);
        assert_eq!(small.shape(), [2, 2, 1]);
        assert_eq!(small.as_bytes(), &[0, 4, 24, 28]);
    }

    #[test]
    fn concat_interleaves_channels() {
        let a = Frame::filled(1, 2, 1, 1);
        let b = Frame::filled(1, 2, 2, 7);
        let joined = Frame::concat_channels(&[a, b]).unwrap();
        assert_eq!(joined.shape(), [1, 2, 3]);
        assert_eq!(joined.as_bytes(), &[1, 7, 7, 1, 7, 7]);
    }

    #[test]
    fn concat_rejects_mismatched_sizes() {
        let a = Frame::filled(1, 2, 1, 0);
        let b = Frame::filled(2, 2, 1, 0);
        assert!(matches!(
            Frame::concat_channels(&[a, b]),
            Err(FrameError::SizeMismatch { .. })
        ));
        assert_eq!(Frame::concat_channels(&[]), Err(FrameError::Empty));
    }

    #[test]
    fn odd_height_is_padded_with_black_row() {
        let frame = Frame::filled(3, 2, 3, 9).pad_to_even_height();
        assert_eq!(frame.shape(), [4, 2, 3]);
        assert!(frame.as_bytes()[..18].iter().all(|&p| p == 9));
        assert!(frame.as_bytes()[18..].iter().all(|&p| p == 0));
        assert_eq!(padded_height(3), 4);
        assert_eq!(padded_height(256), 256);
    }

    #[test]
    fn decoding_checks_the_pixel_count() {
        let config = bincode::config::standard();
        let frame = ramp(2, 3, 3);
        let bytes = bincode::encode_to_vec(&frame, config).unwrap();
        let (decoded, _): (Frame, usize) = bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(decoded, frame);

        let short =
            bincode::encode_to_vec((8usize, 8usize, 3usize, vec![0u8; 3]), config).unwrap();
        let err = bincode::decode_from_slice::<Frame, _>(&short, config).unwrap_err();
        assert!(matches!(err, DecodeError::OtherString(_)));
    }

    #[test]
    fn even_height_is_untouched() {
        let frame = ramp(2, 2, 3);
        assert_eq!(frame.clone().pad_to_even_height(), frame);
    }
}
