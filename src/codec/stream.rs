use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::{pack_rgb, unpack_rgb, Color};
use crate::models::StreamEncoding;

/// LED indices at which a frame is split into parts
pub const CHUNK_THRESHOLDS: [usize; 3] = [170, 340, 510];

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no chunks to reassemble")]
    Empty,
    #[error("inconsistent LED count: chunk announces {announced}, expected {expected}")]
    InconsistentLedCount { announced: usize, expected: usize },
    #[error("missing part {0}")]
    MissingPart(u8),
    #[error("reassembled {actual} LEDs out of {expected}")]
    Truncated { actual: usize, expected: usize },
}

/// One part of a chunked network frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// 1-based part number
    pub part: u8,
    /// Total LED count of the frame
    #[serde(rename = "lednum")]
    pub led_count: usize,
    /// Packed `0xRRGGBB` colors of this part
    #[serde(rename = "stream")]
    pub colors: Vec<u32>,
}

/// Split a frame into chunks at the fixed thresholds, the last part taking the remainder
pub fn split_chunks(colors: &[Color]) -> Vec<StreamChunk> {
    let led_count = colors.len();
    let mut chunks = Vec::with_capacity(CHUNK_THRESHOLDS.len() + 1);
    let mut start = 0;

    for (i, end) in CHUNK_THRESHOLDS
        .iter()
        .copied()
        .chain(std::iter::once(usize::MAX))
        .enumerate()
    {
        if start >= led_count {
            break;
        }

        let end = end.min(led_count);
        chunks.push(StreamChunk {
            part: (i + 1) as u8,
            led_count,
            colors: colors[start..end].iter().copied().map(pack_rgb).collect(),
        });

        start = end;
    }

    chunks
}

/// Rebuild a frame from its chunks, in part order
pub fn reassemble(chunks: &[StreamChunk]) -> Result<Vec<Color>, StreamError> {
    let expected = chunks.first().ok_or(StreamError::Empty)?.led_count;

    let mut sorted: Vec<_> = chunks.iter().collect();
    sorted.sort_by_key(|chunk| chunk.part);

    let mut colors = Vec::with_capacity(expected);
    for (i, chunk) in sorted.into_iter().enumerate() {
        if chunk.part as usize != i + 1 {
            return Err(StreamError::MissingPart((i + 1) as u8));
        }

        if chunk.led_count != expected {
            return Err(StreamError::InconsistentLedCount {
                announced: chunk.led_count,
                expected,
            });
        }

        colors.extend(chunk.colors.iter().copied().map(unpack_rgb));
    }

    if colors.len() != expected {
        return Err(StreamError::Truncated {
            actual: colors.len(),
            expected,
        });
    }

    Ok(colors)
}

/// Single-message format understood by light firmwares: `N,brightness,c0,c1,...`
pub fn render_raw(colors: &[Color], brightness: u8) -> String {
    let mut out = String::with_capacity(8 + colors.len() * 9);
    out.push_str(&colors.len().to_string());
    out.push(',');
    out.push_str(&brightness.to_string());

    for color in colors {
        out.push(',');
        out.push_str(&pack_rgb(*color).to_string());
    }

    out
}

/// Renders frames as network messages
#[derive(Debug, Clone, Copy)]
pub struct StreamEncoder {
    encoding: StreamEncoding,
    brightness: u8,
}

impl StreamEncoder {
    pub fn new(encoding: StreamEncoding, brightness: u8) -> Self {
        Self {
            encoding,
            brightness,
        }
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    /// Encoding actually used for a device running a light firmware or not
    pub fn effective_encoding(&self, light_firmware: bool) -> StreamEncoding {
        match self.encoding {
            StreamEncoding::Auto if light_firmware => StreamEncoding::Raw,
            StreamEncoding::Auto => StreamEncoding::Json,
            other => other,
        }
    }

    /// Render a frame to one or more messages, to be sent in order
    pub fn encode(&self, colors: &[Color], light_firmware: bool) -> Result<Vec<String>, StreamError> {
        match self.effective_encoding(light_firmware) {
            StreamEncoding::Raw => Ok(vec![render_raw(colors, self.brightness)]),
            _ => split_chunks(colors)
                .iter()
                .map(|chunk| serde_json::to_string(chunk).map_err(Into::into))
                .collect(),
        }
    }
}
