use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::color::{scale_brightness, Color, ColorOrder};
use crate::models::ColorSettings;

/// Magic bytes starting every serial frame
pub const MAGIC: &[u8; 3] = b"Ada";

/// Longest status line accepted from a firmware
const MAX_LINE_LENGTH: usize = 256;

/// Build the 6-byte frame header for `led_count` LEDs
///
/// # Panics
///
/// Panics if `led_count` is zero or exceeds 65536.
pub fn serial_header(led_count: usize) -> [u8; 6] {
    assert!(led_count > 0 && led_count <= 0x10000);

    let n = (led_count - 1) as u16;
    let hi = (n >> 8) as u8;
    let lo = (n & 0xFF) as u8;

    [MAGIC[0], MAGIC[1], MAGIC[2], hi, lo, hi ^ lo ^ 0x55]
}

/// Serial LED frame encoder
#[derive(Debug, Clone)]
pub struct SerialCodec {
    color_order: ColorOrder,
    brightness: u8,
    lines: LinesCodec,
}

impl SerialCodec {
    pub fn new(color_order: ColorOrder, brightness: u8) -> Self {
        Self {
            color_order,
            brightness,
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    pub fn from_settings(settings: &ColorSettings) -> Self {
        Self::new(settings.color_order, settings.brightness)
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }
}

impl Default for SerialCodec {
    fn default() -> Self {
        Self::new(ColorOrder::Rgb, u8::MAX)
    }
}

impl<'a> Encoder<&'a [Color]> for SerialCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &'a [Color], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() || item.len() > 0x10000 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot encode a frame of {} LEDs", item.len()),
            ));
        }

        dst.reserve(6 + item.len() * 3);
        dst.put_slice(&serial_header(item.len()));

        for color in item {
            let (r, g, b) = self
                .color_order
                .reorder_from_rgb(scale_brightness(*color, self.brightness))
                .into_components();

            dst.put_u8(r);
            dst.put_u8(g);
            dst.put_u8(b);
        }

        Ok(())
    }
}

/// Status line sent by a serial firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareLine {
    pub key: String,
    pub value: String,
}

impl FirmwareLine {
    /// Parse a `key:value` line
    pub fn parse(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once(':')?;
        let key = key.trim();

        if key.is_empty() {
            return None;
        }

        Some(Self {
            key: key.to_ascii_lowercase(),
            value: value.trim().to_owned(),
        })
    }
}

impl Decoder for SerialCodec {
    type Item = Option<FirmwareLine>;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode(src) {
            Ok(line) => Ok(line.map(|line| FirmwareLine::parse(&line))),
            // FramedRead stops at the first error, noise is reported as an unparsed line
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                trace!("discarding overlong status line");
                Ok(Some(None))
            }
            Err(LinesCodecError::Io(error)) if error.kind() == std::io::ErrorKind::InvalidData => {
                trace!(error = %error, "discarding invalid status line");
                Ok(Some(None))
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checksum() {
        let header = serial_header(100);
        assert_eq!(&header[..3], b"Ada");
        assert_eq!(header[3], 0x00);
        assert_eq!(header[4], 0x63);
        assert_eq!(header[5], 0x36);

        let header = serial_header(300);
        assert_eq!(header[3], 0x01);
        assert_eq!(header[4], 0x2B);
        assert_eq!(header[5], 0x01 ^ 0x2B ^ 0x55);
    }

    #[test]
    fn encode_frame() {
        let mut codec = SerialCodec::default();
        let mut dst = BytesMut::new();
        let frame = vec![Color::new(1, 2, 3); 100];

        codec.encode(&frame[..], &mut dst).unwrap();

        assert_eq!(dst.len(), 6 + 300);
        assert_eq!(&dst[..6], &[b'A', b'd', b'a', 0x00, 0x63, 0x36]);
        assert_eq!(&dst[6..9], &[1, 2, 3]);
    }

    #[test]
    fn encode_order_and_brightness() {
        let mut codec = SerialCodec::new(ColorOrder::Grb, 0);
        let mut dst = BytesMut::new();
        codec
            .encode(&[Color::new(10, 20, 30)][..], &mut dst)
            .unwrap();
        assert_eq!(&dst[6..], &[0, 0, 0]);

        let mut codec = SerialCodec::new(ColorOrder::Grb, 255);
        let mut dst = BytesMut::new();
        codec
            .encode(&[Color::new(10, 20, 30)][..], &mut dst)
            .unwrap();
        assert_eq!(&dst[6..], &[20, 10, 30]);
    }

    #[test]
    fn reject_empty_frame() {
        let mut codec = SerialCodec::default();
        assert!(codec.encode(&[][..], &mut BytesMut::new()).is_err());
    }

    #[test]
    fn decode_firmware_lines() {
        let mut codec = SerialCodec::default();
        let mut src = BytesMut::from("Ada\nfirmware:light\nver: 5.0\n");

        assert_eq!(codec.decode(&mut src).unwrap(), Some(None));
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Some(FirmwareLine {
                key: "firmware".to_owned(),
                value: "light".to_owned()
            }))
        );
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Some(FirmwareLine {
                key: "ver".to_owned(),
                value: "5.0".to_owned()
            }))
        );
        assert_eq!(codec.decode(&mut src).unwrap(), None);
    }

    fn firmware_light() -> Option<FirmwareLine> {
        Some(FirmwareLine {
            key: "firmware".to_owned(),
            value: "light".to_owned(),
        })
    }

    #[tokio::test]
    async fn line_noise_keeps_the_stream_alive() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let input: &[u8] = b"\xff\xfe\nfirmware:light\n";
        let mut lines = FramedRead::new(input, SerialCodec::default());

        assert_eq!(lines.next().await.unwrap().unwrap(), None);
        assert_eq!(lines.next().await.unwrap().unwrap(), firmware_light());
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn overlong_lines_are_skipped() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let mut input = vec![b'x'; 300];
        input.extend_from_slice(b"\nfirmware:light\n");
        let mut lines = FramedRead::new(&input[..], SerialCodec::default());

        assert_eq!(lines.next().await.unwrap().unwrap(), None);
        assert_eq!(lines.next().await.unwrap().unwrap(), firmware_light());
        assert!(lines.next().await.is_none());
    }
}
