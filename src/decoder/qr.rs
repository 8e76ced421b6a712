//! QR decoders backed by `rqrr`

use super::{CodeDecoder, DecodedCode};
use crate::types::{Frame, Rect};

/// Decodes every QR symbol found in the frame
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

/// Decodes only the first readable QR symbol in the frame
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleQrDecoder;

fn detect(frame: &Frame, limit: Option<usize>) -> Vec<DecodedCode> {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let image = &frame.image;
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        image.get_pixel(x as u32, y as u32).0[0]
    });

    let mut codes = Vec::new();
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, payload)) => {
                let corners: Vec<(i32, i32)> = grid.bounds.iter().map(|p| (p.x, p.y)).collect();
                let region = Rect::bounding(&corners, frame.width(), frame.height());
                codes.push(DecodedCode::new(payload, region));
                if limit.is_some_and(|n| codes.len() >= n) {
                    break;
                }
            }
            Err(e) => {
                tracing::trace!(frame = frame.sequence, "QR grid found but not decodable: {:?}", e);
            }
        }
    }
    codes
}

impl CodeDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Vec<DecodedCode> {
        detect(frame, None)
    }
}

impl CodeDecoder for SingleQrDecoder {
    fn decode(&self, frame: &Frame) -> Vec<DecodedCode> {
        detect(frame, Some(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = Frame::new(1, GrayImage::from_pixel(64, 48, Luma([255])));
        assert!(QrDecoder.decode(&frame).is_empty());
        assert!(SingleQrDecoder.decode(&frame).is_empty());
    }

    #[test]
    fn test_empty_frame_is_safe() {
        let frame = Frame::new(1, GrayImage::new(0, 0));
        assert!(QrDecoder.decode(&frame).is_empty());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mut img = GrayImage::from_pixel(32, 32, Luma([255]));
        for x in 4..12 {
            for y in 4..12 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let frame = Frame::new(3, img);
        assert_eq!(QrDecoder.decode(&frame), QrDecoder.decode(&frame));
    }
}
