//! Code decoding for captured frames
//!
//! A decoder is a pure function over one frame that returns every payload it
//! can read, each with its bounding region in the coordinate space of the
//! frame it was given.
//!
//! The kiosk runs a [`DecoderChain`]: the primary decoder on a
//! polarity-inverted copy of the frame first, then a single-code fallback on
//! the unmodified frame when the first pass finds nothing. A frame with no
//! readable code yields an empty list; nothing is ever substituted.

pub mod qr;

pub use qr::{QrDecoder, SingleQrDecoder};

use crate::types::{Frame, Rect};

/// One payload read from a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    /// Decoded text, verbatim
    pub payload: String,
    /// Region in the coordinate space of the decoded frame
    pub region: Rect,
}

impl DecodedCode {
    pub fn new(payload: impl Into<String>, region: Rect) -> Self {
        Self {
            payload: payload.into(),
            region,
        }
    }
}

/// Anything that can read codes from a frame
///
/// Implementations must be deterministic for a given frame and free of side
/// effects.
pub trait CodeDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Vec<DecodedCode>;
}

impl<F> CodeDecoder for F
where
    F: Fn(&Frame) -> Vec<DecodedCode> + Send + Sync,
{
    fn decode(&self, frame: &Frame) -> Vec<DecodedCode> {
        self(frame)
    }
}

/// Which pass of the chain produced the codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePass {
    Inverted,
    Fallback,
}

/// Primary-then-fallback decoding
pub struct DecoderChain {
    primary: Box<dyn CodeDecoder>,
    fallback: Box<dyn CodeDecoder>,
}

impl Default for DecoderChain {
    fn default() -> Self {
        Self::new(Box::new(QrDecoder), Box::new(SingleQrDecoder))
    }
}

impl DecoderChain {
    pub fn new(primary: Box<dyn CodeDecoder>, fallback: Box<dyn CodeDecoder>) -> Self {
        Self { primary, fallback }
    }

    /// Decode with the pass that produced the result
    pub fn decode_with_pass(&self, frame: &Frame) -> Option<(DecodePass, Vec<DecodedCode>)> {
        let inverted = frame.inverted();
        let codes = self.primary.decode(&inverted);
        if !codes.is_empty() {
            return Some((DecodePass::Inverted, codes));
        }

        let codes = self.fallback.decode(frame);
        if !codes.is_empty() {
            return Some((DecodePass::Fallback, codes));
        }

        None
    }
}

impl CodeDecoder for DecoderChain {
    fn decode(&self, frame: &Frame) -> Vec<DecodedCode> {
        self.decode_with_pass(frame)
            .map(|(_, codes)| codes)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn frame(shade: u8) -> Frame {
        Frame::new(1, GrayImage::from_pixel(4, 4, Luma([shade])))
    }

    /// Reads a "payload" only from frames whose first pixel is dark
    fn dark_reader(label: &'static str) -> Box<dyn CodeDecoder> {
        Box::new(move |f: &Frame| {
            if f.image.get_pixel(0, 0).0[0] < 128 {
                vec![DecodedCode::new(label, Rect::new(0, 0, 4, 4))]
            } else {
                Vec::new()
            }
        })
    }

    #[test]
    fn test_primary_sees_inverted_frame() {
        let chain = DecoderChain::new(dark_reader("primary"), dark_reader("fallback"));
        // light frame -> inverted copy is dark -> primary reads it
        let (pass, codes) = chain.decode_with_pass(&frame(250)).unwrap();
        assert_eq!(pass, DecodePass::Inverted);
        assert_eq!(codes[0].payload, "primary");
    }

    #[test]
    fn test_fallback_on_unmodified_frame() {
        let chain = DecoderChain::new(dark_reader("primary"), dark_reader("fallback"));
        // dark frame -> inverted copy is light -> primary misses, fallback reads the frame as captured
        let (pass, codes) = chain.decode_with_pass(&frame(5)).unwrap();
        assert_eq!(pass, DecodePass::Fallback);
        assert_eq!(codes, vec![DecodedCode::new("fallback", Rect::new(0, 0, 4, 4))]);
    }

    #[test]
    fn test_nothing_decoded_is_empty() {
        let none: Box<dyn CodeDecoder> = Box::new(|_: &Frame| Vec::new());
        let none2: Box<dyn CodeDecoder> = Box::new(|_: &Frame| Vec::new());
        let chain = DecoderChain::new(none, none2);
        assert!(chain.decode_with_pass(&frame(0)).is_none());
        assert!(chain.decode(&frame(0)).is_empty());
    }

    #[test]
    fn test_multiple_codes_keep_decode_order() {
        let multi: Box<dyn CodeDecoder> = Box::new(|_: &Frame| {
            vec![
                DecodedCode::new("A", Rect::new(0, 0, 2, 2)),
                DecodedCode::new("B", Rect::new(1, 1, 2, 2)),
            ]
        });
        let none: Box<dyn CodeDecoder> = Box::new(|_: &Frame| Vec::new());
        let chain = DecoderChain::new(multi, none);
        let payloads: Vec<_> = chain
            .decode(&frame(0))
            .into_iter()
            .map(|c| c.payload)
            .collect();
        assert_eq!(payloads, vec!["A", "B"]);
    }
}
