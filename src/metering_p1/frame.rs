use bytes::{Buf, BytesMut};
use log::{debug, warn};

use super::validator::TELEGRAM_START;

/// Upper bound for data buffered without seeing a delimiter
pub const MAX_FRAME_LEN: usize = 16 * 1024;

/// Splits a byte stream into telegrams at the `/` start delimiter.
/// Everything between two delimiters is one frame; no validation happens here.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    synced: bool,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader {
            buffer: BytesMut::with_capacity(4096),
            synced: false,
        }
    }

    /// Feeds received bytes, returns the frames completed by them as received
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == TELEGRAM_START) {
            let frame = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if self.synced {
                frames.push(frame.to_vec());
            } else {
                // Data before the first delimiter belongs to a telegram we joined halfway
                debug!("Discarding {} bytes before first telegram start", frame.len());
                self.synced = true;
            }
        }

        if self.buffer.len() > MAX_FRAME_LEN {
            warn!("No telegram start within {} bytes, dropping buffered data", self.buffer.len());
            self.buffer.clear();
            self.synced = false;
        }

        frames
    }

    /// Bytes waiting for the next delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
