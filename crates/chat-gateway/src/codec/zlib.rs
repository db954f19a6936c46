//! zlib-stream transport compression
//!
//! The whole connection is one deflate stream. Each message ends with a sync
//! flush, so bytes are buffered until the `00 00 ff ff` marker arrives.

use flate2::{Decompress, FlushDecompress, Status};

use super::Compression;
use crate::error::{GatewayError, GatewayResult};

const SYNC_FLUSH_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
const OUTPUT_CHUNK: usize = 16 * 1024;

/// Largest message accepted, compressed or inflated
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Shared inflate context for one connection
pub struct ZlibStream {
    inflater: Option<Decompress>,
    buffer: Vec<u8>,
    max_message: usize,
}

impl ZlibStream {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_MESSAGE_SIZE)
    }

    /// Reject messages larger than `max_message` bytes
    #[must_use]
    pub fn with_limit(max_message: usize) -> Self {
        Self {
            inflater: None,
            buffer: Vec::new(),
            max_message,
        }
    }

    fn oversized(&mut self, size: usize) -> GatewayError {
        self.buffer.clear();
        too_large(self.max_message, size)
    }
}

fn uninitialized() -> GatewayError {
    GatewayError::Protocol("no inflate context initialized".to_string())
}

fn too_large(limit: usize, size: usize) -> GatewayError {
    GatewayError::Protocol(format!("zlib message exceeds {limit} bytes (at least {size})"))
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZlibStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibStream")
            .field("initialized", &self.inflater.is_some())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl Compression for ZlibStream {
    fn name(&self) -> &'static str {
        "zlib-stream"
    }

    fn is_payload_compression(&self) -> bool {
        false
    }

    fn init(&mut self) -> GatewayResult<()> {
        self.inflater = Some(Decompress::new(true));
        self.buffer.clear();
        Ok(())
    }

    fn destroy(&mut self) {
        self.inflater = None;
        self.buffer.clear();
    }

    fn decompress(&mut self, bytes: &[u8]) -> GatewayResult<Option<Vec<u8>>> {
        if self.inflater.is_none() {
            return Err(uninitialized());
        }

        let buffered = self.buffer.len() + bytes.len();
        if buffered > self.max_message {
            return Err(self.oversized(buffered));
        }
        self.buffer.extend_from_slice(bytes);
        if !self.buffer.ends_with(&SYNC_FLUSH_SUFFIX) {
            return Ok(None);
        }

        let limit = self.max_message;
        let input = std::mem::take(&mut self.buffer);
        let inflater = self.inflater.as_mut().ok_or_else(uninitialized)?;
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).min(limit));
        let mut consumed = 0usize;

        loop {
            output.reserve_exact(OUTPUT_CHUNK);
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();

            let status = inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)
                .map_err(|e| GatewayError::Protocol(format!("corrupt zlib stream: {e}")))?;

            consumed += (inflater.total_in() - before_in) as usize;
            if output.len() > limit {
                return Err(too_large(limit, output.len()));
            }
            let progressed =
                inflater.total_in() != before_in || inflater.total_out() != before_out;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    let drained = consumed >= input.len() && output.len() < output.capacity();
                    if drained {
                        break;
                    }
                    if !progressed {
                        if consumed >= input.len() {
                            break;
                        }
                        return Err(GatewayError::Protocol(
                            "zlib stream stalled on inbound data".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(Some(output))
    }
}
