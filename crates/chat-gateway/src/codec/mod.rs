//! Gateway codec
//!
//! Two independent axes chosen once per client: the *encoding* turns payloads
//! into frames and back, the *compression* inflates inbound bytes before they
//! are decoded. Both come from static name registries and are checked for
//! support when the client is built, so an unusable choice fails at startup.

mod json;
mod zlib;

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::GatewayPayload;
use crate::transport::WsFrame;

pub use json::JsonEncoding;
pub use zlib::{ZlibStream, MAX_MESSAGE_SIZE};

/// Payload encoding
pub trait Encoding: Send + Sync + std::fmt::Debug {
    /// Name sent as the `encoding` query parameter
    fn name(&self) -> &'static str;

    /// Encode a payload into an outbound frame
    fn encode(&self, payload: &GatewayPayload) -> GatewayResult<WsFrame>;

    /// Decode inbound (already decompressed) bytes
    fn decode(&self, bytes: &[u8]) -> GatewayResult<GatewayPayload>;
}

/// Stateful inbound decompressor, one per connection
pub trait Compression: Send + std::fmt::Debug {
    /// Name sent as the `compress` query parameter
    fn name(&self) -> &'static str;

    /// Whether single payloads are compressed (announced in IDENTIFY)
    /// rather than the whole transport stream
    fn is_payload_compression(&self) -> bool;

    /// Start a fresh inflate context
    fn init(&mut self) -> GatewayResult<()>;

    /// Drop the inflate context
    fn destroy(&mut self);

    /// Feed inbound bytes.
    ///
    /// Returns `None` while a message is still incomplete.
    fn decompress(&mut self, bytes: &[u8]) -> GatewayResult<Option<Vec<u8>>>;
}

struct EncodingEntry {
    name: &'static str,
    supported: fn() -> GatewayResult<()>,
    create: fn() -> Box<dyn Encoding>,
}

struct CompressionEntry {
    name: &'static str,
    supported: fn() -> GatewayResult<()>,
    create: fn() -> Box<dyn Compression>,
}

fn always_supported() -> GatewayResult<()> {
    Ok(())
}

fn create_json() -> Box<dyn Encoding> {
    Box::new(JsonEncoding)
}

fn etf_supported() -> GatewayResult<()> {
    Err(GatewayError::Unsupported(
        "etf encoding needs an erlpack implementation, which this build does not include"
            .to_string(),
    ))
}

fn create_zlib_stream() -> Box<dyn Compression> {
    Box::new(ZlibStream::new())
}

static ENCODINGS: &[EncodingEntry] = &[
    EncodingEntry {
        name: "json",
        supported: always_supported,
        create: create_json,
    },
    // `etf_supported` always fails, so `create` is never reached
    EncodingEntry {
        name: "etf",
        supported: etf_supported,
        create: create_json,
    },
];

static COMPRESSIONS: &[CompressionEntry] = &[CompressionEntry {
    name: "zlib-stream",
    supported: always_supported,
    create: create_zlib_stream,
}];

/// Names of every registered encoding
#[must_use]
pub fn encoding_names() -> Vec<&'static str> {
    ENCODINGS.iter().map(|entry| entry.name).collect()
}

/// Names of every registered compression
#[must_use]
pub fn compression_names() -> Vec<&'static str> {
    COMPRESSIONS.iter().map(|entry| entry.name).collect()
}

/// The encoding and compression chosen for a client
#[derive(Debug)]
pub struct CodecSelection {
    encoding: Box<dyn Encoding>,
    compression: Option<&'static CompressionEntry>,
}

impl std::fmt::Debug for CompressionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl CodecSelection {
    /// Look up both strategies by name and check that they can run.
    pub fn resolve(encoding: &str, compression: Option<&str>) -> GatewayResult<Self> {
        let entry = ENCODINGS
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(encoding))
            .ok_or_else(|| GatewayError::UnsupportedEncoding(encoding.to_string()))?;
        (entry.supported)()?;

        let compression = match compression {
            Some(name) => {
                let entry = COMPRESSIONS
                    .iter()
                    .find(|entry| entry.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| GatewayError::UnsupportedCompression(name.to_string()))?;
                (entry.supported)()?;
                Some(entry)
            }
            None => None,
        };

        Ok(Self {
            encoding: (entry.create)(),
            compression,
        })
    }

    #[must_use]
    pub fn encoding(&self) -> &dyn Encoding {
        self.encoding.as_ref()
    }

    #[must_use]
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    #[must_use]
    pub fn compression_name(&self) -> Option<&'static str> {
        self.compression.map(|entry| entry.name)
    }

    /// Fresh, uninitialised decompressor for a new connection
    #[must_use]
    pub fn new_compression(&self) -> Option<Box<dyn Compression>> {
        self.compression.map(|entry| (entry.create)())
    }

    /// Whether IDENTIFY should announce payload compression
    #[must_use]
    pub fn is_payload_compression(&self) -> bool {
        self.new_compression()
            .is_some_and(|compression| compression.is_payload_compression())
    }
}
