use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

/// Compression applied to a stored resource, chosen by key extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Identity,
}

impl Codec {
    pub fn for_key(key: &str) -> Self {
        if key.ends_with(".gz") {
            Codec::Gzip
        } else {
            Codec::Identity
        }
    }

    /// Decompress `bytes` into UTF-8 text.
    pub fn decode(self, key: &str, bytes: &[u8]) -> Result<String> {
        match self {
            Codec::Gzip => {
                let mut text = String::with_capacity(bytes.len() * 4);
                GzDecoder::new(bytes)
                    .read_to_string(&mut text)
                    .map_err(|e| Error::decompress(key, e))?;
                Ok(text)
            }
            Codec::Identity => {
                String::from_utf8(bytes.to_vec()).map_err(|e| Error::decompress(key, e))
            }
        }
    }
}
