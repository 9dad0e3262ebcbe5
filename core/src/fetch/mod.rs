//! Resource loading.
//!
//! Resources are addressed by a string key relative to a configured base
//! (a directory or an HTTP root). Loading a key means fetching its bytes,
//! decompressing them according to the key's extension, and decoding the
//! text into a typed payload. [`ResourceCache`] makes sure that happens at
//! most once per key for the whole session.

mod cache;
mod codec;
mod source;

pub use cache::ResourceCache;
pub use codec::Codec;
pub use source::{DirectorySource, HttpSource, ResourceSource, source_for_base};
