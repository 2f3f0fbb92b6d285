//! GIF-flavored LZW decompression.

pub mod decoder;

pub use decoder::LzwDecoder;
