//! RFC 1951 DEFLATE: block framing, Huffman table construction, and the
//! suspendable literal/length/distance decode loop.

pub mod decoder;
pub mod huffman;
pub mod tables;

pub use decoder::Inflate;
