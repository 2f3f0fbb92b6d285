// wuffle — hostile-input-safe, allocation-free streaming decoders

pub mod buffer;
pub mod checksum;
pub mod deflate;
pub mod gif;
pub mod gzip;
pub mod lzw;
pub mod pixel;
pub mod status;
pub mod swizzle;
pub mod zlib;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Raw DEFLATE (RFC 1951) streaming decoder.
pub use deflate::Inflate;
/// zlib (RFC 1950) streaming decoder: header, DEFLATE body, Adler-32 trailer.
pub use zlib::ZlibDecoder;
/// gzip (RFC 1952) streaming decoder: header, DEFLATE body, CRC-32 + ISIZE trailer.
pub use gzip::GzipDecoder;
/// GIF-variant LZW streaming decoder.
pub use lzw::LzwDecoder;
/// GIF89a container decoder: image config, per-frame config, and pixel decode.
pub use gif::GifDecoder;

/// Call outcome shared by every decoder in this crate.
pub use status::{DecodeError, Status, Suspension, Warning};

/// The I/O buffer types every decoder's entry points are expressed in terms of.
pub use buffer::{ReadBuffer, WriteBuffer};

pub use checksum::{Adler32, Crc32};
pub use pixel::PixelFormat;

// ─────────────────────────────────────────────────────────────────────────────
// Version
// ─────────────────────────────────────────────────────────────────────────────

pub const WUFFLE_VERSION_MAJOR: i32 = 0;
pub const WUFFLE_VERSION_MINOR: i32 = 1;
pub const WUFFLE_VERSION_PATCH: i32 = 0;
pub const WUFFLE_VERSION_STRING: &str = "0.1.0";

/// Returns the library version string (e.g. `"0.1.0"`).
pub fn version_string() -> &'static str {
    WUFFLE_VERSION_STRING
}
