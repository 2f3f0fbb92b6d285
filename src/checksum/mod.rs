pub mod adler32;
pub mod crc32;

pub use adler32::Adler32;
pub use crc32::Crc32;
