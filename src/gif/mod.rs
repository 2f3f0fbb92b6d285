pub mod container;
pub mod quirks;
pub mod types;

pub use container::GifDecoder;
pub use quirks::{Quirk, Quirks};
pub use types::{Blend, DecodeFrameOptions, Disposal, FrameConfig, ImageConfig};
