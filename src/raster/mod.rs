//! Premultiplied RGBA8 bitmaps: decoding, caching and cropping.

pub mod bitmap;
pub mod cache;
pub mod crop;
pub mod decode;
