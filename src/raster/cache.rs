use std::collections::HashMap;

use crate::foundation::error::PatchResult;
use crate::raster::bitmap::Bitmap;
use crate::raster::decode::decode_bitmap;

/// Identity of an encoded image source (hash of its encoded bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceKey(pub u64);

impl SourceKey {
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(bytes))
    }
}

/// Decoded bitmaps keyed by source identity.
///
/// Each distinct source is decoded once; entries stay until explicitly invalidated, so hot render
/// paths never re-decode.
#[derive(Default)]
pub struct DecodeCache {
    entries: HashMap<SourceKey, Bitmap>,
    decode_counts: HashMap<SourceKey, u32>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached bitmap for `bytes`, decoding on first use.
    pub fn get_or_decode(&mut self, bytes: &[u8]) -> PatchResult<(SourceKey, Bitmap)> {
        let key = SourceKey::of(bytes);
        if let Some(bmp) = self.entries.get(&key) {
            return Ok((key, bmp.clone()));
        }
        let bmp = decode_bitmap(bytes)?;
        *self.decode_counts.entry(key).or_insert(0) += 1;
        self.entries.insert(key, bmp.clone());
        Ok((key, bmp))
    }

    pub fn get(&self, key: SourceKey) -> Option<&Bitmap> {
        self.entries.get(&key)
    }

    /// Drop one entry; the next lookup for that source decodes again.
    pub fn invalidate(&mut self, key: SourceKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times `key` has been decoded over the cache's lifetime.
    pub fn decode_count(&self, key: SourceKey) -> u32 {
        self.decode_counts.get(&key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png(px: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(1, 1, px.to_vec()).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn same_source_only_decodes_once() {
        let bytes = png([1, 2, 3, 255]);
        let mut cache = DecodeCache::new();
        let (k1, a) = cache.get_or_decode(&bytes).unwrap();
        let (k2, b) = cache.get_or_decode(&bytes).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(a, b);
        assert_eq!(cache.decode_count(k1), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_forces_redecode() {
        let bytes = png([1, 2, 3, 255]);
        let mut cache = DecodeCache::new();
        let (k, _) = cache.get_or_decode(&bytes).unwrap();
        assert!(cache.invalidate(k));
        assert!(cache.get(k).is_none());
        cache.get_or_decode(&bytes).unwrap();
        assert_eq!(cache.decode_count(k), 2);
    }

    #[test]
    fn failed_decode_is_not_cached() {
        let mut cache = DecodeCache::new();
        assert!(cache.get_or_decode(b"nope").is_err());
        assert!(cache.is_empty());
    }
}
