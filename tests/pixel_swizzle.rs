//! Selects a swizzler for every supported destination format and drives it
//! across several row-sized calls, as the GIF container does per frame row.

use wuffle::pixel::Palette;
use wuffle::swizzle::select;
use wuffle::PixelFormat;

fn rainbow_palette() -> Palette {
    let mut p = Palette::default();
    p.entries[0] = [0x00, 0x00, 0xFF, 0xFF]; // red, BGRA
    p.entries[1] = [0x00, 0xFF, 0x00, 0xFF]; // green
    p.entries[2] = [0xFF, 0x00, 0x00, 0xFF]; // blue
    p
}

#[test]
fn bgra_and_rgba_agree_up_to_channel_order() {
    let pal = rainbow_palette();
    let indices = [0u8, 1, 2];

    let bgra = select(wuffle::pixel::BGRA_NONPREMUL).unwrap();
    let rgba = select(wuffle::pixel::RGBA_NONPREMUL).unwrap();
    let mut bgra_out = [0u8; 12];
    let mut rgba_out = [0u8; 12];
    assert_eq!(bgra(&pal, &indices, &mut bgra_out), 3);
    assert_eq!(rgba(&pal, &indices, &mut rgba_out), 3);
    for px in 0..3 {
        let b = &bgra_out[px * 4..px * 4 + 4];
        let r = &rgba_out[px * 4..px * 4 + 4];
        assert_eq!([b[2], b[1], b[0], b[3]], [r[0], r[1], r[2], r[3]]);
    }
}

#[test]
fn multiple_rows_swizzled_across_separate_calls_match_a_single_call() {
    let pal = rainbow_palette();
    let row = [0u8, 1, 2, 0, 1, 2];
    let f = select(wuffle::pixel::RGB).unwrap();

    let mut whole = [0u8; 18];
    f(&pal, &row, &mut whole);

    let mut split = [0u8; 18];
    let n1 = f(&pal, &row[..3], &mut split[0..9]);
    let n2 = f(&pal, &row[3..], &mut split[9..18]);
    assert_eq!(n1, 3);
    assert_eq!(n2, 3);
    assert_eq!(split, whole);
}

#[test]
fn unsupported_destination_format_has_no_swizzler() {
    assert!(select(PixelFormat::INVALID).is_none());
}
