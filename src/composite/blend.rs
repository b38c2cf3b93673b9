use crate::foundation::error::{PatchError, PatchResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied RGBA8.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    std::array::from_fn(|i| src[i].saturating_add(mul_div255(u16::from(dst[i]), inv)))
}

/// Draw `src` onto `dst` with its top-left at `origin`, both buffers premultiplied RGBA8.
///
/// Pixels falling outside `dst` are skipped. Only destination pixels covered by `src` are touched.
pub fn over_at(
    dst: &mut [u8],
    (dst_w, dst_h): (u32, u32),
    src: &[u8],
    (src_w, src_h): (u32, u32),
    (ox, oy): (i64, i64),
) -> PatchResult<()> {
    let dst_len = (dst_w as usize) * (dst_h as usize) * 4;
    let src_len = (src_w as usize) * (src_h as usize) * 4;
    if dst.len() != dst_len || src.len() != src_len {
        return Err(PatchError::composite(
            "over_at expects buffers matching their dimensions",
        ));
    }

    for sy in 0..i64::from(src_h) {
        let dy = oy + sy;
        if dy < 0 || dy >= i64::from(dst_h) {
            continue;
        }
        for sx in 0..i64::from(src_w) {
            let dx = ox + sx;
            if dx < 0 || dx >= i64::from(dst_w) {
                continue;
            }
            let si = ((sy as usize) * (src_w as usize) + (sx as usize)) * 4;
            let di = ((dy as usize) * (dst_w as usize) + (dx as usize)) * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s));
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
