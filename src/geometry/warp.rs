use anyhow::{anyhow, Result};

use super::transform::{Size, Transform};

/// Renders an interleaved RGB image through `transform` into a new buffer of
/// size `transform.dst()`.
///
/// Each destination pixel center is mapped back into the source with the
/// inverse transform and takes the nearest source pixel. Destination pixels
/// with no source pixel stay black.
pub fn warp_rgb(pixels: &[u8], size: Size, transform: &Transform) -> Result<Vec<u8>> {
    if size != transform.src() {
        return Err(anyhow!(
            "image size {} does not match transform source {}",
            size,
            transform.src()
        ));
    }
    let expected = size
        .rgb_len()
        .ok_or_else(|| anyhow!("image dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGB bytes, received {}",
            expected,
            pixels.len()
        ));
    }

    let dst = transform.dst();
    let out_len = dst
        .rgb_len()
        .ok_or_else(|| anyhow!("destination dimensions overflow"))?;
    let inverse = transform.invert()?;

    let src_w = size.width as i64;
    let src_h = size.height as i64;
    let mut out = vec![0u8; out_len];
    for y in 0..dst.height as usize {
        for x in 0..dst.width as usize {
            let (sx, sy) = inverse.map_point(x as f32 + 0.5, y as f32 + 0.5);
            let sx = sx.floor() as i64;
            let sy = sy.floor() as i64;
            if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                continue;
            }
            let from = ((sy * src_w + sx) * 3) as usize;
            let to = (y * dst.width as usize + x) * 3;
            out[to..to + 3].copy_from_slice(&pixels[from..from + 3]);
        }
    }
    Ok(out)
}
