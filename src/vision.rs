// Software raster helpers: filled circles for the mask, a separable box blur
// for soft edges, and the final "draw over the page" composite.
use crate::error::Error;
use crate::types::{pack_argb, unpack_argb, FrameBuffer, Keypoint};

/// Fill every pixel whose center lies inside the circle with `color`.
/// Out-of-bounds parts are clipped. A radius of zero draws nothing.
pub fn fill_circle(fb: &mut FrameBuffer, center: Keypoint, radius: f32, color: u32) {
    if radius <= 0.0 || fb.is_empty() {
        return;
    }
    let r2 = radius * radius;
    let x0 = (center.x - radius).floor().max(0.0) as usize;
    let y0 = (center.y - radius).floor().max(0.0) as usize;
    let x1 = ((center.x + radius).ceil().max(0.0) as usize).min(fb.width - 1);
    let y1 = ((center.y + radius).ceil().max(0.0) as usize).min(fb.height - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    for y in y0..=y1 {
        let dy = y as f32 + 0.5 - center.y;
        let row = y * fb.width;
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - center.x;
            if dx * dx + dy * dy <= r2 {
                fb.pixels[row + x] = color;
            }
        }
    }
}

#[inline]
fn channels(px: u32) -> [u32; 4] {
    let (a, r, g, b) = unpack_argb(px);
    [a as u32, r as u32, g as u32, b as u32]
}

#[inline]
fn average(sum: &[u32; 4], win: u32) -> u32 {
    pack_argb(
        (sum[0] / win) as u8,
        (sum[1] / win) as u8,
        (sum[2] / win) as u8,
        (sum[3] / win) as u8,
    )
}

/// Separable box blur over all four channels (alpha included, so a transparent
/// surface with a drawn shape gets a soft, fading edge).
pub fn box_blur_argb(
    src: &FrameBuffer,     // input
    tmp: &mut FrameBuffer, // horizontal pass result (scratch)
    dst: &mut FrameBuffer, // final blurred output
    radius: usize,         // blur amount; bigger = softer (and slightly slower)
) -> Result<(), Error> {
    if !src.same_size(dst) {
        return Err(Error::SurfaceSize(format!(
            "blur source {}x{} vs destination {}x{}",
            src.width, src.height, dst.width, dst.height
        )));
    }
    if !src.same_size(tmp) {
        return Err(Error::SurfaceSize(format!(
            "blur source {}x{} vs scratch {}x{}",
            src.width, src.height, tmp.width, tmp.height
        )));
    }
    if src.is_empty() {
        return Ok(());
    }
    if radius == 0 {
        dst.pixels.copy_from_slice(&src.pixels);
        return Ok(());
    }

    let w = src.width as i32;
    let h = src.height as i32;
    let r = radius as i32;
    let win = (2 * r + 1) as u32; // window width for averaging (constant everywhere)

    /* ---- Pass 1: Horizontal (store averaged rows in tmp) ---- */
    for y in 0..h {
        let row_ofs = (y as usize) * (w as usize);

        // Edge pixel repeated to the left, so borders do not darken
        let mut sum = channels(src.pixels[row_ofs]).map(|c| c * (r as u32 + 1));

        // Prime the right side of the initial window [1..r]
        for x in 1..=r {
            let p = channels(src.pixels[row_ofs + x.min(w - 1) as usize]);
            for c in 0..4 { sum[c] += p[c]; }
        }

        // Slide the window across the row
        for x in 0..w {
            tmp.pixels[row_ofs + x as usize] = average(&sum, win);

            let left_x = (x - r).max(0) as usize;
            let right_x = (x + r + 1).min(w - 1) as usize;
            let p_sub = channels(src.pixels[row_ofs + left_x]);
            let p_add = channels(src.pixels[row_ofs + right_x]);
            for c in 0..4 { sum[c] = sum[c] + p_add[c] - p_sub[c]; }
        }
    }

    /* ---- Pass 2: Vertical (read tmp, write dst) ---- */
    let stride = w as usize;
    for x in 0..w {
        let col = x as usize;
        let mut sum = channels(tmp.pixels[col]).map(|c| c * (r as u32 + 1));

        for y in 1..=r {
            let p = channels(tmp.pixels[(y.min(h - 1) as usize) * stride + col]);
            for c in 0..4 { sum[c] += p[c]; }
        }

        for y in 0..h {
            dst.pixels[(y as usize) * stride + col] = average(&sum, win);

            let top_y = (y - r).max(0) as usize;
            let bottom_y = (y + r + 1).min(h - 1) as usize;
            let p_sub = channels(tmp.pixels[top_y * stride + col]);
            let p_add = channels(tmp.pixels[bottom_y * stride + col]);
            for c in 0..4 { sum[c] = sum[c] + p_add[c] - p_sub[c]; }
        }
    }

    Ok(())
}

/// Flatten a straight-alpha surface over opaque black.
/// Transparent pixels come out black; opaque pixels pass through.
pub fn composite_over_black(src: &FrameBuffer, dst: &mut FrameBuffer) {
    if !dst.same_size(src) {
        dst.resize(src.width, src.height);
    }
    for (out, &px) in dst.pixels.iter_mut().zip(&src.pixels) {
        let (a, r, g, b) = unpack_argb(px);
        *out = match a {
            0xFF => px,
            0 => 0xFF00_0000,
            _ => {
                let a = a as u32;
                let mul = |c: u8| ((c as u32 * a + 127) / 255) as u8;
                pack_argb(0xFF, mul(r), mul(g), mul(b))
            }
        };
    }
}
