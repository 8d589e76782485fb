//! The noise bitmap the effect samples as `u_noise`.

use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::rng::Rng32;
use crate::types::{pack_argb, FrameBuffer};

/// Side length of the generated bitmap.
pub const GENERATED_SIZE: usize = 512;

/// Decode an image file into ARGB pixels, keeping its alpha.
pub fn load(path: &Path) -> Result<FrameBuffer> {
    let img = image::open(path)
        .map_err(|e| Error::Asset(format!("noise bitmap {}: {e}", path.display())))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    let pixels = img.pixels().map(|p| pack_argb(p[3], p[0], p[1], p[2])).collect();
    info!(path = %path.display(), width = w, height = h, "Noise bitmap loaded from file");
    Ok(FrameBuffer { width: w as usize, height: h as usize, pixels })
}

/// Opaque random noise, identical for identical seeds.
pub fn generate(size: usize, seed: u32) -> FrameBuffer {
    let mut rng = Rng32::from_seed(seed);
    let mut fb = FrameBuffer::new(size, size);
    for px in &mut fb.pixels {
        *px = 0xFF00_0000 | (rng.next_u32() & 0x00FF_FFFF);
    }
    fb
}

/// Load `path` when given, otherwise generate a bitmap from `seed`.
pub fn load_or_generate(path: Option<&Path>, seed: u32) -> Result<FrameBuffer> {
    match path {
        Some(path) => load(path),
        None => {
            info!(seed, size = GENERATED_SIZE, "Generating noise bitmap");
            Ok(generate(GENERATED_SIZE, seed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_noise_is_opaque_and_seeded() {
        let a = generate(16, 7);
        let b = generate(16, 7);
        let c = generate(16, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.pixels.iter().all(|px| px >> 24 == 0xFF));
    }

    #[test]
    fn generated_noise_is_not_flat() {
        let fb = generate(32, 1);
        let first = fb.pixels[0];
        assert!(fb.pixels.iter().any(|&px| px != first));
    }

    #[test]
    fn loads_png_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.png");
        let mut img = image::RgbaImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 40]));
        img.save(&path).unwrap();

        let fb = load_or_generate(Some(&path), 0).unwrap();
        assert_eq!((fb.width, fb.height), (2, 2));
        assert_eq!(fb.get(1, 0), 0x280A_141E);
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        assert!(matches!(load(Path::new("/no/such/noise.png")), Err(Error::Asset(_))));
    }
}
