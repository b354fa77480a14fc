use crate::engine::Rasterizer;
use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

pub const RENDER_DPI: u32 = 300;

/// Rasterizes one zero-indexed page and flattens any transparency onto a
/// white background.
pub fn render_page(
    rasterizer: &dyn Rasterizer,
    pdf: &Path,
    page_number: u32,
    dpi: u32,
) -> Result<RgbImage> {
    let img = rasterizer.rasterize(pdf, page_number, dpi)?;
    Ok(flatten_onto_white(img))
}

pub fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u16::from(a);
        let over_white = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([over_white(r), over_white(g), over_white(b)])
    })
}
