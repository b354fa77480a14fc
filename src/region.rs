//! Finds the dominant content block on a rendered page.
//!
//! The page is shrunk to a fixed working width, binarized, and the outer
//! contour with the longest perimeter is taken as the content block. Its
//! bounding box is scaled back to the page's full resolution.

use crate::{config::RegionCfg, error::PipelineError, model::Region};
use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::{
    contours::{BorderType, Contour, find_contours},
    geometry::{approximate_polygon_dp, arc_length},
    point::Point,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub region: Region,
    pub crop: RgbImage,
}

pub fn detect_region(image: &RgbImage, cfg: &RegionCfg) -> Result<DetectedRegion, PipelineError> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 || cfg.working_width == 0 {
        return Err(PipelineError::NoContentRegion);
    }

    let ratio = f64::from(cfg.working_width) / f64::from(orig_w);
    let work_h = ((f64::from(orig_h) * ratio) as u32).max(1);
    let resized = imageops::resize(
        image,
        cfg.working_width,
        work_h,
        imageops::FilterType::Triangle,
    );

    let mask = pad_with_background(&foreground_mask(&imageops::grayscale(&resized), cfg.threshold));
    let contours = find_contours::<i32>(&mask);

    let (contour, perimeter) =
        longest_outer_contour(&contours).ok_or(PipelineError::NoContentRegion)?;
    let outline: Vec<Point<i32>> = contour
        .points
        .iter()
        .map(|p| Point::new(p.x - 1, p.y - 1))
        .collect();
    // a single-pixel contour has zero perimeter, which the simplifier rejects
    let epsilon = cfg.approx_epsilon_ratio * perimeter;
    let approx = if epsilon > 0.0 {
        approximate_polygon_dp(&outline, epsilon, false)
    } else {
        Vec::new()
    };
    let points = if approx.is_empty() { &outline } else { &approx };
    let working = bounding_rect(points).ok_or(PipelineError::NoContentRegion)?;

    let region = rescale(working, ratio, orig_w, orig_h);
    debug!(
        ratio,
        contours = contours.len(),
        perimeter,
        ?working,
        ?region,
        "content region"
    );

    let crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
    Ok(DetectedRegion { region, crop })
}

/// Pixels brighter than `threshold` are background; the rest become the
/// "on" (255) foreground.
fn foreground_mask(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    imageops::invert(&mut mask);
    mask
}

/// Surrounds the mask with a one-pixel background frame so blocks touching
/// the page edge still get an outer border. Contour points on the padded
/// mask are offset by one.
fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut padded, mask, 1, 1);
    padded
}

/// Outermost borders only. Ties keep the first contour found.
fn longest_outer_contour(contours: &[Contour<i32>]) -> Option<(&Contour<i32>, f64)> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        if contour.points.is_empty() {
            continue;
        }
        let perimeter = arc_length(&contour.points, false);
        if best.is_none_or(|(_, p)| perimeter > p) {
            best = Some((contour, perimeter));
        }
    }
    best
}

fn bounding_rect(points: &[Point<i32>]) -> Option<Region> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(Region {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Divides working coordinates by `ratio`, truncating toward the origin,
/// and keeps the rectangle inside the original image.
fn rescale(working: Region, ratio: f64, orig_w: u32, orig_h: u32) -> Region {
    let up = |v: u32| (f64::from(v) / ratio) as u32;
    let x = up(working.x).min(orig_w.saturating_sub(1));
    let y = up(working.y).min(orig_h.saturating_sub(1));
    Region {
        x,
        y,
        width: up(working.width).min(orig_w - x),
        height: up(working.height).min(orig_h - y),
    }
}
