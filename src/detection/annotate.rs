use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::BoundingBox;

const BOX_COLOR: Rgb<u8> = Rgb([255, 56, 56]);
const BOX_THICKNESS: u32 = 3;

/// `meal.jpg` -> `meal_annotated.jpg`, next to the original.
pub fn annotated_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_annotated.{}", stem, ext.to_string_lossy()),
        None => format!("{}_annotated", stem),
    };
    path.with_file_name(name)
}

/// Draw box outlines onto a copy of the image and save it beside the input.
pub fn draw_boxes(path: &Path, boxes: &[BoundingBox]) -> Result<PathBuf, image::ImageError> {
    let mut canvas = image::open(path)?.to_rgb8();
    for bbox in boxes.iter().filter(|b| b.is_valid()) {
        outline(&mut canvas, bbox);
    }
    let out = annotated_path(path);
    canvas.save(&out)?;
    Ok(out)
}

fn outline(canvas: &mut RgbImage, bbox: &BoundingBox) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let x1 = clamp_coord(bbox.x1, w - 1);
    let y1 = clamp_coord(bbox.y1, h - 1);
    let x2 = clamp_coord(bbox.x2, w - 1);
    let y2 = clamp_coord(bbox.y2, h - 1);

    for t in 0..BOX_THICKNESS {
        for x in x1..=x2 {
            put(canvas, x, y1 + t);
            put(canvas, x, y2.saturating_sub(t));
        }
        for y in y1..=y2 {
            put(canvas, x1 + t, y);
            put(canvas, x2.saturating_sub(t), y);
        }
    }
}

fn put(canvas: &mut RgbImage, x: u32, y: u32) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, BOX_COLOR);
    }
}

fn clamp_coord(v: f32, max: u32) -> u32 {
    (v.max(0.0) as u32).min(max)
}

/// Crop the box region, resize it to a `size`x`size` square and encode as PNG.
/// Returns `None` when the box does not overlap the image.
pub fn crop_png(image: &DynamicImage, bbox: &BoundingBox, size: u32) -> Option<Vec<u8>> {
    if !bbox.is_valid() {
        return None;
    }
    let (w, h) = (image.width(), image.height());
    let left = clamp_coord(bbox.x1, w);
    let top = clamp_coord(bbox.y1, h);
    let right = clamp_coord(bbox.x2, w);
    let bottom = clamp_coord(bbox.y2, h);
    if right <= left || bottom <= top {
        return None;
    }

    let crop = image
        .crop_imm(left, top, right - left, bottom - top)
        .resize_exact(size, size, FilterType::Triangle);

    let mut buf = Vec::new();
    crop.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .ok()?;
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    #[test]
    fn annotated_path_keeps_extension() {
        assert_eq!(
            annotated_path(Path::new("/data/captures/capture_1.jpg")),
            PathBuf::from("/data/captures/capture_1_annotated.jpg")
        );
        assert_eq!(
            annotated_path(Path::new("plain")),
            PathBuf::from("plain_annotated")
        );
    }

    #[test]
    fn draw_boxes_writes_annotated_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("meal.png");
        RgbImage::new(40, 30).save(&path).unwrap();

        let out = draw_boxes(&path, &[bbox(5.0, 5.0, 20.0, 20.0)]).unwrap();
        assert_eq!(out, tmp.path().join("meal_annotated.png"));

        let annotated = image::open(&out).unwrap().to_rgb8();
        assert_eq!(*annotated.get_pixel(5, 5), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(30, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn crop_png_resizes_to_square() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 80));
        let png = crop_png(&img, &bbox(10.0, 10.0, 60.0, 40.0), 224).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (224, 224));
    }

    #[test]
    fn crop_png_rejects_boxes_outside_the_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(50, 50));
        assert!(crop_png(&img, &bbox(60.0, 60.0, 80.0, 80.0), 224).is_none());
        assert!(crop_png(&img, &bbox(30.0, 30.0, 10.0, 40.0), 224).is_none());
    }
}
