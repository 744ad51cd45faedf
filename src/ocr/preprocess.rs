use image::DynamicImage;

const MIN_OCR_WIDTH: u32 = 1000;
const MAX_OCR_WIDTH: u32 = 6000;

/// Flattens transparency onto white, converts to luma and upscales narrow
/// images so glyphs reach a size the OCR models were trained on.
pub(super) fn prepare_for_ocr(image: DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = image::GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }

    let scale = ocr_scale(width);
    if scale > 1 {
        let resized = image::imageops::resize(
            &luma,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
            image::imageops::FilterType::Lanczos3,
        );
        DynamicImage::ImageLuma8(resized)
    } else {
        DynamicImage::ImageLuma8(luma)
    }
}

pub(super) fn ocr_scale(width: u32) -> u32 {
    if width == 0 || width >= MIN_OCR_WIDTH {
        return 1;
    }
    let mut scale = 3u32;
    while width.saturating_mul(scale) > MAX_OCR_WIDTH && scale > 1 {
        scale -= 1;
    }
    scale.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    #[test]
    fn narrow_images_are_upscaled() {
        assert_eq!(ocr_scale(200), 3);
        assert_eq!(ocr_scale(999), 3);
        assert_eq!(ocr_scale(1000), 1);
        assert_eq!(ocr_scale(0), 1);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let mut rgba = RgbaImage::new(1000, 1);
        rgba.put_pixel(999, 0, Rgba([0, 0, 0, 255]));
        let prepared = prepare_for_ocr(DynamicImage::ImageRgba8(rgba));
        assert_eq!(prepared.dimensions(), (1000, 1));
        let luma = prepared.to_luma8();
        assert_eq!(luma.get_pixel(0, 0)[0], 255);
        assert_eq!(luma.get_pixel(999, 0)[0], 0);
    }

    #[test]
    fn small_images_grow() {
        let prepared = prepare_for_ocr(DynamicImage::ImageRgba8(RgbaImage::new(20, 10)));
        assert_eq!(prepared.dimensions(), (60, 30));
    }
}
