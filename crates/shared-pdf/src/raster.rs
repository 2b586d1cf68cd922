//! Layout preview rasterization
//!
//! lopdf has no renderer, so pages are drawn as a layout map: glyph boxes in
//! grey and field widgets outlined in blue, over white. The frame and
//! orientation match a real render of the page (rotated crop box), so
//! normalized coordinates can be checked against it directly.

use crate::capability::FormDocument;
use crate::error::DocumentError;
use crate::geometry::{Matrix, Rect};
use crate::parser::PdfDocument;
use ::image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const MAX_DIMENSION: u32 = 10_000;
const GLYPH: Rgb<u8> = Rgb([96, 96, 96]);
const WIDGET: Rgb<u8> = Rgb([0, 0, 255]);

fn fill(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>, outline_only: bool) {
    let (w, h) = img.dimensions();
    let clamp_x = |v: f64| v.max(0.0).min(w as f64) as u32;
    let clamp_y = |v: f64| v.max(0.0).min(h as f64) as u32;
    let (x0, x1) = (clamp_x(rect.x0.floor()), clamp_x(rect.x1.ceil()));
    let (y0, y1) = (clamp_y(rect.y0.floor()), clamp_y(rect.y1.ceil()));

    for y in y0..y1 {
        for x in x0..x1 {
            let edge = x == x0 || x + 1 == x1 || y == y0 || y + 1 == y1;
            if !outline_only || edge {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// PNG of `page` at `scale` pixels per point.
pub(crate) fn render_layout(
    pdf: &PdfDocument,
    page: usize,
    scale: f64,
) -> Result<Vec<u8>, DocumentError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(DocumentError::Render(format!("invalid scale {}", scale)));
    }
    let geometry = pdf.page_geometry(page)?;
    let frame = geometry.rotated_crop_box();
    let width = (frame.width() * scale).ceil();
    let height = (frame.height() * scale).ceil();
    if width < 1.0 || height < 1.0 || width > MAX_DIMENSION as f64 || height > MAX_DIMENSION as f64
    {
        return Err(DocumentError::Render(format!(
            "raster size {}x{} out of bounds",
            width, height
        )));
    }

    // Page space -> rotated space -> raster pixels.
    let to_pixels = geometry
        .rotation_matrix()
        .concat(&Matrix::translate(-frame.x0, -frame.y0))
        .concat(&Matrix::new(scale, 0.0, 0.0, scale, 0.0, 0.0));

    let mut img = RgbImage::from_pixel(width as u32, height as u32, Rgb([255, 255, 255]));
    for glyph in pdf.glyphs(page)?.iter() {
        if !glyph.ch.is_whitespace() {
            fill(&mut img, &glyph.rect.transform(&to_pixels), GLYPH, false);
        }
    }
    for field in pdf.native_fields()?.iter().filter(|f| f.page_index == page) {
        fill(&mut img, &field.rect.transform(&to_pixels), WIDGET, true);
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| DocumentError::Render(e.to_string()))?;
    tracing::debug!(
        "Rendered page {} layout at {}x{} ({} bytes)",
        page,
        width,
        height,
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    fn rotated_pdf(rotate: i64) -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 10 180 Td (Label) Tj ET".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 100.into(), 200.into()],
            "Rotate" => rotate,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_document(doc)
    }

    #[test]
    fn test_raster_follows_rotation() {
        for (rotate, expected) in [(0, (100, 200)), (90, (200, 100)), (270, (200, 100))] {
            let png = render_layout(&rotated_pdf(rotate), 0, 1.0).unwrap();
            let img = ::image::load_from_memory(&png).unwrap();
            assert_eq!(
                (img.width(), img.height()),
                expected,
                "rotation {}",
                rotate
            );
        }
    }

    #[test]
    fn test_raster_scale_and_ink() {
        let png = render_layout(&rotated_pdf(0), 0, 2.0).unwrap();
        let img = ::image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (200, 400));
        // Text sits near the top-left in page space.
        assert_eq!(img.get_pixel(30, 30), &GLYPH);
        assert_eq!(img.get_pixel(190, 390), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_raster_rejects_bad_scale() {
        let pdf = rotated_pdf(0);
        assert!(render_layout(&pdf, 0, 0.0).is_err());
        assert!(render_layout(&pdf, 0, 1000.0).is_err());
    }
}
