//! Raster image input wrapped as a one-page PDF
//!
//! The page is sized to the image's pixel dimensions, one point per pixel,
//! and the pixels are embedded as a Flate-compressed DeviceRGB XObject.

use crate::error::DocumentError;
use crate::parser::PdfDocument;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;

fn compress(data: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| DocumentError::UnsupportedImage(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| DocumentError::UnsupportedImage(e.to_string()))
}

/// Decode `bytes` as PNG or JPEG and place it on a page of its own size.
pub(crate) fn convert_image(bytes: &[u8]) -> Result<PdfDocument, DocumentError> {
    let decoded =
        ::image::load_from_memory(bytes).map_err(|e| DocumentError::UnsupportedImage(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(DocumentError::UnsupportedImage(
            "image has no pixels".to_string(),
        ));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compress(rgb.as_raw())?,
    );
    let image_id = doc.add_object(image_stream);

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    tracing::debug!("Converted {}x{} image to a single-page PDF", width, height);
    Ok(PdfDocument::from_document(doc))
}
