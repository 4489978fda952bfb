//! Overlay pages as PDF: a JPEG background, Helvetica-Bold text and filled
//! squares for QR modules, assembled with `lopdf`.
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use qrcode::{Color, QrCode};

use super::Overlay;
use crate::error::{AppError, Result};

/// PDF points per CSS pixel.
const PT_PER_PX: f64 = 72.0 / 96.0;

/// Share of the font size above the baseline for Helvetica.
const ASCENT: f64 = 0.78;

const FONT: &str = "F1";
const BACKGROUND: &str = "Im1";

/// A baseline or progressive JPEG, embedded as-is with `DCTDecode`.
///
/// Only the frame header is read; the scan data is never decoded.
#[derive(Clone, Debug)]
pub struct Jpeg {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

impl Jpeg {
    pub fn parse(data: Vec<u8>) -> Result<Jpeg> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(AppError::validation("Not a JPEG image"));
        }
        let mut i = 2;
        while i + 4 <= data.len() {
            if data[i] != 0xFF {
                return Err(AppError::validation("Corrupt JPEG marker stream"));
            }
            let marker = data[i + 1];
            if marker == 0xFF {
                i += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
                i += 2;
                continue;
            }
            let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            if is_frame_header(marker) {
                // SOF0/SOF1 baseline, SOF2 progressive; both decode as DCT
                if !matches!(marker, 0xC0..=0xC2) {
                    return Err(AppError::validation(
                        "Only baseline or progressive JPEGs are supported",
                    ));
                }
                if i + 10 > data.len() || len < 8 {
                    break;
                }
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                let components = data[i + 9];
                if width == 0 || height == 0 || !matches!(components, 1 | 3 | 4) {
                    return Err(AppError::validation("Unsupported JPEG frame"));
                }
                return Ok(Jpeg {
                    data,
                    width,
                    height,
                    components,
                });
            }
            i += 2 + len;
        }
        Err(AppError::validation("JPEG frame header not found"))
    }

    fn into_xobject(self) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        match self.components {
            1 => dict.set("ColorSpace", "DeviceGray"),
            4 => {
                // Adobe CMYK JPEGs store inverted components
                dict.set("ColorSpace", "DeviceCMYK");
                let decode: Vec<Object> = [1i64, 0, 1, 0, 1, 0, 1, 0]
                    .into_iter()
                    .map(Object::from)
                    .collect();
                dict.set("Decode", decode);
            }
            _ => dict.set("ColorSpace", "DeviceRGB"),
        }
        Stream::new(dict, self.data).with_compression(false)
    }
}

fn is_frame_header(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// A PDF under construction. Pages are added in order; `finish` writes the
/// page tree and serializes the file.
pub struct PdfDocument {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfDocument {
    fn default() -> Self {
        PdfDocument::new()
    }
}

impl PdfDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        PdfDocument {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Add one overlay page sized after its background, or the kind's
    /// default size when there is none.
    pub fn add_overlay_page(&mut self, overlay: &Overlay, background: Option<Jpeg>) -> Result<()> {
        let (w_px, h_px) = match &background {
            Some(jpeg) => (jpeg.width, jpeg.height),
            None => overlay.kind.default_size_px(),
        };
        let width = w_px as f64 * PT_PER_PX;
        let height = h_px as f64 * PT_PER_PX;

        let mut ops = Vec::new();
        if background.is_some() {
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                vec![real(width), 0.into(), 0.into(), real(height), 0.into(), 0.into()],
            ));
            ops.push(Operation::new("Do", vec![Object::Name(BACKGROUND.into())]));
            ops.push(Operation::new("Q", vec![]));
        } else {
            log::debug!("Rendering {} page without background", overlay.kind.slug());
        }

        ops.push(Operation::new("g", vec![0.into()]));
        for text in overlay.place_text(width, height) {
            let baseline = height - text.y - text.size * ASCENT;
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(FONT.into()), real(text.size)],
            ));
            ops.push(Operation::new("Td", vec![real(text.x), real(baseline)]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(&text.text), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }

        if let Some(qr) = overlay.place_qr(width, height) {
            draw_qr(&mut ops, qr.value, qr.x, height - qr.y - qr.size, qr.size)?;
        }

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| AppError::Internal(format!("PDF content encoding failed: {}", e)))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let mut resources = dictionary! {
            "Font" => dictionary! { FONT => self.font_id },
        };
        if let Some(jpeg) = background {
            let image_id = self.doc.add_object(jpeg.into_xobject());
            resources.set("XObject", dictionary! { BACKGROUND => image_id });
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(width), real(height)],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Write the page tree and catalog, then serialize the document.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| AppError::Internal(format!("PDF serialization failed: {}", e)))?;
        Ok(out)
    }
}

/// White quiet square plus one filled square per dark module.
fn draw_qr(ops: &mut Vec<Operation>, value: &str, x: f64, y: f64, size: f64) -> Result<()> {
    let code = QrCode::new(value.as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?;
    let modules = code.width();
    let cell = size / modules as f64;

    ops.push(Operation::new("g", vec![1.into()]));
    ops.push(Operation::new("re", vec![real(x), real(y), real(size), real(size)]));
    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("g", vec![0.into()]));
    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let (col, row) = (i % modules, i / modules);
        let cx = x + col as f64 * cell;
        // rows run top to bottom, PDF y runs upwards
        let cy = y + size - (row + 1) as f64 * cell;
        ops.push(Operation::new("re", vec![real(cx), real(cy), real(cell), real(cell)]));
    }
    ops.push(Operation::new("f", vec![]));
    Ok(())
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Encode text for the built-in font's WinAnsi encoding.
///
/// Latin-1 and the common typographic punctuation map directly. Anything
/// else (Bengali or Devanagari names, for one) has no glyph in the standard
/// fonts and is printed as `?`, with a warning naming the text.
pub fn win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut lossy = false;
    for c in text.chars() {
        let byte = match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => {
                lossy = true;
                b'?'
            }
        };
        out.push(byte);
    }
    if lossy {
        log::warn!("`{}` has characters outside WinAnsi; printed as `?`", text);
    }
    out
}
