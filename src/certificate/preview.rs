//! SVG rendering of a single overlay for on-screen preview.
use std::collections::HashMap;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use qrcode::QrCode;
use qrcode::render::svg;

use super::{Overlay, load_background};
use crate::error::{AppError, Result};
use crate::template::{TemplateValue, render_template};

pub const PREVIEW_TEMPLATE: &str = "overlays/overlay.svg";

/// QR code as an embeddable `data:` URL.
pub fn qr_data_url(value: &str, size: u32) -> Result<String> {
    let code = QrCode::new(value.as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?;
    let svg = code
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(false)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        general_purpose::STANDARD.encode(svg.as_bytes())
    ))
}

fn px(v: f64) -> String {
    format!("{:.1}", v)
}

/// Render `overlay` over its background template as an SVG document.
pub async fn render_svg(
    template_dir: &str,
    assets_dir: &Path,
    overlay: &Overlay,
) -> Result<String> {
    let background = load_background(assets_dir, overlay.kind).await;
    let (w, h) = background
        .as_ref()
        .map(|jpeg| (jpeg.width, jpeg.height))
        .unwrap_or_else(|| overlay.kind.default_size_px());
    let (width, height) = (w as f64, h as f64);

    let texts: Vec<TemplateValue> = overlay
        .place_text(width, height)
        .into_iter()
        .map(|t| {
            TemplateValue::object([
                ("text", t.text),
                ("x", px(t.x)),
                ("y", px(t.y)),
                ("size", px(t.size)),
            ])
        })
        .collect();

    let mut context: HashMap<String, TemplateValue> = HashMap::new();
    context.insert("kind".into(), overlay.kind.slug().into());
    context.insert("width".into(), w.to_string().into());
    context.insert("height".into(), h.to_string().into());
    context.insert(
        "background".into(),
        background
            .map(|jpeg| {
                format!(
                    "data:image/jpeg;base64,{}",
                    general_purpose::STANDARD.encode(&jpeg.data)
                )
            })
            .unwrap_or_default()
            .into(),
    );
    context.insert("texts".into(), TemplateValue::List(texts));
    if let Some(qr) = overlay.place_qr(width, height) {
        context.insert(
            "qr".into(),
            TemplateValue::object([
                ("href", qr_data_url(qr.value, qr.size.round() as u32)?),
                ("x", px(qr.x)),
                ("y", px(qr.y)),
                ("size", px(qr.size)),
            ]),
        );
    }

    render_template(template_dir, PREVIEW_TEMPLATE, &context)
}
