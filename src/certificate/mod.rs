//! Certificate, marksheet and typing-certificate overlays.
//!
//! Each overlay is a background template image with text fields placed at
//! fixed relative positions (percent of page width/height). Font sizes are
//! given in pixels for a 896 px wide page and scale with the actual width.
//! The same layout drives both the PDF bundle and the SVG preview.
pub mod pdf;
pub mod preview;

use std::path::Path;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::{AppError, Result};
use crate::models::student::Student;
use pdf::{Jpeg, PdfDocument};

/// Page width the font sizes and QR size are expressed against.
pub const REFERENCE_WIDTH_PX: f64 = 896.0;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    Certificate,
    Marksheet,
    Typing,
}

impl OverlayKind {
    /// Bundle order.
    pub const ALL: [OverlayKind; 3] = [
        OverlayKind::Certificate,
        OverlayKind::Marksheet,
        OverlayKind::Typing,
    ];

    pub fn template_file(self) -> &'static str {
        match self {
            OverlayKind::Certificate => "certificate_template.jpg",
            OverlayKind::Marksheet => "marksheet_template.jpg",
            OverlayKind::Typing => "typing_certificate.jpg",
        }
    }

    /// Page size in pixels (A4 at 96 dpi) used when the template is missing.
    pub fn default_size_px(self) -> (u32, u32) {
        match self {
            OverlayKind::Marksheet => (794, 1123),
            OverlayKind::Certificate | OverlayKind::Typing => (1123, 794),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            OverlayKind::Certificate => "certificate",
            OverlayKind::Marksheet => "marksheet",
            OverlayKind::Typing => "typing",
        }
    }
}

impl FromStr for OverlayKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "certificate" => Ok(OverlayKind::Certificate),
            "marksheet" => Ok(OverlayKind::Marksheet),
            "typing" => Ok(OverlayKind::Typing),
            other => Err(AppError::validation(format!(
                "Unknown certificate kind `{}`",
                other
            ))),
        }
    }
}

/// One text field at a relative position.
#[derive(Clone, Debug, PartialEq)]
pub struct TextField {
    pub text: String,
    pub top_pct: f64,
    pub left_pct: f64,
    pub size_px: f64,
}

/// Bulleted list flowing downwards from its anchor, wrapped to a width.
#[derive(Clone, Debug, PartialEq)]
pub struct BulletList {
    pub items: Vec<String>,
    pub top_pct: f64,
    pub left_pct: f64,
    pub width_pct: f64,
    pub size_px: f64,
}

/// Square QR code; `size_pct` is relative to the page width.
#[derive(Clone, Debug, PartialEq)]
pub struct QrField {
    pub value: String,
    pub top_pct: f64,
    pub left_pct: f64,
    pub size_pct: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub fields: Vec<TextField>,
    pub list: Option<BulletList>,
    pub qr: Option<QrField>,
}

/// A line of text resolved to page units, `y` being the top of the line box.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// A QR code resolved to page units.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedQr<'a> {
    pub value: &'a str,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

fn field(text: impl Into<String>, top_pct: f64, left_pct: f64, size_px: f64) -> TextField {
    TextField {
        text: text.into(),
        top_pct,
        left_pct,
        size_px,
    }
}

fn mark(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl Overlay {
    /// Lay out one overlay for a student, issued on `issued_on`.
    pub fn build(
        kind: OverlayKind,
        student: &Student,
        public_url: &str,
        issued_on: NaiveDate,
    ) -> Overlay {
        let issued = issued_on.format("%Y-%m-%d").to_string();
        let end_date = course_end_date(&student.dor, &student.course_duration);
        match kind {
            OverlayKind::Certificate => Overlay {
                kind,
                fields: vec![
                    field(&student.name, 35.0, 50.0, 12.0),
                    field(&student.fathername, 41.1, 50.0, 12.0),
                    field(&student.course_name, 47.2, 54.0, 12.0),
                    field(&student.branch_name, 53.3, 44.0, 12.0),
                    field(&student.user_id, 65.7, 49.0, 12.0),
                    field(duration_months(&student.course_duration), 59.2, 25.0, 15.0),
                    field(&student.dor, 59.3, 53.0, 12.0),
                    field(end_date, 59.3, 73.0, 12.0),
                    field(student.grade.clone().unwrap_or_default(), 65.4, 19.0, 12.0),
                    field(issued, 65.6, 79.0, 12.0),
                ],
                list: None,
                qr: Some(QrField {
                    value: verification_url(public_url, &student.user_id),
                    top_pct: 60.9,
                    left_pct: 81.25,
                    size_pct: 80.0 / REFERENCE_WIDTH_PX * 100.0,
                }),
            },
            OverlayKind::Marksheet => Overlay {
                kind,
                fields: vec![
                    field(&student.name, 24.0, 19.0, 17.0),
                    field(&student.fathername, 24.0, 68.0, 17.0),
                    field(&student.course_name, 30.0, 68.0, 17.0),
                    field(&student.user_id, 30.0, 15.0, 16.0),
                    field(&student.course_duration, 35.5, 25.0, 17.0),
                    field(format!("{} - {}", student.dor, end_date), 35.2, 60.0, 16.0),
                    field(student.grade.clone().unwrap_or_default(), 78.1, 85.0, 17.0),
                    field(mark(student.theory), 52.0, 84.0, 14.0),
                    field(mark(student.practical), 67.0, 84.0, 14.0),
                    field("100", 78.2, 55.0, 17.0),
                    field(mark(student.total_marks), 78.2, 70.0, 17.0),
                ],
                list: Some(BulletList {
                    items: split_course_content(&student.course_content),
                    top_pct: 45.0,
                    left_pct: 12.0,
                    width_pct: 35.0,
                    size_px: 13.5,
                }),
                qr: None,
            },
            OverlayKind::Typing => Overlay {
                kind,
                fields: vec![
                    field(&student.name, 35.0, 55.0, 14.0),
                    field(&student.fathername, 41.5, 57.0, 14.0),
                    field(student.typing_grade.clone().unwrap_or_default(), 53.0, 24.0, 14.0),
                    field(&student.user_id, 53.4, 64.0, 13.0),
                    field(mark(student.typing_wpm), 60.0, 46.0, 14.0),
                    field(mark(student.typing_marks), 60.0, 68.0, 14.0),
                    field(issued, 47.0, 65.0, 14.0),
                ],
                list: None,
                qr: None,
            },
        }
    }

    /// Resolve every text line to page units for a page of `width` x `height`.
    pub fn place_text(&self, width: f64, height: f64) -> Vec<PlacedText> {
        let scale = width / REFERENCE_WIDTH_PX;
        let mut placed: Vec<PlacedText> = self
            .fields
            .iter()
            .filter(|f| !f.text.is_empty())
            .map(|f| PlacedText {
                text: f.text.clone(),
                x: f.left_pct / 100.0 * width,
                y: f.top_pct / 100.0 * height,
                size: f.size_px * scale,
            })
            .collect();

        if let Some(list) = &self.list {
            let size = list.size_px * scale;
            let line_height = size * 1.5;
            // 20px of list indent at the reference width
            let indent = 20.0 * scale;
            let bullet_x = list.left_pct / 100.0 * width + indent * 0.4;
            let text_x = list.left_pct / 100.0 * width + indent;
            let max_chars =
                ((list.width_pct / 100.0 * width - indent) / (size * 0.58)).max(8.0) as usize;
            let mut y = list.top_pct / 100.0 * height;
            for item in &list.items {
                for (i, line) in wrap(item, max_chars).into_iter().enumerate() {
                    if i == 0 {
                        placed.push(PlacedText {
                            text: "\u{2022}".to_string(),
                            x: bullet_x,
                            y,
                            size,
                        });
                    }
                    placed.push(PlacedText {
                        text: line,
                        x: text_x,
                        y,
                        size,
                    });
                    y += line_height;
                }
            }
        }
        placed
    }

    pub fn place_qr(&self, width: f64, height: f64) -> Option<PlacedQr<'_>> {
        self.qr.as_ref().map(|qr| PlacedQr {
            value: &qr.value,
            x: qr.left_pct / 100.0 * width,
            y: qr.top_pct / 100.0 * height,
            size: qr.size_pct / 100.0 * width,
        })
    }
}

/// Greedy word wrap to at most `max_chars` per line.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// All three overlays in bundle order.
pub fn overlays_for(student: &Student, public_url: &str, issued_on: NaiveDate) -> Vec<Overlay> {
    OverlayKind::ALL
        .iter()
        .map(|&kind| Overlay::build(kind, student, public_url, issued_on))
        .collect()
}

/// Leading month count of a duration like `"6 Months"`.
pub fn duration_months(course_duration: &str) -> String {
    course_duration
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Registration date plus the course duration in months, as `YYYY-MM-DD`.
///
/// Returns `Invalid date` when either the date or the leading month count
/// cannot be read. Month-end overflow clamps to the last day of the month.
pub fn course_end_date(dor: &str, course_duration: &str) -> String {
    const INVALID: &str = "Invalid date";

    let first = course_duration.split_whitespace().next().unwrap_or_default();
    let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
    let Ok(months) = digits.parse::<u32>() else {
        return INVALID.to_string();
    };
    let date_part = dor.trim().get(..10).unwrap_or(dor.trim());
    let Ok(start) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
        return INVALID.to_string();
    };
    match start.checked_add_months(Months::new(months)) {
        Some(end) => end.format("%Y-%m-%d").to_string(),
        None => INVALID.to_string(),
    }
}

/// Split course content at commas that are not inside parentheses.
///
/// `"Word, Excel (Formulas, Charts), Tally"` gives
/// `["Word", "Excel (Formulas, Charts)", "Tally"]`.
pub fn split_course_content(content: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    for c in content.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if c == ',' && depth == 0 {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Public verification link encoded in the certificate QR code.
pub fn verification_url(public_url: &str, user_id: &str) -> String {
    format!(
        "{}/verify/{}",
        public_url.trim_end_matches('/'),
        utf8_percent_encode(user_id, URI_COMPONENT)
    )
}

/// `<userId>_All_Certificates.pdf` with path separators made safe.
pub fn bundle_file_name(user_id: &str) -> String {
    format!("{}_All_Certificates.pdf", user_id.replace(['/', '\\'], "_"))
}

/// Read and parse the background template for one overlay kind.
///
/// A missing or unreadable template is logged and yields `None`; the page
/// is then rendered blank at the kind's default size.
pub async fn load_background(assets_dir: &Path, kind: OverlayKind) -> Option<Jpeg> {
    let path = assets_dir.join(kind.template_file());
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Certificate template {} unavailable: {}", path.display(), e);
            return None;
        }
    };
    match Jpeg::parse(bytes) {
        Ok(jpeg) => Some(jpeg),
        Err(e) => {
            log::warn!("Certificate template {} rejected: {}", path.display(), e);
            None
        }
    }
}

/// Render the three overlays of a student into one PDF, one page each.
pub async fn render_bundle(
    assets_dir: &Path,
    student: &Student,
    public_url: &str,
    issued_on: NaiveDate,
) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::new();
    for overlay in overlays_for(student, public_url, issued_on) {
        let background = load_background(assets_dir, overlay.kind).await;
        doc.add_overlay_page(&overlay, background)?;
    }
    log::info!(
        "Rendered certificate bundle for `{}` ({} pages)",
        student.user_id,
        doc.page_count()
    );
    doc.finish()
}
