use certdesk::certificate::pdf::{Jpeg, PdfDocument, win_ansi};
use certdesk::certificate::preview::{qr_data_url, render_svg};
use certdesk::certificate::{
    Overlay, OverlayKind, bundle_file_name, course_end_date, duration_months, overlays_for,
    render_bundle, split_course_content, verification_url,
};
use certdesk::models::student::Student;
use chrono::{NaiveDate, Utc};
use lopdf::content::Content;

const TEMPLATES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

fn student() -> Student {
    let now = Utc::now();
    Student {
        id: "s-1".to_string(),
        user_id: "RYIT/WB-B01/007".to_string(),
        name: "Asha Roy".to_string(),
        fathername: "Bimal Roy".to_string(),
        mothername: "Chaya Roy".to_string(),
        address: "12 Lake Road".to_string(),
        dob: "2001-04-12".to_string(),
        dor: "2024-01-15".to_string(),
        gender: "Female".to_string(),
        mobile: "9876543210".to_string(),
        highest_qualification: "HS".to_string(),
        image: String::new(),
        password_hash: None,
        role: "student".to_string(),
        branch_name: "Barasat".to_string(),
        branch_code: "B01".to_string(),
        course_name: "DCA".to_string(),
        course_duration: "6 Months".to_string(),
        course_content: "MS Word, Excel (Formulas, Charts), Tally".to_string(),
        theory: Some(45),
        practical: Some(40),
        total_marks: Some(85),
        grade: Some("A".to_string()),
        typing_wpm: Some(35),
        typing_marks: Some(72),
        typing_grade: Some("B+".to_string()),
        active_status: true,
        certificate_downloaded: false,
        created_at: now,
        updated_at: now,
    }
}

/// Page sizes in points and the `Tj` strings of each page.
fn read_pdf(bytes: &[u8]) -> Vec<((f32, f32), Vec<String>)> {
    let pdf = lopdf::Document::load_mem(bytes).unwrap();
    pdf.get_pages()
        .values()
        .map(|id| {
            let page = pdf.get_dictionary(*id).unwrap();
            let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let size = (
                media[2].as_float().unwrap(),
                media[3].as_float().unwrap(),
            );
            let content = Content::decode(&pdf.get_page_content(*id).unwrap()).unwrap();
            let texts = content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .map(|op| String::from_utf8_lossy(op.operands[0].as_str().unwrap()).into_owned())
                .collect();
            (size, texts)
        })
        .collect()
}

fn dct_images(bytes: &[u8]) -> usize {
    let pdf = lopdf::Document::load_mem(bytes).unwrap();
    pdf.objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Filter")
                .and_then(|f| f.as_name())
                .is_ok_and(|name| name == b"DCTDecode")
        })
        .count()
}

fn issued() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
}

/// SOI, a JFIF APP0 segment, a baseline SOF0 frame header and EOI.
fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    data.extend_from_slice(b"JFIF\0");
    data.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

#[test]
fn test_course_end_date() {
    assert_eq!(course_end_date("2024-01-15", "6 Months"), "2024-07-15");
    assert_eq!(course_end_date("2024-01-15T00:00:00.000Z", "12 months"), "2025-01-15");
    assert_eq!(course_end_date("2023-11-10", "3"), "2024-02-10");
    // month end clamps
    assert_eq!(course_end_date("2024-01-31", "1 Month"), "2024-02-29");
}

#[test]
fn test_course_end_date_invalid() {
    assert_eq!(course_end_date("not a date", "6 Months"), "Invalid date");
    assert_eq!(course_end_date("2024-01-15", "Six Months"), "Invalid date");
    assert_eq!(course_end_date("2024-01-15", ""), "Invalid date");
}

#[test]
fn test_duration_months() {
    assert_eq!(duration_months("6 Months"), "6");
    assert_eq!(duration_months(""), "");
}

#[test]
fn test_split_course_content_respects_parentheses() {
    assert_eq!(
        split_course_content("MS Word, Excel (Formulas, Charts), Tally"),
        vec!["MS Word", "Excel (Formulas, Charts)", "Tally"]
    );
    assert_eq!(split_course_content("Only one"), vec!["Only one"]);
    assert!(split_course_content("").is_empty());
    assert_eq!(split_course_content("Word,, Excel ,"), vec!["Word", "Excel"]);
}

#[test]
fn test_verification_url_encodes_identifier() {
    assert_eq!(
        verification_url("https://example.org/", "RYIT/WB-B01/007"),
        "https://example.org/verify/RYIT%2FWB-B01%2F007"
    );
}

#[test]
fn test_bundle_file_name() {
    assert_eq!(
        bundle_file_name("RYIT/WB-B01/007"),
        "RYIT_WB-B01_007_All_Certificates.pdf"
    );
}

#[test]
fn test_overlay_kinds() {
    assert_eq!("certificate".parse::<OverlayKind>().unwrap(), OverlayKind::Certificate);
    assert_eq!("typing".parse::<OverlayKind>().unwrap(), OverlayKind::Typing);
    assert!("diploma".parse::<OverlayKind>().is_err());
    assert_eq!(OverlayKind::Marksheet.default_size_px(), (794, 1123));
    assert_eq!(OverlayKind::Certificate.template_file(), "certificate_template.jpg");
}

#[test]
fn test_only_the_certificate_carries_a_qr_code() {
    let overlays = overlays_for(&student(), "https://example.org", issued());
    let kinds: Vec<OverlayKind> = overlays.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, OverlayKind::ALL.to_vec());

    let qr = overlays[0].place_qr(896.0, 634.0).unwrap();
    assert_eq!(qr.value, "https://example.org/verify/RYIT%2FWB-B01%2F007");
    assert!((qr.size - 80.0).abs() < 1e-9);
    assert!((qr.x - 728.0).abs() < 1e-9);
    assert!(overlays[1].place_qr(896.0, 634.0).is_none());
    assert!(overlays[2].place_qr(896.0, 634.0).is_none());
}

#[test]
fn test_text_placement_scales_with_page_width() {
    let overlay = Overlay::build(OverlayKind::Certificate, &student(), "https://example.org", issued());

    let at_reference = overlay.place_text(896.0, 1000.0);
    let name = at_reference.iter().find(|t| t.text == "Asha Roy").unwrap();
    assert!((name.x - 448.0).abs() < 1e-9);
    assert!((name.y - 350.0).abs() < 1e-9);
    assert!((name.size - 12.0).abs() < 1e-9);

    let doubled = overlay.place_text(1792.0, 1000.0);
    let name = doubled.iter().find(|t| t.text == "Asha Roy").unwrap();
    assert!((name.size - 24.0).abs() < 1e-9);

    let texts: Vec<&str> = at_reference.iter().map(|t| t.text.as_str()).collect();
    assert!(texts.contains(&"2024-07-15"));
    assert!(texts.contains(&"2024-08-01"));
    assert!(texts.contains(&"6"));
}

#[test]
fn test_marksheet_lists_course_content_with_bullets() {
    let overlay = Overlay::build(OverlayKind::Marksheet, &student(), "https://example.org", issued());
    let placed = overlay.place_text(794.0, 1123.0);

    let bullets = placed.iter().filter(|t| t.text == "\u{2022}").count();
    assert_eq!(bullets, 3);
    let item = placed
        .iter()
        .find(|t| t.text.starts_with("Excel"))
        .unwrap();
    let first = placed.iter().find(|t| t.text == "MS Word").unwrap();
    assert!(item.y > first.y);
    assert!(placed.iter().any(|t| t.text == "2024-01-15 - 2024-07-15"));
    assert!(placed.iter().any(|t| t.text == "85"));
}

#[test]
fn test_jpeg_frame_header() {
    let jpeg = Jpeg::parse(tiny_jpeg(1123, 794)).unwrap();
    assert_eq!((jpeg.width, jpeg.height), (1123, 794));
    assert_eq!(jpeg.components, 3);

    assert!(Jpeg::parse(b"\x89PNG\r\n\x1a\n".to_vec()).is_err());
    assert!(Jpeg::parse(vec![0xFF, 0xD8, 0xFF, 0xD9]).is_err());
}

#[test]
fn test_jpeg_accepts_progressive_but_not_lossless() {
    let mut progressive = tiny_jpeg(640, 480);
    progressive[21] = 0xC2;
    assert_eq!(Jpeg::parse(progressive).unwrap().width, 640);

    let mut lossless = tiny_jpeg(640, 480);
    lossless[21] = 0xC3;
    assert!(Jpeg::parse(lossless).is_err());
}

#[test]
fn test_pdf_document_layout() {
    let overlays = overlays_for(&student(), "https://example.org", issued());
    let mut doc = PdfDocument::new();
    doc.add_overlay_page(&overlays[0], Some(Jpeg::parse(tiny_jpeg(1200, 848)).unwrap()))
        .unwrap();
    doc.add_overlay_page(&overlays[1], None).unwrap();
    assert_eq!(doc.page_count(), 2);

    let bytes = doc.finish().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    let pages = read_pdf(&bytes);
    assert_eq!(pages.len(), 2);
    // 1200 x 848 px at 72/96 pt per px
    assert_eq!(pages[0].0, (900.0, 636.0));
    // blank marksheet falls back to A4 portrait
    assert_eq!(pages[1].0, (595.5, 842.25));
    assert!(pages[0].1.iter().any(|t| t == "Asha Roy"));
    assert_eq!(dct_images(&bytes), 1);
}

#[test]
fn test_win_ansi_encoding() {
    assert_eq!(win_ansi("a(b)c"), b"a(b)c".to_vec());
    assert_eq!(win_ansi("\u{2022}"), vec![0x95]);
    assert_eq!(win_ansi("\u{2019}s"), vec![0x92, b's']);
    assert_eq!(win_ansi("\u{e9}"), vec![0xE9]);
    assert_eq!(win_ansi("a\tb"), b"a b".to_vec());
    assert_eq!(win_ansi("\u{0986}\u{09B6}\u{09BE}"), b"???".to_vec());
}

#[tokio::test]
async fn test_render_bundle_uses_backgrounds_when_present() {
    let assets = tempfile::tempdir().unwrap();
    std::fs::write(
        assets.path().join("certificate_template.jpg"),
        tiny_jpeg(1123, 794),
    )
    .unwrap();
    // an unreadable template is skipped, not fatal
    std::fs::write(assets.path().join("typing_certificate.jpg"), b"garbage").unwrap();

    let pdf = render_bundle(assets.path(), &student(), "https://example.org", issued())
        .await
        .unwrap();
    assert_eq!(read_pdf(&pdf).len(), 3);
    assert_eq!(dct_images(&pdf), 1);
}

#[tokio::test]
async fn test_svg_preview() {
    let assets = tempfile::tempdir().unwrap();
    let overlay = Overlay::build(OverlayKind::Certificate, &student(), "https://example.org", issued());

    let svg = render_svg(TEMPLATES, assets.path(), &overlay).await.unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("width=\"1123\""));
    assert!(svg.contains("data-kind=\"certificate\""));
    assert!(svg.contains(">Asha Roy</text>"));
    assert!(svg.contains("data:image/svg+xml;base64,"));
    assert!(svg.contains("fill=\"#ffffff\""));

    let typing = Overlay::build(OverlayKind::Typing, &student(), "https://example.org", issued());
    let svg = render_svg(TEMPLATES, assets.path(), &typing).await.unwrap();
    assert!(!svg.contains("data:image/svg+xml"));
}

#[test]
fn test_qr_data_url() {
    let url = qr_data_url("https://example.org/verify/X", 80).unwrap();
    assert!(url.starts_with("data:image/svg+xml;base64,"));
}
