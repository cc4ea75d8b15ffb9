//! Integration tests for edgequake-vl2md.
//!
//! Each test drives the public API over a realistic page: a fenced HTML
//! answer the way document-parsing models emit it, and a generated source
//! image at twice the model's resolution.
//!
//! Run with:
//!   cargo test --test pipeline

use edgequake_vl2md::pipeline::dom::Document;
use edgequake_vl2md::pipeline::geometry::{BoundingBox, PixelRect, ScaleTransform};
use edgequake_vl2md::{
    convert, convert_page, convert_to_file, html_path_for, html_to_markdown, inline_images,
    sanitize_to_fenced_html, ConversionConfig, PageError, PageInput, PageSeparator, Stage,
    Vl2MdError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;

// ── Fixtures ─────────────────────────────────────────────────────────────────

const REPORT_PAGE: &str = r#"```html
<html><body>
<div class="title" data-bbox="10 10 290 40"><h1 style="color:#333;font-weight:bold">Annual Report</h1></div>
<p data-bbox="10 50 290 80" style="color: red">Revenue grew <b>12%</b>.</p>
<div class="image" data-bbox="20 100 120 200"><img data-bbox="20 100 120 200"><div class="caption">Figure 1</div></div>
<img data-bbox="150 100 250 200" alt="logo">
<div class="chart" format="png" data-bbox="10 210 100 250"><p>1 2 3</p></div>
<p class="formula.handwritten formula" data-polygon="[1,2,3,4]">E = mc2</p>
<table data-bbox="10 260 290 290"><thead><tr><th>Q</th><th>Sales</th></tr></thead><tbody><tr><td>Q1</td><td>10</td></tr></tbody></table>
<ul><li>alpha</li><li>beta</li></ul>
</body></html>
```"#;

const REPORT_MARKDOWN: &str = "# Annual Report\n\n\
Revenue grew 12%.\n\n\
Figure 1\n\n\
![logo](img-1.jpg)\n\n\
E = mc2\n\n\
| Q | Sales |\n| --- | --- |\n| Q1 | 10 |\n\n\
* alpha\n* beta";

/// A 600×600 gradient PNG; the model saw it at 300×300.
fn source_png() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(600, 600, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn model_config() -> ConversionConfig {
    ConversionConfig::builder()
        .resized_dimensions(300, 300)
        .build()
        .unwrap()
}

// ── Single page ──────────────────────────────────────────────────────────────

#[test]
fn test_report_page_markdown() {
    let page = PageInput::new(source_png(), REPORT_PAGE);
    let parsed = convert_page(&page, &model_config()).unwrap();

    assert_eq!(parsed.markdown, REPORT_MARKDOWN);
    assert!(!parsed.markdown.contains("1 2 3"), "chart content must be cleared");
    assert!(!parsed.markdown.contains("\n\n\n"));
}

#[test]
fn test_report_page_regions() {
    let page = PageInput::new(source_png(), REPORT_PAGE);
    let parsed = convert_page(&page, &model_config()).unwrap();

    // The wrapper image repeats its parent's box and is dropped.
    assert_eq!(parsed.regions.len(), 1);
    let region = parsed.regions.iter().next().unwrap();
    assert_eq!(region.name, "img-1.jpg");
    assert_eq!(
        region.rect,
        PixelRect {
            x: 300,
            y: 200,
            width: 200,
            height: 200
        }
    );
    let decoded = image::load_from_memory(&region.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));
}

#[test]
fn test_report_page_fenced_html() {
    let page = PageInput::new(source_png(), REPORT_PAGE);
    let html = convert_page(&page, &model_config()).unwrap().fenced_html;

    assert!(html.starts_with("```html\n<html><body>\n"), "{html}");
    assert!(html.ends_with("</body></html>\n```"), "{html}");
    assert!(!html.contains("data-bbox"));
    assert!(!html.contains("data-polygon"));
    assert!(!html.contains("color"));
    assert!(html.contains(r#"style="font-weight:bold""#), "{html}");
    assert!(html.contains(r#"<p class="formula">E = mc2</p>"#), "{html}");
    assert!(html.contains(r#"<div class="chart"></div>"#), "{html}");
    assert!(html.contains(r#"src="img-1.jpg""#), "{html}");
}

#[test]
fn test_fenced_html_is_a_fixed_point() {
    let page = PageInput::new(source_png(), REPORT_PAGE);
    let parsed = convert_page(&page, &model_config()).unwrap();

    let mut reparsed = Document::parse(&parsed.fenced_html);
    assert_eq!(sanitize_to_fenced_html(&mut reparsed), parsed.fenced_html);
    assert_eq!(html_to_markdown(&parsed.fenced_html), parsed.markdown);
}

#[test]
fn test_embedded_images_round_trip() {
    let page = PageInput::new(source_png(), REPORT_PAGE);
    let config = ConversionConfig::builder()
        .resized_dimensions(300, 300)
        .embed_images(true)
        .build()
        .unwrap();
    let embedded = convert_page(&page, &config).unwrap();
    let plain = convert_page(&page, &model_config()).unwrap();

    assert!(!embedded.markdown.contains("](img-1.jpg)"));
    assert_eq!(inline_images(&plain.markdown, &plain.regions), embedded.markdown);
}

#[test]
fn test_malformed_bbox_names_stage_and_element() {
    let html = r#"<p>ok</p><img data-bbox="1 2 x 4" alt="broken">"#;
    let err = convert_page(&PageInput::new(source_png(), html), &model_config()).unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Extraction));
    let msg = err.to_string();
    assert!(msg.starts_with("Extraction failed at <img"), "{msg}");
    assert!(msg.contains("1 2 x 4"), "{msg}");
}

#[test]
fn test_box_round_trip_is_exact() {
    for (original, resized) in [((600, 600), (300, 300)), ((1241, 1754), (1288, 1652))] {
        let t = ScaleTransform::new(original, resized).unwrap();
        let full = BoundingBox::new(0, 0, i64::from(resized.0), i64::from(resized.1));
        assert_eq!(
            t.to_original(&full),
            Some(BoundingBox::new(0, 0, i64::from(original.0), i64::from(original.1)))
        );
    }
}

#[test]
fn test_external_image_map() {
    let mut images = HashMap::new();
    images.insert("page_1_fig.png".to_string(), "aGVsbG8=".to_string());
    let md = "# Parsed\n\n![chart](page_1_fig.png)\n\n![missing](nope.png)";

    assert_eq!(
        inline_images(md, &images),
        "# Parsed\n\n![chart](data:image/jpeg;base64,aGVsbG8=)\n\n![missing](data:image/jpeg;base64,)"
    );
}

// ── Batches ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut pages = Vec::new();
    for (n, body) in ["<h2>One</h2>", "<h2>Two</h2>"].iter().enumerate() {
        let image = dir.path().join(format!("page-{n}.png"));
        std::fs::write(&image, source_png()).unwrap();
        std::fs::write(html_path_for(&image), body).unwrap();
        pages.push(PageInput::from_files(&image, &html_path_for(&image)).unwrap());
    }

    let config = ConversionConfig::builder()
        .resized_dimensions(300, 300)
        .page_separator(PageSeparator::Comment)
        .concurrency(2)
        .build()
        .unwrap();
    let out_path = dir.path().join("book.md");
    let stats = convert_to_file(pages, &out_path, &config).await.unwrap();

    assert_eq!(stats.processed_pages, 2);
    assert_eq!(
        std::fs::read_to_string(&out_path).unwrap(),
        "## One\n\n<!-- page 2 -->\n\n## Two"
    );
}

#[tokio::test]
async fn test_batch_survives_one_bad_page() {
    let pages = vec![
        PageInput::new(source_png(), REPORT_PAGE).with_name("report.png"),
        PageInput::new(b"\x89PNG truncated".to_vec(), "<p>lost</p>").with_name("bad.png"),
    ];
    let out = convert(pages, &model_config()).await.unwrap();

    assert_eq!(out.markdown, REPORT_MARKDOWN);
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(out.stats.total_regions, 1);

    let errors: Vec<&PageError> = out.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].page(), 2);

    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["pages"][0]["regions"][0]["name"], "img-1.jpg");
    assert!(matches!(
        out.into_result(),
        Err(Vl2MdError::PartialFailure { failed: 1, .. })
    ));
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("absent.png");
    let err = PageInput::from_files(&image, &html_path_for(&image)).unwrap_err();
    assert!(matches!(err, Vl2MdError::FileNotFound { .. }));
}
