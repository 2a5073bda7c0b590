use std::path::PathBuf;

use handscript::render::{self, PAGE_HEIGHT, PAGE_WIDTH};
use handscript::{Error, ErrorKind, RenderRequest, RenderSettings, StylePreset};

fn settings() -> RenderSettings {
    RenderSettings {
        seed: Some(11),
        ..RenderSettings::default()
    }
}

#[test]
fn single_character_fills_an_a5_page() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("one.png");
    let request = RenderRequest::new("字", StylePreset::Default, &output);
    let rendered = render::render(&request, &settings()).unwrap();
    assert_eq!(rendered.dimensions(), (PAGE_WIDTH, PAGE_HEIGHT));
    assert_eq!(
        image::image_dimensions(&output).unwrap(),
        (PAGE_WIDTH, PAGE_HEIGHT)
    );
}

#[test]
fn long_text_keeps_the_page_size_and_counts_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("long.jpg");
    let paragraph = "这是一个很长的段落，用来测试自动换行和分页之外的溢出处理。\n".repeat(40);
    let request = RenderRequest::new(paragraph, StylePreset::Casual, &output);
    let rendered = render::render(&request, &settings()).unwrap();
    assert_eq!(rendered.dimensions(), (PAGE_WIDTH, PAGE_HEIGHT));
    assert!(rendered.overflow_chars > 0);
    assert_eq!(
        image::image_dimensions(&output).unwrap(),
        (PAGE_WIDTH, PAGE_HEIGHT)
    );
}

#[test]
fn every_style_renders() {
    let dir = tempfile::tempdir().unwrap();
    for preset in StylePreset::ALL {
        let output = dir.path().join(format!("{}.png", preset));
        let request = RenderRequest::new("Hello\nworld", preset, &output);
        render::render(&request, &settings()).unwrap();
        assert!(output.exists(), "{} missing", preset);
    }
}

#[test]
fn empty_text_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.png");
    let err = render::render(
        &RenderRequest::new("", StylePreset::Neat, &output),
        &settings(),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!output.exists());
}

#[test]
fn missing_font_is_a_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("font.png");
    let request = RenderRequest::new("hello", StylePreset::Default, &output)
        .with_font(Some(PathBuf::from("/nonexistent/handwriting.ttf")));
    let err = render::render(&request, &settings()).err().unwrap();
    assert!(matches!(err, Error::FontLoad { .. }));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(!output.exists());
}

#[test]
fn non_font_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("fake.ttf");
    std::fs::write(&fake, b"definitely not a font").unwrap();
    let output = dir.path().join("fake.png");
    let request =
        RenderRequest::new("hello", StylePreset::Default, &output).with_font(Some(fake));
    let err = render::render(&request, &settings()).err().unwrap();
    assert!(matches!(err, Error::FontLoad { .. }));
    assert!(!output.exists());
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("page.svgz");
    let err = render::render(
        &RenderRequest::new("hello", StylePreset::Default, &output),
        &settings(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::UnsupportedFormat { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn unwritable_destination_is_a_write_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no-such-dir").join("page.png");
    let err = render::render(
        &RenderRequest::new("hello", StylePreset::Default, &output),
        &settings(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Write { .. }));
    assert!(!output.exists());
}
