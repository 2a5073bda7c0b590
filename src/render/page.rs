use anyhow::{Context, Result, anyhow};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::layout::PageLayout;

pub struct PageStyle<'a> {
    pub family: &'a str,
    pub ink_color: &'a str,
    pub paper_color: &'a str,
}

pub fn page_svg(layout: &PageLayout, width: u32, height: u32, style: &PageStyle<'_>) -> String {
    let mut svg = String::with_capacity(256 + layout.glyphs.len() * 96);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{fill}"/>"#,
        w = width,
        h = height,
        fill = escape_xml(style.paper_color)
    ));
    svg.push_str(&format!(
        r#"<g font-family="{family}" fill="{ink}">"#,
        family = escape_xml(style.family),
        ink = escape_xml(style.ink_color)
    ));
    for glyph in &layout.glyphs {
        let mut buf = [0u8; 4];
        let text = escape_xml(glyph.ch.encode_utf8(&mut buf));
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-size="{size:.1}" transform="rotate({r:.2} {x:.1} {y:.1})">{text}</text>"#,
            x = glyph.x,
            y = glyph.y,
            size = glyph.size,
            r = glyph.rotation,
            text = text
        ));
    }
    svg.push_str("</g></svg>");
    svg
}

pub fn rasterize_svg(
    svg: &str,
    fontdb: Arc<fontdb::Database>,
    family: &str,
) -> Result<image::RgbaImage> {
    let options = Options {
        fontdb,
        font_family: family.to_string(),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse page SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn encode_image(image: &image::RgbaImage, format: image::ImageFormat) -> Result<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode page image")?;
    Ok(bytes)
}

pub fn image_format_from_extension(ext: &str) -> Option<image::ImageFormat> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some(image::ImageFormat::Png),
        "jpg" | "jpeg" => Some(image::ImageFormat::Jpeg),
        "bmp" => Some(image::ImageFormat::Bmp),
        "gif" => Some(image::ImageFormat::Gif),
        "tif" | "tiff" => Some(image::ImageFormat::Tiff),
        "webp" => Some(image::ImageFormat::WebP),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
