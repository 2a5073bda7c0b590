use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::styles::StylePreset;

pub mod font;
pub mod layout;
pub mod page;

pub use font::{ResolvedFont, resolve_font};
pub use layout::{PageLayout, PlacedGlyph, layout_page};

/// A5 landscape (210 x 148 mm) at 300 DPI.
pub const PAGE_WIDTH: u32 = 2480;
pub const PAGE_HEIGHT: u32 = 1748;
pub const PAGE_DPI: u32 = 300;

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub text: String,
    pub font: Option<PathBuf>,
    pub style: StylePreset,
    pub output: PathBuf,
    pub seed: Option<u64>,
}

impl RenderRequest {
    pub fn new(text: impl Into<String>, style: StylePreset, output: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            font: None,
            style,
            output: output.into(),
            seed: None,
        }
    }

    pub fn with_font(mut self, font: Option<PathBuf>) -> Self {
        self.font = font;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub ink_color: String,
    pub paper_color: String,
    pub default_font: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for RenderSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            ink_color: settings.ink_color.clone(),
            paper_color: settings.paper_color.clone(),
            default_font: settings.font_path(),
            seed: settings.seed,
        }
    }
}

pub struct RenderedImage {
    pub image: image::RgbaImage,
    pub path: PathBuf,
    pub overflow_chars: usize,
}

impl RenderedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Nothing is written unless every earlier step succeeded.
pub fn render(request: &RenderRequest, settings: &RenderSettings) -> Result<RenderedImage> {
    let text = clean_text(&request.text);
    if text.trim().is_empty() {
        return Err(Error::MissingText);
    }
    let format = output_format(&request.output)?;

    let (image, overflow_chars) = render_page(&text, request, settings)?;
    let bytes =
        page::encode_image(&image, format).map_err(|err| Error::Encode(format!("{:#}", err)))?;
    fs::write(&request.output, bytes).map_err(|source| Error::Write {
        path: request.output.clone(),
        source,
    })?;
    debug!("wrote {}", request.output.display());

    Ok(RenderedImage {
        image,
        path: request.output.clone(),
        overflow_chars,
    })
}

fn render_page(
    text: &str,
    request: &RenderRequest,
    settings: &RenderSettings,
) -> Result<(image::RgbaImage, usize)> {
    let font_path = request.font.as_deref().or(settings.default_font.as_deref());
    let font = resolve_font(font_path)?;

    let mut rng = match request.seed.or(settings.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let params = request.style.params();
    let layout = layout_page(
        text.trim_end(),
        &params,
        &font.measure(),
        PAGE_WIDTH as f32,
        PAGE_HEIGHT as f32,
        &mut rng,
    );
    debug!(
        "laid out {} glyphs on {} lines (style {})",
        layout.glyphs.len(),
        layout.lines,
        request.style
    );
    if layout.overflow_chars > 0 {
        warn!(
            "{} characters did not fit on the page and were dropped",
            layout.overflow_chars
        );
    }

    let style = page::PageStyle {
        family: &font.family,
        ink_color: &settings.ink_color,
        paper_color: &settings.paper_color,
    };
    let svg = page::page_svg(&layout, PAGE_WIDTH, PAGE_HEIGHT, &style);
    let image = page::rasterize_svg(&svg, font.db.clone(), &font.family)
        .map_err(|err| Error::Encode(format!("{:#}", err)))?;
    Ok((image, layout.overflow_chars))
}

fn output_format(path: &Path) -> Result<image::ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(page::image_format_from_extension)
        .ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
        })
}

pub fn clean_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    for ch in normalized.chars() {
        match ch {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            ch if ch.is_control() => {}
            ch => out.push(ch),
        }
    }
    out
}
