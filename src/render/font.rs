use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::error::Error;

/// Families tried, in order, when no font file is configured. CJK faces come
/// first so mixed Chinese/Latin text renders from a single face.
pub const FALLBACK_FAMILIES: &[&str] = &[
    "LXGW WenKai",
    "Noto Sans CJK SC",
    "Source Han Sans SC",
    "WenQuanYi Micro Hei",
    "Microsoft YaHei",
    "PingFang SC",
    "Noto Sans",
    "DejaVu Sans",
    "sans-serif",
];

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub(crate) fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }
}

pub struct ResolvedFont {
    pub family: String,
    pub metrics: Option<FontMetrics>,
    pub(crate) db: Arc<fontdb::Database>,
}

impl ResolvedFont {
    pub fn measure(&self) -> GlyphMeasure<'_> {
        let Some(metrics) = self.metrics.as_ref() else {
            return GlyphMeasure::Estimate;
        };
        match metrics.face() {
            Some(face) => GlyphMeasure::Face {
                face,
                units_per_em: metrics.units_per_em.max(1) as f32,
                space_advance: metrics.space_advance,
            },
            None => GlyphMeasure::Estimate,
        }
    }
}

pub enum GlyphMeasure<'a> {
    Face {
        face: Face<'a>,
        units_per_em: f32,
        space_advance: u16,
    },
    Estimate,
}

impl GlyphMeasure<'_> {
    pub fn advance(&self, ch: char, font_size: f32) -> f32 {
        match self {
            GlyphMeasure::Face {
                face,
                units_per_em,
                space_advance,
            } => {
                let units = if ch == ' ' {
                    *space_advance
                } else {
                    face.glyph_index(ch)
                        .and_then(|glyph| face.glyph_hor_advance(glyph))
                        .unwrap_or_else(|| fallback_units(ch, *units_per_em, *space_advance))
                };
                units as f32 * (font_size / units_per_em)
            }
            GlyphMeasure::Estimate => estimate_char_units(ch) * font_size,
        }
    }
}

pub fn resolve_font(path: Option<&Path>) -> Result<ResolvedFont, Error> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(path) = path {
        if !path.is_file() {
            return Err(Error::FontLoad {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
        let metrics = load_font_metrics(path).map_err(|err| Error::FontLoad {
            path: path.to_path_buf(),
            reason: format!("{:#}", err),
        })?;
        db.load_font_data(metrics.data().to_vec());
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "sans-serif".to_string());
        debug!("using font file {} ({})", path.display(), family);
        return Ok(ResolvedFont {
            family,
            metrics: Some(metrics),
            db: Arc::new(db),
        });
    }

    for candidate in FALLBACK_FAMILIES {
        if let Ok(metrics) = load_font_metrics_from_family(&db, candidate) {
            let family = metrics
                .family()
                .map(|name| name.to_string())
                .unwrap_or_else(|| candidate.to_string());
            debug!("using system font family {}", family);
            return Ok(ResolvedFont {
                family,
                metrics: Some(metrics),
                db: Arc::new(db),
            });
        }
    }

    warn!("no system font found; glyphs may not be drawn");
    Ok(ResolvedFont {
        family: "sans-serif".to_string(),
        metrics: None,
        db: Arc::new(db),
    })
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn fallback_units(ch: char, units_per_em: f32, space_advance: u16) -> u16 {
    if ch.is_whitespace() {
        space_advance
    } else {
        (estimate_char_units(ch) * units_per_em) as u16
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF | 0x3000..=0x303F
    ) {
        1.0
    } else {
        0.9
    }
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
