use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::font::GlyphMeasure;
use crate::styles::StyleParams;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    /// Degrees, clockwise.
    pub rotation: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub glyphs: Vec<PlacedGlyph>,
    pub lines: usize,
    /// Characters that fell below the bottom margin and were dropped.
    pub overflow_chars: usize,
}

struct Cursor {
    x: f32,
    baseline: f32,
    line: usize,
    overflowed: bool,
}

pub fn layout_page<R: Rng>(
    text: &str,
    params: &StyleParams,
    measure: &GlyphMeasure<'_>,
    page_width: f32,
    page_height: f32,
    rng: &mut R,
) -> PageLayout {
    let right_limit = (page_width - params.right_margin).max(params.left_margin + 1.0);
    let bottom_limit = page_height - params.bottom_margin;
    let mut layout = PageLayout::default();

    let first_baseline =
        params.top_margin + params.font_size + jitter(rng, params.line_spacing_sigma);
    let mut cursor = Cursor {
        x: params.left_margin,
        baseline: first_baseline,
        line: 0,
        overflowed: first_baseline > bottom_limit,
    };
    let mut soft_wrapped = false;

    for ch in text.chars() {
        if ch == '\n' {
            next_line(&mut cursor, params, bottom_limit, rng);
            soft_wrapped = false;
            continue;
        }
        if cursor.overflowed {
            if !ch.is_whitespace() {
                layout.overflow_chars += 1;
            }
            continue;
        }

        let size = (params.font_size + jitter(rng, params.font_size_sigma)).max(1.0);
        let advance = measure.advance(ch, size);
        let is_space = ch.is_whitespace();

        if !is_space && cursor.x + advance > right_limit && cursor.x > params.left_margin {
            next_line(&mut cursor, params, bottom_limit, rng);
            soft_wrapped = true;
            if cursor.overflowed {
                layout.overflow_chars += 1;
                continue;
            }
        }

        if is_space {
            if soft_wrapped {
                continue;
            }
            let step = advance + params.word_spacing + jitter(rng, params.word_spacing_sigma);
            cursor.x += step.max(advance * 0.5);
            continue;
        }

        layout.glyphs.push(PlacedGlyph {
            ch,
            x: cursor.x,
            y: cursor.baseline,
            size,
            rotation: jitter(rng, params.rotation_sigma),
        });
        soft_wrapped = false;
        let step = advance + params.letter_spacing + jitter(rng, params.letter_spacing_sigma);
        cursor.x += step.max(advance * 0.5);
    }

    layout.lines = cursor.line + 1;
    layout
}

fn next_line<R: Rng>(cursor: &mut Cursor, params: &StyleParams, bottom_limit: f32, rng: &mut R) {
    cursor.line += 1;
    cursor.x = params.left_margin;
    cursor.baseline = params.top_margin
        + params.font_size
        + params.line_spacing * cursor.line as f32
        + jitter(rng, params.line_spacing_sigma);
    if cursor.baseline > bottom_limit {
        cursor.overflowed = true;
    }
}

fn jitter<R: Rng>(rng: &mut R, sigma: f32) -> f32 {
    if sigma <= 0.0 || !sigma.is_finite() {
        return 0.0;
    }
    Normal::new(0.0, sigma)
        .map(|normal| normal.sample(rng))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PAGE_HEIGHT, PAGE_WIDTH};
    use crate::styles::StylePreset;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn run(text: &str, preset: StylePreset, seed: u64) -> PageLayout {
        let mut rng = StdRng::seed_from_u64(seed);
        layout_page(
            text,
            &preset.params(),
            &GlyphMeasure::Estimate,
            PAGE_WIDTH as f32,
            PAGE_HEIGHT as f32,
            &mut rng,
        )
    }

    #[test]
    fn every_visible_char_is_placed_when_it_fits() {
        let layout = run("测试文字", StylePreset::Neat, 1);
        let placed: String = layout.glyphs.iter().map(|glyph| glyph.ch).collect();
        assert_eq!(placed, "测试文字");
        assert_eq!(layout.overflow_chars, 0);
        assert_eq!(layout.lines, 1);
    }

    #[test]
    fn same_seed_gives_same_page() {
        let a = run("Hello handwriting", StylePreset::Casual, 42);
        let b = run("Hello handwriting", StylePreset::Casual, 42);
        assert_eq!(a.glyphs, b.glyphs);
    }

    #[test]
    fn glyphs_stay_inside_the_margins() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(6);
        let params = StylePreset::Default.params();
        let layout = run(&text, StylePreset::Default, 7);
        assert!(layout.lines > 1);
        for glyph in &layout.glyphs {
            assert!(glyph.x >= params.left_margin);
            assert!(glyph.x < PAGE_WIDTH as f32 - params.right_margin);
            assert!(glyph.y <= PAGE_HEIGHT as f32 - params.bottom_margin);
        }
    }

    #[test]
    fn explicit_newlines_start_new_lines() {
        let layout = run("a\nb\n\nc", StylePreset::Neat, 3);
        assert_eq!(layout.lines, 4);
        let ys: Vec<f32> = layout.glyphs.iter().map(|glyph| glyph.y).collect();
        assert!(ys[0] < ys[1] && ys[1] < ys[2]);
    }

    #[test]
    fn overflow_is_counted_not_drawn() {
        let text = "字".repeat(2000);
        let layout = run(&text, StylePreset::Default, 9);
        assert!(layout.overflow_chars > 0);
        assert_eq!(layout.glyphs.len() + layout.overflow_chars, 2000);
    }

    #[test]
    fn zero_sigma_means_no_noise() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(jitter(&mut rng, 0.0), 0.0);
        assert_eq!(jitter(&mut rng, -1.0), 0.0);
    }
}
