use std::path::Path;

use crate::{
    foundation::{
        color::{Rgba8, mul_div255},
        error::{CoverError, CoverResult},
    },
    render::{blur::blur_layer, layer::Layer},
    template::model::{TextAlign, TextBlock},
};

/// System faces tried in order when a style names no font file.
const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load the face for a style. An explicit path that cannot be read or
/// parsed is a reported error, never a silent substitution; an absent path
/// resolves the engine-default face from the candidate list.
pub fn load_font(font_path: Option<&str>) -> CoverResult<fontdue::Font> {
    match font_path {
        Some(path) => {
            let bytes = std::fs::read(Path::new(path))
                .map_err(|e| CoverError::asset(format!("read font '{path}': {e}")))?;
            fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
                .map_err(|e| CoverError::asset(format!("parse font '{path}': {e}")))
        }
        None => {
            for candidate in DEFAULT_FONT_CANDIDATES {
                let Ok(bytes) = std::fs::read(candidate) else {
                    continue;
                };
                if let Ok(font) = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
                {
                    return Ok(font);
                }
            }
            Err(CoverError::asset(
                "no default font found; set style.font to a font file",
            ))
        }
    }
}

/// Advance-summed width of a single line.
pub fn measure_width(font: &fontdue::Font, px: f32, text: &str) -> f32 {
    text.chars()
        .map(|ch| font.metrics(ch, px).advance_width)
        .sum()
}

/// Greedy whitespace wrap: any whitespace run is a break opportunity
/// consumed into a single space, so manual line breaks behave like spaces.
/// A token wider than the limit still takes a line alone; words are never
/// split. Wrapping is idempotent over its own newline-joined output.
pub fn wrap_lines<F>(text: &str, limit: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let trial = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&trial) <= limit {
            current = trial;
        } else {
            if !current.is_empty() {
                lines.push(current);
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Render a text block onto the canvas: shadow, then stroke, then fill.
/// Color parse failures and font load failures surface as errors for the
/// caller to report against this block.
pub fn render_block(
    canvas: &mut Layer,
    block: &TextBlock,
    content: &str,
    color_override: Option<&str>,
) -> CoverResult<()> {
    let style = &block.style;
    if content.trim().is_empty() {
        return Ok(());
    }

    let fill = Rgba8::parse_hex(color_override.unwrap_or(&style.color))?;
    let stroke = match (&style.stroke_fill, style.stroke_width) {
        (Some(color), width) if width > 0 => Some((Rgba8::parse_hex(color)?, width as u32)),
        _ => None,
    };
    let shadow = match &style.shadow {
        Some(shadow) => Some((Rgba8::parse_hex(&shadow.color)?, shadow.offset, shadow.blur)),
        None => None,
    };

    let limit = style.max_width.unwrap_or(block.box_px.w);
    if limit <= 0 {
        return Ok(());
    }

    let font = load_font(style.font.as_deref())?;
    let px = style.size;
    let lines = wrap_lines(content, limit as f32, |s| measure_width(&font, px, s));
    if lines.is_empty() {
        return Ok(());
    }

    let mask = rasterize_lines(canvas.width, canvas.height, block, &font, &lines);

    if let Some((color, (dx, dy), blur)) = shadow {
        let layer = colorize(&mask, canvas.width, canvas.height, color);
        let blurred = blur_layer(&layer, blur.max(0) as u32)?;
        canvas.composite_over(&blurred, i64::from(dx), i64::from(dy));
    }
    if let Some((color, width)) = stroke {
        let dilated = dilate(&mask, canvas.width, canvas.height, width);
        let layer = colorize(&dilated, canvas.width, canvas.height, color);
        canvas.composite_over(&layer, 0, 0);
    }
    let layer = colorize(&mask, canvas.width, canvas.height, fill);
    canvas.composite_over(&layer, 0, 0);
    Ok(())
}

/// Stamp every line's glyph coverage into a canvas-sized mask. Lines stack
/// from the box top at a `size * line_spacing` pitch; alignment picks the
/// horizontal origin inside the box width.
fn rasterize_lines(
    canvas_w: u32,
    canvas_h: u32,
    block: &TextBlock,
    font: &fontdue::Font,
    lines: &[String],
) -> Vec<u8> {
    let style = &block.style;
    let px = style.size;
    let mut mask = vec![0u8; (canvas_w as usize) * (canvas_h as usize)];

    let ascent = font
        .horizontal_line_metrics(px)
        .map(|m| m.ascent)
        .unwrap_or(px);
    let pitch = px * style.line_spacing;

    for (i, line) in lines.iter().enumerate() {
        let line_w = measure_width(font, px, line);
        let x0 = match style.align {
            TextAlign::Left => f64::from(block.box_px.x),
            TextAlign::Center => {
                f64::from(block.box_px.x) + (f64::from(block.box_px.w) - f64::from(line_w)) / 2.0
            }
            TextAlign::Right => {
                f64::from(block.box_px.x) + f64::from(block.box_px.w) - f64::from(line_w)
            }
        };
        let line_top = f64::from(block.box_px.y) + f64::from(pitch) * (i as f64);
        let baseline = line_top + f64::from(ascent);

        let mut pen_x = x0;
        for ch in line.chars() {
            let (metrics, bitmap) = font.rasterize(ch, px);
            let glyph_x = pen_x.round() as i64 + i64::from(metrics.xmin);
            let glyph_y =
                baseline.round() as i64 - i64::from(metrics.ymin) - metrics.height as i64;
            stamp_max(
                &mut mask,
                canvas_w,
                canvas_h,
                &bitmap,
                metrics.width,
                metrics.height,
                glyph_x,
                glyph_y,
            );
            pen_x += f64::from(metrics.advance_width);
        }
    }
    mask
}

#[allow(clippy::too_many_arguments)]
fn stamp_max(
    mask: &mut [u8],
    canvas_w: u32,
    canvas_h: u32,
    bitmap: &[u8],
    w: usize,
    h: usize,
    at_x: i64,
    at_y: i64,
) {
    for gy in 0..h {
        let ty = at_y + gy as i64;
        if ty < 0 || ty >= i64::from(canvas_h) {
            continue;
        }
        for gx in 0..w {
            let tx = at_x + gx as i64;
            if tx < 0 || tx >= i64::from(canvas_w) {
                continue;
            }
            let coverage = bitmap[gy * w + gx];
            if coverage == 0 {
                continue;
            }
            let idx = (ty as usize) * (canvas_w as usize) + tx as usize;
            mask[idx] = mask[idx].max(coverage);
        }
    }
}

/// Coverage mask times a straight color, producing a premultiplied layer.
fn colorize(mask: &[u8], w: u32, h: u32, color: Rgba8) -> Layer {
    let premul = color.to_premul();
    let mut layer = Layer::new(w, h);
    for (px, &m) in layer.data.chunks_exact_mut(4).zip(mask.iter()) {
        if m == 0 {
            continue;
        }
        for c in 0..4 {
            px[c] = mul_div255(u16::from(premul[c]), u16::from(m));
        }
    }
    layer
}

/// Max-dilate the mask by a disk, the raster analogue of a stroked
/// outline: the fill pass paints over the interior, leaving a `radius`
/// wide rim.
fn dilate(mask: &[u8], w: u32, h: u32, radius: u32) -> Vec<u8> {
    let r = radius as i64;
    let mut disk = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                disk.push((dx, dy));
            }
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in 0..i64::from(h) {
        for x in 0..i64::from(w) {
            let m = mask[(y as usize) * (w as usize) + x as usize];
            if m == 0 {
                continue;
            }
            for &(dx, dy) in &disk {
                let tx = x + dx;
                let ty = y + dy;
                if tx < 0 || ty < 0 || tx >= i64::from(w) || ty >= i64::from(h) {
                    continue;
                }
                let idx = (ty as usize) * (w as usize) + tx as usize;
                out[idx] = out[idx].max(m);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::BoxPx;
    use crate::template::model::TextStyle;

    fn char_count_measure(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn wrap_packs_greedily() {
        let lines = wrap_lines("aa bb cc dd", 5.0, char_count_measure);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn wrap_treats_newlines_as_whitespace() {
        let lines = wrap_lines("aa\nbb\t\tcc", 8.0, char_count_measure);
        assert_eq!(lines, vec!["aa bb cc"]);
    }

    #[test]
    fn oversize_token_takes_its_own_line() {
        let lines = wrap_lines("a verylongtoken b", 6.0, char_count_measure);
        assert_eq!(lines, vec!["a", "verylongtoken", "b"]);
    }

    #[test]
    fn wrap_is_idempotent() {
        for text in [
            "the quick brown fox jumps over the lazy dog",
            "word",
            "a bb ccc dddd eeeee ffffff",
            "supercalifragilistic a b",
        ] {
            let first = wrap_lines(text, 10.0, char_count_measure);
            let rejoined = first.join("\n");
            let second = wrap_lines(&rejoined, 10.0, char_count_measure);
            assert_eq!(first, second, "rewrap changed breaks for '{text}'");
        }
    }

    #[test]
    fn empty_text_yields_no_lines() {
        assert!(wrap_lines("", 10.0, char_count_measure).is_empty());
        assert!(wrap_lines("   \n \t ", 10.0, char_count_measure).is_empty());
    }

    #[test]
    fn dilate_grows_a_point_into_a_disk() {
        let mut mask = vec![0u8; 49];
        mask[3 * 7 + 3] = 255;
        let out = dilate(&mask, 7, 7, 2);
        assert_eq!(out[3 * 7 + 3], 255);
        assert_eq!(out[3 * 7 + 5], 255);
        assert_eq!(out[1 * 7 + 3], 255);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn colorize_scales_by_coverage() {
        let mask = vec![0u8, 128, 255];
        let layer = colorize(&mask, 3, 1, Rgba8::new(255, 0, 0, 255));
        assert_eq!(layer.get(0, 0), [0, 0, 0, 0]);
        assert_eq!(layer.get(2, 0), [255, 0, 0, 255]);
        assert_eq!(layer.get(1, 0)[3], 128);
    }

    #[test]
    fn missing_font_file_is_an_error_not_a_fallback() {
        let err = load_font(Some("/definitely/not/here.ttf")).unwrap_err();
        assert!(err.to_string().contains("asset error"));
    }

    #[test]
    fn render_block_reports_invalid_color() {
        let mut canvas = Layer::new(64, 64);
        let block = TextBlock {
            key: "t".to_string(),
            box_px: BoxPx::new(0, 0, 64, 64),
            style: TextStyle {
                color: "not-a-color".to_string(),
                ..TextStyle::default()
            },
        };
        let err = render_block(&mut canvas, &block, "hi", None).unwrap_err();
        assert!(matches!(err, CoverError::Color(_)));
    }

    #[test]
    fn render_block_draws_pixels_with_default_font() {
        // Skipped when the host has none of the candidate faces.
        if load_font(None).is_err() {
            return;
        }
        let mut canvas = Layer::new(200, 80);
        let block = TextBlock {
            key: "t".to_string(),
            box_px: BoxPx::new(0, 0, 200, 80),
            style: TextStyle {
                size: 32.0,
                color: "#ff0000".to_string(),
                ..TextStyle::default()
            },
        };
        render_block(&mut canvas, &block, "Hi", None).unwrap();
        let drawn = canvas.data.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(drawn > 0, "expected glyph coverage on the canvas");
    }
}
