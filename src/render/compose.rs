use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::{BoxPx, Canvas},
        error::{CoverError, CoverResult},
    },
    render::{background, fit, layer::Layer, mask, text, transform},
    template::model::{RenderInput, Slot, TemplateDefinition, TextShadow},
};

/// A non-fatal problem with one element of a render: the element was
/// skipped, the rest of the canvas is valid.
#[derive(Debug)]
pub struct RenderIssue {
    /// `slot.<key>` or `text.<key>`.
    pub element: String,
    pub error: CoverError,
}

/// Finished canvas plus the per-element issues collected along the way.
#[derive(Debug)]
pub struct Rendered {
    pub layer: Layer,
    pub issues: Vec<RenderIssue>,
}

/// Run the full pipeline: background, then slots in declaration order,
/// then text blocks in declaration order.
///
/// Missing slot entries are skipped silently (the background stays
/// visible); unreadable slot assets, bad colors and font failures are
/// per-element issues. A broken background is the only fatal asset.
#[tracing::instrument(skip(template, input), fields(template = %template.key))]
pub fn compose(template: &TemplateDefinition, input: &RenderInput) -> CoverResult<Rendered> {
    let mut canvas = background::render_background(template, input.background_path.as_deref())?;
    let mut issues = Vec::new();

    for slot in &template.slots {
        let Some(path) = input.slot_paths.get(&slot.key) else {
            continue;
        };
        if path.trim().is_empty() || slot.box_px.is_degenerate() {
            continue;
        }
        if let Err(error) = place_slot(&mut canvas, slot, Path::new(path)) {
            tracing::warn!(slot = %slot.key, %error, "slot skipped");
            issues.push(RenderIssue {
                element: format!("slot.{}", slot.key),
                error,
            });
        }
    }

    for block in &template.texts {
        let content = input
            .texts
            .get(&block.key)
            .map(String::as_str)
            .unwrap_or("");
        let color_override = input
            .text_colors
            .get(&block.key)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty());
        if block.box_px.is_degenerate() {
            continue;
        }
        if let Err(error) = text::render_block(&mut canvas, block, content, color_override) {
            tracing::warn!(text = %block.key, %error, "text block skipped");
            issues.push(RenderIssue {
                element: format!("text.{}", block.key),
                error,
            });
        }
    }

    Ok(Rendered {
        layer: canvas,
        issues,
    })
}

/// Fit, round and rotate one slot's image, then composite it at the slot
/// anchor (shifted by the transform offset when the layer rotates).
fn place_slot(canvas: &mut Layer, slot: &Slot, path: &Path) -> CoverResult<()> {
    let image = Layer::decode_file(path)?;
    if image.is_empty() {
        return Ok(());
    }

    let box_w = slot.box_px.w as u32;
    let box_h = slot.box_px.h as u32;
    let pad = slot.padding.max(0) as u32;
    let target_w = box_w.saturating_sub(pad * 2).max(1);
    let target_h = box_h.saturating_sub(pad * 2).max(1);

    let mut fitted = fit::place_into_box(
        &image,
        target_w,
        target_h,
        slot.fit,
        slot.align_x,
        slot.align_y,
    );
    if slot.radius > 0 {
        let mask = mask::rounded_rect_mask(target_w, target_h, slot.radius);
        fitted.apply_mask(&mask)?;
    }

    // The rotation turns the whole slot, padding and rounded corners
    // included, so the fitted image is framed in a box-sized layer first.
    let mut slot_layer = Layer::new(box_w, box_h);
    slot_layer.composite_over(&fitted, i64::from(pad), i64::from(pad));

    let (layer, off_x, off_y) =
        transform::rotate_layer(&slot_layer, slot.rotation, slot.rotate_x, slot.rotate_y);
    canvas.composite_over(
        &layer,
        i64::from(slot.box_px.x) + off_x,
        i64::from(slot.box_px.y) + off_y,
    );
    Ok(())
}

/// Full-resolution render persisted as PNG. Issues are logged; the caller
/// gets the written path.
#[tracing::instrument(skip(template, input), fields(template = %template.key))]
pub fn render_to_file(
    input: &RenderInput,
    template: &TemplateDefinition,
    output_path: &Path,
) -> CoverResult<PathBuf> {
    let rendered = compose(template, input)?;
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    rendered.layer.save_png(output_path)?;
    Ok(output_path.to_path_buf())
}

/// Reduced-resolution preview: the template geometry is scaled so the
/// longer canvas edge fits `max_size`, and the same pipeline runs at that
/// internal resolution. Nothing is written to disk, and the full-size
/// render is never produced.
#[tracing::instrument(skip(template, input), fields(template = %template.key))]
pub fn build_preview(
    input: &RenderInput,
    template: &TemplateDefinition,
    max_size: u32,
) -> CoverResult<Rendered> {
    let longer = template.size.width.max(template.size.height).max(1);
    let factor = (f64::from(max_size) / f64::from(longer)).min(1.0);
    if factor >= 1.0 {
        return compose(template, input);
    }
    let scaled = scale_template(template, factor);
    compose(&scaled, input)
}

/// Uniformly scale every geometric quantity of a template: canvas, boxes,
/// radii, padding, font sizes, wrap widths, stroke and shadow. Angles,
/// colors and keys are resolution-independent and stay as they are.
fn scale_template(template: &TemplateDefinition, factor: f64) -> TemplateDefinition {
    let px = |v: i32| -> i32 { (f64::from(v) * factor).round() as i32 };
    let scale_box = |b: BoxPx| -> BoxPx {
        BoxPx::new(px(b.x), px(b.y), px(b.w).max(1), px(b.h).max(1))
    };

    let mut scaled = template.clone();
    scaled.size = Canvas {
        width: ((f64::from(template.size.width) * factor).round() as u32).max(1),
        height: ((f64::from(template.size.height) * factor).round() as u32).max(1),
    };
    for slot in &mut scaled.slots {
        slot.box_px = scale_box(slot.box_px);
        slot.radius = px(slot.radius);
        slot.padding = px(slot.padding);
    }
    for block in &mut scaled.texts {
        block.box_px = scale_box(block.box_px);
        let style = &mut block.style;
        style.size = ((f64::from(style.size) * factor) as f32).max(1.0);
        style.max_width = style.max_width.map(|w| px(w).max(1));
        style.stroke_width = px(style.stroke_width);
        style.shadow = style.shadow.as_ref().map(|shadow| TextShadow {
            offset: (px(shadow.offset.0), px(shadow.offset.1)),
            color: shadow.color.clone(),
            blur: px(shadow.blur),
        });
    }
    scaled
}
