//! Coverforge composes raster cover images from declarative templates.
//!
//! A template fixes the canvas size, a background (color, gradient or
//! image), image slots with fit/alignment/rounding/rotation rules and
//! styled text blocks. Each render call pairs a template with a
//! [`RenderInput`] (per-slot image paths, per-block strings, optional
//! background override) and deterministically produces a pixel buffer.
//!
//! # Pipeline overview
//!
//! 1. **Background**: color fill, gradient synthesis or cover-fitted image
//! 2. **Slots**: fit/align -> rounded-corner mask -> 3D rotation with
//!    perspective projection -> composite, in template declaration order
//! 3. **Text**: whitespace wrap -> shadow/stroke/fill glyph passes
//! 4. **Output**: [`render_to_file`] persists PNG; [`build_preview`]
//!    re-runs the pipeline at reduced internal resolution
//!
//! The engine is a pure, synchronous computation: it holds no state across
//! calls, never mutates its inputs, and works on premultiplied RGBA8
//! end-to-end. Batch runs fan independent rows out over a thread pool and
//! accumulate per-row failures instead of aborting.
#![forbid(unsafe_code)]

mod batch;
mod foundation;
mod input;
mod render;
mod template;

pub use batch::{BatchOpts, BatchReport, RenderedRow, RowFailure, run_batch};
pub use foundation::color::Rgba8;
pub use foundation::core::{BoxPx, Canvas, Point, Rect, Vec2};
pub use foundation::error::{CoverError, CoverResult};
pub use input::rows::{
    ParsedRow, clean_column, read_rows, render_input_from_row, validate_header,
    validate_input_keys,
};
pub use render::blur::blur_layer;
pub use render::compose::{RenderIssue, Rendered, build_preview, compose, render_to_file};
pub use render::fit::{FitPlan, place_into_box, resolve_fit};
pub use render::gradient::synthesize as synthesize_gradient;
pub use render::layer::Layer;
pub use render::mask::rounded_rect_mask;
pub use render::text::{load_font, measure_width, wrap_lines};
pub use render::transform::{perspective_coeffs, project_quad, rotate_layer};
pub use template::model::{
    AlignX, AlignY, BackgroundConfig, BackgroundKind, FitMode, GradientKind, GradientStop,
    RenderInput, Slot, TemplateDefinition, TextAlign, TextBlock, TextShadow, TextStyle,
};
pub use template::registry::{TemplateRegistry, default_template};
