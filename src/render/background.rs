use std::path::Path;

use crate::{
    foundation::{color::Rgba8, error::CoverResult},
    render::{fit, gradient, layer::Layer},
    template::model::{AlignX, AlignY, BackgroundKind, FitMode, TemplateDefinition},
};

/// Fill the canvas for a render call: the template background (color,
/// gradient or image), or the per-call override image when one is given.
///
/// The canvas starts as opaque white so a background opacity below 1
/// blends toward white instead of leaving transparent output. A missing or
/// undecodable background image is fatal for the call, unlike slot assets.
pub fn render_background(
    template: &TemplateDefinition,
    background_path: Option<&str>,
) -> CoverResult<Layer> {
    let size = template.size;
    let background = &template.background;
    let mut canvas = Layer::filled(size.width, size.height, Rgba8::WHITE);

    match background.kind {
        BackgroundKind::Color => {
            let color = Rgba8::parse_hex(&background.value)?.with_opacity(background.opacity);
            let fill = Layer::filled(size.width, size.height, color);
            canvas.composite_over(&fill, 0, 0);
        }
        BackgroundKind::Gradient => {
            let fill = gradient::synthesize(size, background)?;
            canvas.composite_over(&fill, 0, 0);
        }
        BackgroundKind::Image => {
            // The override below replaces the template image entirely.
            if background_path.is_none() && !background.value.trim().is_empty() {
                let image = Layer::decode_file(Path::new(&background.value))?;
                let mut fitted = cover_fit(&image, size.width, size.height);
                fitted.apply_opacity(background.opacity);
                canvas.composite_over(&fitted, 0, 0);
            }
        }
    }

    if let Some(path) = background_path {
        let image = Layer::decode_file(Path::new(path))?;
        let fitted = cover_fit(&image, size.width, size.height);
        canvas.composite_over(&fitted, 0, 0);
    }

    Ok(canvas)
}

fn cover_fit(image: &Layer, w: u32, h: u32) -> Layer {
    fit::place_into_box(image, w, h, FitMode::Cover, AlignX::Center, AlignY::Center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Canvas;
    use crate::template::model::BackgroundConfig;

    fn color_template(value: &str, opacity: f32) -> TemplateDefinition {
        TemplateDefinition {
            key: "t".to_string(),
            name: "t".to_string(),
            size: Canvas {
                width: 8,
                height: 8,
            },
            background: BackgroundConfig {
                kind: BackgroundKind::Color,
                value: value.to_string(),
                opacity,
                ..BackgroundConfig::default()
            },
            slots: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[test]
    fn color_background_fills_canvas() {
        let canvas = render_background(&color_template("#336699", 1.0), None).unwrap();
        assert_eq!(canvas.get(4, 4), [0x33, 0x66, 0x99, 255]);
    }

    #[test]
    fn opacity_blends_toward_white() {
        let canvas = render_background(&color_template("#000000", 0.5), None).unwrap();
        let px = canvas.get(4, 4);
        assert_eq!(px[3], 255);
        assert!(px[0] > 100 && px[0] < 160, "expected mid gray, got {px:?}");
    }

    #[test]
    fn missing_background_image_is_fatal() {
        let mut template = color_template("#ffffff", 1.0);
        template.background.kind = BackgroundKind::Image;
        template.background.value = "/definitely/not/here.png".to_string();
        assert!(render_background(&template, None).is_err());
        // Same for a broken override path.
        let template = color_template("#ffffff", 1.0);
        assert!(render_background(&template, Some("/also/not/here.png")).is_err());
    }
}
