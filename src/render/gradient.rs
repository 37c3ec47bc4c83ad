use crate::{
    foundation::{
        color::Rgba8,
        core::Canvas,
        error::{CoverError, CoverResult},
    },
    render::layer::Layer,
    template::model::{BackgroundConfig, GradientKind},
};

/// Synthesize a gradient layer for the full canvas from ordered color
/// stops. Stops arrive in template order; they are stable-sorted by
/// position and clamped to [0,1] here rather than rejected. Layer opacity
/// is one uniform multiply after interpolation — stops carry no alpha.
pub fn synthesize(canvas: Canvas, config: &BackgroundConfig) -> CoverResult<Layer> {
    let stops = prepare_stops(config)?;
    let (w, h) = (canvas.width, canvas.height);
    let mut layer = Layer::new(w, h);
    if layer.is_empty() {
        return Ok(layer);
    }

    match config.gradient_type.unwrap_or(GradientKind::Linear) {
        GradientKind::Linear => {
            // 0 deg points right, increasing clockwise (image space, y down).
            let angle = config.gradient_angle.unwrap_or(90.0).to_radians();
            let (cos_a, sin_a) = (angle.cos(), angle.sin());
            let cx = f64::from(w) / 2.0;
            let cy = f64::from(h) / 2.0;
            let max_dist =
                (f64::from(w) * f64::from(w) + f64::from(h) * f64::from(h)).sqrt() / 2.0;
            for y in 0..h {
                let dy = f64::from(y) - cy;
                for x in 0..w {
                    let dx = f64::from(x) - cx;
                    let dist = dx * cos_a + dy * sin_a;
                    let t = ((dist / max_dist + 1.0) / 2.0).clamp(0.0, 1.0);
                    layer.put(x, y, sample(&stops, t).to_premul());
                }
            }
        }
        GradientKind::Radial => {
            let (ncx, ncy) = config.gradient_center.unwrap_or((0.5, 0.5));
            let cx = f64::from(w) * ncx;
            let cy = f64::from(h) * ncy;
            let max_dist = corner_distance(cx, cy, f64::from(w), f64::from(h)).max(1.0);
            for y in 0..h {
                let dy = f64::from(y) - cy;
                for x in 0..w {
                    let dx = f64::from(x) - cx;
                    let t = ((dx * dx + dy * dy).sqrt() / max_dist).clamp(0.0, 1.0);
                    layer.put(x, y, sample(&stops, t).to_premul());
                }
            }
        }
    }

    layer.apply_opacity(config.opacity);
    Ok(layer)
}

fn prepare_stops(config: &BackgroundConfig) -> CoverResult<Vec<(f64, Rgba8)>> {
    if config.gradient_stops.len() < 2 {
        return Err(CoverError::template(
            "gradient background needs at least 2 stops",
        ));
    }
    let mut stops = Vec::with_capacity(config.gradient_stops.len());
    for stop in &config.gradient_stops {
        let color = Rgba8::parse_hex_opaque(&stop.color)?;
        stops.push((stop.position.clamp(0.0, 1.0), color));
    }
    stops.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(stops)
}

/// Farthest distance from an interior point to any rect corner, so the
/// radial parameter reaches exactly 1.0 at that corner.
fn corner_distance(cx: f64, cy: f64, w: f64, h: f64) -> f64 {
    let mut max = 0.0f64;
    for (px, py) in [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)] {
        let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
        max = max.max(d);
    }
    max
}

fn sample(stops: &[(f64, Rgba8)], t: f64) -> Rgba8 {
    let (first_pos, first_color) = stops[0];
    if t <= first_pos {
        return first_color;
    }
    for pair in stops.windows(2) {
        let (p1, c1) = pair[0];
        let (p2, c2) = pair[1];
        if t <= p2 {
            if p2 <= p1 {
                return c2;
            }
            let f = (t - p1) / (p2 - p1);
            return lerp(c1, c2, f);
        }
    }
    stops[stops.len() - 1].1
}

fn lerp(a: Rgba8, b: Rgba8, f: f64) -> Rgba8 {
    let mix = |x: u8, y: u8| -> u8 {
        (f64::from(x) + (f64::from(y) - f64::from(x)) * f).round() as u8
    };
    Rgba8::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), 255)
}
