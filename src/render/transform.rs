use kurbo::Point;

use crate::render::layer::Layer;

/// Fixed camera distance factor: d = CAMERA_K * max(w, h). Internal
/// constant, never template-visible.
const CAMERA_K: f64 = 2.5;

/// Supersampling factor for warp edge antialiasing.
const SUPERSAMPLE: u32 = 2;

/// Out-of-plane tilt beyond this produces numerically useless projections.
const MAX_TILT_DEG: f64 = 89.0;

/// Rotate a layer in 3D about its center and project it back to 2D.
///
/// Returns the axis-aligned warped layer plus the anchor offset of its
/// top-left corner relative to the layer's original origin, so callers
/// composite at `(box.x + off_x, box.y + off_y)`. The layer is never
/// clipped to its original box. All-zero angles return the input
/// unchanged.
pub fn rotate_layer(layer: &Layer, rotation: f64, rotate_x: f64, rotate_y: f64) -> (Layer, i64, i64) {
    if rotation == 0.0 && rotate_x == 0.0 && rotate_y == 0.0 {
        return (layer.clone(), 0, 0);
    }
    if layer.is_empty() {
        return (layer.clone(), 0, 0);
    }

    let w = f64::from(layer.width);
    let h = f64::from(layer.height);
    let quad = project_quad(w, h, rotate_x, rotate_y, rotation);

    let min_x = quad.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = quad.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = quad.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = quad.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let out_w = ((max_x - min_x).ceil() as u32).max(1);
    let out_h = ((max_y - min_y).ceil() as u32).max(1);

    let hi = f64::from(SUPERSAMPLE);
    let src_hi = layer.resize_lanczos(layer.width * SUPERSAMPLE, layer.height * SUPERSAMPLE);
    let dst_quad_hi: [Point; 4] = std::array::from_fn(|i| {
        Point::new((quad[i].x - min_x) * hi, (quad[i].y - min_y) * hi)
    });
    let src_quad_hi = [
        Point::new(0.0, 0.0),
        Point::new(w * hi, 0.0),
        Point::new(w * hi, h * hi),
        Point::new(0.0, h * hi),
    ];

    let warped_hi = match perspective_coeffs(&dst_quad_hi, &src_quad_hi) {
        Some(coeffs) => inverse_warp(
            &src_hi,
            out_w * SUPERSAMPLE,
            out_h * SUPERSAMPLE,
            &coeffs,
        ),
        // Singular projection (layer collapsed to a line): nothing visible.
        None => Layer::new(out_w * SUPERSAMPLE, out_h * SUPERSAMPLE),
    };
    let warped = warped_hi.resize_lanczos(out_w, out_h);

    (warped, min_x.round() as i64, min_y.round() as i64)
}

/// Project the four corners of a `w x h` rect through rotation Z -> X -> Y
/// about its center and a fixed-distance perspective divide, in image
/// coordinates (x right, y down, z toward the viewer). Corner order:
/// top-left, top-right, bottom-right, bottom-left.
pub fn project_quad(w: f64, h: f64, rotate_x: f64, rotate_y: f64, rotation: f64) -> [Point; 4] {
    let cx = w / 2.0;
    let cy = h / 2.0;

    let ax = rotate_x.clamp(-MAX_TILT_DEG, MAX_TILT_DEG).to_radians();
    let ay = rotate_y.clamp(-MAX_TILT_DEG, MAX_TILT_DEG).to_radians();
    let az = rotation.to_radians();
    let (sin_x, cos_x) = ax.sin_cos();
    let (sin_y, cos_y) = ay.sin_cos();
    let (sin_z, cos_z) = az.sin_cos();

    let d = (CAMERA_K * w.max(h)).max(1.0);
    let eps = 1e-6;

    let corners = [
        (-cx, -cy, 0.0),
        (cx, -cy, 0.0),
        (cx, cy, 0.0),
        (-cx, cy, 0.0),
    ];
    corners.map(|(x0, y0, z0)| {
        let (x1, y1, z1) = (x0 * cos_z - y0 * sin_z, x0 * sin_z + y0 * cos_z, z0);
        let (x2, y2, z2) = (x1, y1 * cos_x - z1 * sin_x, y1 * sin_x + z1 * cos_x);
        let (x3, y3, z3) = (x2 * cos_y + z2 * sin_y, y2, -x2 * sin_y + z2 * cos_y);

        let mut denom = d - z3;
        if denom.abs() < eps {
            denom = if denom >= 0.0 { eps } else { -eps };
        }
        let s = d / denom;
        Point::new(x3 * s + cx, y3 * s + cy)
    })
}

/// Coefficients `(a..h)` of the projective map taking output coordinates
/// to source coordinates:
/// `u = (a x + b y + c) / (g x + h y + 1)`, `v = (d x + e y + f) / (...)`.
/// Built from the four corner correspondences; `None` when the system is
/// singular.
pub fn perspective_coeffs(dst_quad: &[Point; 4], src_quad: &[Point; 4]) -> Option<[f64; 8]> {
    let mut a = [[0.0f64; 9]; 8];
    for (i, (dp, sp)) in dst_quad.iter().zip(src_quad.iter()).enumerate() {
        let (x, y) = (dp.x, dp.y);
        let (u, v) = (sp.x, sp.y);
        a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
        a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
    }
    solve8(&mut a)
}

/// Gaussian elimination with partial pivoting over the 8x9 augmented
/// system.
fn solve8(a: &mut [[f64; 9]; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in (col + 1)..8 {
            let factor = a[row][col] / a[col][col];
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    let mut x = [0.0f64; 8];
    for col in (0..8).rev() {
        let mut acc = a[col][8];
        for k in (col + 1)..8 {
            acc -= a[col][k] * x[k];
        }
        x[col] = acc / a[col][col];
    }
    Some(x)
}

/// Remap `src` into a `dst_w x dst_h` buffer through the projective map,
/// sampling bilinearly in premultiplied space. Samples that land outside
/// the source are transparent, which is what antialiases the quad edges
/// after the downsample.
fn inverse_warp(src: &Layer, dst_w: u32, dst_h: u32, coeffs: &[f64; 8]) -> Layer {
    let [ca, cb, cc, cd, ce, cf, cg, ch] = *coeffs;
    let mut out = Layer::new(dst_w, dst_h);
    for y in 0..dst_h {
        let yc = f64::from(y) + 0.5;
        for x in 0..dst_w {
            let xc = f64::from(x) + 0.5;
            let denom = cg * xc + ch * yc + 1.0;
            if denom.abs() < 1e-9 {
                continue;
            }
            let u = (ca * xc + cb * yc + cc) / denom;
            let v = (cd * xc + ce * yc + cf) / denom;
            let px = bilinear(src, u, v);
            if px[3] != 0 {
                out.put(x, y, px);
            }
        }
    }
    out
}

fn bilinear(src: &Layer, u: f64, v: f64) -> [u8; 4] {
    let fu = u - 0.5;
    let fv = v - 0.5;
    let x0 = fu.floor();
    let y0 = fv.floor();
    let tx = fu - x0;
    let ty = fv - y0;

    let fetch = |xi: i64, yi: i64| -> [f64; 4] {
        if xi < 0 || yi < 0 || xi >= i64::from(src.width) || yi >= i64::from(src.height) {
            return [0.0; 4];
        }
        let px = src.get(xi as u32, yi as u32);
        [
            f64::from(px[0]),
            f64::from(px[1]),
            f64::from(px[2]),
            f64::from(px[3]),
        ]
    };

    let x0i = x0 as i64;
    let y0i = y0 as i64;
    let p00 = fetch(x0i, y0i);
    let p10 = fetch(x0i + 1, y0i);
    let p01 = fetch(x0i, y0i + 1);
    let p11 = fetch(x0i + 1, y0i + 1);

    let mut px = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - tx) + p10[c] * tx;
        let bottom = p01[c] * (1.0 - tx) + p11[c] * tx;
        px[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    px
}
