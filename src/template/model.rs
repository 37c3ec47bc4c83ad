use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;

use crate::foundation::{
    color::Rgba8,
    core::{BoxPx, Canvas},
    error::{CoverError, CoverResult},
};

/// A validated cover template: canvas, background, image slots and text
/// blocks in declaration order.
///
/// Templates are immutable value objects. The render engine only reads them;
/// all mutation happens in external editors, which pass a freshly validated
/// snapshot per render call.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub size: Canvas,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub texts: Vec<TextBlock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Color,
    Image,
    Gradient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    Linear,
    Radial,
}

/// One control point on a gradient axis. Stop colors are opaque `#RRGGBB`;
/// layer opacity is applied uniformly after interpolation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradientStop {
    pub color: String,
    pub position: f64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundConfig {
    pub kind: BackgroundKind,
    pub value: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_type: Option<GradientKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_center: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gradient_stops: Vec<GradientStop>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            kind: BackgroundKind::Color,
            value: "#ffffff".to_string(),
            opacity: 1.0,
            gradient_type: None,
            gradient_angle: None,
            gradient_center: None,
            gradient_stops: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    Cover,
    Contain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignX {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignY {
    Top,
    Center,
    Bottom,
}

/// A named rectangular region that displays a fitted image layer.
///
/// `rotation` is in-plane (about the view axis, positive clockwise);
/// `rotate_x`/`rotate_y` tilt the layer out of plane and go through the
/// fixed-distance perspective projection.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slot {
    pub key: String,
    #[serde(rename = "box")]
    pub box_px: BoxPx,
    #[serde(default)]
    pub radius: i32,
    #[serde(default = "default_fit")]
    pub fit: FitMode,
    #[serde(default)]
    pub padding: i32,
    #[serde(default = "default_align_x")]
    pub align_x: AlignX,
    #[serde(default = "default_align_y")]
    pub align_y: AlignY,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub rotate_x: f64,
    #[serde(default)]
    pub rotate_y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextShadow {
    #[serde(default = "default_shadow_offset")]
    pub offset: (i32, i32),
    #[serde(default = "default_shadow_color")]
    pub color: String,
    #[serde(default)]
    pub blur: i32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default = "default_text_size")]
    pub size: f32,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default = "default_text_align")]
    pub align: TextAlign,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<i32>,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,
    #[serde(default)]
    pub stroke_width: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<TextShadow>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: None,
            size: default_text_size(),
            color: default_text_color(),
            align: default_text_align(),
            max_width: None,
            line_spacing: default_line_spacing(),
            stroke_width: 0,
            stroke_fill: None,
            shadow: None,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextBlock {
    pub key: String,
    #[serde(rename = "box")]
    pub box_px: BoxPx,
    #[serde(default)]
    pub style: TextStyle,
}

/// Per-call render request: which template, what goes into each slot and
/// text block, and the output file name for batch runs.
///
/// Keys absent from `texts` render empty; keys absent from `slot_paths`
/// leave the background visible.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct RenderInput {
    pub template_key: String,
    pub output_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_path: Option<String>,
    #[serde(default)]
    pub texts: BTreeMap<String, String>,
    #[serde(default)]
    pub text_colors: BTreeMap<String, String>,
    #[serde(default)]
    pub slot_paths: BTreeMap<String, String>,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_fit() -> FitMode {
    FitMode::Cover
}

fn default_align_x() -> AlignX {
    AlignX::Center
}

fn default_align_y() -> AlignY {
    AlignY::Center
}

fn default_text_size() -> f32 {
    42.0
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_text_align() -> TextAlign {
    TextAlign::Left
}

fn default_line_spacing() -> f32 {
    1.2
}

fn default_shadow_offset() -> (i32, i32) {
    (2, 2)
}

fn default_shadow_color() -> String {
    "#00000088".to_string()
}

impl TemplateDefinition {
    /// Parse and validate a template from JSON text. An empty `name` falls
    /// back to the key.
    pub fn from_json_str(json: &str) -> CoverResult<Self> {
        let mut template: TemplateDefinition = serde_json::from_str(json)
            .map_err(|e| CoverError::template(format!("malformed template json: {e}")))?;
        if template.name.is_empty() {
            template.name = template.key.clone();
        }
        template.validate()?;
        Ok(template)
    }

    pub fn from_path(path: &Path) -> CoverResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read template '{}'", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> CoverResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoverError::template(format!("serialize template: {e}")))
    }

    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.key == key)
    }

    pub fn text(&self, key: &str) -> Option<&TextBlock> {
        self.texts.iter().find(|t| t.key == key)
    }

    pub fn validate(&self) -> CoverResult<()> {
        if self.key.is_empty() {
            return Err(CoverError::template("template key must be non-empty"));
        }
        if self.size.width == 0 || self.size.height == 0 {
            return Err(CoverError::template("canvas width/height must be > 0"));
        }

        validate_keys("slot", self.slots.iter().map(|s| s.key.as_str()))?;
        validate_keys("text", self.texts.iter().map(|t| t.key.as_str()))?;

        self.background.validate()?;

        for slot in &self.slots {
            if slot.radius < 0 {
                return Err(CoverError::template(format!(
                    "slot '{}' radius must be >= 0",
                    slot.key
                )));
            }
            if slot.padding < 0 {
                return Err(CoverError::template(format!(
                    "slot '{}' padding must be >= 0",
                    slot.key
                )));
            }
        }

        for text in &self.texts {
            let style = &text.style;
            if !(style.size > 0.0) {
                return Err(CoverError::template(format!(
                    "text '{}' size must be > 0",
                    text.key
                )));
            }
            if !(style.line_spacing > 0.0) {
                return Err(CoverError::template(format!(
                    "text '{}' line_spacing must be > 0",
                    text.key
                )));
            }
            if style.stroke_width < 0 {
                return Err(CoverError::template(format!(
                    "text '{}' stroke_width must be >= 0",
                    text.key
                )));
            }
            if let Some(shadow) = &style.shadow
                && shadow.blur < 0
            {
                return Err(CoverError::template(format!(
                    "text '{}' shadow blur must be >= 0",
                    text.key
                )));
            }
        }

        Ok(())
    }
}

impl BackgroundConfig {
    pub fn validate(&self) -> CoverResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(CoverError::template("background opacity must be in [0,1]"));
        }
        match self.kind {
            BackgroundKind::Color => {
                Rgba8::parse_hex(&self.value)
                    .map_err(|e| CoverError::template(format!("background color: {e}")))?;
            }
            BackgroundKind::Image => {}
            BackgroundKind::Gradient => {
                if self.gradient_stops.len() < 2 {
                    return Err(CoverError::template(
                        "gradient background needs at least 2 stops",
                    ));
                }
                for stop in &self.gradient_stops {
                    Rgba8::parse_hex_opaque(&stop.color)
                        .map_err(|e| CoverError::template(format!("gradient stop: {e}")))?;
                    if !stop.position.is_finite() {
                        return Err(CoverError::template("gradient stop position must be finite"));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_keys<'a>(what: &str, keys: impl Iterator<Item = &'a str>) -> CoverResult<()> {
    let mut seen = Vec::<String>::new();
    for key in keys {
        if key.is_empty() {
            return Err(CoverError::template(format!("{what} key must be non-empty")));
        }
        // '.' is the CSV namespace separator (text.<key> / slot.<key>).
        if key.contains('.') {
            return Err(CoverError::template(format!(
                "{what} key '{key}' must not contain '.'"
            )));
        }
        let folded = key.to_lowercase();
        if seen.contains(&folded) {
            return Err(CoverError::template(format!(
                "duplicate {what} key '{key}' (keys are unique case-insensitively)"
            )));
        }
        seen.push(folded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_template() -> TemplateDefinition {
        TemplateDefinition {
            key: "cover".to_string(),
            name: "Cover".to_string(),
            size: Canvas {
                width: 1080,
                height: 1920,
            },
            background: BackgroundConfig::default(),
            slots: vec![Slot {
                key: "main".to_string(),
                box_px: BoxPx::new(90, 420, 900, 1080),
                radius: 32,
                fit: FitMode::Cover,
                padding: 0,
                align_x: AlignX::Center,
                align_y: AlignY::Center,
                rotation: 0.0,
                rotate_x: 0.0,
                rotate_y: 0.0,
            }],
            texts: vec![TextBlock {
                key: "title".to_string(),
                box_px: BoxPx::new(90, 120, 900, 180),
                style: TextStyle::default(),
            }],
        }
    }

    #[test]
    fn json_roundtrip_is_structurally_identical() {
        let template = basic_template();
        let json = template.to_json_pretty().unwrap();
        let de = TemplateDefinition::from_json_str(&json).unwrap();
        let rejson = de.to_json_pretty().unwrap();
        assert_eq!(json, rejson);
    }

    #[test]
    fn defaults_fill_missing_slot_fields() {
        let json = r##"{
            "key": "t",
            "size": [100, 100],
            "slots": [{"key": "s", "box": [0, 0, 50, 50]}]
        }"##;
        let template = TemplateDefinition::from_json_str(json).unwrap();
        let slot = &template.slots[0];
        assert_eq!(slot.fit, FitMode::Cover);
        assert_eq!(slot.align_x, AlignX::Center);
        assert_eq!(slot.align_y, AlignY::Center);
        assert_eq!(slot.rotation, 0.0);
        assert_eq!(template.name, "t");
    }

    #[test]
    fn removed_perspective_field_is_rejected() {
        let json = r##"{
            "key": "t",
            "size": [100, 100],
            "slots": [{"key": "s", "box": [0, 0, 50, 50], "perspective": 0.5}]
        }"##;
        assert!(TemplateDefinition::from_json_str(json).is_err());
    }

    #[test]
    fn validate_rejects_case_insensitive_duplicate_keys() {
        let mut template = basic_template();
        let mut dup = template.slots[0].clone();
        dup.key = "MAIN".to_string();
        template.slots.push(dup);
        assert!(template.validate().is_err());
    }

    #[test]
    fn validate_rejects_dot_in_key() {
        let mut template = basic_template();
        template.texts[0].key = "title.color".to_string();
        assert!(template.validate().is_err());
    }

    #[test]
    fn validate_rejects_gradient_with_alpha_stop() {
        let mut template = basic_template();
        template.background = BackgroundConfig {
            kind: BackgroundKind::Gradient,
            value: String::new(),
            opacity: 1.0,
            gradient_type: Some(GradientKind::Linear),
            gradient_angle: Some(90.0),
            gradient_center: None,
            gradient_stops: vec![
                GradientStop {
                    color: "#ff000088".to_string(),
                    position: 0.0,
                },
                GradientStop {
                    color: "#0000ff".to_string(),
                    position: 1.0,
                },
            ],
        };
        assert!(template.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_opacity_and_sizes() {
        let mut template = basic_template();
        template.background.opacity = 1.5;
        assert!(template.validate().is_err());

        let mut template = basic_template();
        template.texts[0].style.size = 0.0;
        assert!(template.validate().is_err());
    }

    #[test]
    fn unsorted_stop_positions_are_not_an_error() {
        let mut template = basic_template();
        template.background = BackgroundConfig {
            kind: BackgroundKind::Gradient,
            value: String::new(),
            opacity: 1.0,
            gradient_type: Some(GradientKind::Radial),
            gradient_angle: None,
            gradient_center: Some((0.5, 0.5)),
            gradient_stops: vec![
                GradientStop {
                    color: "#0000ff".to_string(),
                    position: 1.2,
                },
                GradientStop {
                    color: "#ff0000".to_string(),
                    position: -0.3,
                },
            ],
        };
        assert!(template.validate().is_ok());
    }
}
