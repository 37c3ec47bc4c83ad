use std::path::PathBuf;

use coverforge::{TemplateDefinition, TemplateRegistry, default_template};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "coverforge_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

const FULL_FEATURED: &str = r##"{
    "key": "full",
    "name": "Full Featured",
    "size": [1080, 1920],
    "background": {
        "kind": "gradient",
        "value": "",
        "opacity": 0.9,
        "gradient_type": "radial",
        "gradient_center": [0.3, 0.7],
        "gradient_stops": [
            {"color": "#ff8800", "position": 0.0},
            {"color": "#3311aa", "position": 1.0}
        ]
    },
    "slots": [
        {
            "key": "hero",
            "box": [40, 300, 1000, 900],
            "radius": 24,
            "fit": "contain",
            "padding": 16,
            "align_x": "left",
            "align_y": "bottom",
            "rotation": -8.0,
            "rotate_y": 20.0
        }
    ],
    "texts": [
        {
            "key": "title",
            "box": [60, 80, 960, 200],
            "style": {
                "size": 72,
                "color": "#ffffff",
                "align": "center",
                "max_width": 900,
                "line_spacing": 1.4,
                "stroke_width": 2,
                "stroke_fill": "#000000",
                "shadow": {"offset": [3, 3], "color": "#00000066", "blur": 4}
            }
        }
    ]
}"##;

#[test]
fn load_serialize_reload_is_structurally_identical() {
    let template = TemplateDefinition::from_json_str(FULL_FEATURED).unwrap();
    let json = template.to_json_pretty().unwrap();
    let reloaded = TemplateDefinition::from_json_str(&json).unwrap();
    assert_eq!(json, reloaded.to_json_pretty().unwrap());

    assert_eq!(reloaded.slots[0].rotate_y, 20.0);
    assert_eq!(reloaded.texts[0].style.max_width, Some(900));
    let shadow = reloaded.texts[0].style.shadow.as_ref().unwrap();
    assert_eq!(shadow.offset, (3, 3));
    assert_eq!(shadow.blur, 4);
}

#[test]
fn registry_file_roundtrip_preserves_structure() {
    let dir = temp_dir("roundtrip");
    let template = TemplateDefinition::from_json_str(FULL_FEATURED).unwrap();

    let mut registry = TemplateRegistry::new();
    let path = registry
        .save_template(&template, &dir.join("full.json"))
        .unwrap();

    let mut reloaded = TemplateRegistry::new();
    reloaded.load_dir(&dir).unwrap();
    let loaded = reloaded.get("full").unwrap();
    assert_eq!(
        template.to_json_pretty().unwrap(),
        loaded.to_json_pretty().unwrap()
    );
    assert!(path.exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn default_template_roundtrips_through_disk() {
    let dir = temp_dir("default_roundtrip");
    let mut registry = TemplateRegistry::new();
    registry.load_with_default(&dir).unwrap();

    let written = TemplateDefinition::from_path(&dir.join("default.json")).unwrap();
    assert_eq!(
        written.to_json_pretty().unwrap(),
        default_template().to_json_pretty().unwrap()
    );

    std::fs::remove_dir_all(&dir).ok();
}
