use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    foundation::error::{CoverError, CoverResult},
    template::model::TemplateDefinition,
};

/// Insertion-ordered store of validated templates, backed by a directory of
/// `*.json` files.
///
/// The registry is the external loading collaborator: the render engine never
/// touches the filesystem for templates and takes validated snapshots as
/// explicit parameters.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<TemplateDefinition>,
    template_dir: Option<PathBuf>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    /// Load every `*.json` in `dir` in filename order. Files that fail to
    /// parse or validate are skipped with a warning; a missing directory
    /// loads nothing.
    pub fn load_dir(&mut self, dir: &Path) -> CoverResult<()> {
        self.template_dir = Some(dir.to_path_buf());
        if !dir.exists() {
            return Ok(());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read template dir '{}'", dir.display()))?
        {
            let path = entry.context("read template dir entry")?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match TemplateDefinition::from_path(&path) {
                Ok(template) => self.insert(template),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping template");
                }
            }
        }
        Ok(())
    }

    /// Load `dir`, bootstrapping it with the default template when it yields
    /// nothing.
    pub fn load_with_default(&mut self, dir: &Path) -> CoverResult<()> {
        self.clear();
        self.load_dir(dir)?;
        if self.templates.is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create template dir '{}'", dir.display()))?;
            let template = default_template();
            let path = dir.join(format!("{}.json", template.key));
            self.save_template(&template, &path)?;
        }
        Ok(())
    }

    /// Validate, pretty-print and write a template, then register it.
    pub fn save_template(
        &mut self,
        template: &TemplateDefinition,
        path: &Path,
    ) -> CoverResult<PathBuf> {
        template.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir '{}'", parent.display()))?;
        }
        let json = template.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("write template '{}'", path.display()))?;
        self.insert(template.clone());
        Ok(path.to_path_buf())
    }

    pub fn get(&self, key: &str) -> Option<&TemplateDefinition> {
        self.templates.iter().find(|t| t.key == key)
    }

    pub fn require(&self, key: &str) -> CoverResult<&TemplateDefinition> {
        self.get(key)
            .ok_or_else(|| CoverError::template(format!("unknown template key '{key}'")))
    }

    pub fn all(&self) -> &[TemplateDefinition] {
        &self.templates
    }

    pub fn keys(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.key.as_str()).collect()
    }

    fn insert(&mut self, template: TemplateDefinition) {
        if let Some(existing) = self.templates.iter_mut().find(|t| t.key == template.key) {
            *existing = template;
        } else {
            self.templates.push(template);
        }
    }
}

/// The template written into empty template directories: a 1080x1920 cover
/// with one screenshot slot and title/subtitle text blocks.
pub fn default_template() -> TemplateDefinition {
    let json = r##"{
        "key": "default",
        "name": "Default Cover",
        "size": [1080, 1920],
        "background": {"kind": "color", "value": "#f5f5f5", "opacity": 1.0},
        "slots": [
            {
                "key": "screenshot-1",
                "box": [90, 420, 900, 1080],
                "radius": 32,
                "fit": "cover",
                "padding": 0,
                "align_x": "center",
                "align_y": "center"
            }
        ],
        "texts": [
            {
                "key": "title",
                "box": [90, 120, 900, 180],
                "style": {"size": 64, "color": "#111111", "align": "left"}
            },
            {
                "key": "subtitle",
                "box": [90, 280, 900, 100],
                "style": {"size": 36, "color": "#444444", "align": "left"}
            }
        ]
    }"##;
    TemplateDefinition::from_json_str(json).expect("default template is valid")
}
