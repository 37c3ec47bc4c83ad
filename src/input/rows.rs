use std::path::Path;

use anyhow::Context as _;

use crate::{
    foundation::error::{CoverError, CoverResult},
    template::model::{RenderInput, TemplateDefinition},
};

/// Pre-schema column names that are no longer accepted; rejecting them
/// early gives a clearer message than "unknown column".
const LEGACY_COLUMNS: &[&str] = &[
    "title",
    "subtitle",
    "background",
    "screenshots",
    "screenshot",
    "template",
    "layout",
    "layout_key",
    "output",
];

const RESERVED_COLUMNS: &[&str] = &["template_key", "output_name", "background_path"];

/// One CSV data row: its 1-based row number and the parse result.
#[derive(Debug)]
pub struct ParsedRow {
    pub row: usize,
    pub input: CoverResult<RenderInput>,
}

/// Strip the junk spreadsheet exports put into header cells: surrounding
/// whitespace plus leading BOM / zero-width characters (U+FEFF, U+200B,
/// U+200C, U+200D, U+2060).
pub fn clean_column(raw: &str) -> &str {
    raw.trim().trim_start_matches([
        '\u{feff}', '\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}',
    ])
}

/// Read a batch CSV. Header problems (missing required columns, legacy or
/// unknown names) reject the whole file; data rows fail individually.
pub fn read_rows(path: &Path) -> CoverResult<Vec<ParsedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("read csv '{}'", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("read csv header '{}'", path.display()))?
        .clone();
    validate_header(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let input = match record {
            Ok(record) => render_input_from_row(&headers, &record),
            Err(e) => Err(CoverError::input(format!("row {row}: {e}"))),
        };
        rows.push(ParsedRow { row, input });
    }
    Ok(rows)
}

/// Check cleaned, lowercased header names against the schema:
/// `template_key`, `output_name`, `background_path`, `text.<key>`,
/// `text.<key>.color`, `slot.<key>`.
pub fn validate_header(headers: &csv::StringRecord) -> CoverResult<()> {
    let cols: Vec<String> = headers
        .iter()
        .map(clean_column)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_lowercase())
        .collect();

    let missing: Vec<&str> = ["template_key", "output_name"]
        .into_iter()
        .filter(|required| !cols.iter().any(|c| c.as_str() == *required))
        .collect();
    if !missing.is_empty() {
        return Err(CoverError::input(format!(
            "csv is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let legacy: Vec<&String> = cols
        .iter()
        .filter(|c| LEGACY_COLUMNS.contains(&c.as_str()))
        .collect();
    if !legacy.is_empty() {
        return Err(CoverError::input(format!(
            "csv uses legacy columns that are no longer supported: {}",
            legacy
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let unknown: Vec<&String> = cols
        .iter()
        .filter(|c| {
            !RESERVED_COLUMNS.contains(&c.as_str())
                && !c.starts_with("text.")
                && !c.starts_with("slot.")
        })
        .collect();
    if !unknown.is_empty() {
        return Err(CoverError::input(format!(
            "csv has unknown columns: {}; supported: template_key, output_name, \
             background_path, text.<key>, text.<key>.color, slot.<key>",
            unknown
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(())
}

/// Map one CSV record onto a `RenderInput`. The `text.`/`slot.` prefixes
/// and the `.color` suffix match case-insensitively; the `<key>` segment
/// is kept verbatim and matched case-sensitively against the template
/// later.
pub fn render_input_from_row(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
) -> CoverResult<RenderInput> {
    let mut input = RenderInput::default();

    for (raw_col, raw_value) in headers.iter().zip(record.iter()) {
        let col = clean_column(raw_col);
        if col.is_empty() {
            continue;
        }
        let value = raw_value.trim();
        let low = col.to_lowercase();

        if let Some(rest) = strip_prefix_ci(col, "text.") {
            if let Some(key) = strip_suffix_ci(rest, ".color") {
                if !key.trim().is_empty() {
                    input
                        .text_colors
                        .insert(key.trim().to_string(), value.to_string());
                }
            } else if !rest.trim().is_empty() {
                input.texts.insert(rest.trim().to_string(), value.to_string());
            }
        } else if let Some(key) = strip_prefix_ci(col, "slot.") {
            if !key.trim().is_empty() && !value.is_empty() {
                input
                    .slot_paths
                    .insert(key.trim().to_string(), value.to_string());
            }
        } else if low == "template_key" {
            input.template_key = value.to_string();
        } else if low == "output_name" {
            input.output_name = value.to_string();
        } else if low == "background_path" && !value.is_empty() {
            input.background_path = Some(value.to_string());
        }
    }

    if input.template_key.is_empty() {
        return Err(CoverError::input(
            "required column template_key is missing or empty",
        ));
    }
    if input.output_name.is_empty() {
        return Err(CoverError::input(
            "required column output_name is missing or empty",
        ));
    }
    Ok(input)
}

/// Every keyed entry must name a template element exactly; a case mismatch
/// is an unknown column, not a fuzzy match.
pub fn validate_input_keys(template: &TemplateDefinition, input: &RenderInput) -> CoverResult<()> {
    let mut unknown = Vec::new();
    for key in input.texts.keys() {
        if template.text(key).is_none() {
            unknown.push(format!("text.{key}"));
        }
    }
    for key in input.text_colors.keys() {
        if template.text(key).is_none() {
            unknown.push(format!("text.{key}.color"));
        }
    }
    for key in input.slot_paths.keys() {
        if template.slot(key).is_none() {
            unknown.push(format!("slot.{key}"));
        }
    }
    if !unknown.is_empty() {
        return Err(CoverError::input(format!(
            "columns do not match any key of template '{}': {}",
            template.key,
            unknown.join(", ")
        )));
    }
    Ok(())
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}
