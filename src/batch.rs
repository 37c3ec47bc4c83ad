use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    foundation::error::{CoverError, CoverResult},
    input::rows::{ParsedRow, validate_input_keys},
    render::compose::{RenderIssue, compose},
    template::{model::RenderInput, registry::TemplateRegistry},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct BatchOpts {
    /// Fan rows out over a rayon pool. Rows are independent renders, so
    /// the only cross-row state is the collision pre-scan, which runs
    /// before the fan-out.
    pub parallel: bool,
    /// Worker thread override (parallel mode only).
    pub threads: Option<usize>,
}

#[derive(Debug)]
pub struct RenderedRow {
    pub row: usize,
    pub path: PathBuf,
    pub issues: Vec<RenderIssue>,
}

#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    pub error: CoverError,
}

/// Accumulated outcome of a batch: every row either rendered (possibly
/// with per-element issues) or failed. The batch itself never aborts on a
/// row.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub rendered: Vec<RenderedRow>,
    pub failures: Vec<RowFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.rendered.len() + self.failures.len()
    }
}

/// Render every parsed row against the registry into `out_dir`.
///
/// Duplicate `output_name`s are claimed first-row-wins; later claimants
/// are reported as collisions and skipped rather than silently
/// overwritten.
#[tracing::instrument(skip(registry, rows), fields(row_count = rows.len()))]
pub fn run_batch(
    registry: &TemplateRegistry,
    rows: Vec<ParsedRow>,
    out_dir: &Path,
    opts: BatchOpts,
) -> CoverResult<BatchReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir '{}'", out_dir.display()))?;

    let mut report = BatchReport::default();
    let mut claimed = HashSet::<String>::new();
    let mut work = Vec::<(usize, RenderInput)>::new();

    for parsed in rows {
        match parsed.input {
            Ok(input) => {
                if !claimed.insert(input.output_name.clone()) {
                    report.failures.push(RowFailure {
                        row: parsed.row,
                        error: CoverError::collision(format!(
                            "output name '{}' already used by an earlier row",
                            input.output_name
                        )),
                    });
                    continue;
                }
                work.push((parsed.row, input));
            }
            Err(error) => report.failures.push(RowFailure {
                row: parsed.row,
                error,
            }),
        }
    }

    let outcomes: Vec<Result<RenderedRow, RowFailure>> = if opts.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.threads.unwrap_or(0))
            .build()
            .context("build rayon pool")?;
        pool.install(|| {
            work.par_iter()
                .map(|(row, input)| render_row(registry, *row, input, out_dir))
                .collect()
        })
    } else {
        work.iter()
            .map(|(row, input)| render_row(registry, *row, input, out_dir))
            .collect()
    };

    for outcome in outcomes {
        match outcome {
            Ok(rendered) => report.rendered.push(rendered),
            Err(failure) => {
                tracing::warn!(row = failure.row, error = %failure.error, "row failed");
                report.failures.push(failure);
            }
        }
    }
    report.failures.sort_by_key(|f| f.row);
    Ok(report)
}

fn render_row(
    registry: &TemplateRegistry,
    row: usize,
    input: &RenderInput,
    out_dir: &Path,
) -> Result<RenderedRow, RowFailure> {
    let fail = |error: CoverError| RowFailure { row, error };

    let template = registry.require(&input.template_key).map_err(fail)?;
    validate_input_keys(template, input).map_err(fail)?;

    let rendered = compose(template, input).map_err(fail)?;
    let path = out_dir.join(&input.output_name);
    rendered.layer.save_png(&path).map_err(fail)?;

    Ok(RenderedRow {
        row,
        path,
        issues: rendered.issues,
    })
}
