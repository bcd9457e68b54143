use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::driver::counter::ProgressCounter;
use crate::driver::ExecutionContext;
use crate::error::LoopResult;
use crate::project::sample::{Sample, SAMPLE_NAME_ATTR};

/// Per-sample stats file written by pipelines: `key<TAB>value<TAB>pipeline`
pub const STATS_FILE: &str = "stats.tsv";
/// Per-sample reported objects: `key<TAB>filename<TAB>anchor_text<TAB>anchor_image<TAB>annotation`
pub const OBJECTS_FILE: &str = "objects.tsv";

const OBJECT_COLUMNS: [&str; 5] = ["key", "filename", "anchor_text", "anchor_image", "annotation"];

/// Tables written by a summary
#[derive(Debug, PartialEq, Eq)]
pub struct SummaryFiles {
    pub stats: PathBuf,
    pub objects: PathBuf,
}

type Row = BTreeMap<String, String>;

/// Collect every sample's stats and reported objects into project-wide tables
pub fn summarize(ctx: &ExecutionContext) -> LoopResult<SummaryFiles> {
    let samples = ctx.samples()?;
    let mut counter = ProgressCounter::new(samples.len());
    let stats = stats_summary(ctx, &samples, &mut counter)?;
    counter.reset();
    let objects = objects_summary(ctx, &samples, &mut counter)?;
    Ok(SummaryFiles { stats, objects })
}

fn stats_summary(ctx: &ExecutionContext, samples: &[&Sample], counter: &mut ProgressCounter) -> LoopResult<PathBuf> {
    let mut columns: Vec<String> = vec![SAMPLE_NAME_ATTR.to_string()];
    let mut rows: Vec<Row> = Vec::new();
    let mut missing = Vec::new();

    info!("Creating stats summary...");
    for sample in samples {
        info!("{}", counter.show(&sample.name, "sample", None));
        let mut row = BTreeMap::new();
        row.insert(SAMPLE_NAME_ATTR.to_string(), sample.name.clone());
        for key in sample.attributes.keys() {
            if let Some(value) = sample.attr(key) {
                push_column(&mut columns, key);
                row.insert(key.clone(), value);
            }
        }

        let stats_file = sample.output_folder.join(STATS_FILE);
        if !stats_file.is_file() {
            missing.push(stats_file);
            continue;
        }
        for (key, value) in read_stats(&stats_file)? {
            push_column(&mut columns, &key);
            row.insert(key, value);
        }
        rows.push(row);
    }
    warn_missing("Stats", &missing);

    let path = project_file(ctx, "stats_summary.tsv");
    write_table(&path, &columns, &rows)?;
    info!("Summary (n={}): {}", rows.len(), path.display());
    Ok(path)
}

fn objects_summary(ctx: &ExecutionContext, samples: &[&Sample], counter: &mut ProgressCounter) -> LoopResult<PathBuf> {
    let mut columns: Vec<String> = OBJECT_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.push(SAMPLE_NAME_ATTR.to_string());
    let mut rows: Vec<Row> = Vec::new();
    let mut missing = Vec::new();

    info!("Creating objects summary...");
    for sample in samples {
        info!("{}", counter.show(&sample.name, "sample", None));
        let objects_file = sample.output_folder.join(OBJECTS_FILE);
        if !objects_file.is_file() {
            missing.push(objects_file);
            continue;
        }
        let text = fs::read_to_string(&objects_file)?;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let mut row: Row = OBJECT_COLUMNS
                .iter()
                .zip(line.split('\t'))
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .collect();
            row.insert(SAMPLE_NAME_ATTR.to_string(), sample.name.clone());
            rows.push(row);
        }
    }
    warn_missing("Object", &missing);

    let path = project_file(ctx, "objs_summary.tsv");
    write_table(&path, &columns, &rows)?;
    info!("Objects (n={}): {}", rows.len(), path.display());
    Ok(path)
}

fn project_file(ctx: &ExecutionContext, suffix: &str) -> PathBuf {
    let info = &ctx.project.info;
    info.output_dir.join(format!("{}_{suffix}", info.name))
}

fn warn_missing(kind: &str, missing: &[PathBuf]) {
    if !missing.is_empty() {
        let listed = missing.iter().map(|p| p.display().to_string()).collect::<Vec<_>>();
        warn!("{} files missing for {} samples: {}", kind, missing.len(), listed.join(", "));
    }
}

fn push_column(columns: &mut Vec<String>, key: &str) {
    if !columns.iter().any(|c| c == key) {
        columns.push(key.to_string());
    }
}

/// Stats of one sample, last value per (key, pipeline) wins
///
/// A key reported by more than one pipeline becomes `pipeline:key`.
fn read_stats(path: &Path) -> LoopResult<Vec<(String, String)>> {
    let text = fs::read_to_string(path)?;
    let mut by_key_pipeline: Vec<((String, String), String)> = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split('\t');
        let key = fields.next().unwrap_or_default().to_string();
        let value = fields.next().unwrap_or_default().to_string();
        let pipeline = fields.next().unwrap_or_default().to_string();
        let slot = (key, pipeline);
        match by_key_pipeline.iter_mut().find(|(k, _)| *k == slot) {
            Some(entry) => entry.1 = value,
            None => by_key_pipeline.push((slot, value)),
        }
    }

    let stats = by_key_pipeline
        .iter()
        .map(|((key, pipeline), value)| {
            let shared = by_key_pipeline.iter().filter(|((k, _), _)| k == key).count() > 1;
            let column = if shared { format!("{pipeline}:{key}") } else { key.clone() };
            (column, value.clone())
        })
        .collect();
    Ok(stats)
}

fn write_table(path: &Path, columns: &[String], rows: &[Row]) -> LoopResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let header: Vec<Cow<str>> = columns.iter().map(|c| tsv_cell(c)).collect();
    let mut out = header.join("\t");
    out.push('\n');
    for row in rows {
        let cells: Vec<Cow<str>> = columns
            .iter()
            .map(|c| tsv_cell(row.get(c).map_or("", String::as_str)))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Quote a cell holding a tab, line break or quote; inner quotes are doubled
fn tsv_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\t', '\n', '\r', '"']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
