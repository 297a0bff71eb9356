use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use custodia_core::CanonicalRecord;
use custodia_import::{
    transform_file, CsvSink, Detection, JsonLinesSink, LoadError, RecordSink, SchemaRegistry,
    TransformStats,
};

use crate::OutputFormat;

enum Output {
    Csv(CsvSink<Box<dyn Write>>),
    Jsonl(JsonLinesSink<Box<dyn Write>>),
}

impl Output {
    fn open(path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let writer: Box<dyn Write> = match path {
            Some(p) => Box::new(BufWriter::new(
                File::create(p).with_context(|| format!("Failed to create {}", p.display()))?,
            )),
            None => Box::new(BufWriter::new(std::io::stdout().lock())),
        };
        Ok(match format {
            OutputFormat::Csv => Output::Csv(CsvSink::new(writer)?),
            OutputFormat::Jsonl => Output::Jsonl(JsonLinesSink::new(writer)),
        })
    }

    fn finish(self) -> Result<(), LoadError> {
        match self {
            Output::Csv(sink) => sink.finish().map(drop),
            Output::Jsonl(sink) => sink.finish().map(drop),
        }
    }
}

impl RecordSink for Output {
    type Error = LoadError;

    fn append(&mut self, record: CanonicalRecord) -> Result<(), Self::Error> {
        match self {
            Output::Csv(sink) => sink.append(record),
            Output::Jsonl(sink) => sink.append(record),
        }
    }
}

/// Execute the `process` command. A file whose source cannot be resolved is
/// skipped with a warning; only configuration and output failures abort.
pub fn execute(
    config_path: &Path,
    source: Option<&str>,
    output: Option<&Path>,
    format: OutputFormat,
    inputs: &[PathBuf],
) -> Result<()> {
    let registry = SchemaRegistry::load(config_path)
        .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;
    for (id, reason) in registry.rejected() {
        tracing::warn!(source = id, %reason, "source unavailable");
    }

    let forced = match source {
        Some(id) => Some(registry.get(id)?),
        None => None,
    };

    let files = expand_inputs(inputs)?;
    let mut sink = Output::open(output, format)?;
    let mut totals = TransformStats::default();
    let mut skipped = 0usize;

    for file in &files {
        let schema = match forced.map_or_else(|| detect(&registry, file), Detection::Found) {
            Detection::Found(schema) => schema,
            Detection::Rejected { source_id, reason } => {
                tracing::warn!(
                    file = %file.display(),
                    source = source_id,
                    %reason,
                    "file belongs to a malformed source; skipping"
                );
                skipped += 1;
                continue;
            }
            Detection::Unmatched => {
                tracing::warn!(file = %file.display(), "no source matches this file; skipping");
                skipped += 1;
                continue;
            }
        };
        tracing::info!(file = %file.display(), source = %schema.id, "processing");
        let stats = transform_file(schema, file, &mut sink)
            .with_context(|| format!("Failed to write records from {}", file.display()))?;
        totals.merge(&stats);
    }
    sink.finish().context("Failed to flush output")?;

    eprintln!("Processed {} file(s), skipped {}.", files.len() - skipped, skipped);
    eprintln!("  Rows read:     {}", totals.rows_read);
    eprintln!("  Rows emitted:  {}", totals.emitted);
    eprintln!("  Rows dropped:  {}", totals.dropped_total());
    for (reason, count) in &totals.dropped {
        eprintln!("    {reason:20} {count}");
    }
    if totals.read_failures > 0 {
        eprintln!("  Unreadable:    {}", totals.read_failures);
    }
    Ok(())
}

fn detect<'a>(registry: &'a SchemaRegistry, file: &Path) -> Detection<'a> {
    match file.file_name().and_then(|n| n.to_str()) {
        Some(name) => registry.detect_with_rejected(name),
        None => Detection::Unmatched,
    }
}

/// Files are taken as given; directories contribute their direct children,
/// sorted by name.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut children = Vec::new();
            for entry in std::fs::read_dir(input)
                .with_context(|| format!("Failed to list {}", input.display()))?
            {
                let path = entry?.path();
                if path.is_file() {
                    children.push(path);
                }
            }
            children.sort();
            files.extend(children);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}
