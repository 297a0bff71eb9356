use custodia_core::CanonicalRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::Path;

use crate::coerce::{coerce_row, RawRow};
use crate::derive::derive_record;
use crate::reader;
use crate::schema::SourceSchema;
use crate::validate::{validate_row, RowIssue};

/// Append contract of every loader. The engine never writes storage itself.
pub trait RecordSink {
    type Error;

    fn append(&mut self, record: CanonicalRecord) -> Result<(), Self::Error>;
}

impl RecordSink for Vec<CanonicalRecord> {
    type Error = Infallible;

    fn append(&mut self, record: CanonicalRecord) -> Result<(), Self::Error> {
        self.push(record);
        Ok(())
    }
}

/// Per-file counters. `dropped` is keyed by [`RowIssue::reason`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub rows_read: usize,
    pub emitted: usize,
    pub dropped: BTreeMap<&'static str, usize>,
    pub read_failures: usize,
}

impl TransformStats {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn record_drop(&mut self, issue: &RowIssue) {
        *self.dropped.entry(issue.reason()).or_default() += 1;
    }

    pub fn merge(&mut self, other: &TransformStats) {
        self.rows_read += other.rows_read;
        self.emitted += other.emitted;
        self.read_failures += other.read_failures;
        for (reason, count) in &other.dropped {
            *self.dropped.entry(*reason).or_default() += count;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    pub records: Vec<CanonicalRecord>,
    pub stats: TransformStats,
}

/// Coerce → validate → derive one row.
pub fn process_row(raw: &RawRow, schema: &SourceSchema) -> Result<CanonicalRecord, RowIssue> {
    let typed = coerce_row(raw, schema)?;
    validate_row(&typed, schema)?;
    Ok(derive_record(&typed, schema))
}

/// Run every row through the engine and hand valid records to `sink`.
/// Dropped rows are counted and logged; only the sink can fail.
pub fn transform<I, S>(schema: &SourceSchema, rows: I, sink: &mut S) -> Result<TransformStats, S::Error>
where
    I: IntoIterator<Item = RawRow>,
    S: RecordSink + ?Sized,
{
    let mut stats = TransformStats::default();
    for (index, raw) in rows.into_iter().enumerate() {
        stats.rows_read += 1;
        match process_row(&raw, schema) {
            Ok(record) => {
                sink.append(record)?;
                stats.emitted += 1;
            }
            Err(issue) => {
                tracing::debug!(source = %schema.id, row = index + 1, %issue, "row dropped");
                stats.record_drop(&issue);
            }
        }
    }
    tracing::info!(
        source = %schema.id,
        read = stats.rows_read,
        emitted = stats.emitted,
        dropped = stats.dropped_total(),
        "rows transformed"
    );
    Ok(stats)
}

/// In-memory variant of [`transform`].
pub fn transform_rows<I>(schema: &SourceSchema, rows: I) -> TransformOutcome
where
    I: IntoIterator<Item = RawRow>,
{
    let mut records = Vec::new();
    let stats = match transform(schema, rows, &mut records) {
        Ok(stats) => stats,
        Err(never) => match never {},
    };
    TransformOutcome { records, stats }
}

/// Read `path` with the source's reader hints and transform it into `sink`.
/// An unreadable file counts as zero rows.
pub fn transform_file<S>(schema: &SourceSchema, path: &Path, sink: &mut S) -> Result<TransformStats, S::Error>
where
    S: RecordSink + ?Sized,
{
    match reader::read_rows(path, &schema.reader) {
        Ok(rows) => transform(schema, rows, sink),
        Err(e) => {
            tracing::warn!(source = %schema.id, file = %path.display(), error = %e, "could not read file");
            Ok(TransformStats {
                read_failures: 1,
                ..TransformStats::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SharedTables, SourceConfig};
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> SourceSchema {
        let config: SourceConfig = serde_json::from_value(json!({
            "columns": {
                "Data": { "name": "data", "type": "date", "format": "%d/%m/%Y", "required": true },
                "Lançamento": { "name": "lancamento" },
                "Valor": { "name": "valor", "type": "decimal", "replace": [[",", "."]] }
            },
            "validations": { "filter_out_lancamentos": ["Saldo"] },
            "output_mapping": {
                "data": { "source": "data" },
                "lancamento": { "source": "lancamento" },
                "valor": { "source": "valor", "extract": "abs" }
            }
        }))
        .unwrap();
        SourceSchema::compile("Master", config, Arc::new(SharedTables::default())).unwrap()
    }

    fn raw(data: &str, lancamento: &str, valor: &str) -> RawRow {
        [("Data", Some(data)), ("Lançamento", Some(lancamento)), ("Valor", Some(valor))]
            .into_iter()
            .collect()
    }

    #[test]
    fn counts_emitted_and_dropped_rows() {
        let outcome = transform_rows(
            &schema(),
            vec![
                raw("02/01/2024", "Taxa", "-10,50"),
                raw("", "Taxa", "1"),
                raw("03/01/2024", "Saldo final", "99"),
            ],
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].valor, Decimal::new(1050, 2));
        assert_eq!(outcome.stats.rows_read, 3);
        assert_eq!(outcome.stats.emitted, 1);
        assert_eq!(outcome.stats.dropped.get("required_empty"), Some(&1));
        assert_eq!(outcome.stats.dropped.get("excluded_lancamento"), Some(&1));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let outcome = transform_rows(&schema(), Vec::new());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats, TransformStats::default());
    }

    #[test]
    fn stats_merge_adds_counts() {
        let mut total = TransformStats::default();
        let first = transform_rows(&schema(), vec![raw("", "Taxa", "1")]).stats;
        let second = transform_rows(&schema(), vec![raw("", "Taxa", "1"), raw("02/01/2024", "Taxa", "1")]).stats;
        total.merge(&first);
        total.merge(&second);
        assert_eq!(total.rows_read, 3);
        assert_eq!(total.emitted, 1);
        assert_eq!(total.dropped_total(), 2);
    }

    #[test]
    fn unreadable_file_counts_as_zero_rows() {
        let mut records: Vec<CanonicalRecord> = Vec::new();
        let stats = transform_file(&schema(), Path::new("/nonexistent/ptr_0524.csv"), &mut records).unwrap();
        assert!(records.is_empty());
        assert_eq!(stats.read_failures, 1);
        assert_eq!(stats.rows_read, 0);
    }
}
