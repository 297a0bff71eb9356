use custodia_core::{CanonicalField, CanonicalRecord};
use std::io::Write;
use thiserror::Error;

use crate::pipeline::RecordSink;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes records as CSV in canonical column order, header first.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    written: usize,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Result<Self, LoadError> {
        Self::with_delimiter(inner, b',')
    }

    pub fn with_delimiter(inner: W, delimiter: u8) -> Result<Self, LoadError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(inner);
        writer.write_record(CanonicalField::ALL.iter().map(|f| f.name()))?;
        Ok(Self { writer, written: 0 })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W, LoadError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| LoadError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    type Error = LoadError;

    fn append(&mut self, record: CanonicalRecord) -> Result<(), Self::Error> {
        self.writer.write_record(record.to_row())?;
        self.written += 1;
        Ok(())
    }
}

/// One JSON object per line, keys in canonical order.
pub struct JsonLinesSink<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W, LoadError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    type Error = LoadError;

    fn append(&mut self, record: CanonicalRecord) -> Result<(), Self::Error> {
        serde_json::to_writer(&mut self.inner, &record)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            data: "2024-12-03 00:00:00".to_string(),
            ano: Some(2024),
            mes: "Dezembro".to_string(),
            tp_fundo: "FIDC".to_string(),
            nm_fundo: "ALFA FIDC".to_string(),
            nm_categorizado: "ALFA FIDC".to_string(),
            lancamento: "Taxa".to_string(),
            valor: Decimal::new(15050, 2),
            codigo: "BTG".to_string(),
        }
    }

    #[test]
    fn csv_sink_writes_header_then_rows() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        sink.append(record()).unwrap();
        assert_eq!(sink.written(), 1);
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("data,ano,mes,tp_fundo,nm_fundo,nm_categorizado,lancamento,valor,codigo")
        );
        assert_eq!(
            lines.next(),
            Some("2024-12-03 00:00:00,2024,Dezembro,FIDC,ALFA FIDC,ALFA FIDC,Taxa,150.50,BTG")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_sink_with_no_records_is_header_only() {
        let sink = CsvSink::with_delimiter(Vec::new(), b';').unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("data;ano;mes"));
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_record() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.append(record()).unwrap();
        sink.append(record()).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: CanonicalRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record());
        assert!(lines[0].starts_with("{\"data\":"));
    }
}
