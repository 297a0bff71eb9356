use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use custodia_import::{read_table, Detection, SchemaRegistry, SourceSchema};

/// Whether one statement file can be processed, and why not.
#[derive(Debug)]
pub struct Verdict {
    pub file: String,
    pub source: Option<String>,
    pub rows: usize,
    pub missing_columns: Vec<String>,
    pub problem: Option<String>,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        self.problem.is_none() && self.missing_columns.is_empty()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:    {}", self.file)?;
        writeln!(f, "Source:  {}", self.source.as_deref().unwrap_or("-"))?;
        writeln!(f, "Rows:    {}", self.rows)?;
        if !self.missing_columns.is_empty() {
            writeln!(f, "Missing required columns: {}", self.missing_columns.join(", "))?;
        }
        if let Some(problem) = &self.problem {
            writeln!(f, "Problem: {problem}")?;
        }
        writeln!(f, "Valid:   {}", if self.is_valid() { "yes" } else { "no" })
    }
}

/// Execute the `validate` command: resolve the file's source, read it with
/// that source's reader hints and check the required columns are present.
pub fn execute(
    config_path: &Path,
    source: Option<&str>,
    output: Option<&Path>,
    file: &Path,
) -> Result<()> {
    let registry = SchemaRegistry::load(config_path)
        .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

    let verdict = validate_file(&registry, source, file);
    print!("{verdict}");
    if let Some(path) = output {
        std::fs::write(path, verdict.to_string())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "verdict written");
    }

    if verdict.is_valid() {
        Ok(())
    } else {
        anyhow::bail!("{} is not processable", file.display())
    }
}

fn validate_file(registry: &SchemaRegistry, source: Option<&str>, file: &Path) -> Verdict {
    let mut verdict = Verdict {
        file: file.display().to_string(),
        source: None,
        rows: 0,
        missing_columns: Vec::new(),
        problem: None,
    };

    let schema = match resolve(registry, source, file) {
        Ok(schema) => schema,
        Err(problem) => {
            verdict.problem = Some(problem);
            return verdict;
        }
    };
    verdict.source = Some(schema.id.clone());

    match read_table(file, &schema.reader) {
        Ok(table) => {
            verdict.rows = table.rows.len();
            verdict.missing_columns = schema
                .fields
                .iter()
                .filter(|spec| spec.required && !table.has_column(&spec.raw_name))
                .map(|spec| spec.raw_name.clone())
                .collect();
        }
        Err(e) => verdict.problem = Some(format!("unreadable: {e}")),
    }
    verdict
}

fn resolve<'a>(
    registry: &'a SchemaRegistry,
    source: Option<&str>,
    file: &Path,
) -> Result<&'a SourceSchema, String> {
    if let Some(id) = source {
        return registry.get(id).map_err(|e| e.to_string());
    }
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    match registry.detect_with_rejected(name) {
        Detection::Found(schema) => Ok(schema),
        Detection::Rejected { source_id, reason } => {
            Err(format!("source '{source_id}' is malformed: {reason}"))
        }
        Detection::Unmatched => Err("no source matches this file name".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_json(
            r#"{ "custodiantes": {
                "Master": {
                    "file_patterns": ["ptr_"],
                    "columns": {
                        "DataLancamento": { "name": "data", "type": "date", "format": "%d/%m/%Y", "required": true },
                        "Historico": { "name": "lancamento" }
                    },
                    "output_mapping": { "data": { "source": "data" } }
                },
                "Daycoval": {
                    "file_patterns": ["demonstrativo"],
                    "output_mapping": { "data": { "source": "data" } }
                }
            } }"#,
        )
        .unwrap()
    }

    #[test]
    fn processable_file_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("PTR_0524.csv");
        std::fs::write(&file, "DataLancamento;Historico\n02/05/2024;TED\n03/05/2024;Taxa\n").unwrap();

        let verdict = validate_file(&registry(), None, &file);
        assert!(verdict.is_valid(), "{verdict}");
        assert_eq!(verdict.source.as_deref(), Some("Master"));
        assert_eq!(verdict.rows, 2);
    }

    #[test]
    fn missing_required_column_is_invalid_even_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ptr_0624.csv");
        std::fs::write(&file, "Data;Historico\n").unwrap();

        let verdict = validate_file(&registry(), None, &file);
        assert!(!verdict.is_valid());
        assert_eq!(verdict.missing_columns, vec!["DataLancamento".to_string()]);
        assert!(verdict.to_string().contains("Valid:   no"));
    }

    #[test]
    fn unmatched_and_malformed_sources_are_reported() {
        let registry = registry();

        let unmatched = validate_file(&registry, None, Path::new("outro.csv"));
        assert_eq!(unmatched.source, None);
        assert!(unmatched.problem.unwrap().contains("no source"));

        let rejected = validate_file(&registry, None, Path::new("Demonstrativo 05-2024.xlsx"));
        assert!(rejected.problem.unwrap().contains("'Daycoval' is malformed"));
    }

    #[test]
    fn forced_source_skips_detection_and_missing_file_is_unreadable() {
        let verdict = validate_file(&registry(), Some("master"), Path::new("/nao/existe.csv"));
        assert_eq!(verdict.source.as_deref(), Some("Master"));
        assert!(verdict.problem.unwrap().starts_with("unreadable"));
    }
}
