pub mod coerce;
pub mod derive;
pub mod fund;
pub mod loader;
pub mod pipeline;
pub mod reader;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod validate;
pub(crate) mod util;

pub use coerce::{coerce_row, RawRow, TypedRow};
pub use derive::derive_record;
pub use fund::{FundAliasTable, FundTypeTable, UNKNOWN_FUND_TYPE};
pub use loader::{CsvSink, JsonLinesSink, LoadError};
pub use pipeline::{
    process_row, transform, transform_file, transform_rows, RecordSink, TransformOutcome,
    TransformStats,
};
pub use reader::{read_rows, read_table, ReadError, Table};
pub use registry::{Detection, SchemaError, SchemaRegistry};
pub use rules::{CategorizationTable, CategoryRule};
pub use schema::{DerivationRule, Extract, FieldSpec, SourceSchema, ValueType};
pub use validate::{validate_row, RowIssue};
