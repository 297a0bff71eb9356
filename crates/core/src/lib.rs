pub mod month;
pub mod record;
pub mod value;

pub use month::{MonthTable, MonthTableError, ENGLISH_MONTHS};
pub use record::{CanonicalField, CanonicalRecord};
pub use value::{FieldValue, DEFAULT_TIMESTAMP_FORMAT};
