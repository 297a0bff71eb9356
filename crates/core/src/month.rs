use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// English month names in calendar order, as rendered by chrono's `%B`.
pub const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const PORTUGUESE_MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonthTableError {
    #[error("Unknown English month name: '{0}'")]
    UnknownMonth(String),
    #[error("Month translation is missing an entry for {0}")]
    MissingMonth(&'static str),
}

/// English → local month-name lookup used by the `month_name_pt` operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTable {
    names: [String; 12],
}

impl Default for MonthTable {
    fn default() -> Self {
        Self::portuguese()
    }
}

impl MonthTable {
    pub fn portuguese() -> Self {
        MonthTable {
            names: PORTUGUESE_MONTHS.map(str::to_string),
        }
    }

    /// Build a table from `(english, translated)` pairs. All twelve months
    /// must be present; English names are matched case-insensitively.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, MonthTableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut names: [Option<String>; 12] = Default::default();
        for (english, translated) in pairs {
            let idx = ENGLISH_MONTHS
                .iter()
                .position(|m| m.eq_ignore_ascii_case(english.trim()))
                .ok_or_else(|| MonthTableError::UnknownMonth(english.to_string()))?;
            names[idx] = Some(translated.to_string());
        }

        let mut resolved: [String; 12] = Default::default();
        for (idx, name) in names.into_iter().enumerate() {
            resolved[idx] = name.ok_or(MonthTableError::MissingMonth(ENGLISH_MONTHS[idx]))?;
        }
        Ok(MonthTable { names: resolved })
    }

    pub fn translate_english(&self, english: &str) -> Option<&str> {
        ENGLISH_MONTHS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(english))
            .map(|idx| self.names[idx].as_str())
    }

    /// Month name for `date`, looked up through its locale-independent
    /// English name.
    pub fn translate(&self, date: NaiveDateTime) -> &str {
        &self.names[date.month0() as usize]
    }
}
