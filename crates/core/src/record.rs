use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::value::{FieldValue, DEFAULT_TIMESTAMP_FORMAT};

/// The fixed set of canonical output fields, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Data,
    Ano,
    Mes,
    TpFundo,
    NmFundo,
    NmCategorizado,
    Lancamento,
    Valor,
    Codigo,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Data,
        CanonicalField::Ano,
        CanonicalField::Mes,
        CanonicalField::TpFundo,
        CanonicalField::NmFundo,
        CanonicalField::NmCategorizado,
        CanonicalField::Lancamento,
        CanonicalField::Valor,
        CanonicalField::Codigo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Data => "data",
            CanonicalField::Ano => "ano",
            CanonicalField::Mes => "mes",
            CanonicalField::TpFundo => "tp_fundo",
            CanonicalField::NmFundo => "nm_fundo",
            CanonicalField::NmCategorizado => "nm_categorizado",
            CanonicalField::Lancamento => "lancamento",
            CanonicalField::Valor => "valor",
            CanonicalField::Codigo => "codigo",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown canonical field: '{s}'"))
    }
}

/// One normalized transaction, identical in shape for every custodian.
///
/// Field order here is the column order written by every loader.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Reference date as a timestamp string.
    pub data: String,
    pub ano: Option<i32>,
    /// Month name in Portuguese.
    pub mes: String,
    pub tp_fundo: String,
    pub nm_fundo: String,
    pub nm_categorizado: String,
    /// Transaction category after categorization.
    pub lancamento: String,
    /// Always non-negative.
    pub valor: Decimal,
    pub codigo: String,
}

impl CanonicalRecord {
    /// Store a derived value in its canonical slot, converting it to the
    /// slot's type. Values that cannot be represented become the slot's
    /// empty value rather than an error.
    pub fn set(&mut self, field: CanonicalField, value: &FieldValue) {
        match field {
            CanonicalField::Data => self.data = value.format_with(DEFAULT_TIMESTAMP_FORMAT),
            CanonicalField::Ano => self.ano = to_year(value),
            CanonicalField::Mes => self.mes = value.to_string(),
            CanonicalField::TpFundo => self.tp_fundo = value.to_string(),
            CanonicalField::NmFundo => self.nm_fundo = value.to_string(),
            CanonicalField::NmCategorizado => self.nm_categorizado = value.to_string(),
            CanonicalField::Lancamento => self.lancamento = value.to_string(),
            CanonicalField::Valor => self.valor = to_amount(value),
            CanonicalField::Codigo => self.codigo = value.to_string(),
        }
    }

    /// Field values rendered as strings, in canonical order.
    pub fn to_row(&self) -> [String; 9] {
        [
            self.data.clone(),
            self.ano.map(|y| y.to_string()).unwrap_or_default(),
            self.mes.clone(),
            self.tp_fundo.clone(),
            self.nm_fundo.clone(),
            self.nm_categorizado.clone(),
            self.lancamento.clone(),
            self.valor.to_string(),
            self.codigo.clone(),
        ]
    }
}

fn to_year(value: &FieldValue) -> Option<i32> {
    match value {
        FieldValue::Integer(i) => i32::try_from(*i).ok(),
        FieldValue::Date(_) => value.year(),
        FieldValue::Decimal(d) => d.trunc().to_i32(),
        FieldValue::Text(s) => s.trim().parse().ok(),
        FieldValue::Empty => None,
    }
}

fn to_amount(value: &FieldValue) -> Decimal {
    let amount = match value {
        FieldValue::Text(s) => Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO),
        other => other.as_decimal().unwrap_or(Decimal::ZERO),
    };
    amount.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn canonical_field_names_roundtrip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_str(field.name()).unwrap(), field);
        }
        assert!(CanonicalField::from_str("saldo").is_err());
    }

    #[test]
    fn set_formats_dates_as_timestamps() {
        let mut record = CanonicalRecord::default();
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap().and_hms_opt(0, 0, 0).unwrap();
        record.set(CanonicalField::Data, &FieldValue::Date(date));
        record.set(CanonicalField::Ano, &FieldValue::Date(date));
        assert_eq!(record.data, "2024-05-07 00:00:00");
        assert_eq!(record.ano, Some(2024));
    }

    #[test]
    fn set_keeps_amount_non_negative() {
        let mut record = CanonicalRecord::default();
        record.set(CanonicalField::Valor, &FieldValue::Decimal(Decimal::new(-15050, 2)));
        assert_eq!(record.valor, Decimal::new(15050, 2));

        record.set(CanonicalField::Valor, &FieldValue::Empty);
        assert_eq!(record.valor, Decimal::ZERO);

        record.set(CanonicalField::Valor, &FieldValue::text("-12.5"));
        assert_eq!(record.valor, Decimal::new(125, 1));
    }

    #[test]
    fn empty_values_leave_blank_slots() {
        let mut record = CanonicalRecord::default();
        record.set(CanonicalField::Codigo, &FieldValue::Empty);
        record.set(CanonicalField::Ano, &FieldValue::Empty);
        assert_eq!(record.codigo, "");
        assert_eq!(record.ano, None);
    }

    #[test]
    fn to_row_follows_canonical_order() {
        let record = CanonicalRecord {
            data: "2024-01-15 00:00:00".to_string(),
            ano: Some(2024),
            mes: "Janeiro".to_string(),
            tp_fundo: "FIDC".to_string(),
            nm_fundo: "ALFA FIDC".to_string(),
            nm_categorizado: "ALFA FIDC".to_string(),
            lancamento: "Taxa".to_string(),
            valor: Decimal::new(1000, 2),
            codigo: "BTG".to_string(),
        };
        let row = record.to_row();
        assert_eq!(row[0], "2024-01-15 00:00:00");
        assert_eq!(row[1], "2024");
        assert_eq!(row[7], "10.00");
        assert_eq!(row[8], "BTG");
    }

    #[test]
    fn json_keys_follow_canonical_order() {
        let json = serde_json::to_string(&CanonicalRecord::default()).unwrap();
        let positions: Vec<usize> = CanonicalField::ALL
            .iter()
            .map(|f| json.find(&format!("\"{}\":", f.name())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
