//! The record type stored in the raffle CSV file

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Column header of the store file, in on-disk order
pub const STORE_HEADER: [&str; 4] = ["numero", "nome", "telefone", "data_compra"];

/// Format of the `data_compra` column (local time)
pub const PURCHASE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// One row of the store: a raffle number sold to a buyer
///
/// Serde field names match the CSV header, so JSON output uses the same
/// vocabulary as the file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Raffle number; unique across the store, compared as text
    #[serde(rename = "numero")]
    pub number: String,
    /// Buyer name
    #[serde(rename = "nome")]
    pub name: String,
    /// Buyer phone, free-form and possibly empty
    #[serde(rename = "telefone")]
    pub phone: String,
    /// Purchase timestamp in `DD/MM/YYYY HH:MM`, set at write time
    #[serde(rename = "data_compra")]
    pub purchased_at: String,
}

impl Record {
    /// Create a new record
    pub fn new(
        number: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        purchased_at: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            phone: phone.into(),
            purchased_at: purchased_at.into(),
        }
    }

    /// Cells in on-disk column order
    pub(crate) fn as_row(&self) -> [&str; 4] {
        [
            self.number.as_str(),
            self.name.as_str(),
            self.phone.as_str(),
            self.purchased_at.as_str(),
        ]
    }

    /// Build a record from a data row of the store file
    ///
    /// Columns are positional; cells missing from short rows become empty
    /// strings, mirroring how the store treats hand-edited files.
    pub(crate) fn from_store_row(row: &csv::StringRecord) -> Self {
        Self {
            number: row.get(0).unwrap_or("").to_string(),
            name: row.get(1).unwrap_or("").to_string(),
            phone: row.get(2).unwrap_or("").to_string(),
            purchased_at: row.get(3).unwrap_or("").to_string(),
        }
    }
}

/// Current local time formatted for the `data_compra` column
pub fn purchase_timestamp() -> String {
    Local::now().format(PURCHASE_DATE_FORMAT).to_string()
}

/// Check whether a raffle number can be stored
///
/// A number is valid iff it parses as an `i64`, which is exactly what the
/// sorted listing needs from every stored value.
pub fn valid_number(number: &str) -> bool {
    number.parse::<i64>().is_ok()
}
