use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The six columns the allocation engine understands.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    #[schemars(description = "Day label the row belongs to (e.g. '05/08'). Not calendar-validated.")]
    Date,

    #[schemars(description = "Person the row describes.")]
    Name,

    #[schemars(description = "Role of the person; 'Kitchen' rows receive the kitchen share.")]
    Role,

    #[schemars(description = "Attendance marker; 'Yes' (case-insensitive) means present.")]
    Attendance,

    #[schemars(description = "Total tip pool for the date. Only the first non-blank value per date is used.")]
    Pool,

    #[schemars(description = "Performance value; divided by the weight divisor to give the staff weight.")]
    Value,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Date,
        CanonicalField::Name,
        CanonicalField::Role,
        CanonicalField::Attendance,
        CanonicalField::Pool,
        CanonicalField::Value,
    ];

    /// Key used for this field in a [`NormalizedRow`].
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Date => "Date",
            CanonicalField::Name => "Name",
            CanonicalField::Role => "Role",
            CanonicalField::Attendance => "Attendance",
            CanonicalField::Pool => "Pool",
            CanonicalField::Value => "Value",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed delimited file: header row kept verbatim, blank body rows dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.header.iter().position(|h| h == header)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One body row keyed by canonical field key (or the original header for
/// unmatched columns).
pub type NormalizedRow = BTreeMap<String, String>;

/// One person on one date, independent of the file shape it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: String,
    pub name: String,
    pub role: String,
    /// Raw attendance marker as it appeared in the input.
    pub attendance: String,
    pub present: bool,
    pub kitchen: bool,
    pub performance_value: Option<f64>,
    pub pool_amount: Option<f64>,
}

impl AttendanceRecord {
    pub fn is_present_staff(&self) -> bool {
        self.present && !self.kitchen
    }

    pub fn is_present_kitchen(&self) -> bool {
        self.present && self.kitchen
    }
}
