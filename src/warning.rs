use crate::engine::AllocationOutcome;
use crate::error::TipPoolError;
use crate::schema::{AttendanceRecord, CanonicalField};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-facing notice produced during a computation pass.
///
/// Blocking warnings mean nothing was computed and the previous report is
/// still current. Non-blocking warnings accompany a fresh report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    NoRows,
    NoDateColumns,
    IncompleteMapping { missing: Vec<CanonicalField> },
    WeightsWithoutSheet,
    InvalidInput { details: String },
    MissingColumns { missing: Vec<CanonicalField> },
    EmptyValue { date: String, name: String },
    EmptyWeight { date: String, name: String },
    ZeroPool { date: String },
    DuplicatePerson { name: String },
}

impl Warning {
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Warning::NoRows
                | Warning::NoDateColumns
                | Warning::IncompleteMapping { .. }
                | Warning::WeightsWithoutSheet
                | Warning::InvalidInput { .. }
        )
    }

    pub fn from_error(err: &TipPoolError) -> Self {
        match err {
            TipPoolError::EmptyInput => Warning::NoRows,
            TipPoolError::NoDateColumns => Warning::NoDateColumns,
            TipPoolError::IncompleteMapping(missing) => Warning::IncompleteMapping {
                missing: missing.clone(),
            },
            other => Warning::InvalidInput {
                details: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoRows => write!(f, "No data rows found in the file."),
            Warning::NoDateColumns => write!(
                f,
                "No date columns found. Expected headers like 05/08 after the name column."
            ),
            Warning::IncompleteMapping { missing } => write!(
                f,
                "Map every column before computing. Still unmapped: {}.",
                join_fields(missing)
            ),
            Warning::WeightsWithoutSheet => {
                write!(f, "Load the attendance sheet before loading weights.")
            }
            Warning::InvalidInput { details } => write!(f, "Could not read the input: {}", details),
            Warning::MissingColumns { missing } => write!(
                f,
                "Missing columns: {}. Affected fields use defaults.",
                join_fields(missing)
            ),
            Warning::EmptyValue { date, name } => write!(
                f,
                "{} is present on {} but has an empty Value; they receive no weighted share.",
                name, date
            ),
            Warning::EmptyWeight { date, name } => write!(
                f,
                "{} is present on {} but the weights sheet has no value; they receive no weighted share.",
                name, date
            ),
            Warning::ZeroPool { date } => write!(
                f,
                "No Pool value for date {}. Set it in any row for that date.",
                date
            ),
            Warning::DuplicatePerson { name } => write!(
                f,
                "{} appears on more than one row; only the first row is used.",
                name
            ),
        }
    }
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One warning per date whose effective pool is zero.
pub fn zero_pool_warnings(outcome: &AllocationOutcome) -> Vec<Warning> {
    outcome
        .days
        .iter()
        .filter(|day| day.pool == 0.0)
        .map(|day| Warning::ZeroPool {
            date: day.date.clone(),
        })
        .collect()
}

/// One warning per present staff record without a performance value.
/// `from_weights_sheet` picks the wording for cross-tab weights.
pub fn missing_value_warnings(
    records: &[AttendanceRecord],
    from_weights_sheet: bool,
) -> Vec<Warning> {
    records
        .iter()
        .filter(|r| r.is_present_staff() && r.performance_value.is_none())
        .map(|r| {
            let (date, name) = (r.date.clone(), r.name.clone());
            if from_weights_sheet {
                Warning::EmptyWeight { date, name }
            } else {
                Warning::EmptyValue { date, name }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{allocate, AllocationRule, DatePools};

    fn staff(date: &str, name: &str, value: Option<f64>) -> AttendanceRecord {
        AttendanceRecord {
            date: date.to_string(),
            name: name.to_string(),
            role: "FOH".to_string(),
            attendance: "Yes".to_string(),
            present: true,
            kitchen: false,
            performance_value: value,
            pool_amount: None,
        }
    }

    #[test]
    fn test_blocking_classification() {
        assert!(Warning::NoRows.is_blocking());
        assert!(Warning::IncompleteMapping { missing: vec![] }.is_blocking());
        assert!(!Warning::ZeroPool { date: "05/08".into() }.is_blocking());
        assert!(!Warning::MissingColumns { missing: vec![] }.is_blocking());
        assert!(!Warning::DuplicatePerson { name: "Juan".into() }.is_blocking());
    }

    #[test]
    fn test_from_error() {
        assert_eq!(Warning::from_error(&TipPoolError::EmptyInput), Warning::NoRows);
        assert_eq!(
            Warning::from_error(&TipPoolError::NoDateColumns),
            Warning::NoDateColumns
        );
        assert!(matches!(
            Warning::from_error(&TipPoolError::InvalidConfig("x".into())),
            Warning::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_display_messages() {
        let warning = Warning::MissingColumns {
            missing: vec![CanonicalField::Pool, CanonicalField::Value],
        };
        assert_eq!(
            warning.to_string(),
            "Missing columns: Pool, Value. Affected fields use defaults."
        );
        assert!(Warning::ZeroPool { date: "05/08".into() }
            .to_string()
            .contains("05/08"));
    }

    #[test]
    fn test_data_warnings() {
        let mut juan = staff("05/08", "Juan", None);
        juan.pool_amount = Some(100.0);
        let records = vec![juan, staff("05/08", "Alina", Some(8.0)), staff("06/08", "Ryu", Some(4.0))];

        let values = missing_value_warnings(&records, false);
        assert_eq!(
            values,
            vec![Warning::EmptyValue {
                date: "05/08".into(),
                name: "Juan".into()
            }]
        );
        assert!(matches!(
            missing_value_warnings(&records, true)[0],
            Warning::EmptyWeight { .. }
        ));

        let outcome = allocate(&records, &DatePools::from_records(&records), AllocationRule::default());
        assert_eq!(
            zero_pool_warnings(&outcome),
            vec![Warning::ZeroPool { date: "06/08".into() }]
        );
    }
}
