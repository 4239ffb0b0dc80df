use crate::config::{AllocationConfig, HeaderAliases};
use crate::error::{Result, TipPoolError};
use crate::schema::{AttendanceRecord, CanonicalField, Grid, NormalizedRow};
use crate::utils::parse_optional_amount;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Keys every body row by canonical field, using the alias table.
/// Headers that match no alias keep their original text as the key.
pub fn normalize_automatic(grid: &Grid, aliases: &HeaderAliases) -> Vec<NormalizedRow> {
    let keys: Vec<String> = grid
        .header
        .iter()
        .map(|header| match aliases.match_header(header) {
            Some(field) => field.key().to_string(),
            None => header.clone(),
        })
        .collect();

    grid.rows
        .iter()
        .map(|row| {
            let mut out = NormalizedRow::new();
            for (idx, key) in keys.iter().enumerate() {
                let value = row.get(idx).cloned().unwrap_or_default();
                // Later duplicates of a canonical column must not clobber an
                // earlier non-blank value.
                let keep_existing = is_canonical_key(key)
                    && out.get(key).map_or(false, |existing| !existing.is_empty());
                if !keep_existing {
                    out.insert(key.clone(), value);
                }
            }
            out
        })
        .collect()
}

fn is_canonical_key(key: &str) -> bool {
    CanonicalField::ALL.iter().any(|f| f.key() == key)
}

/// Canonical fields that appear as keys in at least one row.
pub fn present_fields(rows: &[NormalizedRow]) -> BTreeSet<CanonicalField> {
    CanonicalField::ALL
        .into_iter()
        .filter(|field| rows.iter().any(|row| row.contains_key(field.key())))
        .collect()
}

pub fn missing_fields(rows: &[NormalizedRow]) -> Vec<CanonicalField> {
    let present = present_fields(rows);
    CanonicalField::ALL
        .into_iter()
        .filter(|field| !present.contains(field))
        .collect()
}

/// User-confirmed header choice per canonical field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    fields: BTreeMap<CanonicalField, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proposes a header for every field an alias recognises. The first
    /// matching header wins.
    pub fn auto_guess(headers: &[String], aliases: &HeaderAliases) -> Self {
        let mut mapping = Self::new();
        for header in headers {
            if let Some(field) = aliases.match_header(header) {
                mapping
                    .fields
                    .entry(field)
                    .or_insert_with(|| header.clone());
            }
        }
        mapping
    }

    pub fn set(&mut self, field: CanonicalField, header: impl Into<String>) {
        let header = header.into();
        if header.trim().is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, header);
        }
    }

    pub fn clear(&mut self, field: CanonicalField) {
        self.fields.remove(&field);
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn unmapped(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unmapped().is_empty()
    }

    /// Builds one row per body row with exactly the six canonical keys.
    pub fn apply(&self, grid: &Grid) -> Result<Vec<NormalizedRow>> {
        let missing = self.unmapped();
        if !missing.is_empty() {
            return Err(TipPoolError::IncompleteMapping(missing));
        }

        let mut columns = Vec::with_capacity(CanonicalField::ALL.len());
        for field in CanonicalField::ALL {
            let header = self.get(field).unwrap_or_default();
            let idx = grid
                .column_index(header)
                .ok_or_else(|| TipPoolError::UnknownHeader {
                    field,
                    header: header.to_string(),
                })?;
            columns.push((field, idx));
        }

        let rows: Vec<NormalizedRow> = (0..grid.rows.len())
            .map(|row| {
                columns
                    .iter()
                    .map(|(field, col)| (field.key().to_string(), grid.cell(row, *col).to_string()))
                    .collect()
            })
            .collect();

        Ok(rows)
    }
}

/// Converts normalized rows into shape-independent records.
pub fn records_from_rows(
    rows: &[NormalizedRow],
    config: &AllocationConfig,
) -> Result<Vec<AttendanceRecord>> {
    let kitchen = config.kitchen_matcher()?;
    let field = |row: &NormalizedRow, f: CanonicalField| -> String {
        row.get(f.key()).cloned().unwrap_or_default()
    };

    let records: Vec<AttendanceRecord> = rows
        .iter()
        .map(|row| {
            let name = field(row, CanonicalField::Name);
            let role = field(row, CanonicalField::Role);
            let attendance = field(row, CanonicalField::Attendance);
            let classified_by = if role.is_empty() { &name } else { &role };

            AttendanceRecord {
                date: field(row, CanonicalField::Date),
                present: config.is_present_marker(&attendance),
                kitchen: kitchen.is_match(classified_by),
                performance_value: parse_optional_amount(&field(row, CanonicalField::Value)),
                pool_amount: parse_optional_amount(&field(row, CanonicalField::Pool)),
                name,
                role,
                attendance,
            }
        })
        .collect();

    debug!("Built {} attendance records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_grid;

    fn sample_grid() -> Grid {
        parse_grid(
            "Date,Employee,Position,Attendance,Total Pool,Points,Shift\n\
             05/08,Kitchen,Kitchen,Yes,1000,,PM\n\
             05/08,Juan,FOH,Yes,,12,PM\n",
        )
        .unwrap()
    }

    #[test]
    fn test_automatic_maps_aliases_and_passes_through_unknown() {
        let rows = normalize_automatic(&sample_grid(), &HeaderAliases::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Name"], "Kitchen");
        assert_eq!(rows[0]["Pool"], "1000");
        assert_eq!(rows[1]["Value"], "12");
        assert_eq!(rows[1]["Shift"], "PM");
        assert!(!rows[0].contains_key("Employee"));
    }

    #[test]
    fn test_automatic_preserves_row_order() {
        let rows = normalize_automatic(&sample_grid(), &HeaderAliases::default());
        assert_eq!(rows[0]["Name"], "Kitchen");
        assert_eq!(rows[1]["Name"], "Juan");
    }

    #[test]
    fn test_short_rows_fill_blank() {
        let grid = parse_grid("Date,Name,Role\n05/08,Juan\n").unwrap();
        let rows = normalize_automatic(&grid, &HeaderAliases::default());
        assert_eq!(rows[0]["Role"], "");
    }

    #[test]
    fn test_present_and_missing_fields() {
        let grid = parse_grid("Date,Name,Attendance\n05/08,Juan,Yes\n").unwrap();
        let rows = normalize_automatic(&grid, &HeaderAliases::default());
        let present = present_fields(&rows);
        assert!(present.contains(&CanonicalField::Date));
        assert!(!present.contains(&CanonicalField::Pool));
        assert_eq!(
            missing_fields(&rows),
            vec![CanonicalField::Role, CanonicalField::Pool, CanonicalField::Value]
        );
    }

    #[test]
    fn test_auto_guess_proposes_defaults() {
        let grid = sample_grid();
        let mapping = ColumnMapping::auto_guess(&grid.header, &HeaderAliases::default());
        assert!(mapping.is_complete());
        assert_eq!(mapping.get(CanonicalField::Pool), Some("Total Pool"));
        assert_eq!(mapping.get(CanonicalField::Value), Some("Points"));
    }

    #[test]
    fn test_incomplete_mapping_blocks() {
        let grid = parse_grid("Day Label,Who,Here\n05/08,Juan,Yes\n").unwrap();
        let mut mapping = ColumnMapping::auto_guess(&grid.header, &HeaderAliases::default());
        assert_eq!(mapping.unmapped().len(), 6);

        mapping.set(CanonicalField::Date, "Day Label");
        mapping.set(CanonicalField::Name, "Who");
        match mapping.apply(&grid) {
            Err(TipPoolError::IncompleteMapping(missing)) => {
                assert_eq!(missing.len(), 4);
                assert!(!missing.contains(&CanonicalField::Date));
            }
            other => panic!("expected incomplete mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_mapping_overrides_guess() {
        let grid = parse_grid("Date,Name,Role,Here,Tips,Score,Points\n05/08,Juan,FOH,Yes,100,12,3\n")
            .unwrap();
        let mut mapping = ColumnMapping::auto_guess(&grid.header, &HeaderAliases::default());
        mapping.set(CanonicalField::Attendance, "Here");
        mapping.set(CanonicalField::Value, "Score");

        let rows = mapping.apply(&grid).unwrap();
        assert_eq!(rows[0]["Attendance"], "Yes");
        assert_eq!(rows[0]["Value"], "12");
        assert_eq!(rows[0].len(), 6);
    }

    #[test]
    fn test_blank_header_clears_mapping() {
        let mut mapping = ColumnMapping::new();
        mapping.set(CanonicalField::Role, "Role");
        mapping.set(CanonicalField::Role, "  ");
        assert_eq!(mapping.get(CanonicalField::Role), None);
    }

    #[test]
    fn test_mapping_to_unknown_header_fails() {
        let grid = sample_grid();
        let mut mapping = ColumnMapping::auto_guess(&grid.header, &HeaderAliases::default());
        mapping.set(CanonicalField::Role, "Department");
        assert!(matches!(
            mapping.apply(&grid),
            Err(TipPoolError::UnknownHeader { field: CanonicalField::Role, .. })
        ));
    }

    #[test]
    fn test_records_classify_kitchen_and_presence() {
        let grid = parse_grid(
            "Date,Name,Role,Attendance,Pool,Value\n\
             05/08,Kitchen,,yes,1000,\n\
             05/08,Juan,FOH,YES,,12\n\
             05/08,Ryu,FOH,No,,10\n\
             05/08,Maria,Kitchen Porter,Yes,,\n",
        )
        .unwrap();
        let rows = normalize_automatic(&grid, &HeaderAliases::default());
        let records = records_from_rows(&rows, &AllocationConfig::default()).unwrap();

        assert!(records[0].kitchen, "blank role falls back to name");
        assert!(records[0].present);
        assert_eq!(records[0].pool_amount, Some(1000.0));
        assert_eq!(records[0].performance_value, None);

        assert!(!records[1].kitchen);
        assert!(records[1].present);
        assert_eq!(records[1].performance_value, Some(12.0));

        assert!(!records[2].present);
        assert!(records[3].kitchen);
    }
}
