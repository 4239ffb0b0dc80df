//! Weekly cross-tab sheets: one row per person, one column per date.

use crate::config::AllocationConfig;
use crate::engine::DatePools;
use crate::error::{Result, TipPoolError};
use crate::parser::parse_grid;
use crate::schema::{AttendanceRecord, Grid};
use crate::utils::parse_optional_amount;
use log::{debug, warn};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Header cells after the first column that look like dates, with their index.
fn date_columns(grid: &Grid, pattern: &Regex) -> Result<Vec<(usize, String)>> {
    let columns: Vec<(usize, String)> = grid
        .header
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, header)| pattern.is_match(header))
        .map(|(idx, header)| (idx, header.clone()))
        .collect();

    if columns.is_empty() {
        return Err(TipPoolError::NoDateColumns);
    }
    Ok(columns)
}

/// Person identifiers from the first column with their row, blanks dropped.
/// Only the first row of a repeated name is kept; the repeats are returned
/// separately, once per name.
fn people(grid: &Grid) -> (Vec<(usize, String)>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut repeated = Vec::new();

    for row in 0..grid.rows.len() {
        let person = grid.cell(row, 0);
        if person.is_empty() {
            continue;
        }
        if seen.insert(person.to_string()) {
            kept.push((row, person.to_string()));
        } else if !repeated.iter().any(|r| r == person) {
            warn!("Ignoring repeated row for {}", person);
            repeated.push(person.to_string());
        }
    }

    (kept, repeated)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideSheet {
    pub dates: Vec<String>,
    pub people: Vec<String>,
    /// Names that appeared on more than one row. Their first row is used.
    pub duplicates: Vec<String>,
    attendance: HashMap<String, HashMap<String, String>>,
}

impl WideSheet {
    pub fn parse(text: &str, config: &AllocationConfig) -> Result<Self> {
        let grid = parse_grid(text)?;
        Self::from_grid(&grid, &config.date_column_matcher()?)
    }

    pub fn from_grid(grid: &Grid, date_pattern: &Regex) -> Result<Self> {
        let columns = date_columns(grid, date_pattern)?;
        let (rows, duplicates) = people(grid);

        let mut attendance: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (col, date) in &columns {
            let by_person = attendance.entry(date.clone()).or_default();
            for (row, person) in &rows {
                by_person.insert(person.clone(), grid.cell(*row, *col).to_string());
            }
        }

        debug!(
            "Wide sheet with {} dates and {} people",
            columns.len(),
            rows.len()
        );

        Ok(Self {
            dates: columns.into_iter().map(|(_, d)| d).collect(),
            people: rows.into_iter().map(|(_, p)| p).collect(),
            duplicates,
            attendance,
        })
    }

    /// Raw attendance cell, blank when the sheet has none.
    pub fn attendance(&self, date: &str, person: &str) -> &str {
        self.attendance
            .get(date)
            .and_then(|by_person| by_person.get(person))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Expands the sheet into date-major records. A pool from `pools` is
    /// attached to the first record of its date; weights become performance
    /// values.
    pub fn to_records(
        &self,
        weights: Option<&WeightMatrix>,
        pools: &DatePools,
        config: &AllocationConfig,
    ) -> Result<Vec<AttendanceRecord>> {
        let kitchen = config.kitchen_matcher()?;
        let mut records = Vec::with_capacity(self.dates.len() * self.people.len());

        for date in &self.dates {
            for (i, person) in self.people.iter().enumerate() {
                let attendance = self.attendance(date, person).to_string();
                records.push(AttendanceRecord {
                    date: date.clone(),
                    name: person.clone(),
                    role: String::new(),
                    present: config.is_present_marker(&attendance),
                    kitchen: kitchen.is_match(person),
                    performance_value: weights.and_then(|w| w.get(date, person)),
                    pool_amount: if i == 0 { pools.amount(date) } else { None },
                    attendance,
                });
            }
        }

        Ok(records)
    }
}

/// Numeric weights laid out like a [`WideSheet`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    pub dates: Vec<String>,
    pub people: Vec<String>,
    pub duplicates: Vec<String>,
    values: HashMap<String, HashMap<String, Option<f64>>>,
}

impl WeightMatrix {
    pub fn parse(text: &str, config: &AllocationConfig) -> Result<Self> {
        let grid = parse_grid(text)?;
        Self::from_grid(&grid, &config.date_column_matcher()?)
    }

    pub fn from_grid(grid: &Grid, date_pattern: &Regex) -> Result<Self> {
        let columns = date_columns(grid, date_pattern)?;
        let (rows, duplicates) = people(grid);

        let mut values: HashMap<String, HashMap<String, Option<f64>>> = HashMap::new();
        for (col, date) in &columns {
            let by_person = values.entry(date.clone()).or_default();
            for (row, person) in &rows {
                by_person.insert(person.clone(), parse_optional_amount(grid.cell(*row, *col)));
            }
        }

        Ok(Self {
            dates: columns.into_iter().map(|(_, d)| d).collect(),
            people: rows.into_iter().map(|(_, p)| p).collect(),
            duplicates,
            values,
        })
    }

    /// `None` when the person/date is absent from the matrix or the cell is blank.
    pub fn get(&self, date: &str, person: &str) -> Option<f64> {
        self.values
            .get(date)
            .and_then(|by_person| by_person.get(person))
            .copied()
            .flatten()
    }
}
