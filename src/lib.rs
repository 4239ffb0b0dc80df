//! # Tip Pool Allocator
//!
//! A library for turning staff attendance sheets into tip-pool payouts.
//!
//! ## Core Concepts
//!
//! - **Pool**: the money available on a date. In record-oriented files the first non-blank
//!   pool cell of a date is used; cross-tab sheets take pools from the caller.
//! - **Kitchen share**: a fixed fraction (25% by default) of the pool, paid as a block to the
//!   kitchen on dates where a kitchen row is marked present.
//! - **Staff share**: the remainder, split between present non-kitchen staff by weight
//!   (`Value / 4` by default) or equally.
//! - **Unallocated**: staff money nobody was eligible for, reported separately.
//!
//! Two input shapes converge on [`AttendanceRecord`]: long CSV files with one row per person
//! per date, and weekly cross-tabs with one column per date plus an optional weights sheet.
//!
//! ## Example
//!
//! ```rust
//! use tip_pool_allocator::*;
//!
//! let report = process_record_oriented(sample::record_oriented_csv(), &AllocationConfig::default())
//!     .unwrap();
//!
//! let juan = report.total_for("Juan").unwrap();
//! assert_eq!(juan.total_allocated, 450.0);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod parser;
pub mod report;
pub mod sample;
pub mod schema;
pub mod session;
pub mod utils;
pub mod warning;
pub mod wide;

pub use config::{AllocationConfig, AllocationMode, HeaderAliases};
pub use engine::{
    allocate, AllocationLine, AllocationOutcome, AllocationRule, Allocator, DatePools,
    DayAllocation, Weighting,
};
pub use error::{Result, TipPoolError};
pub use normalizer::{
    missing_fields, normalize_automatic, present_fields, records_from_rows, ColumnMapping,
};
pub use parser::{detect_delimiter, parse_grid, parse_rows};
pub use report::{DailyRow, PersonTotal, Report, SummaryItem, SummaryStats};
pub use schema::*;
pub use session::{MappingMode, TipPoolSession};
pub use utils::*;
pub use warning::Warning;
pub use wide::{WeightMatrix, WideSheet};

use log::{debug, info};

pub struct TipPoolProcessor;

impl TipPoolProcessor {
    /// Parses, normalizes and allocates a record-oriented file in one pass.
    pub fn process_record_oriented(text: &str, config: &AllocationConfig) -> Result<Report> {
        config.validate()?;

        let grid = parse_grid(text)?;
        if grid.rows.is_empty() {
            return Err(TipPoolError::EmptyInput);
        }
        let rows = normalize_automatic(&grid, &config.aliases);
        debug!("Missing columns: {:?}", missing_fields(&rows));

        let records = records_from_rows(&rows, config)?;
        let pools = DatePools::from_records(&records);
        info!(
            "Processing {} records across {} pooled dates",
            records.len(),
            pools.iter().count()
        );

        let mode = config.allocation_mode;
        let outcome = allocate(&records, &pools, AllocationRule::from_config(config, mode));
        Ok(Report::build(&outcome, config.rule_description(mode)))
    }

    /// Allocates a cross-tab sheet. With `weights` the staff share is weighted,
    /// otherwise it is split equally.
    pub fn process_wide_format(
        text: &str,
        weights: Option<&str>,
        pools: &DatePools,
        config: &AllocationConfig,
    ) -> Result<Report> {
        config.validate()?;

        let sheet = WideSheet::parse(text, config)?;
        let weights = weights
            .map(|w| WeightMatrix::parse(w, config))
            .transpose()?;
        let mode = if weights.is_some() {
            AllocationMode::Weighted
        } else {
            AllocationMode::EqualSplit
        };

        let records = sheet.to_records(weights.as_ref(), pools, config)?;
        let outcome = allocate(&records, pools, AllocationRule::from_config(config, mode));
        Ok(Report::build(&outcome, config.rule_description(mode)))
    }
}

pub fn process_record_oriented(text: &str, config: &AllocationConfig) -> Result<Report> {
    TipPoolProcessor::process_record_oriented(text, config)
}

pub fn process_wide_format(
    text: &str,
    weights: Option<&str>,
    pools: &DatePools,
    config: &AllocationConfig,
) -> Result<Report> {
    TipPoolProcessor::process_wide_format(text, weights, pools, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pools() -> DatePools {
        let mut pools = DatePools::new();
        for (date, amount) in sample::sample_pools() {
            pools.set(date, amount);
        }
        pools
    }

    #[test]
    fn test_end_to_end_record_oriented() {
        let report =
            process_record_oriented(sample::record_oriented_csv(), &AllocationConfig::default())
                .unwrap();

        assert_eq!(report.summary.total_pool, 2200.0);
        assert_eq!(report.summary.total_allocated, 2200.0);
        assert_eq!(report.summary.total_unallocated, 0.0);
        assert_eq!(report.daily.len(), 8);

        let alina = report.total_for("Alina").unwrap();
        assert_eq!(alina.days_counted, 2);
        assert_eq!(alina.total_allocated, 814.29);
    }

    #[test]
    fn test_wide_and_long_agree() {
        let config = AllocationConfig::default();
        let long = process_record_oriented(sample::record_oriented_csv(), &config).unwrap();
        let wide = process_wide_format(
            sample::wide_format_csv(),
            Some(sample::weights_csv()),
            &sample_pools(),
            &config,
        )
        .unwrap();

        for total in &long.totals {
            let other = wide.total_for(&total.name).unwrap();
            assert_eq!(other.total_allocated, total.total_allocated, "{}", total.name);
            assert_eq!(other.days_counted, total.days_counted, "{}", total.name);
        }
    }

    #[test]
    fn test_wide_without_weights_splits_equally() {
        let report = process_wide_format(
            sample::wide_format_csv(),
            None,
            &sample_pools(),
            &AllocationConfig::default(),
        )
        .unwrap();

        assert_eq!(report.summary.mode, AllocationMode::EqualSplit);
        // 05/08: 750 staff share between Juan and Alina.
        let juan = report.total_for("Juan").unwrap();
        assert_eq!(juan.total_allocated, 375.0);
    }

    #[test]
    fn test_header_only_file_is_empty_input() {
        let result = process_record_oriented("Date,Name\n", &AllocationConfig::default());
        assert!(matches!(result, Err(TipPoolError::EmptyInput)));
    }
}
