use crate::config::{AllocationConfig, AllocationMode};
use crate::engine::{allocate, AllocationRule, DatePools};
use crate::error::{Result, TipPoolError};
use crate::normalizer::{missing_fields, normalize_automatic, records_from_rows, ColumnMapping};
use crate::parser::parse_grid;
use crate::report::Report;
use crate::schema::{AttendanceRecord, CanonicalField, Grid};
use crate::warning::{missing_value_warnings, zero_pool_warnings, Warning};
use crate::wide::{WeightMatrix, WideSheet};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingMode {
    /// Headers are matched against the alias table; missing columns only warn.
    Automatic,
    /// A caller must confirm a complete [`ColumnMapping`] before anything is computed.
    Manual,
}

#[derive(Debug, Clone)]
enum Dataset {
    RecordOriented {
        grid: Grid,
        /// `None` while a manual mapping is pending.
        records: Option<Vec<AttendanceRecord>>,
        missing_columns: Vec<CanonicalField>,
    },
    Wide(WideSheet),
}

/// The most recent ingestion plus its computed results.
///
/// Every ingestion replaces the previous dataset, pool overrides and
/// weights wholesale (weights loaded for the current cross-tab survive
/// pool edits). Each pass replaces the warning list. A pass that ends in
/// a blocking warning leaves the previous report in place.
#[derive(Debug, Clone)]
pub struct TipPoolSession {
    config: AllocationConfig,
    mapping_mode: MappingMode,
    use_weights: bool,
    dataset: Option<Dataset>,
    proposed_mapping: Option<ColumnMapping>,
    weights: Option<WeightMatrix>,
    pool_overrides: DatePools,
    report: Option<Report>,
    warnings: Vec<Warning>,
}

impl Default for TipPoolSession {
    fn default() -> Self {
        Self::with_config(AllocationConfig::default())
    }
}

impl TipPoolSession {
    pub fn new(config: AllocationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: AllocationConfig) -> Self {
        Self {
            config,
            mapping_mode: MappingMode::Automatic,
            use_weights: true,
            dataset: None,
            proposed_mapping: None,
            weights: None,
            pool_overrides: DatePools::new(),
            report: None,
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_blocking_warning(&self) -> bool {
        self.warnings.iter().any(Warning::is_blocking)
    }

    /// Pool amounts entered through [`set_pool_amount`](Self::set_pool_amount).
    pub fn pools(&self) -> &DatePools {
        &self.pool_overrides
    }

    /// Dates of the loaded cross-tab, for a pool editor.
    pub fn wide_dates(&self) -> &[String] {
        match &self.dataset {
            Some(Dataset::Wide(sheet)) => &sheet.dates,
            _ => &[],
        }
    }

    pub fn proposed_mapping(&self) -> Option<&ColumnMapping> {
        self.proposed_mapping.as_ref()
    }

    /// Applies to the next record-oriented ingestion.
    pub fn set_mapping_mode(&mut self, mode: MappingMode) {
        self.mapping_mode = mode;
    }

    /// Turns cross-tab weighting on or off and recomputes. With weights off,
    /// or none loaded, the staff pool is split equally.
    pub fn set_use_weights(&mut self, enabled: bool) -> Option<&Report> {
        self.use_weights = enabled;
        if matches!(self.dataset, Some(Dataset::Wide(_))) {
            self.recompute()
        } else {
            self.report.as_ref()
        }
    }

    pub fn ingest_record_oriented(&mut self, text: &str) -> Option<&Report> {
        let grid = match parse_body(text) {
            Ok(grid) => grid,
            Err(err) => return self.block(Warning::from_error(&err)),
        };
        info!("Ingested record-oriented file with {} rows", grid.rows.len());

        self.weights = None;
        self.pool_overrides = DatePools::new();

        match self.mapping_mode {
            MappingMode::Automatic => {
                let rows = normalize_automatic(&grid, &self.config.aliases);
                let records = match records_from_rows(&rows, &self.config) {
                    Ok(records) => records,
                    Err(err) => return self.block(Warning::from_error(&err)),
                };
                self.proposed_mapping = None;
                self.dataset = Some(Dataset::RecordOriented {
                    missing_columns: missing_fields(&rows),
                    grid,
                    records: Some(records),
                });
                self.recompute()
            }
            MappingMode::Manual => {
                let proposed = ColumnMapping::auto_guess(&grid.header, &self.config.aliases);
                self.warnings = vec![Warning::IncompleteMapping {
                    missing: CanonicalField::ALL.to_vec(),
                }];
                self.proposed_mapping = Some(proposed);
                self.dataset = Some(Dataset::RecordOriented {
                    grid,
                    records: None,
                    missing_columns: Vec::new(),
                });
                None
            }
        }
    }

    /// Confirms a manual mapping for the loaded record-oriented file and computes.
    pub fn apply_mapping(&mut self, mapping: ColumnMapping) -> Option<&Report> {
        let result = match &self.dataset {
            Some(Dataset::RecordOriented { grid, .. }) => mapping
                .apply(grid)
                .and_then(|rows| records_from_rows(&rows, &self.config)),
            _ => Err(TipPoolError::EmptyInput),
        };

        let records = match result {
            Ok(records) => records,
            Err(err) => return self.block(Warning::from_error(&err)),
        };

        if let Some(Dataset::RecordOriented {
            records: slot,
            missing_columns,
            ..
        }) = &mut self.dataset
        {
            *slot = Some(records);
            missing_columns.clear();
        }
        self.proposed_mapping = Some(mapping);
        self.recompute()
    }

    pub fn ingest_wide_format(&mut self, text: &str) -> Option<&Report> {
        let sheet = match parse_body(text).and_then(|grid| {
            let pattern = self.config.date_column_matcher()?;
            WideSheet::from_grid(&grid, &pattern)
        }) {
            Ok(sheet) => sheet,
            Err(err) => return self.block(Warning::from_error(&err)),
        };
        info!(
            "Ingested cross-tab with {} dates and {} people",
            sheet.dates.len(),
            sheet.people.len()
        );

        self.dataset = Some(Dataset::Wide(sheet));
        self.proposed_mapping = None;
        self.weights = None;
        self.pool_overrides = DatePools::new();
        self.recompute()
    }

    pub fn ingest_weights(&mut self, text: &str) -> Option<&Report> {
        if !matches!(self.dataset, Some(Dataset::Wide(_))) {
            return self.block(Warning::WeightsWithoutSheet);
        }

        let weights = match parse_body(text).and_then(|grid| {
            let pattern = self.config.date_column_matcher()?;
            WeightMatrix::from_grid(&grid, &pattern)
        }) {
            Ok(weights) => weights,
            Err(err) => return self.block(Warning::from_error(&err)),
        };
        info!("Loaded weights for {} dates", weights.dates.len());

        self.weights = Some(weights);
        self.recompute()
    }

    /// Sets the pool for one date and recomputes.
    pub fn set_pool_amount(&mut self, date: &str, amount: f64) -> Option<&Report> {
        self.pool_overrides.set(date, amount);
        if self.dataset.is_some() {
            self.recompute()
        } else {
            self.report.as_ref()
        }
    }

    /// Re-runs allocation on the current dataset.
    pub fn recompute(&mut self) -> Option<&Report> {
        match self.prepare() {
            Ok(Prepared {
                records,
                mode,
                from_weights_sheet,
                mut warnings,
            }) => {
                let mut pools = DatePools::from_records(&records);
                pools.merge(&self.pool_overrides);

                let outcome = allocate(&records, &pools, AllocationRule::from_config(&self.config, mode));
                warnings.extend(zero_pool_warnings(&outcome));
                if mode == AllocationMode::Weighted {
                    warnings.extend(missing_value_warnings(&records, from_weights_sheet));
                }
                for warning in &warnings {
                    warn!("{}", warning);
                }

                self.warnings = warnings;
                self.report = Some(Report::build(&outcome, self.config.rule_description(mode)));
                self.report.as_ref()
            }
            Err(warning) => self.block(warning),
        }
    }

    fn prepare(&self) -> std::result::Result<Prepared, Warning> {
        match &self.dataset {
            None => Err(Warning::NoRows),
            Some(Dataset::RecordOriented {
                records,
                missing_columns,
                ..
            }) => {
                let records = records.clone().ok_or_else(|| Warning::IncompleteMapping {
                    missing: CanonicalField::ALL.to_vec(),
                })?;
                let mut warnings = Vec::new();
                if !missing_columns.is_empty() {
                    warnings.push(Warning::MissingColumns {
                        missing: missing_columns.clone(),
                    });
                }
                Ok(Prepared {
                    records,
                    mode: self.config.allocation_mode,
                    from_weights_sheet: false,
                    warnings,
                })
            }
            Some(Dataset::Wide(sheet)) => {
                let weights = self.weights.as_ref().filter(|_| self.use_weights);
                let records = sheet
                    .to_records(weights, &self.pool_overrides, &self.config)
                    .map_err(|err| Warning::from_error(&err))?;
                let mode = if weights.is_some() {
                    AllocationMode::Weighted
                } else {
                    AllocationMode::EqualSplit
                };

                let mut repeated: Vec<&String> = sheet.duplicates.iter().collect();
                for name in weights.into_iter().flat_map(|w| w.duplicates.iter()) {
                    if !repeated.contains(&name) {
                        repeated.push(name);
                    }
                }
                let warnings = repeated
                    .into_iter()
                    .map(|name| Warning::DuplicatePerson { name: name.clone() })
                    .collect();

                Ok(Prepared {
                    records,
                    mode,
                    from_weights_sheet: true,
                    warnings,
                })
            }
        }
    }

    fn block(&mut self, warning: Warning) -> Option<&Report> {
        warn!("Computation blocked: {}", warning);
        self.warnings = vec![warning];
        None
    }
}

struct Prepared {
    records: Vec<AttendanceRecord>,
    mode: AllocationMode,
    from_weights_sheet: bool,
    warnings: Vec<Warning>,
}

/// Parses text and rejects files without body rows.
fn parse_body(text: &str) -> Result<Grid> {
    let grid = parse_grid(text)?;
    if grid.rows.is_empty() {
        return Err(TipPoolError::EmptyInput);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;

    #[test]
    fn test_automatic_ingestion_computes() {
        let mut session = TipPoolSession::default();
        let report = session.ingest_record_oriented(sample::record_oriented_csv()).unwrap();
        assert_eq!(report.summary.total_pool, 2200.0);
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn test_missing_columns_warn_without_blocking() {
        let mut session = TipPoolSession::default();
        let report = session.ingest_record_oriented("Date,Name,Attendance,Pool\n05/08,Juan,Yes,100\n");
        assert!(report.is_some());
        assert!(session.warnings().contains(&Warning::MissingColumns {
            missing: vec![CanonicalField::Role, CanonicalField::Value]
        }));
        assert!(!session.has_blocking_warning());
    }

    #[test]
    fn test_structural_failure_keeps_previous_report() {
        let mut session = TipPoolSession::default();
        session.ingest_record_oriented(sample::record_oriented_csv());
        let before = session.report().cloned();

        assert!(session.ingest_record_oriented("Date,Name\n").is_none());
        assert_eq!(session.warnings(), &[Warning::NoRows]);
        assert_eq!(session.report().cloned(), before);

        assert!(session.ingest_wide_format("Name,Mon\nJuan,Yes\n").is_none());
        assert_eq!(session.warnings(), &[Warning::NoDateColumns]);
        assert_eq!(session.report().cloned(), before);
    }

    #[test]
    fn test_manual_mode_waits_for_mapping() {
        let mut session = TipPoolSession::default();
        session.set_mapping_mode(MappingMode::Manual);

        let text = "Day,Who,Job,Here,Tips,Score\n05/08,Juan,FOH,Yes,100,4\n";
        assert!(session.ingest_record_oriented(text).is_none());
        assert!(session.has_blocking_warning());
        assert!(session.report().is_none());

        let mut mapping = session.proposed_mapping().cloned().unwrap();
        assert_eq!(mapping.get(CanonicalField::Date), Some("Day"));
        assert!(session.apply_mapping(mapping.clone()).is_none());
        assert!(matches!(
            session.warnings()[0],
            Warning::IncompleteMapping { .. }
        ));

        mapping.set(CanonicalField::Name, "Who");
        mapping.set(CanonicalField::Role, "Job");
        mapping.set(CanonicalField::Attendance, "Here");
        mapping.set(CanonicalField::Value, "Score");
        let report = session.apply_mapping(mapping).unwrap();
        assert_eq!(report.total_for("Juan").unwrap().total_allocated, 100.0);
        assert!(!session.has_blocking_warning());
    }

    #[test]
    fn test_weights_require_sheet() {
        let mut session = TipPoolSession::default();
        assert!(session.ingest_weights(sample::weights_csv()).is_none());
        assert_eq!(session.warnings(), &[Warning::WeightsWithoutSheet]);
    }

    #[test]
    fn test_new_wide_ingestion_resets_pools() {
        let mut session = TipPoolSession::default();
        session.ingest_wide_format(sample::wide_format_csv());
        session.set_pool_amount("05/08", 1000.0);
        assert_eq!(session.pools().get("05/08"), 1000.0);

        session.ingest_wide_format(sample::wide_format_csv());
        assert!(session.pools().is_empty());
        assert!(session
            .warnings()
            .contains(&Warning::ZeroPool { date: "05/08".into() }));
    }

    #[test]
    fn test_repeated_wide_row_warns_and_keeps_first() {
        let mut session = TipPoolSession::default();
        session.ingest_wide_format("Name,05/08\nJuan,Yes\nJuan,No\nAlina,Yes\n");
        let report = session.set_pool_amount("05/08", 100.0).unwrap();

        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.total_for("Juan").unwrap().total_allocated, 50.0);
        assert_eq!(report.total_for("Alina").unwrap().total_allocated, 50.0);
        assert_eq!(
            session.warnings(),
            &[Warning::DuplicatePerson { name: "Juan".into() }]
        );
        assert!(!session.has_blocking_warning());
    }

    #[test]
    fn test_wide_dates_for_pool_editor() {
        let mut session = TipPoolSession::default();
        assert!(session.wide_dates().is_empty());
        session.ingest_wide_format(sample::wide_format_csv());
        assert_eq!(session.wide_dates(), &["05/08".to_string(), "06/08".to_string()]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AllocationConfig {
            weight_divisor: -1.0,
            ..AllocationConfig::default()
        };
        assert!(TipPoolSession::new(config).is_err());
    }
}
