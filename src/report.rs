use crate::config::AllocationMode;
use crate::engine::AllocationOutcome;
use crate::error::{Result, TipPoolError};
use crate::utils::{format_amount, format_euro, round_cents};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const UNNAMED: &str = "(Unnamed)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailyRow {
    pub date: String,
    pub name: String,
    pub role: String,
    pub attendance: String,
    pub pool: f64,
    pub kitchen_share: f64,
    pub staff_share: f64,
    pub weight: Option<f64>,
    pub allocation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonTotal {
    pub name: String,
    pub role: String,
    pub days_counted: u32,
    pub total_allocated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_pool: f64,
    pub total_allocated: f64,
    pub total_unallocated: f64,
    pub mode: AllocationMode,
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub label: String,
    pub value: String,
}

/// Everything the rendering side needs after one computation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: SummaryStats,
    pub daily: Vec<DailyRow>,
    /// Sorted by `total_allocated`, highest first; ties keep first-seen order.
    pub totals: Vec<PersonTotal>,
}

impl Report {
    pub fn build(outcome: &AllocationOutcome, rule: impl Into<String>) -> Self {
        let mut daily = Vec::new();
        let mut totals: Vec<PersonTotal> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut total_pool = 0.0;
        let mut total_allocated = 0.0;
        let mut total_unallocated = 0.0;

        for day in &outcome.days {
            total_pool += day.pool;
            total_allocated += day.allocated();
            total_unallocated += day.unallocated;

            for line in &day.lines {
                daily.push(DailyRow {
                    date: day.date.clone(),
                    name: line.name.clone(),
                    role: line.role.clone(),
                    attendance: line.attendance.clone(),
                    pool: day.pool,
                    kitchen_share: day.kitchen_share,
                    staff_share: day.staff_share_display,
                    weight: line.weight,
                    allocation: line.amount,
                });

                let key = if line.name.is_empty() {
                    UNNAMED.to_string()
                } else {
                    line.name.clone()
                };
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    totals.push(PersonTotal {
                        name: key,
                        role: line.role.clone(),
                        days_counted: 0,
                        total_allocated: 0.0,
                    });
                    totals.len() - 1
                });
                let entry = &mut totals[slot];

                let counted = if line.kitchen {
                    line.present && day.kitchen_present
                } else {
                    line.present
                };
                if counted {
                    entry.days_counted += 1;
                    entry.total_allocated += line.amount;
                }
            }
        }

        for entry in totals.iter_mut() {
            entry.total_allocated = round_cents(entry.total_allocated);
        }
        // `sort_by` is stable, so equal totals keep encounter order.
        totals.sort_by(|a, b| {
            b.total_allocated
                .partial_cmp(&a.total_allocated)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Self {
            summary: SummaryStats {
                total_pool: round_cents(total_pool),
                total_allocated: round_cents(total_allocated),
                total_unallocated: round_cents(total_unallocated),
                mode: outcome.mode,
                rule: rule.into(),
            },
            daily,
            totals,
        }
    }

    /// Label/value pairs for stat cards.
    pub fn summary_items(&self) -> Vec<SummaryItem> {
        let item = |label: &str, value: String| SummaryItem {
            label: label.to_string(),
            value,
        };
        vec![
            item("Total Pool", format_euro(self.summary.total_pool)),
            item("Allocated", format_euro(self.summary.total_allocated)),
            item("Unallocated", format_euro(self.summary.total_unallocated)),
            item("Rule", self.summary.rule.clone()),
        ]
    }

    /// Person totals as (label, value) pairs, in table order, for a bar chart.
    pub fn chart_series(&self) -> Vec<(String, f64)> {
        self.totals
            .iter()
            .map(|t| (t.name.clone(), t.total_allocated))
            .collect()
    }

    pub fn total_for(&self, name: &str) -> Option<&PersonTotal> {
        self.totals.iter().find(|t| t.name == name)
    }

    pub fn daily_csv(&self) -> Result<String> {
        write_csv(&self.daily)
    }

    pub fn totals_csv(&self) -> Result<String> {
        write_csv(&self.totals)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering of the summary and both tables.
    pub fn render_text(&self) -> String {
        let mut output = String::new();
        self.write_text(&mut output)
            .expect("formatting into a String cannot fail");
        output
    }

    pub fn write_text<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "# Tip Pool Distribution")?;
        for item in self.summary_items() {
            writeln!(out, "{}: {}", item.label, item.value)?;
        }

        writeln!(out)?;
        writeln!(out, "## Daily Detail")?;
        if self.daily.is_empty() {
            writeln!(out, "No rows.")?;
        }
        for row in &self.daily {
            let weight = row.weight.map(format_amount).unwrap_or_default();
            writeln!(
                out,
                "- {} {} ({}) {}: pool {} kitchen {} staff {} weight {} -> {}",
                row.date,
                row.name,
                row.role,
                row.attendance,
                format_amount(row.pool),
                format_amount(row.kitchen_share),
                format_amount(row.staff_share),
                weight,
                format_amount(row.allocation)
            )?;
        }

        writeln!(out)?;
        writeln!(out, "## Totals")?;
        if self.totals.is_empty() {
            writeln!(out, "No people.")?;
        }
        for total in &self.totals {
            writeln!(
                out,
                "- {} ({}) {} days: {}",
                total.name,
                total.role,
                total.days_counted,
                format_amount(total.total_allocated)
            )?;
        }

        Ok(())
    }
}

fn write_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| TipPoolError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
