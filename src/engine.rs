use crate::config::{AllocationConfig, AllocationMode};
use crate::schema::AttendanceRecord;
use crate::utils::round_cents;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pool amount per date label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatePools {
    amounts: BTreeMap<String, f64>,
}

impl DatePools {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first non-blank pool cell of each date is authoritative; later
    /// cells for the same date are ignored even if they disagree.
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut pools = Self::new();
        for record in records {
            if let Some(amount) = record.pool_amount {
                pools.amounts.entry(record.date.clone()).or_insert(amount);
            }
        }
        pools
    }

    pub fn set(&mut self, date: impl Into<String>, amount: f64) {
        self.amounts.insert(date.into(), amount);
    }

    /// Amount for `date`, or `0.0` when none was supplied.
    pub fn get(&self, date: &str) -> f64 {
        self.amounts.get(date).copied().unwrap_or(0.0)
    }

    pub fn amount(&self, date: &str) -> Option<f64> {
        self.amounts.get(date).copied()
    }

    pub fn contains(&self, date: &str) -> bool {
        self.amounts.contains_key(date)
    }

    /// Overlays every amount from `other`, replacing existing entries.
    pub fn merge(&mut self, other: &DatePools) {
        for (date, amount) in &other.amounts {
            self.amounts.insert(date.clone(), *amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(d, a)| (d.as_str(), *a))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Weighting {
    /// `performance_value / divisor`; a blank value counts as zero.
    Performance { divisor: f64 },
    /// Every present staff member weighs 1.
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationRule {
    pub kitchen_share_ratio: f64,
    pub weighting: Weighting,
    /// Split evenly when staff are present but every weight is zero.
    pub equal_split_fallback: bool,
}

impl AllocationRule {
    pub fn from_config(config: &AllocationConfig, mode: AllocationMode) -> Self {
        let weighting = match mode {
            AllocationMode::Weighted => Weighting::Performance {
                divisor: config.weight_divisor,
            },
            AllocationMode::EqualSplit => Weighting::Equal,
        };
        Self {
            kitchen_share_ratio: config.kitchen_share_ratio,
            weighting,
            equal_split_fallback: config.equal_split_fallback,
        }
    }

    pub fn mode(&self) -> AllocationMode {
        match self.weighting {
            Weighting::Performance { .. } => AllocationMode::Weighted,
            Weighting::Equal => AllocationMode::EqualSplit,
        }
    }

    fn staff_weight(&self, record: &AttendanceRecord) -> f64 {
        let weight = match self.weighting {
            Weighting::Performance { divisor } => record.performance_value.unwrap_or(0.0) / divisor,
            Weighting::Equal => 1.0,
        };
        weight.max(0.0)
    }
}

impl Default for AllocationRule {
    fn default() -> Self {
        Self::from_config(&AllocationConfig::default(), AllocationMode::Weighted)
    }
}

/// One person's result for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub name: String,
    pub role: String,
    pub attendance: String,
    pub present: bool,
    pub kitchen: bool,
    /// Only set for present non-kitchen staff.
    pub weight: Option<f64>,
    /// Rounded to cents.
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAllocation {
    pub date: String,
    pub pool: f64,
    /// No pool amount was supplied for this date.
    pub pool_missing: bool,
    pub kitchen_present: bool,
    pub kitchen_share: f64,
    pub staff_available: f64,
    /// `(1 - kitchen ratio) * pool`, shown regardless of kitchen presence.
    pub staff_share_display: f64,
    pub total_weight: f64,
    pub present_staff: usize,
    pub unallocated: f64,
    pub lines: Vec<AllocationLine>,
}

impl DayAllocation {
    /// Everything paid out for the date: kitchen block plus distributed staff pool.
    pub fn allocated(&self) -> f64 {
        round_cents(self.kitchen_share + self.staff_available - self.unallocated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub mode: AllocationMode,
    pub days: Vec<DayAllocation>,
}

impl AllocationOutcome {
    pub fn day(&self, date: &str) -> Option<&DayAllocation> {
        self.days.iter().find(|d| d.date == date)
    }
}

/// Groups records by date, keeping dates and records in first-seen order.
pub fn group_by_date(records: &[AttendanceRecord]) -> Vec<(&str, Vec<&AttendanceRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&AttendanceRecord>)> = Vec::new();

    for record in records {
        let date = record.date.as_str();
        match index.get(date) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(date, groups.len());
                groups.push((date, vec![record]));
            }
        }
    }

    groups
}

pub struct Allocator {
    rule: AllocationRule,
}

impl Allocator {
    pub fn new(rule: AllocationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &AllocationRule {
        &self.rule
    }

    pub fn allocate(&self, records: &[AttendanceRecord], pools: &DatePools) -> AllocationOutcome {
        let groups = group_by_date(records);
        info!(
            "Allocating {} records across {} dates ({:?})",
            records.len(),
            groups.len(),
            self.rule.mode()
        );

        let days = groups
            .into_iter()
            .map(|(date, items)| self.allocate_day(date, &items, pools.amount(date)))
            .collect();

        AllocationOutcome {
            mode: self.rule.mode(),
            days,
        }
    }

    fn allocate_day(
        &self,
        date: &str,
        items: &[&AttendanceRecord],
        pool: Option<f64>,
    ) -> DayAllocation {
        let pool_amount = pool.unwrap_or(0.0);

        let present_kitchen = items.iter().filter(|r| r.is_present_kitchen()).count();
        let kitchen_present = present_kitchen > 0;
        let kitchen_share = if kitchen_present {
            self.rule.kitchen_share_ratio * pool_amount
        } else {
            0.0
        };
        let staff_available = pool_amount - kitchen_share;

        let present_staff: Vec<&AttendanceRecord> = items
            .iter()
            .copied()
            .filter(|r| r.is_present_staff())
            .collect();
        let total_weight: f64 = present_staff.iter().map(|r| self.rule.staff_weight(r)).sum();

        let even_split = total_weight <= 0.0
            && !present_staff.is_empty()
            && self.rule.equal_split_fallback;
        let unallocated = if total_weight > 0.0 || even_split {
            0.0
        } else {
            staff_available.max(0.0)
        };

        debug!(
            "Date {}: pool {:.2}, kitchen {:.2}, staff {:.2}, total weight {:.4}, unallocated {:.2}",
            date, pool_amount, kitchen_share, staff_available, total_weight, unallocated
        );

        let lines = items
            .iter()
            .map(|record| {
                let (weight, amount) = if record.kitchen {
                    let amount = if record.present {
                        kitchen_share / present_kitchen as f64
                    } else {
                        0.0
                    };
                    (None, amount)
                } else if record.present {
                    let weight = self.rule.staff_weight(record);
                    let amount = if total_weight > 0.0 {
                        weight / total_weight * staff_available
                    } else if even_split {
                        staff_available / present_staff.len() as f64
                    } else {
                        0.0
                    };
                    (Some(weight), amount)
                } else {
                    (None, 0.0)
                };

                AllocationLine {
                    name: record.name.clone(),
                    role: record.role.clone(),
                    attendance: record.attendance.clone(),
                    present: record.present,
                    kitchen: record.kitchen,
                    weight,
                    amount: round_cents(amount),
                }
            })
            .collect();

        DayAllocation {
            date: date.to_string(),
            pool: pool_amount,
            pool_missing: pool.is_none(),
            kitchen_present,
            kitchen_share: round_cents(kitchen_share),
            staff_available: round_cents(staff_available),
            staff_share_display: round_cents((1.0 - self.rule.kitchen_share_ratio) * pool_amount),
            total_weight,
            present_staff: present_staff.len(),
            unallocated: round_cents(unallocated),
            lines,
        }
    }
}

pub fn allocate(
    records: &[AttendanceRecord],
    pools: &DatePools,
    rule: AllocationRule,
) -> AllocationOutcome {
    Allocator::new(rule).allocate(records, pools)
}
