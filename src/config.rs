use crate::error::{Result, TipPoolError};
use crate::schema::CanonicalField;
use crate::utils::round_cents;
use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AllocationMode {
    #[schemars(
        description = "Each present staff member's weight is their performance value divided by the weight divisor."
    )]
    Weighted,

    #[schemars(description = "Every present staff member has weight 1; the staff pool is split evenly.")]
    EqualSplit,
}

impl Default for AllocationMode {
    fn default() -> Self {
        Self::Weighted
    }
}

/// Accepted header spellings per canonical field.
///
/// Spellings are compared after lower-casing and removing all whitespace, so
/// `"Total Pool"` matches the alias `"totalpool"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HeaderAliases {
    #[serde(default = "default_date_aliases")]
    pub date: Vec<String>,
    #[serde(default = "default_name_aliases")]
    pub name: Vec<String>,
    #[serde(default = "default_role_aliases")]
    pub role: Vec<String>,
    #[serde(default = "default_attendance_aliases")]
    pub attendance: Vec<String>,
    #[serde(default = "default_pool_aliases")]
    pub pool: Vec<String>,
    #[serde(default = "default_value_aliases")]
    pub value: Vec<String>,
}

impl HeaderAliases {
    pub fn for_field(&self, field: CanonicalField) -> &[String] {
        match field {
            CanonicalField::Date => &self.date,
            CanonicalField::Name => &self.name,
            CanonicalField::Role => &self.role,
            CanonicalField::Attendance => &self.attendance,
            CanonicalField::Pool => &self.pool,
            CanonicalField::Value => &self.value,
        }
    }

    /// Returns the canonical field a raw header cell refers to, if any.
    /// Fields are tried in [`CanonicalField::ALL`] order.
    pub fn match_header(&self, header: &str) -> Option<CanonicalField> {
        let key = normalize_header(header);
        if key.is_empty() {
            return None;
        }
        CanonicalField::ALL.into_iter().find(|field| {
            self.for_field(*field)
                .iter()
                .any(|alias| normalize_header(alias) == key)
        })
    }
}

impl Default for HeaderAliases {
    fn default() -> Self {
        Self {
            date: default_date_aliases(),
            name: default_name_aliases(),
            role: default_role_aliases(),
            attendance: default_attendance_aliases(),
            pool: default_pool_aliases(),
            value: default_value_aliases(),
        }
    }
}

pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_date_aliases() -> Vec<String> {
    strings(&["date", "day"])
}

fn default_name_aliases() -> Vec<String> {
    strings(&["name", "employee", "staff"])
}

fn default_role_aliases() -> Vec<String> {
    strings(&["role", "position"])
}

fn default_attendance_aliases() -> Vec<String> {
    strings(&["attendance", "present", "attended"])
}

fn default_pool_aliases() -> Vec<String> {
    strings(&["pool", "totalpool", "tips", "tip", "total"])
}

fn default_value_aliases() -> Vec<String> {
    strings(&["value", "points", "c"])
}

fn default_kitchen_share_ratio() -> f64 {
    0.25
}

fn default_weight_divisor() -> f64 {
    4.0
}

fn default_kitchen_pattern() -> String {
    "kitchen".to_string()
}

fn default_present_markers() -> Vec<String> {
    strings(&["yes"])
}

fn default_date_column_pattern() -> String {
    r"^\d{2}/\d{2}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AllocationConfig {
    #[serde(default = "default_kitchen_share_ratio")]
    #[schemars(
        description = "Fraction of the daily pool reserved for the kitchen when any kitchen row is present. Between 0.0 and 1.0."
    )]
    pub kitchen_share_ratio: f64,

    #[serde(default = "default_weight_divisor")]
    #[schemars(description = "Performance values are divided by this to obtain staff weights. Must be positive.")]
    pub weight_divisor: f64,

    #[serde(default = "default_kitchen_pattern")]
    #[schemars(
        description = "Case-insensitive regular expression; a row whose role (or name, when the role is blank) matches is kitchen."
    )]
    pub kitchen_pattern: String,

    #[serde(default = "default_present_markers")]
    #[schemars(description = "Attendance cell values (case-insensitive, exact) that mean the person was present.")]
    pub present_markers: Vec<String>,

    #[serde(default)]
    #[schemars(description = "How the staff share is divided between present non-kitchen staff.")]
    pub allocation_mode: AllocationMode,

    #[serde(default)]
    #[schemars(
        description = "When weighted mode finds staff present but every weight is zero, split the staff pool evenly instead of leaving it unallocated."
    )]
    pub equal_split_fallback: bool,

    #[serde(default = "default_date_column_pattern")]
    #[schemars(description = "Regular expression a wide-format header must match to be treated as a date column.")]
    pub date_column_pattern: String,

    #[serde(default)]
    #[schemars(description = "Accepted header spellings per canonical column.")]
    pub aliases: HeaderAliases,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            kitchen_share_ratio: default_kitchen_share_ratio(),
            weight_divisor: default_weight_divisor(),
            kitchen_pattern: default_kitchen_pattern(),
            present_markers: default_present_markers(),
            allocation_mode: AllocationMode::default(),
            equal_split_fallback: false,
            date_column_pattern: default_date_column_pattern(),
            aliases: HeaderAliases::default(),
        }
    }
}

impl AllocationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.kitchen_share_ratio) {
            return Err(TipPoolError::InvalidConfig(format!(
                "kitchen_share_ratio {} must be between 0.0 and 1.0",
                self.kitchen_share_ratio
            )));
        }
        if !(self.weight_divisor > 0.0 && self.weight_divisor.is_finite()) {
            return Err(TipPoolError::InvalidConfig(format!(
                "weight_divisor {} must be a positive number",
                self.weight_divisor
            )));
        }
        if self.present_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(TipPoolError::InvalidConfig(
                "present_markers must contain at least one non-blank marker".to_string(),
            ));
        }
        self.kitchen_matcher()?;
        self.date_column_matcher()?;
        Ok(())
    }

    pub fn kitchen_matcher(&self) -> Result<Regex> {
        Ok(RegexBuilder::new(&self.kitchen_pattern)
            .case_insensitive(true)
            .build()?)
    }

    pub fn date_column_matcher(&self) -> Result<Regex> {
        Ok(Regex::new(&self.date_column_pattern)?)
    }

    pub fn is_present_marker(&self, cell: &str) -> bool {
        let cell = cell.trim();
        !cell.is_empty()
            && self
                .present_markers
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(cell))
    }

    /// Human-readable description of the active allocation rule.
    pub fn rule_description(&self, mode: AllocationMode) -> String {
        let kitchen_pct = round_cents(self.kitchen_share_ratio * 100.0);
        let staff_pct = round_cents(100.0 - kitchen_pct);
        match mode {
            AllocationMode::Weighted => format!(
                "Kitchen {}% if present; Staff {}% weighted by Value/{}",
                kitchen_pct, staff_pct, self.weight_divisor
            ),
            AllocationMode::EqualSplit => format!(
                "Kitchen {}% if present; Staff {}% split equally",
                kitchen_pct, staff_pct
            ),
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AllocationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_match_header_aliases() {
        let aliases = HeaderAliases::default();
        assert_eq!(aliases.match_header("Date"), Some(CanonicalField::Date));
        assert_eq!(aliases.match_header(" EMPLOYEE "), Some(CanonicalField::Name));
        assert_eq!(aliases.match_header("Total Pool"), Some(CanonicalField::Pool));
        assert_eq!(aliases.match_header("Tips"), Some(CanonicalField::Pool));
        assert_eq!(aliases.match_header("total"), Some(CanonicalField::Pool));
        assert_eq!(aliases.match_header("C"), Some(CanonicalField::Value));
        assert_eq!(aliases.match_header("Points"), Some(CanonicalField::Value));
        assert_eq!(aliases.match_header("Shift"), None);
        assert_eq!(aliases.match_header(""), None);
    }

    #[test]
    fn test_present_markers() {
        let config = AllocationConfig::default();
        assert!(config.is_present_marker("Yes"));
        assert!(config.is_present_marker("YES"));
        assert!(!config.is_present_marker("No"));
        assert!(!config.is_present_marker("yes please"));
        assert!(!config.is_present_marker(""));
    }

    #[test]
    fn test_kitchen_matcher_is_case_insensitive() {
        let matcher = AllocationConfig::default().kitchen_matcher().unwrap();
        assert!(matcher.is_match("Kitchen"));
        assert!(matcher.is_match("KITCHEN crew"));
        assert!(!matcher.is_match("FOH"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AllocationConfig::from_json_str(r#"{"kitchen_share_ratio": 0.3}"#).unwrap();
        assert_eq!(config.kitchen_share_ratio, 0.3);
        assert_eq!(config.weight_divisor, 4.0);
        assert_eq!(config.allocation_mode, AllocationMode::Weighted);
        assert_eq!(config.aliases, HeaderAliases::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            AllocationConfig::from_json_str(r#"{"kitchen_share_ratio": 1.5}"#),
            Err(TipPoolError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocationConfig::from_json_str(r#"{"weight_divisor": 0}"#),
            Err(TipPoolError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocationConfig::from_json_str(r#"{"kitchen_pattern": "(unclosed"}"#),
            Err(TipPoolError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"allocation_mode": "EqualSplit", "present_markers": ["yes", "x"]}}"#)
            .unwrap();

        let config = AllocationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.allocation_mode, AllocationMode::EqualSplit);
        assert!(config.is_present_marker("X"));
    }

    #[test]
    fn test_rule_description() {
        let config = AllocationConfig::default();
        assert_eq!(
            config.rule_description(AllocationMode::Weighted),
            "Kitchen 25% if present; Staff 75% weighted by Value/4"
        );
        assert_eq!(
            config.rule_description(AllocationMode::EqualSplit),
            "Kitchen 25% if present; Staff 75% split equally"
        );
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = AllocationConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("kitchen_share_ratio"));
        assert!(schema_json.contains("present_markers"));
        assert!(schema_json.contains("aliases"));
    }
}
