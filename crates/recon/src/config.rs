use serde::Deserialize;

use crate::error::CheckError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sheets: SheetNames,
    #[serde(default)]
    pub report: ReportColumns,
    #[serde(default)]
    pub parts_list: PartsListColumns,
    #[serde(default)]
    pub policy: MatchPolicy,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            name: String::new(),
            sheets: SheetNames::default(),
            report: ReportColumns::default(),
            parts_list: PartsListColumns::default(),
            policy: MatchPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SheetNames {
    #[serde(default = "default_report_sheet")]
    pub report: String,
    #[serde(default = "default_parts_sheet")]
    pub parts_list: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        SheetNames {
            report: default_report_sheet(),
            parts_list: default_parts_sheet(),
        }
    }
}

fn default_report_sheet() -> String {
    "Report Data".into()
}

fn default_parts_sheet() -> String {
    "EPL Data".into()
}

// ---------------------------------------------------------------------------
// Report sheet columns (1-based)
// ---------------------------------------------------------------------------

/// Column layout of the indented report sheet. Defaults match the production
/// workbook export: part key in J, indent level in I, category tag in M,
/// alternate label in L, quantity in N, header on row 1.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportColumns {
    #[serde(default = "default_report_part")]
    pub part: u32,
    #[serde(default = "default_report_level")]
    pub level: u32,
    #[serde(default = "default_report_category")]
    pub category: u32,
    #[serde(default = "default_report_alt_label")]
    pub alt_label: u32,
    #[serde(default = "default_report_qty")]
    pub qty: u32,
    #[serde(default = "default_first_row")]
    pub first_row: u32,
}

impl Default for ReportColumns {
    fn default() -> Self {
        ReportColumns {
            part: default_report_part(),
            level: default_report_level(),
            category: default_report_category(),
            alt_label: default_report_alt_label(),
            qty: default_report_qty(),
            first_row: default_first_row(),
        }
    }
}

fn default_report_part() -> u32 {
    10 // J
}

fn default_report_level() -> u32 {
    9 // I
}

fn default_report_category() -> u32 {
    13 // M
}

fn default_report_alt_label() -> u32 {
    12 // L
}

fn default_report_qty() -> u32 {
    14 // N
}

fn default_first_row() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Parts-list sheet columns (1-based)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PartsListColumns {
    #[serde(default = "default_parts_key")]
    pub key: u32,
    #[serde(default = "default_parts_desc")]
    pub desc: u32,
    #[serde(default = "default_parts_qty")]
    pub qty: u32,
    #[serde(default = "default_first_row")]
    pub first_row: u32,
}

impl Default for PartsListColumns {
    fn default() -> Self {
        PartsListColumns {
            key: default_parts_key(),
            desc: default_parts_desc(),
            qty: default_parts_qty(),
            first_row: default_first_row(),
        }
    }
}

fn default_parts_key() -> u32 {
    1 // A
}

fn default_parts_desc() -> u32 {
    2 // B
}

fn default_parts_qty() -> u32 {
    3 // C
}

// ---------------------------------------------------------------------------
// Match policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchPolicy {
    /// Remove a reference pair from the pool once it validates a child.
    /// `false` reproduces the historical non-consuming behavior, kept only
    /// for comparing runs against old results. Deprecated.
    #[serde(default = "default_consume")]
    pub consume_matches: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy {
            consume_matches: default_consume(),
        }
    }
}

fn default_consume() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CheckConfig {
    pub fn from_toml(input: &str) -> Result<Self, CheckError> {
        let config: CheckConfig =
            toml::from_str(input).map_err(|e| CheckError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CheckError> {
        if self.sheets.report.trim().is_empty() || self.sheets.parts_list.trim().is_empty() {
            return Err(CheckError::ConfigValidation(
                "sheet names must be non-empty".into(),
            ));
        }
        if self.sheets.report == self.sheets.parts_list {
            return Err(CheckError::ConfigValidation(format!(
                "report and parts_list sheets must differ, both are \"{}\"",
                self.sheets.report
            )));
        }

        for (key, value) in [
            ("report.part", self.report.part),
            ("report.level", self.report.level),
            ("report.category", self.report.category),
            ("report.alt_label", self.report.alt_label),
            ("report.qty", self.report.qty),
            ("report.first_row", self.report.first_row),
            ("parts_list.key", self.parts_list.key),
            ("parts_list.desc", self.parts_list.desc),
            ("parts_list.qty", self.parts_list.qty),
            ("parts_list.first_row", self.parts_list.first_row),
        ] {
            if value == 0 {
                return Err(CheckError::ConfigValidation(format!(
                    "{key} must be >= 1 (columns and rows are 1-based)"
                )));
            }
        }

        // part/level/qty drive classification and annotation; sharing a
        // column cannot be a working layout
        if self.report.part == self.report.level
            || self.report.part == self.report.qty
            || self.report.level == self.report.qty
        {
            return Err(CheckError::ConfigValidation(
                "report part, level and qty columns must be distinct".into(),
            ));
        }
        if self.parts_list.key == self.parts_list.qty || self.parts_list.key == self.parts_list.desc
        {
            return Err(CheckError::ConfigValidation(
                "parts_list key column must differ from qty and desc".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
