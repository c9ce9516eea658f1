//! `bomcheck check` / `bomcheck validate` — workbook verification commands.

use std::path::{Path, PathBuf};

use bomcheck_io::{apply_fills, load_input, WorkbookError};
use bomcheck_recon::config::CheckConfig;
use bomcheck_recon::engine;
use bomcheck_recon::model::CheckSummary;

use crate::exit_codes::{
    EXIT_CHECK_FAILED, EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_STRUCTURAL, EXIT_WORKBOOK,
    EXIT_WRITE_BACK,
};
use crate::CliError;

fn check_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn load_config(path: Option<&Path>) -> Result<CheckConfig, CliError> {
    match path {
        None => Ok(CheckConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                check_err(
                    EXIT_INVALID_CONFIG,
                    format!("cannot read config {}: {e}", path.display()),
                )
            })?;
            CheckConfig::from_toml(&text)
                .map_err(|e| check_err(EXIT_INVALID_CONFIG, e.to_string()))
        }
    }
}

pub fn cmd_check(
    workbook: PathBuf,
    config_path: Option<PathBuf>,
    dry_run: bool,
    json_output: bool,
    output_file: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;

    let input = load_input(&workbook, &config).map_err(|e| {
        let err = check_err(EXIT_WORKBOOK, e.to_string());
        match e {
            WorkbookError::MissingSheet { .. } => {
                err.with_hint("sheet names come from [sheets] in the config file")
            }
            _ => err,
        }
    })?;

    let result = engine::run(&config, &input)
        .map_err(|e| check_err(EXIT_INVALID_CONFIG, e.to_string()))?;

    if !dry_run {
        apply_fills(&workbook, &config.sheets.report, &result.fills)
            .map_err(|e| check_err(EXIT_WRITE_BACK, e.to_string()))?;
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| check_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| check_err(EXIT_ERROR, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    if !quiet {
        print_summary(&result.summary, dry_run);
    }

    exit_verdict(&result.summary)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&config_path)
        .map_err(|e| check_err(EXIT_INVALID_CONFIG, format!("cannot read config: {e}")))?;

    match CheckConfig::from_toml(&text) {
        Ok(config) => {
            eprintln!(
                "valid: '{}' — report '{}' (part col {}, level col {}, qty col {}), parts list '{}' (key col {})",
                config.name,
                config.sheets.report,
                config.report.part,
                config.report.level,
                config.report.qty,
                config.sheets.parts_list,
                config.parts_list.key,
            );
            Ok(())
        }
        Err(e) => Err(check_err(EXIT_INVALID_CONFIG, e.to_string())),
    }
}

fn print_summary(s: &CheckSummary, dry_run: bool) {
    eprintln!(
        "checked {} children under {} parents — {} passed, {} failed, {} cells {}",
        s.children_checked,
        s.parents_seen,
        s.passed,
        s.failed,
        s.cells_annotated,
        if dry_run { "to annotate (dry run)" } else { "annotated" },
    );
    if s.orphan_rows > 0 {
        eprintln!("warning: {} report row(s) attached to no parent", s.orphan_rows);
    }
    if s.dangling_alternate_rows > 0 {
        eprintln!(
            "warning: {} alternate-key row(s) with no child to attach to",
            s.dangling_alternate_rows
        );
    }
}

fn exit_verdict(s: &CheckSummary) -> Result<(), CliError> {
    if s.failed > 0 {
        return Err(check_err(
            EXIT_CHECK_FAILED,
            format!("{} child quantity check(s) failed", s.failed),
        ));
    }
    if s.orphan_rows > 0 || s.dangling_alternate_rows > 0 {
        return Err(check_err(
            EXIT_STRUCTURAL,
            "all quantities match, but the report has structural problems",
        ));
    }
    Ok(())
}
