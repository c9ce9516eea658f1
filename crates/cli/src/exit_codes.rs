//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success: every checked quantity matched, no orphans        |
//! | 1    | Verdict failures present (like diff(1))                    |
//! | 2    | CLI usage error (bad args, missing subcommand)             |
//! | 3    | Config unreadable, unparseable, or failing validation      |
//! | 4    | Workbook unreadable or a required sheet missing            |
//! | 5    | Verdicts clean but orphans / dangling alternate rows found |
//! | 6    | Annotation write-back failed (workbook left untouched)     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - the check ran and every verdict passed.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing subcommand.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Check (1, 3-6)
// =============================================================================

/// Quantity verdict failures present.
/// Like `diff(1)`, exit 1 means "the sides differ."
pub const EXIT_CHECK_FAILED: u8 = 1;

/// Config file unreadable, unparseable, or rejected by validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Workbook unreadable, or a configured sheet is not in the workbook.
pub const EXIT_WORKBOOK: u8 = 4;

/// Every verdict passed, but the report has structural orphans or
/// dangling alternate rows.
pub const EXIT_STRUCTURAL: u8 = 5;

/// Annotation write-back failed; the original workbook is untouched.
pub const EXIT_WRITE_BACK: u8 = 6;
