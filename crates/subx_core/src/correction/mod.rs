//! OCR text correction.
//!
//! An ordered table of literal and regex substitutions is applied to the
//! text lines of a subtitle file. The correction level decides how often:
//! not at all, one pass, or repeated passes until the text stops changing
//! (bounded by a pass cap).
//!
//! # Example
//!
//! ```
//! use subx_core::correction::correct_content;
//! use subx_core::models::CorrectionLevel;
//!
//! let outcome = correct_content("Hello ¦ world", CorrectionLevel::Thorough, 3);
//! assert_eq!(outcome.text, "Hello world");
//! assert_eq!(outcome.changing_passes, 2);
//! ```

mod engine;
mod file;
mod rules;

pub use engine::{correct_content, CorrectionEngine, CorrectionOutcome, DEFAULT_THOROUGH_PASSES};
pub use file::{backup_path_for, correct_file, CorrectionError, FileCorrectionReport};
pub use rules::{CorrectionRule, RuleKind, RULES, RULE_TABLE_VERSION};
