//! Multi-pass correction over subtitle text.

use serde::Serialize;

use super::rules::COMPILED_RULES;
use crate::config::CorrectionSettings;
use crate::models::CorrectionLevel;

/// Default pass cap for [`CorrectionLevel::Thorough`].
pub const DEFAULT_THOROUGH_PASSES: u32 = 3;

/// Result of correcting a block of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionOutcome {
    pub text: String,
    /// Passes executed, including a final pass that changed nothing.
    pub passes_run: u32,
    /// Passes that changed the text.
    pub changing_passes: u32,
    /// A pass ran without changing anything.
    pub converged: bool,
    /// Rule applications that changed at least one line, summed over passes.
    pub rules_triggered: usize,
}

impl CorrectionOutcome {
    fn unchanged(content: &str) -> Self {
        Self {
            text: content.to_string(),
            passes_run: 0,
            changing_passes: 0,
            converged: true,
            rules_triggered: 0,
        }
    }

    pub fn changed(&self) -> bool {
        self.changing_passes > 0
    }
}

/// Correction level plus pass budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionEngine {
    level: CorrectionLevel,
    max_passes: u32,
}

impl CorrectionEngine {
    pub fn new(level: CorrectionLevel) -> Self {
        Self {
            level,
            max_passes: DEFAULT_THOROUGH_PASSES,
        }
    }

    pub fn from_settings(settings: &CorrectionSettings) -> Self {
        Self::new(settings.level).with_max_passes(settings.thorough_max_passes)
    }

    /// Pass cap used at the thorough level. Zero is treated as one.
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn level(&self) -> CorrectionLevel {
        self.level
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    pub fn correct(&self, content: &str) -> CorrectionOutcome {
        correct_content(content, self.level, self.max_passes)
    }
}

/// Correct `content` at `level`.
///
/// Off returns the input untouched. Standard runs exactly one pass.
/// Thorough repeats passes until one changes nothing or `max_passes`
/// passes have run.
pub fn correct_content(content: &str, level: CorrectionLevel, max_passes: u32) -> CorrectionOutcome {
    let budget = match level {
        CorrectionLevel::Off => return CorrectionOutcome::unchanged(content),
        CorrectionLevel::Standard => 1,
        CorrectionLevel::Thorough => max_passes.max(1),
    };

    let (bom, body) = match content.strip_prefix('\u{FEFF}') {
        Some(rest) => ("\u{FEFF}", rest),
        None => ("", content),
    };

    let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    let mut outcome = CorrectionOutcome::unchanged(content);
    outcome.converged = false;

    for _ in 0..budget {
        outcome.passes_run += 1;
        let triggered = run_pass(&mut lines);
        if triggered == 0 {
            outcome.converged = true;
            break;
        }
        outcome.changing_passes += 1;
        outcome.rules_triggered += triggered;
    }

    if outcome.changing_passes > 0 {
        outcome.text = format!("{}{}", bom, lines.join("\n"));
    }

    tracing::trace!(
        "Correction at {:?}: {} passes, {} changing, {} rules",
        level,
        outcome.passes_run,
        outcome.changing_passes,
        outcome.rules_triggered
    );

    outcome
}

/// One pass of the whole table over every text line.
///
/// Returns how many rules changed at least one line.
fn run_pass(lines: &mut [String]) -> usize {
    let mut triggered = 0;

    for compiled in COMPILED_RULES.iter() {
        let mut fired = false;
        for line in lines.iter_mut() {
            let (text, cr) = split_cr(line);
            if is_structural(text) {
                continue;
            }
            if let Some(mut changed) = compiled.apply(text) {
                if cr {
                    changed.push('\r');
                }
                *line = changed;
                fired = true;
            }
        }
        if fired {
            triggered += 1;
        }
    }

    triggered
}

fn split_cr(line: &str) -> (&str, bool) {
    match line.strip_suffix('\r') {
        Some(text) => (text, true),
        None => (line, false),
    }
}

/// Lines that carry file structure rather than dialogue.
fn is_structural(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.chars().all(|c| c.is_ascii_digit())
        || trimmed.contains("-->")
        || trimmed.starts_with("WEBVTT")
}
