//! External tool availability.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::ToolSettings;

/// Resolution result for one configured program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    /// Role of the tool in the pipeline ("prober", "extractor", "ocr").
    pub role: &'static str,
    /// Program as configured.
    pub program: String,
    /// Resolved executable, if found.
    pub resolved: Option<PathBuf>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Resolve a program name or path the way the runner would spawn it.
pub fn locate_tool(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Resolve every configured external program.
pub fn check_tools(tools: &ToolSettings) -> Vec<ToolStatus> {
    [
        ("prober", &tools.mkvmerge),
        ("extractor", &tools.mkvextract),
        ("ocr", &tools.ocr_program),
    ]
    .into_iter()
    .map(|(role, program)| {
        let resolved = locate_tool(program);
        match &resolved {
            Some(path) => tracing::debug!("{} '{}' -> {}", role, program, path.display()),
            None => tracing::warn!("{} '{}' not found on PATH", role, program),
        }
        ToolStatus {
            role,
            program: program.clone(),
            resolved,
        }
    })
    .collect()
}

/// Names of the configured programs that could not be resolved.
pub fn missing_tools(tools: &ToolSettings) -> Vec<String> {
    check_tools(tools)
        .into_iter()
        .filter(|status| !status.is_available())
        .map(|status| status.program)
        .collect()
}
