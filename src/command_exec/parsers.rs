//! Pluggable output parsers for the Command Executor.
//!
//! Each parser consumes the combined stdout/stderr captured from a command
//! run and extracts `{file, line, message, category}` records. Parsers are
//! selected by a build-system identifier (`"maven"`, `"npm"`, `"cypress"`,
//! `"generic"`, ...) rather than by sniffing the command itself — the
//! caller (a domain skill, out of scope here) knows which build system it
//! invoked.

use serde::{Deserialize, Serialize};

/// One parsed diagnostic line from a captured command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedError {
    pub file: String,
    pub line: u32,
    pub message: String,
    pub category: String,
}

/// Parse `output` using the parser registered for `build_system`. Unknown
/// identifiers fall back to the generic parser rather than failing — the
/// Command Executor never raises.
pub fn parse_output(build_system: &str, output: &str) -> Vec<ParsedError> {
    match build_system {
        "maven" => parse_maven(output),
        "npm" | "node" => parse_npm(output),
        "cypress" => parse_cypress(output),
        _ => parse_generic(output),
    }
}

/// `path/to/File.java:[line,col] message` (javac/Maven compiler plugin) and
/// `[ERROR] Tests run: N, Failures: M` summary lines.
fn parse_maven(output: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("[ERROR] ") {
            if let Some((file, remainder)) = rest.split_once(":[") {
                if let Some((pos, message)) = remainder.split_once(']') {
                    let line_no = pos.split(',').next().unwrap_or("0").trim().parse().unwrap_or(0);
                    out.push(ParsedError {
                        file: file.trim().to_string(),
                        line: line_no,
                        message: message.trim_start_matches(':').trim().to_string(),
                        category: "compilation_error".to_string(),
                    });
                    continue;
                }
            }
            if rest.contains("Failures:") || rest.contains("FAILED") {
                out.push(ParsedError {
                    file: String::new(),
                    line: 0,
                    message: rest.trim().to_string(),
                    category: "test_failure".to_string(),
                });
            } else {
                out.push(ParsedError {
                    file: String::new(),
                    line: 0,
                    message: rest.trim().to_string(),
                    category: "dependency_error".to_string(),
                });
            }
        } else if let Some(rest) = line.strip_prefix("[WARNING] ") {
            out.push(ParsedError {
                file: String::new(),
                line: 0,
                message: rest.trim().to_string(),
                category: "warning".to_string(),
            });
        }
    }
    out
}

/// TypeScript/ESLint-style `file.ts(line,col): error TSxxxx: message` and
/// Jest/Mocha `✕ test name` failure lines.
fn parse_npm(output: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some((file_part, rest)) = trimmed.split_once('(') {
            if let Some((pos, rest)) = rest.split_once(')') {
                let line_no = pos.split(',').next().unwrap_or("0").trim().parse().unwrap_or(0);
                let category = if rest.contains("error TS") {
                    "type_error"
                } else if rest.to_lowercase().contains("error") {
                    "lint_error"
                } else {
                    continue;
                };
                out.push(ParsedError {
                    file: file_part.trim().to_string(),
                    line: line_no,
                    message: rest.trim_start_matches(':').trim().to_string(),
                    category: category.to_string(),
                });
                continue;
            }
        }
        if trimmed.starts_with('✕') || trimmed.starts_with("FAIL") {
            out.push(ParsedError {
                file: String::new(),
                line: 0,
                message: trimmed.to_string(),
                category: "test_failure".to_string(),
            });
        }
    }
    out
}

/// Cypress reporter lines: `  1) Suite name > test name:` followed by
/// `     AssertionError: message` on a later line.
fn parse_cypress(output: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    let mut pending_title: Option<String> = None;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) && trimmed.contains(')') {
            pending_title = Some(trimmed.to_string());
            continue;
        }
        if let Some(title) = pending_title.take() {
            if trimmed.to_lowercase().contains("error") {
                out.push(ParsedError {
                    file: String::new(),
                    line: 0,
                    message: format!("{title}: {trimmed}"),
                    category: "test_failure".to_string(),
                });
            }
        }
    }
    out
}

/// Fallback: lines containing `error` are `compilation_error`, lines
/// containing `warning` are `warning`. No file/line extraction.
fn parse_generic(output: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("error") {
            out.push(ParsedError {
                file: String::new(),
                line: 0,
                message: line.trim().to_string(),
                category: "compilation_error".to_string(),
            });
        } else if lower.contains("warning") {
            out.push(ParsedError {
                file: String::new(),
                line: 0,
                message: line.trim().to_string(),
                category: "warning".to_string(),
            });
        }
    }
    out
}
