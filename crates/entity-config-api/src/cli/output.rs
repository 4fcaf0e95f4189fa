//! Output formatting for the CLI
//!
//! Every result renders as JSON, YAML or a colored table.

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};

use entity_config_core::{IssueKind, RuleMetadata, ValidationIssue, ValidationReport};

use crate::error::CliError;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Result of validating one payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutput {
    pub valid: bool,
    pub issue_count: usize,
    pub fields_checked: usize,
    pub rules_applied: usize,
    pub issues: Vec<ValidationIssue>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ValidationOutput {
    pub fn from_report(report: &ValidationReport, duration_ms: Option<u64>) -> Self {
        let summary = if report.valid {
            "Payload is valid".to_string()
        } else {
            let structural = report.issues.iter().filter(|i| i.kind.is_structural()).count();
            format!(
                "Payload has {} issue(s): {} structural, {} business rule",
                report.issues.len(),
                structural,
                report.issues.len() - structural
            )
        };

        Self {
            valid: report.valid,
            issue_count: report.issues.len(),
            fields_checked: report.fields_checked,
            rules_applied: report.rules_applied,
            issues: report.issues.clone(),
            summary,
            duration_ms,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<(), CliError> {
        match format {
            OutputFormat::Json => print_json(self),
            OutputFormat::Yaml => print_yaml(self),
            OutputFormat::Table => {
                self.write_table(&mut io::stdout()).ok();
                Ok(())
            }
        }
    }

    pub fn write_table(&self, out: &mut impl Write) -> io::Result<()> {
        write_header(out, "Validation Results")?;

        let status = if self.valid { "+".green() } else { "x".red() };
        writeln!(out, "{} {}", status, self.summary)?;
        writeln!(
            out,
            "  Fields checked: {}  Rules applied: {}",
            self.fields_checked, self.rules_applied
        )?;
        if let Some(duration) = self.duration_ms {
            writeln!(out, "  Duration: {}ms", duration)?;
        }
        writeln!(out)?;

        if !self.issues.is_empty() {
            writeln!(out, "{}", "Issues:".cyan().bold())?;
            writeln!(out, "{}", "-".repeat(60))?;
            for (index, issue) in self.issues.iter().enumerate() {
                let kind = match issue.kind {
                    IssueKind::BusinessRuleError | IssueKind::UnknownRuleError => issue.kind.as_str().yellow(),
                    _ => issue.kind.as_str().red(),
                };
                writeln!(out, "{}. [{}] {}", index + 1, kind, issue.path().bold())?;
                writeln!(out, "   {}", issue.message)?;
                if let Some(rule) = &issue.rule {
                    writeln!(out, "   Rule: {}", rule.dimmed())?;
                }
                if let Some(cause) = &issue.cause {
                    writeln!(out, "   Cause: {}", cause.dimmed())?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Result of checking a schema file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCheckOutput {
    pub valid: bool,
    pub field_count: usize,
    pub rule_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Referenced rules with no registered implementation
    #[serde(default)]
    pub unknown_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl SchemaCheckOutput {
    pub fn render(&self, format: OutputFormat) -> Result<(), CliError> {
        match format {
            OutputFormat::Json => print_json(self),
            OutputFormat::Yaml => print_yaml(self),
            OutputFormat::Table => {
                self.write_table(&mut io::stdout()).ok();
                Ok(())
            }
        }
    }

    pub fn write_table(&self, out: &mut impl Write) -> io::Result<()> {
        write_header(out, "Schema Check")?;

        match &self.error {
            Some(error) => writeln!(out, "{} {}", "x".red(), error)?,
            None => writeln!(
                out,
                "{} Schema is valid ({} fields, {} rule invocations)",
                "+".green(),
                self.field_count,
                self.rule_count
            )?,
        }
        for rule in &self.unknown_rules {
            writeln!(out, "{} Rule '{}' is not registered", "!".yellow(), rule)?;
        }
        if let Some(fingerprint) = &self.fingerprint {
            writeln!(out, "  Fingerprint: {}", fingerprint.dimmed())?;
        }
        writeln!(out)?;
        Ok(())
    }
}

/// Metadata of every registered rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesOutput {
    pub rules: BTreeMap<String, RuleMetadata>,
}

impl RulesOutput {
    pub fn render(&self, format: OutputFormat) -> Result<(), CliError> {
        match format {
            OutputFormat::Json => print_json(&self.rules),
            OutputFormat::Yaml => print_yaml(&self.rules),
            OutputFormat::Table => {
                self.write_table(&mut io::stdout()).ok();
                Ok(())
            }
        }
    }

    pub fn write_table(&self, out: &mut impl Write) -> io::Result<()> {
        write_header(out, "Validation Rules")?;

        for (name, metadata) in &self.rules {
            writeln!(out, "{} - {}", name.bold(), metadata.label)?;
            if !metadata.applicable_types.is_empty() {
                writeln!(out, "  Applies to: {}", metadata.applicable_types.join(", "))?;
            }
            for param in &metadata.params {
                let options = param
                    .options
                    .as_ref()
                    .map(|o| format!(" [{}]", o.join(", ")))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  {} ({}): {}{}",
                    param.name.cyan(),
                    param.param_type,
                    param.label,
                    options
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

fn write_header(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title.cyan().bold())?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn print_yaml<T: Serialize>(value: &T) -> Result<(), CliError> {
    let yaml = serde_yaml::to_string(value)
        .map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{}", yaml);
    Ok(())
}
