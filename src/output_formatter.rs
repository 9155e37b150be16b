use crate::cli::Format;
use crate::detector::EmojiMatch;
use crate::errors::Result;
use crate::scanner::ProcessResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Defines the possible output formats for scan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One human-readable line per match.
    Text,
    /// A single JSON document.
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Csv => OutputFormat::Csv,
        }
    }
}

/// Totals over a batch of scan results.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub files_with_emoji: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_emoji: usize,
    pub unique_emoji: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ProcessResult]) -> Self {
        let mut summary = ScanSummary {
            files_scanned: results.len(),
            ..ScanSummary::default()
        };
        let mut distinct = std::collections::HashSet::new();

        for r in results {
            if !r.success {
                summary.files_failed += 1;
            } else if r.skipped_reason.is_some() {
                summary.files_skipped += 1;
            }
            let count = r.emoji_count();
            if count > 0 {
                summary.files_with_emoji += 1;
                summary.total_emoji += count;
            }
            for (_, m) in matches_of(r) {
                distinct.insert(m.emoji.as_str());
            }
        }
        summary.unique_emoji = distinct.len();
        summary
    }
}

fn matches_of(result: &ProcessResult) -> impl Iterator<Item = (&Path, &EmojiMatch)> {
    result
        .detection
        .iter()
        .flat_map(|d| d.matches.iter())
        .map(move |m| (result.file_path.as_path(), m))
}

/// Renders scan results as reports.
pub struct OutputFormatter {
    format: OutputFormat,
    include_summary: bool,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    /// Creates a new `OutputFormatter`.
    ///
    /// # Arguments
    ///
    /// * `format` - The `OutputFormat` to use.
    /// * `include_summary` - Append totals to text and CSV reports. JSON
    ///   reports always carry a `summary` object.
    pub fn new(format: OutputFormat, include_summary: bool) -> Self {
        Self {
            format,
            include_summary,
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes the formatted report for `results` to `writer`.
    pub fn write_output<W: Write>(&self, writer: &mut W, results: &[ProcessResult]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => self.format_text(results),
            OutputFormat::Json => self.format_json(results)?,
            OutputFormat::Csv => self.format_csv(results)?,
        };
        writer.write_all(output.as_bytes())?;

        if self.include_summary && self.format != OutputFormat::Json {
            writer.write_all(self.format_summary(results).as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn format_text(&self, results: &[ProcessResult]) -> String {
        let mut output = String::new();

        for r in results {
            for (path, m) in matches_of(r) {
                output.push_str(&format!(
                    "{}:{}:{}: {} ({})\n",
                    path.display(),
                    m.line,
                    m.column,
                    m.emoji,
                    m.category
                ));
            }
            if let Some(error) = &r.error {
                output.push_str(&format!("{}: error: {}\n", r.file_path.display(), error));
            }
        }

        output
    }

    fn format_json(&self, results: &[ProcessResult]) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            tool: ToolInfo<'a>,
            scan_time: DateTime<Utc>,
            summary: ScanSummary,
            matches: Vec<JsonMatch<'a>>,
            errors: Vec<JsonError<'a>>,
        }

        #[derive(Serialize)]
        struct ToolInfo<'a> {
            name: &'a str,
            version: &'a str,
        }

        #[derive(Serialize)]
        struct JsonMatch<'a> {
            file: String,
            #[serde(flatten)]
            emoji: &'a EmojiMatch,
        }

        #[derive(Serialize)]
        struct JsonError<'a> {
            file: String,
            error: &'a str,
        }

        let output = JsonOutput {
            tool: ToolInfo {
                name: &self.tool_name,
                version: &self.tool_version,
            },
            scan_time: Utc::now(),
            summary: ScanSummary::from_results(results),
            matches: results
                .iter()
                .flat_map(matches_of)
                .map(|(path, m)| JsonMatch {
                    file: path.display().to_string(),
                    emoji: m,
                })
                .collect(),
            errors: results
                .iter()
                .filter_map(|r| {
                    r.error.as_deref().map(|error| JsonError {
                        file: r.file_path.display().to_string(),
                        error,
                    })
                })
                .collect(),
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }

    fn format_csv(&self, results: &[ProcessResult]) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(["File", "Line", "Column", "Emoji", "Category"])?;

        for (path, m) in results.iter().flat_map(matches_of) {
            wtr.write_record([
                path.display().to_string(),
                m.line.to_string(),
                m.column.to_string(),
                m.emoji.clone(),
                m.category.to_string(),
            ])?;
        }

        let data = wtr.into_inner().map_err(|e| format!("CSV writer error: {e}"))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Totals plus the most frequent emoji.
    fn format_summary(&self, results: &[ProcessResult]) -> String {
        let totals = ScanSummary::from_results(results);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, m) in results.iter().flat_map(matches_of) {
            *counts.entry(m.emoji.as_str()).or_insert(0) += 1;
        }

        let mut summary = String::new();
        summary.push_str(&format!("\n{} Summary {}\n", "=".repeat(20), "=".repeat(20)));
        summary.push_str(&format!("Files scanned     : {}\n", totals.files_scanned));
        summary.push_str(&format!("Files with emoji  : {}\n", totals.files_with_emoji));
        summary.push_str(&format!("Files skipped     : {}\n", totals.files_skipped));
        summary.push_str(&format!("Files failed      : {}\n", totals.files_failed));
        summary.push_str(&format!("Total emoji       : {}\n", totals.total_emoji));
        summary.push_str(&format!("Unique emoji      : {}\n", totals.unique_emoji));

        if !counts.is_empty() {
            summary.push_str("\nTop emoji:\n");
            let mut ranked: Vec<_> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            for (emoji, count) in ranked.iter().take(10) {
                summary.push_str(&format!("  {emoji} - {count}\n"));
            }
        }

        summary
    }
}
