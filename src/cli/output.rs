//! CLI output formatting utilities.

use crate::pipeline::{IngestOutcome, IngestReport, TranscriptEntry};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print the outcome of ingesting one transcript.
    pub fn ingest_report(report: &IngestReport) {
        let marker = match report.outcome {
            IngestOutcome::Indexed | IngestOutcome::AlreadyIndexed => style("ok").green(),
            IngestOutcome::Skipped(_) => style("--").yellow(),
            _ => style("!!").red(),
        };
        println!(
            "  {} {} {}",
            marker.bold(),
            style(&report.source_id).bold(),
            style(&report.outcome).dim()
        );
        if report.recovered_corruption {
            Self::warning("The existing index was unreadable and has been replaced.");
        }
    }

    /// Print one transcript listing line.
    pub fn transcript_entry(entry: &TranscriptEntry) {
        let indexed = if entry.indexed {
            style("indexed").green()
        } else {
            style("not indexed").dim()
        };

        let mut details = Vec::new();
        if let Some(language) = &entry.language {
            let mut lang = language.clone();
            if entry.translated {
                lang.push_str(", translated");
            }
            details.push(lang);
        }
        if let Some(stats) = entry.stats {
            details.push(format!("{} words", stats.words));
            details.push(format!("{} speakers", stats.speakers));
        }
        if let Some(modified) = entry.modified {
            details.push(modified.format("%Y-%m-%d %H:%M").to_string());
        }
        if let Some(problem) = &entry.problem {
            details.push(problem.clone());
        }

        println!(
            "  {} {} [{}] ({})",
            style("*").cyan(),
            style(&entry.source_id).bold(),
            indexed,
            details.join(", ")
        );
    }

    /// Print search result.
    pub fn search_result(source_id: &str, score: f64, content: &str) {
        println!(
            "\n{} {} (score: {:.2})",
            style(">>").green(),
            style(source_id).bold(),
            score
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis, on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
