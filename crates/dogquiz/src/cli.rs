//! CLI output and argument helpers
//!
//! Table/JSON formatters for breeds, quiz questions, statistics and task
//! reports. Handlers in `main.rs` do the work, this module only renders.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use dogquiz_core::models::{Breed, CacheStats, HealthReport, HealthStatus};
use dogquiz_core::{DataSource, Difficulty, QuizQuestion, Size, TaskOutcome, TaskReport};
use serde::Serialize;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    NoResults { query: String },
    UnknownBreed { id: String },
    Core(dogquiz_core::CoreError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoResults { query } => write!(f, "No breeds match '{}'", query),
            CliError::UnknownBreed { id } => {
                write!(f, "Unknown breed '{}' (try `dogquiz search`)", id)
            }
            CliError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<dogquiz_core::CoreError> for CliError {
    fn from(e: dogquiz_core::CoreError) -> Self {
        CliError::Core(e)
    }
}

// ============================================================================
// Argument parsing
// ============================================================================

pub fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    s.parse()
}

pub fn parse_size(s: &str) -> Result<Size, String> {
    s.parse()
}

// ============================================================================
// Formatters
// ============================================================================

fn header(table: &mut Table, names: &[&str], no_color: bool) {
    if no_color {
        table.set_header(names.to_vec());
    } else {
        table.set_header(
            names
                .iter()
                .map(|n| Cell::new(n).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Breed list as a table (human) or JSON
pub fn format_breed_table(breeds: &[Breed], json: bool, no_color: bool) -> String {
    if json {
        return to_json(breeds);
    }

    if breeds.is_empty() {
        return "No breeds found.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(
        &mut table,
        &["ID", "Name", "Size", "Difficulty", "Origin", "Fav", "Expires"],
        no_color,
    );

    for breed in breeds {
        let record = &breed.record;
        table.add_row(Row::from(vec![
            record.id.clone(),
            record.name.clone(),
            record.size.to_string(),
            record.difficulty.to_string(),
            truncate(non_empty(&record.origin), 20),
            if record.is_favorite { "*" } else { "" }.to_string(),
            format_expiry(record.expires_at, Utc::now()),
        ]));
    }

    table.to_string()
}

/// Single breed details (human or JSON)
pub fn format_breed_info(breed: &Breed, json: bool) -> String {
    if json {
        return to_json(breed);
    }

    let record = &breed.record;
    let mut lines = vec![];

    lines.push(format!("Breed:        {} ({})", record.name, record.id));
    lines.push(format!("Size:         {}", record.size));
    lines.push(format!("Difficulty:   {}", record.difficulty));
    lines.push(format!("Origin:       {}", non_empty(&record.origin)));
    lines.push(format!("Life span:    {}", non_empty(&record.life_span)));
    if !record.temperament.is_empty() {
        lines.push(format!("Temperament:  {}", record.temperament.join(", ")));
    }
    lines.push(format!("Favorite:     {}", record.is_favorite));
    lines.push(format!("Source:       {}", record.source));
    lines.push(format!(
        "Cached:       {} (expires {})",
        record.cached_at.format("%Y-%m-%d %H:%M"),
        record.expires_at.format("%Y-%m-%d %H:%M")
    ));
    lines.push(format!(
        "Image:        {}",
        breed.image_url.as_deref().unwrap_or("-")
    ));
    if !record.description.is_empty() {
        lines.push(String::new());
        lines.push(record.description.clone());
    }
    if !record.trivia.is_empty() {
        lines.push(format!("Trivia: {}", record.trivia));
    }

    lines.join("\n")
}

/// One line under a breed list saying where it came from
pub fn format_source(source: DataSource) -> Option<String> {
    match source {
        DataSource::Cache | DataSource::Network => None,
        DataSource::Stale => Some("Offline: showing expired cached breeds".to_string()),
        DataSource::Static => Some("Offline: showing built-in breeds".to_string()),
    }
}

pub fn format_quiz(questions: &[QuizQuestion], json: bool) -> String {
    if json {
        return to_json(questions);
    }

    let mut out = vec![];
    for (n, question) in questions.iter().enumerate() {
        out.push(format!(
            "Q{} [{}] {}",
            n + 1,
            question.difficulty,
            question.image_url.as_deref().unwrap_or("(no image)")
        ));
        for (i, option) in question.options.iter().enumerate() {
            let marker = if question.is_correct(i) { "*" } else { " " };
            out.push(format!("  {} {}) {}", marker, (b'a' + i as u8) as char, option));
        }
    }
    out.join("\n")
}

pub fn format_stats(stats: &CacheStats, json: bool) -> String {
    if json {
        return to_json(stats);
    }

    let mut lines = vec![];
    lines.push("dogquiz - Cache Statistics".to_string());
    lines.push("==========================".to_string());
    lines.push(String::new());
    lines.push(format!(
        "Breeds:        {} ({} valid, {} favorite)",
        stats.total_breeds, stats.valid_breeds, stats.favorite_breeds
    ));
    lines.push(format!(
        "Images:        {} ({} valid)",
        stats.total_images, stats.valid_images
    ));
    lines.push(format!(
        "Image bytes:   {} of {} ({:.1}%)",
        format_size(stats.image_bytes),
        format_size(stats.max_cache_bytes),
        stats.utilization() * 100.0
    ));
    lines.push(format!("Database:      {}", format_size(stats.database_bytes)));
    lines.push(String::new());
    lines.push(format!(
        "Today:         {} hits, {} misses, {} cached, {} expired",
        stats.today.hits, stats.today.misses, stats.today.items_cached, stats.today.items_expired
    ));
    lines.push(format!(
        "Last {} days:  {} hits, {} misses, {} API calls",
        stats.retention_days,
        stats.retention.hits,
        stats.retention.misses,
        stats.retention.api_calls()
    ));
    lines.push(format!("Hit rate:      {:.1}%", stats.hit_rate() * 100.0));
    lines.push(format!(
        "  Breeds:      {:.1}%",
        stats.breeds.hit_rate() * 100.0
    ));
    lines.push(format!(
        "  Images:      {:.1}%",
        stats.images.hit_rate() * 100.0
    ));

    lines.join("\n")
}

pub fn format_health(report: &HealthReport, json: bool, no_color: bool) -> String {
    if json {
        return to_json(report);
    }

    let status = report.status.label();
    let status = if no_color {
        status.to_string()
    } else {
        let code = match report.status {
            HealthStatus::Healthy => "32",
            HealthStatus::Degraded => "33",
            HealthStatus::Unhealthy => "31",
        };
        format!("\x1b[{}m{}\x1b[0m", code, status)
    };

    let mut lines = vec![];
    lines.push(format!(
        "Health:        {:.0}/100 ({})",
        report.health_score, status
    ));
    lines.push(format!(
        "Items:         {} total, {} valid, {} expired",
        report.total_items, report.valid_items, report.expired_items
    ));
    lines.push(format!(
        "Utilization:   {:.1}%",
        report.utilization * 100.0
    ));
    lines.push(format!("Hit rate:      {:.1}%", report.hit_rate * 100.0));

    if !report.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        for rec in &report.recommendations {
            lines.push(format!("  - {}", rec));
        }
    }

    lines.join("\n")
}

pub fn format_task_report(report: &TaskReport, json: bool) -> String {
    if json {
        return to_json(report);
    }

    let status = match &report.outcome {
        TaskOutcome::Success => "ok".to_string(),
        TaskOutcome::Skipped { reason } => format!("skipped ({})", reason),
        TaskOutcome::Failed { error } => format!("failed: {}", error),
    };

    let mut lines = vec![format!(
        "{} {} in {}ms",
        report.kind,
        status,
        report.duration.as_millis()
    )];
    if report.breeds_refreshed > 0 {
        lines.push(format!("  Breeds refreshed: {}", report.breeds_refreshed));
    }
    if report.breeds_removed > 0 || report.images_removed > 0 {
        lines.push(format!(
            "  Removed:          {} breeds, {} images",
            report.breeds_removed, report.images_removed
        ));
    }
    if report.bytes_reclaimed > 0 {
        lines.push(format!(
            "  Reclaimed:        {}",
            format_size(report.bytes_reclaimed)
        ));
    }
    if report.stats_rows_removed > 0 {
        lines.push(format!(
            "  Stats rows:       {} deleted",
            report.stats_rows_removed
        ));
    }
    lines.join("\n")
}

// ============================================================================
// Utilities
// ============================================================================

/// `--max-mb` to bytes, saturating at `u64::MAX`
pub fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(1_048_576)
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.1}KB", bytes as f64 / 1_024.0)
    } else {
        format!("{}B", bytes)
    }
}

fn format_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = expires_at - now;
    if left <= chrono::Duration::zero() {
        "expired".to_string()
    } else if left.num_days() >= 1 {
        format!("{}d", left.num_days())
    } else {
        format!("{}h", left.num_hours())
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dogquiz_core::models::BreedRecord;

    fn breed(key: &str) -> Breed {
        Breed::from(BreedRecord::new(
            key,
            None,
            key,
            Utc::now(),
            chrono::Duration::days(7),
        ))
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(5 * 1_048_576), "5.0MB");
    }

    #[test]
    fn test_megabytes_saturates() {
        assert_eq!(megabytes(100), 104_857_600);
        assert_eq!(megabytes(u64::MAX), u64::MAX);
        assert_eq!(megabytes(u64::MAX / 1_048_576 + 1), u64::MAX);
    }

    #[test]
    fn test_format_expiry() {
        let now = Utc::now();
        assert_eq!(format_expiry(now - chrono::Duration::hours(1), now), "expired");
        assert_eq!(format_expiry(now + chrono::Duration::hours(5), now), "5h");
        assert_eq!(
            format_expiry(now + chrono::Duration::days(3) + chrono::Duration::hours(1), now),
            "3d"
        );
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate("Shiba Inu", 20), "Shiba Inu");
        assert_eq!(truncate("Großer Schweizer", 6), "Große…");
    }

    #[test]
    fn test_breed_table_json() {
        let out = format_breed_table(&[breed("pug")], true, true);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_breed_table_empty() {
        assert_eq!(format_breed_table(&[], false, true), "No breeds found.");
    }

    #[test]
    fn test_source_banner_only_when_degraded() {
        assert!(format_source(DataSource::Cache).is_none());
        assert!(format_source(DataSource::Static).is_some());
    }

    #[test]
    fn test_parse_difficulty_arg() {
        assert_eq!(parse_difficulty("hard"), Ok(Difficulty::Hard));
        assert!(parse_difficulty("impossible").is_err());
    }
}
