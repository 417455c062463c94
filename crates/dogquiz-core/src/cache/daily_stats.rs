//! Daily statistics table operations

use super::record_store::{parse_col, read_ts, to_millis, RecordStore};
use crate::error::{QueryContext, StorageError};
use crate::event::Table;
use crate::models::{DailyStat, StatCategory, StatDelta};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

const DATE_FORMAT: &str = "%Y-%m-%d";

const STAT_COLUMNS: &str = "date, category, hits, misses, bytes_cached, items_cached, \
     items_expired, clears, last_updated_at";

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn counter(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<DailyStat> {
    let raw_date: String = row.get(0)?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(DailyStat {
        date,
        category: parse_col::<StatCategory>(row, 1)?,
        hits: counter(row, 2)?,
        misses: counter(row, 3)?,
        bytes_cached: counter(row, 4)?,
        items_cached: counter(row, 5)?,
        items_expired: counter(row, 6)?,
        clears: counter(row, 7)?,
        last_updated_at: read_ts(row, 8)?,
    })
}

impl RecordStore {
    /// Apply `delta` to the row of each category for `date`
    ///
    /// Missing rows are created zeroed first; create and increment share one
    /// transaction so concurrent events for the same day never lose counts.
    pub fn increment_stats(
        &self,
        date: NaiveDate,
        categories: &[StatCategory],
        delta: StatDelta,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if delta.is_empty() || categories.is_empty() {
            return Ok(());
        }

        let key = date_key(date);
        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin stats increment")?;
        for category in categories {
            tx.execute(
                "INSERT OR IGNORE INTO daily_stats (date, category, last_updated_at) \
                 VALUES (?1, ?2, ?3)",
                params![key, category.as_str(), to_millis(now)],
            )
            .ctx("create daily stats row")?;

            tx.execute(
                r#"
                UPDATE daily_stats SET
                    hits = hits + ?3,
                    misses = misses + ?4,
                    bytes_cached = bytes_cached + ?5,
                    items_cached = items_cached + ?6,
                    items_expired = items_expired + ?7,
                    clears = clears + ?8,
                    last_updated_at = ?9
                WHERE date = ?1 AND category = ?2
                "#,
                params![
                    key,
                    category.as_str(),
                    delta.hits as i64,
                    delta.misses as i64,
                    delta.bytes_cached as i64,
                    delta.items_cached as i64,
                    delta.items_expired as i64,
                    delta.clears as i64,
                    to_millis(now),
                ],
            )
            .ctx("increment daily stats")?;
        }
        tx.commit().ctx("commit stats increment")?;
        drop(conn);

        self.notify(Table::DailyStats, categories.len());
        Ok(())
    }

    pub fn daily_stat(
        &self,
        date: NaiveDate,
        category: StatCategory,
    ) -> Result<Option<DailyStat>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM daily_stats WHERE date = ?1 AND category = ?2",
            STAT_COLUMNS
        );
        conn.query_row(&sql, params![date_key(date), category.as_str()], stat_from_row)
            .optional()
            .ctx("get daily stat")
    }

    /// Rows for `category` dated on or after `from`, oldest first
    pub fn stats_since(
        &self,
        from: NaiveDate,
        category: StatCategory,
    ) -> Result<Vec<DailyStat>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM daily_stats WHERE date >= ?1 AND category = ?2 ORDER BY date",
            STAT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).ctx("list daily stats")?;
        let rows = stmt
            .query_map(params![date_key(from), category.as_str()], stat_from_row)
            .ctx("list daily stats")?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row.ctx("read daily stat row")?);
        }
        Ok(stats)
    }

    pub fn all_daily_stats(&self) -> Result<Vec<DailyStat>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM daily_stats ORDER BY date, category",
            STAT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).ctx("list all daily stats")?;
        let rows = stmt
            .query_map([], stat_from_row)
            .ctx("list all daily stats")?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row.ctx("read daily stat row")?);
        }
        Ok(stats)
    }

    /// Delete rows dated strictly before `cutoff`
    pub fn delete_stats_before(&self, cutoff: NaiveDate) -> Result<usize, StorageError> {
        // ISO dates compare correctly as text
        let removed = self
            .conn()
            .execute(
                "DELETE FROM daily_stats WHERE date < ?1",
                params![date_key(cutoff)],
            )
            .ctx("delete old daily stats")?;
        self.notify(Table::DailyStats, removed);
        Ok(removed)
    }

    pub fn daily_stat_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM daily_stats", [], |row| row.get(0))
            .ctx("count daily stats")?;
        Ok(count as usize)
    }
}
