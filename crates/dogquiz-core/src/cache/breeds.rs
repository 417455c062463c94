//! Breed table operations

use super::record_store::{parse_col, read_ts, to_millis, RecordStore};
use crate::error::{QueryContext, StorageError};
use crate::event::{CacheEvent, Table};
use crate::models::{BreedRecord, Difficulty, Size};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::debug;

/// Rows removed by a breed delete, cascaded images included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreedPurge {
    pub breeds: usize,
    pub images: usize,
    pub image_bytes: u64,
}

const BREED_COLUMNS: &str = "id, breed_key, variant, name, description, trivia, origin, size, \
     difficulty, temperament, life_span, cached_at, expires_at, last_updated_at, source, is_favorite";

// is_favorite is left untouched on conflict
const UPSERT_BREED: &str = r#"
    INSERT INTO breeds
    (id, breed_key, variant, name, description, trivia, origin, size, difficulty,
     temperament, life_span, cached_at, expires_at, last_updated_at, source, is_favorite)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
    ON CONFLICT(id) DO UPDATE SET
        breed_key = excluded.breed_key,
        variant = excluded.variant,
        name = excluded.name,
        description = excluded.description,
        trivia = excluded.trivia,
        origin = excluded.origin,
        size = excluded.size,
        difficulty = excluded.difficulty,
        temperament = excluded.temperament,
        life_span = excluded.life_span,
        cached_at = excluded.cached_at,
        expires_at = excluded.expires_at,
        last_updated_at = excluded.last_updated_at,
        source = excluded.source
"#;

fn breed_from_row(row: &Row<'_>) -> rusqlite::Result<BreedRecord> {
    let temperament_json: String = row.get(9)?;
    let temperament: Vec<String> = serde_json::from_str(&temperament_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(BreedRecord {
        id: row.get(0)?,
        breed_key: row.get(1)?,
        variant: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        trivia: row.get(5)?,
        origin: row.get(6)?,
        size: parse_col::<Size>(row, 7)?,
        difficulty: parse_col::<Difficulty>(row, 8)?,
        temperament,
        life_span: row.get(10)?,
        cached_at: read_ts(row, 11)?,
        expires_at: read_ts(row, 12)?,
        last_updated_at: read_ts(row, 13)?,
        source: row.get(14)?,
        is_favorite: row.get::<_, i64>(15)? != 0,
    })
}

fn temperament_json(record: &BreedRecord) -> Result<String, StorageError> {
    serde_json::to_string(&record.temperament).map_err(|source| StorageError::Serialization {
        field: "temperament",
        source,
    })
}

impl RecordStore {
    fn query_breeds<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
        context: &'static str,
    ) -> Result<Vec<BreedRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM breeds {}", BREED_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql).ctx(context)?;
        let rows = stmt.query_map(params, breed_from_row).ctx(context)?;

        let mut breeds = Vec::new();
        for row in rows {
            breeds.push(row.ctx("read breed row")?);
        }
        Ok(breeds)
    }

    /// Insert or replace one breed, keeping an existing favorite flag
    pub fn upsert_breed(&self, record: &BreedRecord) -> Result<(), StorageError> {
        self.upsert_breeds(std::slice::from_ref(record)).map(|_| ())
    }

    /// Insert or replace a batch of breeds in one transaction
    pub fn upsert_breeds(&self, records: &[BreedRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin breed upsert")?;
        {
            let mut stmt = tx.prepare(UPSERT_BREED).ctx("prepare breed upsert")?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.breed_key,
                    record.variant,
                    record.name,
                    record.description,
                    record.trivia,
                    record.origin,
                    record.size.as_str(),
                    record.difficulty.as_str(),
                    temperament_json(record)?,
                    record.life_span,
                    to_millis(record.cached_at),
                    to_millis(record.expires_at),
                    to_millis(record.last_updated_at),
                    record.source,
                    record.is_favorite as i64,
                ])
                .ctx("upsert breed")?;
            }
        }
        tx.commit().ctx("commit breed upsert")?;
        drop(conn);

        debug!(count = records.len(), "Breeds upserted");
        self.notify(Table::Breeds, records.len());
        Ok(records.len())
    }

    /// Overwrite every field of an existing breed, favorite flag included
    pub fn update_breed(&self, record: &BreedRecord) -> Result<bool, StorageError> {
        let changed = self
            .conn()
            .execute(
                r#"
                UPDATE breeds SET
                    breed_key = ?2, variant = ?3, name = ?4, description = ?5, trivia = ?6,
                    origin = ?7, size = ?8, difficulty = ?9, temperament = ?10, life_span = ?11,
                    cached_at = ?12, expires_at = ?13, last_updated_at = ?14, source = ?15,
                    is_favorite = ?16
                WHERE id = ?1
                "#,
                params![
                    record.id,
                    record.breed_key,
                    record.variant,
                    record.name,
                    record.description,
                    record.trivia,
                    record.origin,
                    record.size.as_str(),
                    record.difficulty.as_str(),
                    temperament_json(record)?,
                    record.life_span,
                    to_millis(record.cached_at),
                    to_millis(record.expires_at),
                    to_millis(record.last_updated_at),
                    record.source,
                    record.is_favorite as i64,
                ],
            )
            .ctx("update breed")?;

        self.notify(Table::Breeds, changed);
        Ok(changed > 0)
    }

    pub fn get_breed(&self, id: &str) -> Result<Option<BreedRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM breeds WHERE id = ?", BREED_COLUMNS);
        conn.query_row(&sql, params![id], breed_from_row)
            .optional()
            .ctx("get breed")
    }

    /// Every breed regardless of freshness
    pub fn all_breeds(&self) -> Result<Vec<BreedRecord>, StorageError> {
        self.query_breeds("ORDER BY name, id", [], "list breeds")
    }

    /// Breeds whose `expires_at` is strictly after `now`
    pub fn valid_breeds(&self, now: DateTime<Utc>) -> Result<Vec<BreedRecord>, StorageError> {
        self.query_breeds(
            "WHERE expires_at > ?1 ORDER BY name, id",
            params![to_millis(now)],
            "list valid breeds",
        )
    }

    /// Case-insensitive substring match on name, key, origin and temperament
    pub fn search_breeds(&self, query: &str) -> Result<Vec<BreedRecord>, StorageError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.all_breeds();
        }
        self.query_breeds(
            r#"WHERE instr(lower(name), ?1) > 0
                  OR instr(lower(breed_key), ?1) > 0
                  OR instr(lower(origin), ?1) > 0
                  OR instr(lower(temperament), ?1) > 0
               ORDER BY name, id"#,
            params![needle],
            "search breeds",
        )
    }

    pub fn favorite_breeds(&self) -> Result<Vec<BreedRecord>, StorageError> {
        self.query_breeds(
            "WHERE is_favorite = 1 ORDER BY name, id",
            [],
            "list favorite breeds",
        )
    }

    pub fn favorite_ids(&self) -> Result<HashSet<String>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id FROM breeds WHERE is_favorite = 1")
            .ctx("prepare favorite ids")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .ctx("query favorite ids")?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row.ctx("read favorite id")?);
        }
        Ok(ids)
    }

    /// Up to `n` breeds in random order
    pub fn random_breeds(&self, n: usize) -> Result<Vec<BreedRecord>, StorageError> {
        self.query_breeds(
            "ORDER BY RANDOM() LIMIT ?1",
            params![n as i64],
            "sample breeds",
        )
    }

    /// Breeds with `expires_at < cutoff` (expired ones included)
    pub fn breeds_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BreedRecord>, StorageError> {
        self.query_breeds(
            "WHERE expires_at < ?1 ORDER BY expires_at",
            params![to_millis(cutoff)],
            "list near-expiry breeds",
        )
    }

    /// Toggle the favorite flag; false when the breed does not exist
    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool, StorageError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE breeds SET is_favorite = ?2 WHERE id = ?1",
                params![id, favorite as i64],
            )
            .ctx("set favorite")?;

        if changed > 0 {
            self.events().publish(CacheEvent::FavoriteChanged {
                breed_id: id.to_string(),
                favorite,
            });
        }
        Ok(changed > 0)
    }

    /// Delete one breed; its images go with it
    pub fn delete_breed(&self, id: &str) -> Result<bool, StorageError> {
        let changed = self
            .conn()
            .execute("DELETE FROM breeds WHERE id = ?", params![id])
            .ctx("delete breed")?;
        self.notify(Table::Breeds, changed);
        self.notify(Table::Images, changed);
        Ok(changed > 0)
    }

    /// Delete breeds with `expires_at <= now`, counting the images they take along
    pub fn delete_expired_breeds(&self, now: DateTime<Utc>) -> Result<BreedPurge, StorageError> {
        let purge = self.purge_breeds(
            "SELECT id FROM breeds WHERE expires_at <= ?1",
            params![to_millis(now)],
            "delete expired breeds",
        )?;
        if purge.breeds > 0 {
            debug!(
                breeds = purge.breeds,
                images = purge.images,
                "Expired breeds deleted"
            );
        }
        Ok(purge)
    }

    /// Delete the breeds selected by `selection` and their cascaded images
    /// in one transaction
    fn purge_breeds<P: rusqlite::Params + Copy>(
        &self,
        selection: &str,
        params: P,
        context: &'static str,
    ) -> Result<BreedPurge, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction().ctx(context)?;
        let (images, image_bytes): (i64, i64) = tx
            .query_row(
                &format!(
                    "SELECT COUNT(*), COALESCE(SUM(byte_size), 0) FROM images \
                     WHERE breed_id IN ({})",
                    selection
                ),
                params,
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ctx(context)?;
        let breeds = tx
            .execute(&format!("DELETE FROM breeds WHERE id IN ({})", selection), params)
            .ctx(context)?;
        tx.commit().ctx(context)?;
        drop(conn);

        self.notify(Table::Breeds, breeds);
        self.notify(Table::Images, images as usize);
        Ok(BreedPurge {
            breeds,
            images: images.max(0) as usize,
            image_bytes: image_bytes.max(0) as u64,
        })
    }

    pub fn delete_all_breeds(&self) -> Result<usize, StorageError> {
        let removed = self
            .conn()
            .execute("DELETE FROM breeds", [])
            .ctx("delete all breeds")?;
        self.notify(Table::Breeds, removed);
        self.notify(Table::Images, removed);
        Ok(removed)
    }

    /// Drop the least recently updated non-favorite breeds beyond `max`
    pub fn trim_breeds(&self, max: usize) -> Result<BreedPurge, StorageError> {
        let count = self.breed_count()?;
        if count <= max {
            return Ok(BreedPurge::default());
        }

        let purge = self.purge_breeds(
            "SELECT id FROM breeds WHERE is_favorite = 0 \
             ORDER BY last_updated_at ASC, id LIMIT ?1",
            params![(count - max) as i64],
            "trim breeds",
        )?;
        debug!(removed = purge.breeds, max, "Breeds trimmed to limit");
        Ok(purge)
    }

    pub fn breed_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM breeds", [], |row| row.get(0))
            .ctx("count breeds")?;
        Ok(count as usize)
    }

    pub fn valid_breed_count(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM breeds WHERE expires_at > ?1",
                params![to_millis(now)],
                |row| row.get(0),
            )
            .ctx("count valid breeds")?;
        Ok(count as usize)
    }
}
