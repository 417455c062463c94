//! Image table operations

use super::record_store::{parse_col, read_ts, to_millis, RecordStore};
use crate::error::{QueryContext, StorageError};
use crate::event::Table;
use crate::models::{ImageRecord, ImageType};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::path::PathBuf;
use tracing::debug;

const IMAGE_COLUMNS: &str = "id, breed_id, url, image_type, is_primary, cached_at, expires_at, \
     last_accessed_at, access_count, byte_size, local_path";

// access_count and last_accessed_at survive a re-cache of the same image
const UPSERT_IMAGE: &str = r#"
    INSERT INTO images
    (id, breed_id, url, image_type, is_primary, cached_at, expires_at,
     last_accessed_at, access_count, byte_size, local_path)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(id) DO UPDATE SET
        url = excluded.url,
        image_type = excluded.image_type,
        is_primary = excluded.is_primary,
        cached_at = excluded.cached_at,
        expires_at = excluded.expires_at,
        byte_size = excluded.byte_size,
        local_path = excluded.local_path
"#;

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        breed_id: row.get(1)?,
        url: row.get(2)?,
        image_type: parse_col::<ImageType>(row, 3)?,
        is_primary: row.get::<_, i64>(4)? != 0,
        cached_at: read_ts(row, 5)?,
        expires_at: read_ts(row, 6)?,
        last_accessed_at: read_ts(row, 7)?,
        access_count: row.get::<_, i64>(8)?.max(0) as u64,
        byte_size: row.get::<_, i64>(9)?.max(0) as u64,
        local_path: row.get::<_, Option<String>>(10)?.map(PathBuf::from),
    })
}

fn write_image(tx: &Transaction<'_>, record: &ImageRecord) -> Result<(), StorageError> {
    if record.is_primary {
        tx.execute(
            "UPDATE images SET is_primary = 0 WHERE breed_id = ?1 AND is_primary = 1",
            params![record.breed_id],
        )
        .ctx("unset primary image")?;
    }

    tx.execute(
        UPSERT_IMAGE,
        params![
            record.id,
            record.breed_id,
            record.url,
            record.image_type.as_str(),
            record.is_primary as i64,
            to_millis(record.cached_at),
            to_millis(record.expires_at),
            to_millis(record.last_accessed_at),
            record.access_count as i64,
            record.byte_size as i64,
            record
                .local_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        ],
    )
    .ctx("upsert image")?;
    Ok(())
}

/// Keep at most `max` images for a breed, evicting least recently accessed
/// non-primary ones first
fn trim_breed_images(
    tx: &Transaction<'_>,
    breed_id: &str,
    max: usize,
) -> Result<usize, StorageError> {
    let primaries: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM images WHERE breed_id = ?1 AND is_primary = 1",
            params![breed_id],
            |row| row.get(0),
        )
        .ctx("count primary images")?;
    let keep = (max as i64 - primaries).max(0);

    tx.execute(
        r#"
        DELETE FROM images WHERE id IN (
            SELECT id FROM images
            WHERE breed_id = ?1 AND is_primary = 0
            ORDER BY last_accessed_at DESC, cached_at DESC, id
            LIMIT -1 OFFSET ?2
        )
        "#,
        params![breed_id, keep],
    )
    .ctx("trim breed images")
}

impl RecordStore {
    fn query_images<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
        context: &'static str,
    ) -> Result<Vec<ImageRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM images {}", IMAGE_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql).ctx(context)?;
        let rows = stmt.query_map(params, image_from_row).ctx(context)?;

        let mut images = Vec::new();
        for row in rows {
            images.push(row.ctx("read image row")?);
        }
        Ok(images)
    }

    /// Insert or replace one image
    ///
    /// A primary record first clears the flag on every other image of the
    /// breed, inside the same transaction.
    pub fn upsert_image(&self, record: &ImageRecord) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin image upsert")?;
        write_image(&tx, record)?;
        tx.commit().ctx("commit image upsert")?;
        drop(conn);

        self.notify(Table::Images, 1);
        Ok(())
    }

    /// Make `record` the breed's only primary image, then evict that breed's
    /// images beyond `max_per_breed`. Returns the number evicted.
    pub fn set_primary_image(
        &self,
        record: &ImageRecord,
        max_per_breed: usize,
    ) -> Result<usize, StorageError> {
        let mut primary = record.clone();
        primary.is_primary = true;

        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin set primary image")?;
        write_image(&tx, &primary)?;
        let evicted = trim_breed_images(&tx, &primary.breed_id, max_per_breed)?;
        tx.commit().ctx("commit set primary image")?;
        drop(conn);

        debug!(breed_id = %primary.breed_id, evicted, "Primary image set");
        self.notify(Table::Images, 1);
        Ok(evicted)
    }

    /// Insert a batch of images for one or more breeds, then trim each
    /// touched breed to `max_per_breed`
    pub fn upsert_images(
        &self,
        records: &[ImageRecord],
        max_per_breed: usize,
    ) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin image batch")?;
        for record in records {
            write_image(&tx, record)?;
        }

        let mut breed_ids: Vec<&str> = records.iter().map(|r| r.breed_id.as_str()).collect();
        breed_ids.sort_unstable();
        breed_ids.dedup();

        let mut evicted = 0;
        for breed_id in breed_ids {
            evicted += trim_breed_images(&tx, breed_id, max_per_breed)?;
        }
        tx.commit().ctx("commit image batch")?;
        drop(conn);

        self.notify(Table::Images, records.len());
        Ok(evicted)
    }

    pub fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS);
        conn.query_row(&sql, params![id], image_from_row)
            .optional()
            .ctx("get image")
    }

    pub fn primary_image(&self, breed_id: &str) -> Result<Option<ImageRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM images WHERE breed_id = ?1 AND is_primary = 1",
            IMAGE_COLUMNS
        );
        conn.query_row(&sql, params![breed_id], image_from_row)
            .optional()
            .ctx("get primary image")
    }

    /// Primary image if it has not expired at `now`
    pub fn valid_primary_image(
        &self,
        breed_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ImageRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM images WHERE breed_id = ?1 AND is_primary = 1 AND expires_at > ?2",
            IMAGE_COLUMNS
        );
        conn.query_row(&sql, params![breed_id, to_millis(now)], image_from_row)
            .optional()
            .ctx("get valid primary image")
    }

    pub fn images_for_breed(&self, breed_id: &str) -> Result<Vec<ImageRecord>, StorageError> {
        self.query_images(
            "WHERE breed_id = ?1 ORDER BY is_primary DESC, last_accessed_at DESC, id",
            params![breed_id],
            "list breed images",
        )
    }

    pub fn valid_images_of_type(
        &self,
        breed_id: &str,
        image_type: ImageType,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImageRecord>, StorageError> {
        self.query_images(
            "WHERE breed_id = ?1 AND image_type = ?2 AND expires_at > ?3 \
             ORDER BY last_accessed_at DESC, id",
            params![breed_id, image_type.as_str(), to_millis(now)],
            "list valid images by type",
        )
    }

    /// Record a cache read: bump `access_count`, stamp `last_accessed_at`
    pub fn touch_image(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE images SET access_count = access_count + 1, last_accessed_at = ?2 \
                 WHERE id = ?1",
                params![id, to_millis(now)],
            )
            .ctx("touch image")?;
        Ok(changed > 0)
    }

    pub fn delete_image(&self, id: &str) -> Result<bool, StorageError> {
        let changed = self
            .conn()
            .execute("DELETE FROM images WHERE id = ?", params![id])
            .ctx("delete image")?;
        self.notify(Table::Images, changed);
        Ok(changed > 0)
    }

    /// Delete images with `expires_at <= now`; returns (count, bytes)
    pub fn delete_expired_images(&self, now: DateTime<Utc>) -> Result<(usize, u64), StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin expired image delete")?;
        let bytes: i64 = tx
            .query_row(
                "SELECT COALESCE(SUM(byte_size), 0) FROM images WHERE expires_at <= ?1",
                params![to_millis(now)],
                |row| row.get(0),
            )
            .ctx("sum expired image bytes")?;
        let removed = tx
            .execute(
                "DELETE FROM images WHERE expires_at <= ?1",
                params![to_millis(now)],
            )
            .ctx("delete expired images")?;
        tx.commit().ctx("commit expired image delete")?;
        drop(conn);

        if removed > 0 {
            debug!(removed, bytes, "Expired images deleted");
        }
        self.notify(Table::Images, removed);
        Ok((removed, bytes.max(0) as u64))
    }

    /// Delete the `limit` least recently accessed images; returns (count, bytes)
    pub fn delete_least_recent_images(&self, limit: usize) -> Result<(usize, u64), StorageError> {
        if limit == 0 {
            return Ok((0, 0));
        }

        const LRU_SELECTION: &str = "SELECT id FROM images \
             ORDER BY last_accessed_at ASC, access_count ASC, id LIMIT ?1";

        let mut conn = self.conn();
        let tx = conn.transaction().ctx("begin LRU delete")?;
        let bytes: i64 = tx
            .query_row(
                &format!(
                    "SELECT COALESCE(SUM(byte_size), 0) FROM images WHERE id IN ({})",
                    LRU_SELECTION
                ),
                params![limit as i64],
                |row| row.get(0),
            )
            .ctx("sum LRU image bytes")?;
        let removed = tx
            .execute(
                &format!("DELETE FROM images WHERE id IN ({})", LRU_SELECTION),
                params![limit as i64],
            )
            .ctx("delete LRU images")?;
        tx.commit().ctx("commit LRU delete")?;
        drop(conn);

        self.notify(Table::Images, removed);
        Ok((removed, bytes.max(0) as u64))
    }

    pub fn delete_all_images(&self) -> Result<usize, StorageError> {
        let removed = self
            .conn()
            .execute("DELETE FROM images", [])
            .ctx("delete all images")?;
        self.notify(Table::Images, removed);
        Ok(removed)
    }

    pub fn total_image_bytes(&self) -> Result<u64, StorageError> {
        let bytes: i64 = self
            .conn()
            .query_row(
                "SELECT COALESCE(SUM(byte_size), 0) FROM images",
                [],
                |row| row.get(0),
            )
            .ctx("sum image bytes")?;
        Ok(bytes.max(0) as u64)
    }

    pub fn image_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
            .ctx("count images")?;
        Ok(count as usize)
    }

    pub fn valid_image_count(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM images WHERE expires_at > ?1",
                params![to_millis(now)],
                |row| row.get(0),
            )
            .ctx("count valid images")?;
        Ok(count as usize)
    }

    /// Images with `expires_at < cutoff` (expired ones included)
    pub fn images_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ImageRecord>, StorageError> {
        self.query_images(
            "WHERE expires_at < ?1 ORDER BY expires_at",
            params![to_millis(cutoff)],
            "list near-expiry images",
        )
    }

    pub fn primary_image_count(&self, breed_id: &str) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM images WHERE breed_id = ?1 AND is_primary = 1",
                params![breed_id],
                |row| row.get(0),
            )
            .ctx("count primary images")?;
        Ok(count as usize)
    }
}
