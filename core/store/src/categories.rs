//! Category records and the settings key/value store.

use chrono::Utc;
use rusqlite::{params, Row};
use tracing::debug;

use taskvault_common::{CategoryId, Error, Result};

use crate::model::{Category, CategoryDraft, CategoryPatch};
use crate::store::{abort, begin, storage, Store};
use crate::validate::{validate_category_draft, validate_category_patch};

const CATEGORY_COLUMNS: &str = "id, name, color, description, created_at";

impl Store {
    /// Create a category. Names are unique.
    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category> {
        let mut draft = draft;
        validate_category_draft(&mut draft)?;

        let category = Category {
            id: CategoryId::generate(),
            name: draft.name,
            color: draft.color,
            description: draft.description,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO categories (id, name, color, description, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id.as_str(),
                category.name,
                category.color,
                category.description,
                category.created_at.timestamp_micros(),
            ],
        )
        .map_err(unique_name)?;

        debug!(category = %category.id, "category created");
        Ok(category)
    }

    /// Read a category by id.
    pub async fn get_category(&self, id: &CategoryId) -> Result<Option<Category>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"
            ))
            .map_err(storage)?;
        match stmt.query_row([id.as_str()], category_from_row) {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    /// All categories, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"
            ))
            .map_err(storage)?;
        let rows = stmt.query_map([], category_from_row).map_err(storage)?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row.map_err(storage)?);
        }
        Ok(categories)
    }

    /// Apply a partial update to a category.
    pub async fn update_category(
        &self,
        id: &CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category> {
        let mut patch = patch;
        validate_category_patch(&mut patch)?;

        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;

        let mut stmt = tx
            .prepare(&format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"
            ))
            .map_err(storage)?;
        let mut category = match stmt.query_row([id.as_str()], category_from_row) {
            Ok(c) => c,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(Error::NotFound(format!("category {}", id)))
            }
            Err(e) => return Err(storage(e)),
        };
        drop(stmt);

        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }
        if let Some(description) = patch.description {
            category.description = description;
        }

        tx.execute(
            "UPDATE categories SET name = ?2, color = ?3, description = ?4 WHERE id = ?1",
            params![
                category.id.as_str(),
                category.name,
                category.color,
                category.description,
            ],
        )
        .map_err(unique_name)?;
        tx.commit().map_err(abort)?;

        Ok(category)
    }

    /// Delete a category.
    ///
    /// The reference from tasks is weak: their `category_id` is cleared in
    /// the same transaction, the tasks themselves survive.
    pub async fn delete_category(&self, id: &CategoryId) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;

        let removed = tx
            .execute("DELETE FROM categories WHERE id = ?1", [id.as_str()])
            .map_err(abort)?;
        if removed == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        tx.execute(
            "UPDATE tasks SET category_id = NULL WHERE category_id = ?1",
            [id.as_str()],
        )
        .map_err(abort)?;
        tx.commit().map_err(abort)?;

        debug!(category = %id, "category deleted, task references cleared");
        Ok(())
    }

    /// Read a settings value.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT value FROM settings WHERE key = ?1")
            .map_err(storage)?;
        match stmt.query_row([key], |row| row.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    /// Write a settings value.
    pub async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(storage)?;
        Ok(())
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    use chrono::TimeZone;
    let id: String = row.get(0)?;
    let created_raw: i64 = row.get(4)?;
    let created_at = chrono::Utc
        .timestamp_micros(created_raw)
        .single()
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Integer,
                format!("timestamp out of range: {created_raw}").into(),
            )
        })?;
    Ok(Category {
        id: CategoryId::new(id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        name: row.get(1)?,
        color: row.get(2)?,
        description: row.get(3)?,
        created_at,
    })
}

fn unique_name(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Validation("category name already exists".to_string())
        }
        _ => storage(e),
    }
}
