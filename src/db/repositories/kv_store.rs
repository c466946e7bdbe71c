use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

impl Database {
    /// Read a raw value by key.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .with_context(|| format!("failed to read key {key}"))?;
            Ok(value)
        })
        .await
    }

    /// Insert or replace a value. The write is one transaction, so readers
    /// see either the previous value or the new one.
    pub async fn put_value(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open kv transaction")?;
            tx.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            tx.commit().context("failed to commit kv write")?;
            Ok(())
        })
        .await
    }

    /// Delete several keys together.
    pub async fn remove_values(&self, keys: &[&str]) -> Result<()> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open kv transaction")?;
            for key in &keys {
                tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                    .with_context(|| format!("failed to delete key {key}"))?;
            }
            tx.commit().context("failed to commit kv delete")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("kv.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        assert_eq!(db.get_value("k").await.unwrap(), None);
        db.put_value("k", "one".into()).await.unwrap();
        db.put_value("k", "two".into()).await.unwrap();
        assert_eq!(db.get_value("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn remove_values_deletes_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        db.put_value("a", "1".into()).await.unwrap();
        db.put_value("b", "2".into()).await.unwrap();
        db.put_value("c", "3".into()).await.unwrap();
        db.remove_values(&["a", "b", "missing"]).await.unwrap();

        assert_eq!(db.get_value("a").await.unwrap(), None);
        assert_eq!(db.get_value("b").await.unwrap(), None);
        assert_eq!(db.get_value("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = open_db(&dir);
            db.put_value("k", "kept".into()).await.unwrap();
        }
        let db = open_db(&dir);
        assert_eq!(db.get_value("k").await.unwrap().as_deref(), Some("kept"));
    }
}
