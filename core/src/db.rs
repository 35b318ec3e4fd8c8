use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, bail};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::Account;
use crate::error::Error;
use crate::settings::{Settings, Units};
use crate::store::{self, Document, DocumentStore, Query};
use crate::theme::ThemePreference;

const SESSION_KEY: &str = "session_uid";

pub struct Database {
    conn: Mutex<Connection>,
}

/// SQL for one equality filter, binding its value into `values`. `None`
/// leaves the filter to `Query::apply`: field names that cannot be spliced
/// into a JSON path, and array or object values.
fn filter_condition(field: &str, value: &Value, values: &mut Vec<SqlValue>) -> Option<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let path = format!("'$.{field}'");
    match value {
        Value::String(s) => {
            values.push(SqlValue::Text(s.clone()));
            Some(format!("json_extract(data, {path}) = ?"))
        }
        Value::Number(n) => {
            values.push(match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64()?),
            });
            Some(format!("json_extract(data, {path}) = ?"))
        }
        Value::Bool(b) => Some(format!("json_type(data, {path}) = '{b}'")),
        Value::Null => Some(format!("json_type(data, {path}) = 'null'")),
        Value::Array(_) | Value::Object(_) => None,
    }
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (collection, id)
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    uid TEXT PRIMARY KEY NOT NULL,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    display_name TEXT,
                    photo_url TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS password_resets (
                    token TEXT PRIMARY KEY NOT NULL,
                    uid TEXT NOT NULL REFERENCES accounts(uid) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        if version < 3 {
            conn.execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_documents_owner
                    ON documents (collection, json_extract(data, '$.userId'));

                PRAGMA user_version = 3;",
            )?;
        }

        Ok(())
    }

    // --- Documents ---

    fn parse_data(id: &str, raw: &str) -> anyhow::Result<Value> {
        serde_json::from_str(raw).with_context(|| format!("Corrupt document {id}"))
    }

    /// The documents of a collection matching `query`, in insertion order
    /// and then sorted by it. Equality filters are evaluated by SQLite; the
    /// rows that come back are checked again for exact JSON equality.
    pub fn query_documents(&self, collection: &str, query: &Query) -> anyhow::Result<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut values = vec![SqlValue::Text(collection.to_string())];
        for filter in &query.filters {
            if let Some(condition) = filter_condition(&filter.field, &filter.value, &mut values) {
                sql.push_str(" AND ");
                sql.push_str(&condition);
            }
        }
        sql.push_str(" ORDER BY rowid");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut docs = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            let data = Self::parse_data(&id, &raw)?;
            docs.push(Document { id, data });
        }
        query.apply(&mut docs);
        Ok(docs)
    }

    pub fn get_document(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(Document {
                id: id.to_string(),
                data: Self::parse_data(id, &raw)?,
            })),
            None => Ok(None),
        }
    }

    pub fn insert_document(&self, collection: &str, data: Map<String, Value>) -> anyhow::Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = store::timestamp();
        let raw = serde_json::to_string(&data)?;
        self.conn()
            .execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![collection, id, raw, now],
            )
            .context("Failed to insert document")?;
        Ok(Document {
            id,
            data: Value::Object(data),
        })
    }

    pub fn set_document(&self, collection: &str, id: &str, data: Map<String, Value>) -> anyhow::Result<Document> {
        let now = store::timestamp();
        let raw = serde_json::to_string(&data)?;
        self.conn()
            .execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![collection, id, raw, now],
            )
            .context("Failed to write document")?;
        Ok(Document {
            id: id.to_string(),
            data: Value::Object(data),
        })
    }

    /// Shallow-merge `patch` into the stored document. `None` if it does not exist.
    pub fn merge_document(&self, collection: &str, id: &str, patch: Value) -> anyhow::Result<Option<Document>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let Value::Object(mut data) = Self::parse_data(id, &raw)? else {
            bail!("Corrupt document {id}: not an object");
        };
        store::merge_patch(&mut data, patch)?;
        conn.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![serde_json::to_string(&data)?, store::timestamp(), collection, id],
        )
        .context("Failed to update document")?;
        Ok(Some(Document {
            id: id.to_string(),
            data: Value::Object(data),
        }))
    }

    pub fn delete_document(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(rows > 0)
    }

    // --- Accounts ---

    fn account_from_row(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        Ok(Account {
            uid: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            display_name: row.get(3)?,
            photo_url: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    /// `None` when the email is already registered.
    pub fn insert_account(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<Account>> {
        let uid = Uuid::new_v4().simple().to_string();
        let now = store::timestamp();
        let conn = self.conn();
        let rows = conn.execute(
            "INSERT INTO accounts (uid, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO NOTHING",
            params![uid, email, password_hash, now],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(Account {
            uid,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            display_name: None,
            photo_url: None,
            created_at: now,
        }))
    }

    pub fn get_account(&self, uid: &str) -> anyhow::Result<Option<Account>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT uid, email, password_hash, display_name, photo_url, created_at
                 FROM accounts WHERE uid = ?1",
                params![uid],
                Self::account_from_row,
            )
            .optional()?)
    }

    pub fn find_account_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT uid, email, password_hash, display_name, photo_url, created_at
                 FROM accounts WHERE email = ?1",
                params![email],
                Self::account_from_row,
            )
            .optional()?)
    }

    pub fn update_account_profile(
        &self,
        uid: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> anyhow::Result<bool> {
        let rows = self.conn().execute(
            "UPDATE accounts SET
                display_name = COALESCE(?2, display_name),
                photo_url = COALESCE(?3, photo_url)
             WHERE uid = ?1",
            params![uid, display_name, photo_url],
        )?;
        Ok(rows > 0)
    }

    pub fn create_password_reset(&self, uid: &str) -> anyhow::Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        self.conn().execute(
            "INSERT INTO password_resets (token, uid, created_at) VALUES (?1, ?2, ?3)",
            params![token, uid, store::timestamp()],
        )?;
        Ok(token)
    }

    pub fn count_password_resets(&self, uid: &str) -> anyhow::Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM password_resets WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )?)
    }

    pub fn session_uid(&self) -> anyhow::Result<Option<String>> {
        self.get_setting(SESSION_KEY)
    }

    pub fn set_session_uid(&self, uid: Option<&str>) -> anyhow::Result<()> {
        match uid {
            Some(uid) => self.set_setting(SESSION_KEY, uid),
            None => self.delete_setting(SESSION_KEY).map(|_| ()),
        }
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn().execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, store::timestamp()],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn delete_setting(&self, key: &str) -> anyhow::Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Stored settings over the defaults. Unreadable values fall back to the
    /// default for that key.
    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::default();
        if let Some(theme) = self.get_setting("theme")? {
            settings.theme = ThemePreference::parse(&theme).unwrap_or_default();
        }
        if let Some(notifications) = self.get_setting("notifications")? {
            settings.notifications = notifications != "false";
        }
        if let Some(units) = self.get_setting("units")? {
            settings.units = Units::parse(&units).unwrap_or_default();
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        self.set_setting("theme", settings.theme.as_str())?;
        self.set_setting(
            "notifications",
            if settings.notifications { "true" } else { "false" },
        )?;
        self.set_setting("units", settings.units.as_str())
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn query(&self, collection: &str, query: &Query) -> crate::Result<Vec<Document>> {
        store::validate_collection(collection)?;
        Ok(self.query_documents(collection, query)?)
    }

    async fn get(&self, collection: &str, id: &str) -> crate::Result<Option<Document>> {
        store::validate_collection(collection)?;
        Ok(self.get_document(collection, id)?)
    }

    async fn insert(&self, collection: &str, data: Value) -> crate::Result<Document> {
        store::validate_collection(collection)?;
        let data = store::into_object(data)?;
        Ok(self.insert_document(collection, data)?)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> crate::Result<Document> {
        store::validate_collection(collection)?;
        let data = store::into_object(data)?;
        Ok(self.set_document(collection, id, data)?)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> crate::Result<Document> {
        store::validate_collection(collection)?;
        if !patch.is_object() {
            return Err(Error::validation("Update payload must be a JSON object"));
        }
        self.merge_document(collection, id, patch)?
            .ok_or_else(|| Error::not_found(format!("No document {collection}/{id}")))
    }

    async fn delete(&self, collection: &str, id: &str) -> crate::Result<bool> {
        store::validate_collection(collection)?;
        Ok(self.delete_document(collection, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let version: i64 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stride.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_document("workouts", object(json!({"title": "Run"}))).unwrap();
        }
        let db = Database::open(&path).unwrap();
        let docs = db.query_documents("workouts", &Query::new()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["title"], "Run");
    }

    #[test]
    fn test_insert_and_get_document() {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .insert_document("meals", object(json!({"name": "Oats", "userId": "u1"})))
            .unwrap();
        assert_eq!(doc.id.len(), 36);

        let fetched = db.get_document("meals", &doc.id).unwrap().unwrap();
        assert_eq!(fetched, doc);
        assert!(db.get_document("workouts", &doc.id).unwrap().is_none());
    }

    #[test]
    fn test_query_documents_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        for (user, date) in [("u1", "2024-01-01"), ("u1", "2024-03-01"), ("u2", "2024-02-01")] {
            db.insert_document("progress", object(json!({"userId": user, "date": date})))
                .unwrap();
        }
        let q = Query::new()
            .where_eq("userId", "u1")
            .order_by("date", Direction::Desc);
        let docs = db.query_documents("progress", &q).unwrap();
        let dates: Vec<&str> = docs.iter().map(|d| d.data["date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-01-01"]);
    }

    #[test]
    fn test_query_documents_filters_by_json_type() {
        let db = Database::open_in_memory().unwrap();
        for doc in [
            json!({"userId": "u1", "completed": true, "duration": 30, "date": "2024-01-01"}),
            json!({"userId": "u1", "completed": false, "duration": 45, "date": "2024-01-01"}),
            json!({"userId": "u1", "completed": 1, "duration": "30", "date": "2024-01-02"}),
            json!({"userId": "u2", "completed": true, "duration": 30, "date": "2024-01-01"}),
        ] {
            db.insert_document("workouts", object(doc)).unwrap();
        }
        let count = |q: Query| db.query_documents("workouts", &q).unwrap().len();

        assert_eq!(count(Query::new().where_eq("userId", "u1")), 3);
        assert_eq!(count(Query::new().where_eq("userId", "u1").where_eq("completed", true)), 1);
        assert_eq!(count(Query::new().where_eq("completed", 1)), 1);
        assert_eq!(count(Query::new().where_eq("duration", 30)), 2);
        assert_eq!(count(Query::new().where_eq("duration", "30")), 1);
        assert_eq!(count(Query::new().where_eq("date", "2024-01-01").where_eq("userId", "u2")), 1);
        assert_eq!(count(Query::new().where_eq("notes", Value::Null)), 0);
        assert_eq!(count(Query::new().where_eq("user'Id", "u1")), 0);
    }

    #[test]
    fn test_owner_lookup_uses_index() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let plan: Vec<String> = conn
            .prepare(
                "EXPLAIN QUERY PLAN SELECT id FROM documents
                 WHERE collection = ?1 AND json_extract(data, '$.userId') = ?2",
            )
            .unwrap()
            .query_map(params!["meals", "u1"], |row| row.get::<_, String>(3))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(plan.iter().any(|line| line.contains("idx_documents_owner")), "{plan:?}");
    }

    #[test]
    fn test_merge_document() {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .insert_document("workouts", object(json!({"title": "Run", "duration": 30})))
            .unwrap();
        let merged = db
            .merge_document("workouts", &doc.id, json!({"duration": 45}))
            .unwrap()
            .unwrap();
        assert_eq!(merged.data["title"], "Run");
        assert_eq!(merged.data["duration"], 45);

        assert!(db.merge_document("workouts", "missing", json!({})).unwrap().is_none());
    }

    #[test]
    fn test_set_document_creates_then_replaces() {
        let db = Database::open_in_memory().unwrap();
        db.set_document("users", "uid1", object(json!({"email": "a@b.co", "goals": ["x"]})))
            .unwrap();
        db.set_document("users", "uid1", object(json!({"email": "a@b.co"})))
            .unwrap();
        let doc = db.get_document("users", "uid1").unwrap().unwrap();
        assert!(doc.data.get("goals").is_none());
    }

    #[test]
    fn test_delete_document() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.insert_document("meals", object(json!({}))).unwrap();
        assert!(db.delete_document("meals", &doc.id).unwrap());
        assert!(!db.delete_document("meals", &doc.id).unwrap());
    }

    #[tokio::test]
    async fn test_store_rejects_unknown_collection() {
        let db = Database::open_in_memory().unwrap();
        let err = db.query("recipes", &Query::new()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_store_update_missing_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update("workouts", "nope", json!({"title": "x"})).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_store_insert_strips_id() {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .insert("workouts", json!({"id": "chosen", "title": "Swim"}))
            .await
            .unwrap();
        assert_ne!(doc.id, "chosen");
        assert!(doc.data.get("id").is_none());
    }

    #[test]
    fn test_accounts_unique_email_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let account = db.insert_account("Ada@Example.com", "hash").unwrap().unwrap();
        assert!(db.insert_account("ada@example.com", "hash2").unwrap().is_none());

        let found = db.find_account_by_email("ADA@example.com").unwrap().unwrap();
        assert_eq!(found.uid, account.uid);
        assert!(found.display_name.is_none());
    }

    #[test]
    fn test_update_account_profile() {
        let db = Database::open_in_memory().unwrap();
        let account = db.insert_account("a@b.co", "hash").unwrap().unwrap();
        assert!(db.update_account_profile(&account.uid, Some("Ada"), None).unwrap());
        let updated = db.get_account(&account.uid).unwrap().unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Ada"));
        assert!(!db.update_account_profile("ghost", Some("x"), None).unwrap());
    }

    #[test]
    fn test_session_uid_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.session_uid().unwrap().is_none());
        db.set_session_uid(Some("uid1")).unwrap();
        assert_eq!(db.session_uid().unwrap().as_deref(), Some("uid1"));
        db.set_session_uid(None).unwrap();
        assert!(db.session_uid().unwrap().is_none());
    }

    #[test]
    fn test_settings_crud() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("missing").unwrap(), None);
        db.set_setting("k", "v1").unwrap();
        db.set_setting("k", "v2").unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("v2"));
        assert!(db.delete_setting("k").unwrap());
        assert!(!db.delete_setting("k").unwrap());
    }

    #[test]
    fn test_load_settings_defaults_then_saved() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_settings().unwrap(), Settings::default());

        let saved = Settings {
            theme: ThemePreference::Dark,
            notifications: false,
            units: Units::Imperial,
        };
        db.save_settings(&saved).unwrap();
        assert_eq!(db.load_settings().unwrap(), saved);
    }

    #[test]
    fn test_load_settings_ignores_garbage() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("theme", "neon").unwrap();
        assert_eq!(db.load_settings().unwrap().theme, ThemePreference::System);
    }
}
