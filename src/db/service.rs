use crate::db::models::{Chat, Message, Role};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const CHAT_COLUMNS: &str =
    "id, user_id, chat_name, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

const MESSAGE_COLUMNS: &str =
    "id, chat_id, role, content, model, CAST(created_at AS VARCHAR), metadata";

pub struct DbService;

impl DbService {
    // Timestamps are written and read back as text so the driver never has to
    // map DuckDB's TIMESTAMP type.
    fn format_timestamp(ts: DateTime<Utc>) -> String {
        ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(|_| Utc::now())
    }

    fn parse_uuid(idx: usize, raw: String) -> DbResult<Uuid> {
        raw.parse().map_err(|e| {
            duckdb::Error::FromSqlConversionFailure(idx, duckdb::types::Type::Text, Box::new(e))
        })
    }

    fn row_to_chat(row: &Row) -> DbResult<Chat> {
        let created: String = row.get(3)?;
        let updated: String = row.get(4)?;

        Ok(Chat {
            id: Self::parse_uuid(0, row.get(0)?)?,
            user_id: row.get(1)?,
            chat_name: row.get(2)?,
            created_at: Self::parse_timestamp(&created),
            updated_at: Self::parse_timestamp(&updated),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<Message> {
        let role: String = row.get(2)?;
        let role = role.parse::<Role>().map_err(|e| {
            duckdb::Error::FromSqlConversionFailure(
                2,
                duckdb::types::Type::Text,
                e.into(),
            )
        })?;
        let created: String = row.get(5)?;
        let meta_str: Option<String> = row.get(6)?;
        let metadata = meta_str
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| serde_json::json!({}));

        Ok(Message {
            id: row.get(0)?,
            chat_id: Self::parse_uuid(1, row.get(1)?)?,
            role,
            content: row.get(3)?,
            model: row.get(4)?,
            created_at: Self::parse_timestamp(&created),
            metadata,
        })
    }

    // --- Chat Operations ---

    pub fn insert_chat(conn: &Connection, user_id: &str, chat_name: &str) -> DbResult<Chat> {
        let id = Uuid::new_v4();
        let now = Self::format_timestamp(Utc::now());

        conn.execute(
            "INSERT INTO chats (id, user_id, chat_name, created_at, updated_at)
             VALUES (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![id.to_string(), user_id, chat_name, now, now],
        )?;

        Self::get_chat(conn, id)?.ok_or(duckdb::Error::QueryReturnedNoRows)
    }

    pub fn get_chat(conn: &Connection, id: Uuid) -> DbResult<Option<Chat>> {
        let sql = format!("SELECT {} FROM chats WHERE id = ?", CHAT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_chat)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Chats owned by `user_id`, most recently updated first.
    pub fn list_chats(
        conn: &Connection,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<Chat>> {
        let sql = format!(
            "SELECT {} FROM chats WHERE user_id = ? ORDER BY updated_at DESC, id LIMIT ? OFFSET ?",
            CHAT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, limit as i64, offset as i64],
            Self::row_to_chat,
        )?;

        rows.collect()
    }

    /// Returns false when no chat has this id.
    pub fn rename_chat(conn: &Connection, id: Uuid, chat_name: &str) -> DbResult<bool> {
        let now = Self::format_timestamp(Utc::now());
        let changed = conn.execute(
            "UPDATE chats SET chat_name = ?, updated_at = CAST(? AS TIMESTAMP) WHERE id = ?",
            params![chat_name, now, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Runs `f` inside BEGIN/COMMIT, rolling back if it fails.
    pub fn in_transaction<T, F>(conn: &Connection, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        conn.execute("BEGIN TRANSACTION", [])?;

        match f(conn) {
            Ok(value) => {
                conn.execute("COMMIT", [])?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn delete_chat(conn: &Connection, id: Uuid) -> DbResult<()> {
        let id_str = id.to_string();

        Self::in_transaction(conn, |conn| {
            conn.execute("DELETE FROM messages WHERE chat_id = ?", params![id_str])?;
            conn.execute("DELETE FROM chats WHERE id = ?", params![id_str])?;
            Ok(())
        })
    }

    // --- Message Operations ---

    pub fn insert_message(
        conn: &Connection,
        chat_id: Uuid,
        role: Role,
        content: &str,
        model: Option<&str>,
        metadata: serde_json::Value,
    ) -> DbResult<Message> {
        let meta_str = metadata.to_string();
        let now = Self::format_timestamp(Utc::now());
        let chat_id_str = chat_id.to_string();

        conn.execute(
            "INSERT INTO messages (chat_id, role, content, model, created_at, metadata)
             VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), ?)",
            params![chat_id_str, role.as_str(), content, model, now, meta_str],
        )?;

        conn.execute(
            "UPDATE chats SET updated_at = CAST(? AS TIMESTAMP) WHERE id = ?",
            params![now, chat_id_str],
        )?;

        // ids come from a sequence, so the newest row for the chat is ours
        let sql = format!(
            "SELECT {} FROM messages WHERE chat_id = ? ORDER BY id DESC LIMIT 1",
            MESSAGE_COLUMNS
        );
        conn.query_row(&sql, params![chat_id_str], Self::row_to_message)
    }

    /// Returns false when the message does not exist.
    pub fn delete_message(conn: &Connection, id: i64) -> DbResult<bool> {
        let changed = conn.execute("DELETE FROM messages WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }

    pub fn get_messages(
        conn: &Connection,
        chat_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![chat_id.to_string(), limit as i64, offset as i64],
            Self::row_to_message,
        )?;

        rows.collect()
    }

    /// The last `limit` messages of a chat, oldest first.
    pub fn recent_messages(conn: &Connection, chat_id: Uuid, limit: usize) -> DbResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE chat_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![chat_id.to_string(), limit as i64],
            Self::row_to_message,
        )?;

        let mut messages = rows.collect::<DbResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    pub fn count_messages(conn: &Connection, chat_id: Uuid) -> DbResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?",
            params![chat_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
