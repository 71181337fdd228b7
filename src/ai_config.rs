use crate::prompts::{
    DEFAULT_INTRODUCE_TEXT, DEFAULT_PROMPT_TEMPLATE, TEMPLATE_PLACEHOLDER,
};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// The introduction text and greeting template used when composing prompts.
///
/// The row with the highest id is the canonical one; older rows are kept
/// and remain readable by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigRecord {
    pub id: i64,
    pub introduce_text: String,
    pub prompt_template: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConfigRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            introduce_text: row.get(1)?,
            prompt_template: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    /// Fill the template's `%s` placeholders from `args` in order.
    /// Placeholders without an argument become empty.
    pub fn render_prompt(&self, args: &[&str]) -> String {
        let mut pieces = self.prompt_template.split(TEMPLATE_PLACEHOLDER);
        let mut rendered = pieces.next().unwrap_or_default().to_string();
        for (index, piece) in pieces.enumerate() {
            rendered.push_str(args.get(index).copied().unwrap_or_default());
            rendered.push_str(piece);
        }
        rendered
    }
}

const SELECT_COLUMNS: &str = "SELECT id, introduce_text, prompt_template,
     created_at, updated_at FROM ai_config";

fn latest(conn: &Connection) -> rusqlite::Result<Option<ConfigRecord>> {
    conn.query_row(
        &format!("{} ORDER BY id DESC LIMIT 1", SELECT_COLUMNS),
        [],
        ConfigRecord::from_row,
    )
    .optional()
}

fn insert(
    conn: &Connection,
    introduce_text: &str,
    prompt_template: &str,
) -> rusqlite::Result<ConfigRecord> {
    let now = chrono::Utc::now().timestamp();
    conn.query_row(
        "INSERT INTO ai_config
            (introduce_text, prompt_template, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, introduce_text, prompt_template,
            created_at, updated_at",
        params![introduce_text, prompt_template, now, now],
        ConfigRecord::from_row,
    )
}

/// Latest record, seeding the default one if the table is empty.
#[instrument(skip(conn))]
pub fn get_latest(conn: &mut Connection) -> Result<ConfigRecord> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let record = match latest(&tx)? {
        Some(record) => record,
        None => {
            let record =
                insert(&tx, DEFAULT_INTRODUCE_TEXT, DEFAULT_PROMPT_TEMPLATE)?;
            info!("Created default AI config, id: {}", record.id);
            record
        }
    };
    tx.commit()?;
    Ok(record)
}

pub fn get_all(conn: &Connection) -> Result<Vec<ConfigRecord>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
    let records = stmt
        .query_map([], ConfigRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<ConfigRecord>> {
    let record = conn
        .query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            [id],
            ConfigRecord::from_row,
        )
        .optional()?;
    Ok(record)
}

/// Update the latest record in place, or insert the first one.
#[instrument(skip(conn, introduce_text, prompt_template))]
pub fn upsert(
    conn: &mut Connection,
    introduce_text: &str,
    prompt_template: &str,
) -> Result<ConfigRecord> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let record = match latest(&tx)? {
        None => {
            let record = insert(&tx, introduce_text, prompt_template)?;
            info!("Created AI config, id: {}", record.id);
            record
        }
        Some(existing) => {
            let record = tx.query_row(
                "UPDATE ai_config
                 SET introduce_text = ?, prompt_template = ?, updated_at = ?
                 WHERE id = ?
                 RETURNING id, introduce_text, prompt_template,
                    created_at, updated_at",
                params![
                    introduce_text,
                    prompt_template,
                    chrono::Utc::now().timestamp(),
                    existing.id
                ],
                ConfigRecord::from_row,
            )?;
            info!("Updated AI config, id: {}", record.id);
            record
        }
    };
    tx.commit()?;
    Ok(record)
}

/// Returns whether a row was removed.
#[instrument(skip(conn))]
pub fn delete_by_id(conn: &Connection, id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM ai_config WHERE id = ?", [id])?;
    if removed > 0 {
        info!("Deleted AI config, id: {}", id);
    }
    Ok(removed > 0)
}
