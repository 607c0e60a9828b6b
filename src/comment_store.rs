use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::model::Post;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create db directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            thread_id INTEGER NOT NULL,
            parent_id INTEGER,
            created_at TEXT NOT NULL,
            text TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_comments_thread ON comments(thread_id);
        CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at);
        "#,
    )
    .context("init sqlite schema")?;
    Ok(())
}

/// Upserts by post id; returns the number of rows written.
pub fn insert_posts(conn: &mut Connection, posts: &[Post]) -> Result<usize> {
    let tx = conn.transaction().context("begin comments transaction")?;
    for post in posts {
        tx.execute(
            "INSERT OR REPLACE INTO comments (id, thread_id, parent_id, created_at, text)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.id,
                post.thread_id,
                post.parent_id,
                post.created_at,
                post.text
            ],
        )
        .with_context(|| format!("upsert comment {}", post.id))?;
    }
    tx.commit().context("commit comments transaction")?;
    Ok(posts.len())
}

/// Posts ordered by `created_at`, optionally bounded by date strings
/// (inclusive start, exclusive end, compared lexically).
pub fn load_posts(conn: &Connection, start: Option<&str>, end: Option<&str>) -> Result<Vec<Post>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, thread_id, parent_id, created_at, text
            FROM comments
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .context("prepare load comments query")?;

    let rows = stmt
        .query_map(params![start, end], decode_post)
        .context("query load comments")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode comment row")?);
    }
    Ok(out)
}

pub fn load_thread(conn: &Connection, thread_id: i64) -> Result<Vec<Post>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, thread_id, parent_id, created_at, text
            FROM comments
            WHERE thread_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .context("prepare load thread query")?;

    let rows = stmt
        .query_map(params![thread_id], decode_post)
        .context("query load thread")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode comment row")?);
    }
    Ok(out)
}

fn decode_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        parent_id: row.get(2)?,
        created_at: row.get(3)?,
        text: row.get(4)?,
    })
}

pub fn parse_posts_json(raw: &str) -> Result<Vec<Post>> {
    serde_json::from_str(raw).context("invalid posts json")
}

pub fn load_posts_json(path: &Path) -> Result<Vec<Post>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_posts_json(&raw)
}
