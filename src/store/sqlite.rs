use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{
    Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch, PostQuery, RemoteStore,
    StoreError, StoreResult,
};

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = include_str!("../../schema/sqlite.sql");

const POST_COLUMNS: &str = "id, title, content, image_url, upvotes, created_at";

/// Embedded store backed by a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(configure);
        let pool = Pool::builder().max_size(8).build(manager)?;

        pool.get()?.execute_batch("PRAGMA journal_mode = WAL;")?;

        Self::from_pool(pool)
    }

    /// Single-connection in-memory database. Every pooled connection to
    /// `:memory:` is its own database, so the pool is capped at one.
    pub fn in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure);
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: DbPool) -> anyhow::Result<Self> {
        pool.get()?.execute_batch(SCHEMA)?;
        tracing::info!("SQLite schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn configure(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )
}

struct PostRow {
    id: i64,
    title: String,
    content: Option<String>,
    image_url: Option<String>,
    upvotes: u32,
    created_at: String,
}

impl PostRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            image_url: row.get(3)?,
            upvotes: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_post(self, comments: Vec<Comment>) -> StoreResult<Post> {
        Ok(Post {
            id: PostId(self.id),
            title: self.title,
            content: self.content,
            image_url: self.image_url,
            upvotes: self.upvotes,
            created_at: parse_timestamp(&self.created_at)?,
            comments,
        })
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(raw.to_string()))
}

fn read_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        post_id: PostId(row.get(1)?),
        comment: row.get(2)?,
    })
}

fn query_comments(conn: &Connection, post_id: Option<PostId>) -> StoreResult<Vec<Comment>> {
    let comments = match post_id {
        Some(id) => {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, comment FROM comments WHERE post_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![id.0], read_comment)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt =
                conn.prepare("SELECT id, post_id, comment FROM comments ORDER BY id ASC")?;
            let rows = stmt.query_map([], read_comment)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };

    Ok(comments)
}

fn load_post(conn: &Connection, id: PostId) -> StoreResult<Option<Post>> {
    let row = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id.0],
            PostRow::read,
        )
        .optional()?;

    match row {
        Some(row) => {
            let comments = query_comments(conn, Some(id))?;
            Ok(Some(row.into_post(comments)?))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let conn = self.pool.get()?;

        // Ties fall back to newest row first.
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY {} DESC, id DESC",
            query.sort.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], PostRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_post: HashMap<PostId, Vec<Comment>> = HashMap::new();
        for comment in query_comments(&conn, None)? {
            by_post.entry(comment.post_id).or_default().push(comment);
        }

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let comments = by_post.remove(&PostId(row.id)).unwrap_or_default();
            let post = row.into_post(comments)?;
            if post.title_matches(&query.search) {
                posts.push(post);
            }
        }

        Ok(posts)
    }

    async fn select_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        load_post(&conn, id)
    }

    async fn insert_post(&self, post: &NewPost) -> StoreResult<Post> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (title, content, image_url, upvotes) VALUES (?1, ?2, ?3, ?4)",
            params![post.title, post.content, post.image_url, post.upvotes],
        )?;
        let id = PostId(conn.last_insert_rowid());

        load_post(&conn, id)?.ok_or(StoreError::Database(
            rusqlite::Error::QueryReturnedNoRows,
        ))
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if let Some(title) = &patch.title {
            columns.push("title");
            values.push(title);
        }
        if let Some(content) = &patch.content {
            columns.push("content");
            values.push(content);
        }
        if let Some(image_url) = &patch.image_url {
            columns.push("image_url");
            values.push(image_url);
        }
        if let Some(upvotes) = &patch.upvotes {
            columns.push("upvotes");
            values.push(upvotes);
        }

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE posts SET {assignments} WHERE id = ?{}",
            columns.len() + 1
        );
        values.push(&id.0);

        let conn = self.pool.get()?;
        conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> StoreResult<Comment> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (post_id, comment) VALUES (?1, ?2)",
            params![comment.post_id.0, comment.comment],
        )?;

        Ok(Comment {
            id: CommentId(conn.last_insert_rowid()),
            post_id: comment.post_id,
            comment: comment.comment.clone(),
        })
    }
}
