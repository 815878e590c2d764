//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! The vector dimension is pinned in a `meta` table on first open; reopening
//! the database with a different dimension is refused.
//!
//! A file-backed store keeps two connections. Writes go through one, reads
//! through a second read-only one, and WAL keeps readers on the last
//! committed snapshot, so a search never waits for an upsert to commit.

use super::{
    check_dimension, prepare_upsert, rank, IndexedVideo, QueryFilter, QueryResult, StoredChunk, TranscriptRecord,
    VectorStore, VideoMetadata,
};
use crate::chunking::Chunk;
use crate::error::{Result, VidscribeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chunks (
        chunk_id TEXT PRIMARY KEY,
        video_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        start_seconds REAL NOT NULL,
        end_seconds REAL NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_video_id ON chunks(video_id);
    CREATE INDEX IF NOT EXISTS idx_chunks_indexed_at ON chunks(indexed_at);

    CREATE TABLE IF NOT EXISTS videos (
        video_id TEXT PRIMARY KEY,
        source TEXT,
        model TEXT,
        chunk_count INTEGER NOT NULL,
        total_duration_seconds REAL NOT NULL,
        indexed_at TEXT NOT NULL
    );

    -- Databases written before the videos table existed
    INSERT OR IGNORE INTO videos (video_id, chunk_count, total_duration_seconds, indexed_at)
        SELECT video_id, COUNT(*), MAX(end_seconds), MAX(indexed_at) FROM chunks GROUP BY video_id;

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const CHUNK_COLUMNS: &str =
    "chunk_id, video_id, chunk_index, text, start_seconds, end_seconds, embedding, indexed_at";

const VIDEO_COLUMNS: &str = "video_id, source, model, chunk_count, total_duration_seconds, indexed_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    /// Read-only connection; `None` for in-memory databases, which cannot be
    /// shared between connections.
    reader: Option<Mutex<Connection>>,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path` for vectors of `dimensions`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let mut store = Self::init(conn, dimensions)?;

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;
        store.reader = Some(Mutex::new(reader));

        info!("Initialized SQLite vector store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Self::pin_dimensions(&conn, dimensions)?;
        Ok(Self {
            conn: Mutex::new(conn),
            reader: None,
            dimensions,
        })
    }

    fn pin_dimensions(conn: &Connection, dimensions: usize) -> Result<()> {
        let pinned: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'dimensions'", [], |row| row.get(0))
            .optional()?;

        match pinned {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )?;
                Ok(())
            }
            Some(value) if value == dimensions.to_string() => Ok(()),
            Some(value) => Err(VidscribeError::Store(format!(
                "store holds {}-dimensional vectors but {} were configured",
                value, dimensions
            ))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        Self::acquire(&self.conn)
    }

    /// The connection reads go through.
    fn read(&self) -> Result<MutexGuard<'_, Connection>> {
        Self::acquire(self.reader.as_ref().unwrap_or(&self.conn))
    }

    fn acquire(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|e| VidscribeError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<StoredChunk> {
        let index: i64 = row.get(2)?;
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let indexed_at: String = row.get(7)?;

        Ok(StoredChunk {
            chunk_id: row.get(0)?,
            video_id: row.get(1)?,
            index: index as usize,
            text: row.get(3)?,
            start_seconds: row.get(4)?,
            end_seconds: row.get(5)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: Self::parse_time(&indexed_at),
        })
    }

    fn row_to_video(row: &Row<'_>) -> rusqlite::Result<IndexedVideo> {
        let source: Option<String> = row.get(1)?;
        let indexed_at: String = row.get(5)?;

        Ok(IndexedVideo {
            video_id: row.get(0)?,
            chunk_count: row.get(3)?,
            total_duration_seconds: row.get(4)?,
            indexed_at: Self::parse_time(&indexed_at),
            metadata: VideoMetadata {
                source: source.map(PathBuf::from),
                model: row.get(2)?,
            },
        })
    }

    fn load(conn: &Connection, video_id: Option<&str>) -> Result<Vec<StoredChunk>> {
        let chunks = match video_id {
            Some(video_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM chunks WHERE video_id = ?1 ORDER BY chunk_index",
                    CHUNK_COLUMNS
                ))?;
                let rows = stmt.query_map(params![video_id], Self::row_to_chunk)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!("SELECT {} FROM chunks", CHUNK_COLUMNS))?;
                let rows = stmt.query_map([], Self::row_to_chunk)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(chunks)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, metadata, chunks, embeddings), fields(chunks = chunks.len()))]
    async fn upsert(
        &self,
        video_id: &str,
        metadata: &VideoMetadata,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let record = prepare_upsert(video_id, metadata, chunks, embeddings, self.dimensions)?;
        let video = &record.video;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM chunks WHERE video_id = ?1", params![video_id])?;
        tx.execute(
            &format!("INSERT OR REPLACE INTO videos ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)", VIDEO_COLUMNS),
            params![
                video.video_id,
                video.metadata.source.as_ref().map(|p| p.to_string_lossy().into_owned()),
                video.metadata.model,
                video.chunk_count,
                video.total_duration_seconds,
                video.indexed_at.to_rfc3339(),
            ],
        )?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO chunks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                CHUNK_COLUMNS
            ))?;
            for chunk in &record.chunks {
                insert.execute(params![
                    chunk.chunk_id,
                    chunk.video_id,
                    chunk.index as i64,
                    chunk.text,
                    chunk.start_seconds,
                    chunk.end_seconds,
                    Self::embedding_to_bytes(&chunk.embedding),
                    chunk.indexed_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        info!("Stored {} chunks for video {}", record.chunks.len(), video_id);
        Ok(record.chunks.len())
    }

    #[instrument(skip(self, vector, filter))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>> {
        check_dimension(vector, self.dimensions)?;

        let candidates = {
            let conn = self.read()?;
            Self::load(&conn, filter.and_then(|f| f.video_id.as_deref()))?
        };

        let results = rank(vector, candidates.iter(), top_k, filter);
        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM chunks WHERE video_id = ?1", params![video_id])?;
        tx.execute("DELETE FROM videos WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;

        info!("Deleted {} chunks for video {}", deleted, video_id);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn get_by_video_id(&self, video_id: &str) -> Result<Vec<StoredChunk>> {
        let conn = self.read()?;
        let chunks = Self::load(&conn, Some(video_id))?;
        debug!("Found {} chunks for video {}", chunks.len(), video_id);
        Ok(chunks)
    }

    #[instrument(skip(self))]
    async fn get_video(&self, video_id: &str) -> Result<Option<TranscriptRecord>> {
        let conn = self.read()?;
        // One snapshot for the record and its chunks
        let tx = conn.unchecked_transaction()?;

        let video = tx
            .query_row(
                &format!("SELECT {} FROM videos WHERE video_id = ?1", VIDEO_COLUMNS),
                params![video_id],
                Self::row_to_video,
            )
            .optional()?;

        let record = match video {
            Some(video) => Some(TranscriptRecord {
                chunks: Self::load(&tx, Some(video_id))?,
                video,
            }),
            None => None,
        };

        tx.finish()?;
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let conn = self.read()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos ORDER BY indexed_at DESC, video_id",
            VIDEO_COLUMNS
        ))?;
        let videos = stmt.query_map([], Self::row_to_video)?;

        Ok(videos.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.read()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn close(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA optimize;")?;
        debug!("Closed SQLite vector store");
        Ok(())
    }
}
