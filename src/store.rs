//! Persistent index store over SQLite.
//!
//! Owns the chunk and vector tables and the four access patterns the rest
//! of the system relies on: replace-by-source writes, delete-by-source,
//! similarity queries, and substring (containment) queries. Embedding the
//! chunk text on write is the store's responsibility; the provider behind
//! it is a black box (see [`crate::embedding`]).
//!
//! The store is constructed once at process start and passed by reference
//! into the indexing pipeline and the retriever — no global handles.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::{Config, EmbeddingConfig};
use crate::embedding::{self, EmbeddingClient};
use crate::models::{chunk_id, Chunk, ChunkType, StoredChunk};

/// Sources deleted per statement during the prune pass.
const DELETE_BATCH_SIZE: usize = 100;

/// Open the SQLite pool behind the store, creating the database file and
/// its parent directory on first use. WAL keeps the indexing writer from
/// blocking search readers; foreign keys guard the chunk/vector relation.
pub(crate) async fn connect(config: &Config) -> Result<SqlitePool> {
    let path = &config.db.path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub struct IndexStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
}

impl IndexStore {
    /// Open the store backed by the configured database file.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect(config).await?;
        Ok(Self {
            pool,
            embedding: config.embedding.clone(),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Fail fast when the schema is missing — a query against an
    /// uninitialized store is a configuration error, never silently empty.
    pub async fn ensure_indexed(&self) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks'",
        )
        .fetch_one(&self.pool)
        .await?;

        if !exists {
            bail!("Chunk index not found — is the vault indexed? Run 'mdv init' and 'mdv index' first.");
        }
        Ok(())
    }

    /// Replace all of a source's chunks with a fresh set.
    ///
    /// Deterministic ids keyed by (source, ordinal) plus delete-then-insert
    /// in one transaction give replace-not-append semantics: re-indexing an
    /// unchanged note stores identical rows. Embeddings are generated
    /// inline afterwards, non-fatally.
    pub async fn replace_chunks(&self, source: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;

        for (ordinal, chunk) in chunks.iter().enumerate() {
            let ordinal = ordinal as i64;
            sqlx::query(
                "INSERT INTO chunks (id, source, ordinal, heading, chunk_type, text) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk_id(source, ordinal))
            .bind(source)
            .bind(ordinal)
            .bind(&chunk.heading)
            .bind(chunk.chunk_type.as_str())
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.embed_chunks_inline(source, chunks).await;
        Ok(())
    }

    /// Embed a source's new chunks and store the vectors. Non-fatal: a
    /// failed batch leaves those chunks keyword-searchable only.
    async fn embed_chunks_inline(&self, source: &str, chunks: &[Chunk]) {
        if !self.embedding.is_enabled() || chunks.is_empty() {
            return;
        }

        let client = match EmbeddingClient::from_config(&self.embedding) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Warning: could not create embedding client: {}", e);
                return;
            }
        };

        for (batch_start, batch) in chunks
            .chunks(self.embedding.batch_size)
            .enumerate()
            .map(|(i, b)| (i * self.embedding.batch_size, b))
        {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            match client.embed(&texts).await {
                Ok(vectors) => {
                    for (offset, vec) in vectors.iter().enumerate() {
                        let ordinal = (batch_start + offset) as i64;
                        let blob = embedding::vec_to_blob(vec);
                        let result = sqlx::query(
                            "INSERT INTO chunk_vectors (chunk_id, source, embedding) VALUES (?, ?, ?)
                             ON CONFLICT(chunk_id) DO UPDATE SET
                                 source = excluded.source,
                                 embedding = excluded.embedding",
                        )
                        .bind(chunk_id(source, ordinal))
                        .bind(source)
                        .bind(&blob)
                        .execute(&self.pool)
                        .await;

                        if let Err(e) = result {
                            eprintln!(
                                "Warning: failed to store embedding for {} #{}: {}",
                                source, ordinal, e
                            );
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Warning: embedding batch failed for {}: {}", source, e);
                }
            }
        }
    }

    /// Remove all entries for one source path. Returns deleted chunk count.
    pub async fn delete_by_source(&self, source: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM chunks WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    /// Remove all entries for the given sources, batched to bound statement
    /// size. Returns deleted chunk count.
    pub async fn delete_sources(&self, sources: &[String]) -> Result<u64> {
        let mut deleted = 0u64;

        for batch in sources.chunks(DELETE_BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM chunk_vectors WHERE source IN (");
            let mut sep = qb.separated(", ");
            for source in batch {
                sep.push_bind(source);
            }
            qb.push(")");
            qb.build().execute(&self.pool).await?;

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM chunks WHERE source IN (");
            let mut sep = qb.separated(", ");
            for source in batch {
                sep.push_bind(source);
            }
            qb.push(")");
            deleted += qb.build().execute(&self.pool).await?.rows_affected();
        }

        Ok(deleted)
    }

    /// All distinct source paths currently indexed. Used by the prune pass.
    pub async fn list_sources(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar("SELECT DISTINCT source FROM chunks")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Entries whose text contains ANY of `terms` as a substring, up to
    /// `limit`. One OR-combined statement — not a round trip per term.
    /// Containment is case-sensitive at this layer; case-insensitive
    /// scoring happens in the retriever.
    pub async fn query_contains(
        &self,
        terms: &[String],
        limit: i64,
        chunk_type: Option<ChunkType>,
    ) -> Result<Vec<StoredChunk>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, source, ordinal, heading, chunk_type, text FROM chunks WHERE (");
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("instr(text, ");
            qb.push_bind(term);
            qb.push(") > 0");
        }
        qb.push(")");

        if let Some(ct) = chunk_type {
            qb.push(" AND chunk_type = ");
            qb.push_bind(ct.as_str());
        }

        qb.push(" ORDER BY source, ordinal LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_stored_chunk).collect()
    }

    /// Up to `k` entries ranked by embedding similarity to `query_text`.
    ///
    /// Vectors are scanned and scored in process (cosine); at vault scale
    /// a full scan beats maintaining an ANN index.
    pub async fn query_similarity(
        &self,
        query_text: &str,
        k: usize,
        chunk_type: Option<ChunkType>,
    ) -> Result<Vec<(StoredChunk, f32)>> {
        if !self.embedding.is_enabled() {
            bail!("Semantic search requires embeddings. Set [embedding] provider in config.");
        }

        let client = EmbeddingClient::from_config(&self.embedding)?;
        let query_vec = client.embed_one(query_text).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT c.id, c.source, c.ordinal, c.heading, c.chunk_type, c.text, v.embedding \
             FROM chunk_vectors v JOIN chunks c ON c.id = v.chunk_id",
        );
        if let Some(ct) = chunk_type {
            qb.push(" WHERE c.chunk_type = ");
            qb.push_bind(ct.as_str());
        }

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut scored: Vec<(StoredChunk, f32)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk = row_to_stored_chunk(row)?;
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let similarity = embedding::cosine_similarity(&query_vec, &vec);
            scored.push((chunk, similarity));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }
}

fn row_to_stored_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<StoredChunk> {
    let chunk_type: String = row.get("chunk_type");
    Ok(StoredChunk {
        id: row.get("id"),
        source: row.get("source"),
        ordinal: row.get("ordinal"),
        heading: row.get("heading"),
        chunk_type: chunk_type.parse()?,
        text: row.get("text"),
    })
}
