use anyhow::Result;

use crate::config::Config;
use crate::store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;

    // Chunk rows: one per indexed chunk, keyed by a deterministic id
    // derived from (source, ordinal).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            heading TEXT NOT NULL,
            chunk_type TEXT NOT NULL,
            text TEXT NOT NULL,
            UNIQUE(source, ordinal)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Embedding vectors, stored as little-endian f32 BLOBs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_type ON chunks(chunk_type)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_source ON chunk_vectors(source)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
