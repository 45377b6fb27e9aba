//! Professor and embedding persistence on Postgres + pgvector.

use anyhow::{Context, Result};
use pgvector::Vector;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls, Row};

use crate::record::ProfessorRecord;

/// Default table for professor rows.
pub const DEFAULT_PROFESSORS_TABLE: &str = "professors";
/// Default table for chunk embeddings.
pub const DEFAULT_EMBEDDINGS_TABLE: &str = "professor_embeddings";

/// Fully-qualified Postgres table name (schema + table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Builds a new table identifier.
    pub fn new<S, T>(schema: S, table: T) -> Result<Self>
    where
        S: Into<String>,
        T: Into<String>,
    {
        let schema = schema.into();
        let table = table.into();
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!table.trim().is_empty(), "table name is required");
        Ok(Self { schema, table })
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Returns the raw table string.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quoted name for an index on this table.
    fn index_name(&self, suffix: &str) -> String {
        quote_ident(&format!(
            "{}_{}_{}",
            sanitize_ident(&self.schema),
            sanitize_ident(&self.table),
            suffix
        ))
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

/// The two tables backing a [`PgVectorStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTables {
    /// One row per professor, unique on email.
    pub professors: TableName,
    /// One row per `(professor_id, chunk_index)`.
    pub embeddings: TableName,
}

impl StoreTables {
    /// Builds both table names inside `schema`.
    pub fn new(schema: &str, professors: &str, embeddings: &str) -> Result<Self> {
        Ok(Self {
            professors: TableName::new(schema, professors)?,
            embeddings: TableName::new(schema, embeddings)?,
        })
    }
}

impl Default for StoreTables {
    fn default() -> Self {
        Self {
            professors: TableName {
                schema: "public".into(),
                table: DEFAULT_PROFESSORS_TABLE.into(),
            },
            embeddings: TableName {
                schema: "public".into(),
                table: DEFAULT_EMBEDDINGS_TABLE.into(),
            },
        }
    }
}

/// Values written to the professors table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessorRow {
    /// Display name or the missing placeholder.
    pub name: String,
    /// Primary email; the natural key.
    pub email: String,
    /// Page the record was scraped from.
    pub source_url: String,
    /// Biography and publications as rendered by the summary.
    pub research_areas: String,
}

impl ProfessorRow {
    /// Row for a record, or `None` when the record has no email.
    pub fn from_record(record: &ProfessorRecord) -> Option<Self> {
        let email = record.primary_email()?.to_string();
        let summary = record.summarize();
        Some(Self {
            name: summary.name,
            email,
            source_url: record.source_url.clone(),
            research_areas: summary.body,
        })
    }
}

/// Best-matching chunk of one professor for a query vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessorMatch {
    /// Database id.
    pub professor_id: i64,
    /// Display name.
    pub name: String,
    /// Primary email.
    pub email: String,
    /// Profile page.
    pub source_url: String,
    /// Stored research text.
    pub research_areas: String,
    /// Closest stored chunk.
    pub chunk: String,
    /// Cosine distance of that chunk.
    pub distance: f64,
}

impl ProfessorMatch {
    /// Cosine similarity, `1 - distance`.
    pub fn score(&self) -> f64 {
        1.0 - self.distance
    }
}

/// A professor written together with its full set of chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacedProfile {
    /// Database id.
    pub professor_id: i64,
    /// Stale chunks removed beyond the new chunk count.
    pub pruned: u64,
}

/// Storage backend for professors and their chunk embeddings.
pub trait ProfileStore {
    /// Whether a professor with this email is already stored.
    fn professor_exists(&self, email: &str) -> Result<bool>;

    /// Inserts or updates a professor keyed by email and returns its id.
    fn upsert_professor(&mut self, row: &ProfessorRow) -> Result<i64>;

    /// Inserts or replaces the chunk at `chunk_index`.
    fn insert_embedding(
        &mut self,
        professor_id: i64,
        chunk_index: usize,
        chunk: &str,
        embedding: &[f32],
    ) -> Result<()>;

    /// Deletes chunks with an index `>= keep`; returns how many were removed.
    fn prune_embeddings(&mut self, professor_id: i64, keep: usize) -> Result<u64>;

    /// Upserts `row` and replaces all of its chunks with `chunks` as one unit.
    /// On error the stored professor and chunks are left as they were.
    fn replace_profile(
        &mut self,
        row: &ProfessorRow,
        chunks: &[(String, Vec<f32>)],
    ) -> Result<ReplacedProfile>;

    /// Up to `top_k` professors ordered by their closest chunk.
    fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ProfessorMatch>>;
}

/// [`ProfileStore`] over `tokio-postgres`, driven by a private
/// current-thread runtime so callers stay blocking.
pub struct PgVectorStore {
    runtime: Runtime,
    client: Client,
    tables: StoreTables,
}

impl PgVectorStore {
    /// Connects to `database_url`.
    pub fn connect(database_url: &str, tables: StoreTables) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(database_url, NoTls))
            .context("failed to connect to Postgres")?;
        // Progresses whenever a query is driven through `block_on`.
        runtime.spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection error");
            }
        });
        Ok(Self {
            runtime,
            client,
            tables,
        })
    }

    /// Table names in use.
    pub fn tables(&self) -> &StoreTables {
        &self.tables
    }

    /// Creates the `vector` extension, both tables and the lookup index.
    pub fn ensure_schema(&self, dims: usize) -> Result<()> {
        anyhow::ensure!(dims > 0, "embedding dimension must be positive");
        for statement in schema_sql(&self.tables, dims) {
            self.runtime
                .block_on(self.client.execute(statement.as_str(), &[]))
                .with_context(|| format!("failed to apply schema statement: {statement}"))?;
        }
        tracing::info!(
            professors = %self.tables.professors.qualified(),
            embeddings = %self.tables.embeddings.qualified(),
            dims,
            "schema ready"
        );
        Ok(())
    }
}

impl ProfileStore for PgVectorStore {
    fn professor_exists(&self, email: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE email = $1",
            self.tables.professors.qualified()
        );
        let row = self
            .runtime
            .block_on(self.client.query_opt(sql.as_str(), &[&email]))
            .with_context(|| format!("failed to look up professor {email}"))?;
        Ok(row.is_some())
    }

    fn upsert_professor(&mut self, row: &ProfessorRow) -> Result<i64> {
        let sql = upsert_professor_sql(&self.tables.professors);
        let inserted = self
            .runtime
            .block_on(self.client.query_one(
                sql.as_str(),
                &[&row.name, &row.email, &row.source_url, &row.research_areas],
            ))
            .with_context(|| format!("failed to upsert professor {}", row.email))?;
        Ok(inserted.get("id"))
    }

    fn insert_embedding(
        &mut self,
        professor_id: i64,
        chunk_index: usize,
        chunk: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let sql = insert_embedding_sql(&self.tables.embeddings);
        let index = i32::try_from(chunk_index).context("chunk index exceeds i32 range")?;
        let vector = Vector::from(embedding.to_vec());
        self.runtime
            .block_on(
                self.client
                    .execute(sql.as_str(), &[&professor_id, &index, &chunk, &vector]),
            )
            .with_context(|| {
                format!("failed to insert chunk {chunk_index} for professor {professor_id}")
            })?;
        Ok(())
    }

    fn prune_embeddings(&mut self, professor_id: i64, keep: usize) -> Result<u64> {
        let sql = prune_embeddings_sql(&self.tables.embeddings);
        let keep = i32::try_from(keep).context("chunk count exceeds i32 range")?;
        self.runtime
            .block_on(self.client.execute(sql.as_str(), &[&professor_id, &keep]))
            .with_context(|| format!("failed to prune chunks for professor {professor_id}"))
    }

    fn replace_profile(
        &mut self,
        row: &ProfessorRow,
        chunks: &[(String, Vec<f32>)],
    ) -> Result<ReplacedProfile> {
        let upsert_sql = upsert_professor_sql(&self.tables.professors);
        let insert_sql = insert_embedding_sql(&self.tables.embeddings);
        let prune_sql = prune_embeddings_sql(&self.tables.embeddings);
        let keep = i32::try_from(chunks.len()).context("chunk count exceeds i32 range")?;
        let Self { runtime, client, .. } = self;
        runtime.block_on(async {
            let tx = client
                .transaction()
                .await
                .context("failed to open upload transaction")?;
            let inserted = tx
                .query_one(
                    upsert_sql.as_str(),
                    &[&row.name, &row.email, &row.source_url, &row.research_areas],
                )
                .await
                .with_context(|| format!("failed to upsert professor {}", row.email))?;
            let professor_id: i64 = inserted.get("id");
            for (chunk_index, (chunk, embedding)) in chunks.iter().enumerate() {
                let index = i32::try_from(chunk_index).context("chunk index exceeds i32 range")?;
                let vector = Vector::from(embedding.clone());
                tx.execute(
                    insert_sql.as_str(),
                    &[&professor_id, &index, &chunk.as_str(), &vector],
                )
                .await
                .with_context(|| {
                    format!("failed to insert chunk {chunk_index} for professor {professor_id}")
                })?;
            }
            let pruned = tx
                .execute(prune_sql.as_str(), &[&professor_id, &keep])
                .await
                .with_context(|| format!("failed to prune chunks for professor {professor_id}"))?;
            tx.commit()
                .await
                .with_context(|| format!("failed to commit upload of {}", row.email))?;
            Ok::<_, anyhow::Error>(ReplacedProfile {
                professor_id,
                pruned,
            })
        })
    }

    fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ProfessorMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let sql = similarity_sql(&self.tables);
        let vector = Vector::from(embedding.to_vec());
        let rows = self
            .runtime
            .block_on(self.client.query(sql.as_str(), &[&vector, &(top_k as i64)]))
            .context("similarity search failed")?;
        Ok(rows.iter().map(match_from_row).collect())
    }
}

fn match_from_row(row: &Row) -> ProfessorMatch {
    ProfessorMatch {
        professor_id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        source_url: row.get("source_url"),
        research_areas: row.get("research_areas"),
        chunk: row.get("chunk"),
        distance: row.get("distance"),
    }
}

fn schema_sql(tables: &StoreTables, dims: usize) -> Vec<String> {
    let professors = tables.professors.qualified();
    let embeddings = tables.embeddings.qualified();
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {professors} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                source_url TEXT NOT NULL,
                research_areas TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {embeddings} (
                professor_id BIGINT NOT NULL REFERENCES {professors} (id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                chunk TEXT NOT NULL,
                embedding VECTOR({dims}) NOT NULL,
                PRIMARY KEY (professor_id, chunk_index)
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {embeddings} USING hnsw (embedding vector_cosine_ops)",
            tables.embeddings.index_name("embedding_hnsw_idx")
        ),
    ]
}

fn upsert_professor_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (name, email, source_url, research_areas) \
            VALUES ($1, $2, $3, $4) \
            ON CONFLICT (email) DO UPDATE SET \
                name = EXCLUDED.name, \
                source_url = EXCLUDED.source_url, \
                research_areas = EXCLUDED.research_areas, \
                updated_at = now() \
            RETURNING id",
        table.qualified()
    )
}

fn insert_embedding_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (professor_id, chunk_index, chunk, embedding) \
            VALUES ($1, $2, $3, $4) \
            ON CONFLICT (professor_id, chunk_index) DO UPDATE SET \
                chunk = EXCLUDED.chunk, \
                embedding = EXCLUDED.embedding",
        table.qualified()
    )
}

fn prune_embeddings_sql(table: &TableName) -> String {
    format!(
        "DELETE FROM {} WHERE professor_id = $1 AND chunk_index >= $2",
        table.qualified()
    )
}

fn similarity_sql(tables: &StoreTables) -> String {
    format!(
        "SELECT id, name, email, source_url, research_areas, chunk, distance FROM ( \
            SELECT DISTINCT ON (p.id) \
                p.id, p.name, p.email, p.source_url, p.research_areas, e.chunk, \
                (e.embedding <=> $1) AS distance \
            FROM {} e JOIN {} p ON p.id = e.professor_id \
            ORDER BY p.id, distance \
        ) best \
        ORDER BY distance ASC \
        LIMIT $2",
        tables.embeddings.qualified(),
        tables.professors.qualified()
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) struct StoredChunk {
        pub(crate) professor_id: i64,
        pub(crate) chunk_index: usize,
        pub(crate) chunk: String,
        pub(crate) embedding: Vec<f32>,
    }

    /// In-memory store ranking by cosine distance.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryStore {
        pub(crate) professors: Vec<ProfessorRow>,
        pub(crate) chunks: Vec<StoredChunk>,
        /// Makes `replace_profile` fail when it reaches this chunk index.
        pub(crate) reject_chunk_at: Option<usize>,
    }

    impl MemoryStore {
        pub(crate) fn chunks_of(&self, professor_id: i64) -> Vec<&StoredChunk> {
            let mut chunks: Vec<_> = self
                .chunks
                .iter()
                .filter(|c| c.professor_id == professor_id)
                .collect();
            chunks.sort_by_key(|c| c.chunk_index);
            chunks
        }
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
        let norm = |v: &[f32]| v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        1.0 - dot / (norm(a) * norm(b))
    }

    impl ProfileStore for MemoryStore {
        fn professor_exists(&self, email: &str) -> Result<bool> {
            Ok(self.professors.iter().any(|p| p.email == email))
        }

        fn upsert_professor(&mut self, row: &ProfessorRow) -> Result<i64> {
            if let Some(idx) = self.professors.iter().position(|p| p.email == row.email) {
                self.professors[idx] = row.clone();
                return Ok(idx as i64 + 1);
            }
            self.professors.push(row.clone());
            Ok(self.professors.len() as i64)
        }

        fn insert_embedding(
            &mut self,
            professor_id: i64,
            chunk_index: usize,
            chunk: &str,
            embedding: &[f32],
        ) -> Result<()> {
            self.chunks
                .retain(|c| !(c.professor_id == professor_id && c.chunk_index == chunk_index));
            self.chunks.push(StoredChunk {
                professor_id,
                chunk_index,
                chunk: chunk.to_string(),
                embedding: embedding.to_vec(),
            });
            Ok(())
        }

        fn prune_embeddings(&mut self, professor_id: i64, keep: usize) -> Result<u64> {
            let before = self.chunks.len();
            self.chunks
                .retain(|c| !(c.professor_id == professor_id && c.chunk_index >= keep));
            Ok((before - self.chunks.len()) as u64)
        }

        fn replace_profile(
            &mut self,
            row: &ProfessorRow,
            chunks: &[(String, Vec<f32>)],
        ) -> Result<ReplacedProfile> {
            // Writes go to a copy that only replaces `self` once every step succeeded.
            let mut staged = MemoryStore {
                professors: self.professors.clone(),
                chunks: self.chunks.clone(),
                reject_chunk_at: None,
            };
            let professor_id = staged.upsert_professor(row)?;
            for (idx, (chunk, embedding)) in chunks.iter().enumerate() {
                anyhow::ensure!(
                    self.reject_chunk_at != Some(idx),
                    "chunk {idx} rejected for professor {professor_id}"
                );
                staged.insert_embedding(professor_id, idx, chunk, embedding)?;
            }
            let pruned = staged.prune_embeddings(professor_id, chunks.len())?;
            self.professors = staged.professors;
            self.chunks = staged.chunks;
            Ok(ReplacedProfile {
                professor_id,
                pruned,
            })
        }

        fn similarity_search(
            &self,
            embedding: &[f32],
            top_k: usize,
        ) -> Result<Vec<ProfessorMatch>> {
            let mut best: Vec<ProfessorMatch> = Vec::new();
            for (idx, professor) in self.professors.iter().enumerate() {
                let id = idx as i64 + 1;
                let closest = self
                    .chunks_of(id)
                    .into_iter()
                    .map(|c| (cosine_distance(&c.embedding, embedding), c))
                    .min_by(|a, b| a.0.total_cmp(&b.0));
                if let Some((distance, chunk)) = closest {
                    best.push(ProfessorMatch {
                        professor_id: id,
                        name: professor.name.clone(),
                        email: professor.email.clone(),
                        source_url: professor.source_url.clone(),
                        research_areas: professor.research_areas.clone(),
                        chunk: chunk.chunk.clone(),
                        distance,
                    });
                }
            }
            best.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            best.truncate(top_k);
            Ok(best)
        }
    }
}
