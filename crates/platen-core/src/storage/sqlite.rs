//! SQLite-backed repository implementation.
//!
//! Every write is a single-row idempotent upsert, so concurrent documents
//! need no cross-row transaction coordination. Optional members of the
//! error-code uniqueness scope are normalized to "" in their columns so
//! the UNIQUE index treats two absent values as equal.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{PlatenError, PlatenResult};
use crate::pipeline::Stage;
use crate::traits::{Repository, UpsertOutcome};
use crate::types::{
    Chunk, ChunkOutcome, Document, EmbeddingRecord, ErrorCode, ExtractionMethod, ImageItem,
    OemRelationType, OemRelationship, ProcessingStatus, SourceType, StageState, StageStatus,
    TableItem,
};

/// SQLite-backed repository.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Create a repository at the given path.
    pub fn new(path: impl AsRef<Path>) -> PlatenResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    /// Create an in-memory repository (for testing).
    pub fn in_memory() -> PlatenResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> PlatenResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                blob_url TEXT,
                page_count INTEGER,
                word_count INTEGER,
                manufacturer TEXT,
                manufacturer_confidence REAL,
                model TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                processing_status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                page_start INTEGER NOT NULL,
                page_end INTEGER NOT NULL,
                page_label_start TEXT NOT NULL,
                page_label_end TEXT NOT NULL,
                section_hierarchy TEXT NOT NULL DEFAULT '[]',
                prev_chunk_id TEXT,
                next_chunk_id TEXT,
                processing_status TEXT NOT NULL,
                UNIQUE(document_id, fingerprint)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, ordinal);

            CREATE TABLE IF NOT EXISTS embeddings (
                source_id TEXT NOT NULL,
                source_type TEXT NOT NULL,
                model_name TEXT NOT NULL,
                document_id TEXT NOT NULL,
                vector TEXT NOT NULL,
                context_text TEXT,
                PRIMARY KEY(source_id, source_type, model_name)
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_document ON embeddings(document_id);

            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_id TEXT,
                page INTEGER NOT NULL,
                bbox TEXT,
                content_hash TEXT NOT NULL,
                blob_url TEXT NOT NULL,
                is_vector INTEGER NOT NULL DEFAULT 0,
                raster_url TEXT,
                context TEXT NOT NULL DEFAULT '{}',
                UNIQUE(document_id, content_hash)
            );

            CREATE TABLE IF NOT EXISTS tables (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_id TEXT,
                page INTEGER NOT NULL,
                bbox TEXT,
                content_hash TEXT NOT NULL,
                headers TEXT NOT NULL DEFAULT '[]',
                rows TEXT NOT NULL DEFAULT '[]',
                context TEXT NOT NULL DEFAULT '{}',
                UNIQUE(document_id, content_hash)
            );

            CREATE TABLE IF NOT EXISTS error_codes (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                product TEXT NOT NULL DEFAULT '',
                document_id TEXT NOT NULL DEFAULT '',
                video_id TEXT NOT NULL DEFAULT '',
                description TEXT,
                solution_text TEXT,
                confidence REAL NOT NULL,
                extraction_method TEXT NOT NULL,
                chunk_id TEXT,
                image_id TEXT,
                linked_parts TEXT NOT NULL DEFAULT '[]',
                oem_manufacturer TEXT,
                UNIQUE(code, manufacturer, product, document_id, video_id)
            );

            CREATE INDEX IF NOT EXISTS idx_error_codes_manufacturer
                ON error_codes(manufacturer);
            CREATE INDEX IF NOT EXISTS idx_error_codes_oem
                ON error_codes(oem_manufacturer);

            CREATE TABLE IF NOT EXISTS oem_relationships (
                id TEXT PRIMARY KEY,
                brand TEXT NOT NULL,
                series_pattern TEXT NOT NULL,
                oem_manufacturer TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                UNIQUE(brand, series_pattern)
            );

            CREATE TABLE IF NOT EXISTS stage_status (
                document_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error TEXT,
                PRIMARY KEY(document_id, stage)
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn json<T: serde::Serialize>(value: &T) -> PlatenResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> PlatenResult<T> {
    Ok(serde_json::from_str(s)?)
}

fn opt_empty(s: Option<&str>) -> String {
    s.unwrap_or_default().to_string()
}

fn empty_opt(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn processing_status(s: &str) -> ProcessingStatus {
    match s {
        "processing" => ProcessingStatus::Processing,
        "completed" => ProcessingStatus::Completed,
        "failed" => ProcessingStatus::Failed,
        _ => ProcessingStatus::Pending,
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let metadata: String = row.get("metadata")?;
    let status: String = row.get("processing_status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Document {
        id: row.get("id")?,
        filename: row.get("filename")?,
        content_hash: row.get("content_hash")?,
        blob_url: row.get("blob_url")?,
        page_count: row.get::<_, Option<i64>>("page_count")?.map(|n| n as usize),
        word_count: row.get::<_, Option<i64>>("word_count")?.map(|n| n as usize),
        manufacturer: row.get("manufacturer")?,
        manufacturer_confidence: row.get("manufacturer_confidence")?,
        model: row.get("model")?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        processing_status: processing_status(&status),
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let label_start: String = row.get("page_label_start")?;
    let label_end: String = row.get("page_label_end")?;
    let hierarchy: String = row.get("section_hierarchy")?;
    let status: String = row.get("processing_status")?;
    Ok(Chunk {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        ordinal: row.get::<_, i64>("ordinal")? as usize,
        text: row.get("text")?,
        fingerprint: row.get("fingerprint")?,
        page_start: row.get::<_, i64>("page_start")? as usize,
        page_end: row.get::<_, i64>("page_end")? as usize,
        page_label_start: serde_json::from_str(&label_start)
            .unwrap_or(crate::types::PageLabel::Arabic(1)),
        page_label_end: serde_json::from_str(&label_end)
            .unwrap_or(crate::types::PageLabel::Arabic(1)),
        section_hierarchy: serde_json::from_str(&hierarchy).unwrap_or_default(),
        prev_chunk_id: row.get("prev_chunk_id")?,
        next_chunk_id: row.get("next_chunk_id")?,
        processing_status: processing_status(&status),
    })
}

fn row_to_image(row: &Row<'_>) -> rusqlite::Result<ImageItem> {
    let bbox: Option<String> = row.get("bbox")?;
    let context: String = row.get("context")?;
    Ok(ImageItem {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        chunk_id: row.get("chunk_id")?,
        page: row.get::<_, i64>("page")? as usize,
        bbox: bbox.and_then(|b| serde_json::from_str(&b).ok()),
        content_hash: row.get("content_hash")?,
        blob_url: row.get("blob_url")?,
        is_vector: row.get::<_, i64>("is_vector")? != 0,
        raster_url: row.get("raster_url")?,
        context: serde_json::from_str(&context).unwrap_or_default(),
    })
}

fn row_to_table(row: &Row<'_>) -> rusqlite::Result<TableItem> {
    let bbox: Option<String> = row.get("bbox")?;
    let headers: String = row.get("headers")?;
    let rows: String = row.get("rows")?;
    let context: String = row.get("context")?;
    Ok(TableItem {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        chunk_id: row.get("chunk_id")?,
        page: row.get::<_, i64>("page")? as usize,
        bbox: bbox.and_then(|b| serde_json::from_str(&b).ok()),
        content_hash: row.get("content_hash")?,
        headers: serde_json::from_str(&headers).unwrap_or_default(),
        rows: serde_json::from_str(&rows).unwrap_or_default(),
        context: serde_json::from_str(&context).unwrap_or_default(),
    })
}

fn row_to_error_code(row: &Row<'_>) -> rusqlite::Result<ErrorCode> {
    let method: String = row.get("extraction_method")?;
    let linked: String = row.get("linked_parts")?;
    Ok(ErrorCode {
        id: row.get("id")?,
        code: row.get("code")?,
        manufacturer: row.get("manufacturer")?,
        product: empty_opt(row.get("product")?),
        document_id: empty_opt(row.get("document_id")?),
        video_id: empty_opt(row.get("video_id")?),
        description: row.get("description")?,
        solution_text: row.get("solution_text")?,
        confidence: row.get("confidence")?,
        extraction_method: match method.as_str() {
            "table_parse" => ExtractionMethod::TableParse,
            "manual" => ExtractionMethod::Manual,
            _ => ExtractionMethod::RuleTable,
        },
        chunk_id: row.get("chunk_id")?,
        image_id: row.get("image_id")?,
        linked_parts: serde_json::from_str(&linked).unwrap_or_default(),
        oem_manufacturer: row.get("oem_manufacturer")?,
    })
}

impl Repository for SqliteRepository {
    fn get_document(&self, document_id: &str) -> PlatenResult<Option<Document>> {
        let conn = self.lock();
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![document_id],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    fn find_document_by_hash(&self, content_hash: &str) -> PlatenResult<Option<Document>> {
        let conn = self.lock();
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE content_hash = ?1 ORDER BY created_at LIMIT 1",
                params![content_hash],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    fn upsert_document(&self, document: &Document) -> PlatenResult<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO documents
                (id, filename, content_hash, blob_url, page_count, word_count,
                 manufacturer, manufacturer_confidence, model, metadata,
                 processing_status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                content_hash = excluded.content_hash,
                blob_url = excluded.blob_url,
                page_count = excluded.page_count,
                word_count = excluded.word_count,
                manufacturer = excluded.manufacturer,
                manufacturer_confidence = excluded.manufacturer_confidence,
                model = excluded.model,
                metadata = excluded.metadata,
                processing_status = excluded.processing_status,
                updated_at = excluded.updated_at
            "#,
            params![
                document.id,
                document.filename,
                document.content_hash,
                document.blob_url,
                document.page_count.map(|n| n as i64),
                document.word_count.map(|n| n as i64),
                document.manufacturer,
                document.manufacturer_confidence,
                document.model,
                json(&document.metadata)?,
                document.processing_status.as_str(),
                document.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn set_processing_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
    ) -> PlatenResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE documents SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
            params![document_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(PlatenError::NotFound(format!("document {document_id}")));
        }
        Ok(())
    }

    fn list_chunks_by_document(&self, document_id: &str) -> PlatenResult<Vec<Chunk>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM chunks WHERE document_id = ?1 ORDER BY ordinal")?;
        let chunks = stmt
            .query_map(params![document_id], row_to_chunk)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    fn find_chunk_by_fingerprint(
        &self,
        document_id: &str,
        fingerprint: &str,
    ) -> PlatenResult<Option<Chunk>> {
        let conn = self.lock();
        let chunk = conn
            .query_row(
                "SELECT * FROM chunks WHERE document_id = ?1 AND fingerprint = ?2",
                params![document_id, fingerprint],
                row_to_chunk,
            )
            .optional()?;
        Ok(chunk)
    }

    fn upsert_chunk(&self, chunk: &Chunk) -> PlatenResult<ChunkOutcome> {
        if let Some(existing) =
            self.find_chunk_by_fingerprint(&chunk.document_id, &chunk.fingerprint)?
        {
            return Ok(ChunkOutcome::DuplicateIgnored(existing.id));
        }
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO chunks
                (id, document_id, ordinal, text, fingerprint, page_start, page_end,
                 page_label_start, page_label_end, section_hierarchy,
                 prev_chunk_id, next_chunk_id, processing_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                chunk.id,
                chunk.document_id,
                chunk.ordinal as i64,
                chunk.text,
                chunk.fingerprint,
                chunk.page_start as i64,
                chunk.page_end as i64,
                json(&chunk.page_label_start)?,
                json(&chunk.page_label_end)?,
                json(&chunk.section_hierarchy)?,
                chunk.prev_chunk_id,
                chunk.next_chunk_id,
                chunk.processing_status.as_str(),
            ],
        )?;
        Ok(ChunkOutcome::Created(chunk.id.clone()))
    }

    fn link_chunks(
        &self,
        chunk_id: &str,
        prev: Option<&str>,
        next: Option<&str>,
    ) -> PlatenResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE chunks SET prev_chunk_id = ?2, next_chunk_id = ?3 WHERE id = ?1",
            params![chunk_id, prev, next],
        )?;
        Ok(())
    }

    fn upsert_embedding(&self, record: &EmbeddingRecord) -> PlatenResult<UpsertOutcome> {
        let conn = self.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT source_id FROM embeddings
                 WHERE source_id = ?1 AND source_type = ?2 AND model_name = ?3",
                params![
                    record.source_id,
                    record.source_type.as_str(),
                    record.model_name
                ],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO embeddings
                (source_id, source_type, model_name, document_id, vector, context_text)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(source_id, source_type, model_name) DO UPDATE SET
                document_id = excluded.document_id,
                vector = excluded.vector,
                context_text = excluded.context_text
            "#,
            params![
                record.source_id,
                record.source_type.as_str(),
                record.model_name,
                record.document_id,
                json(&record.vector)?,
                record.context_text,
            ],
        )?;
        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn count_embeddings(&self, document_id: &str) -> PlatenResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_images_by_document(&self, document_id: &str) -> PlatenResult<Vec<ImageItem>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM images WHERE document_id = ?1 ORDER BY page, id")?;
        let images = stmt
            .query_map(params![document_id], row_to_image)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn upsert_image(&self, image: &ImageItem) -> PlatenResult<UpsertOutcome> {
        let conn = self.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM images WHERE document_id = ?1 AND content_hash = ?2",
                params![image.document_id, image.content_hash],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO images
                (id, document_id, chunk_id, page, bbox, content_hash, blob_url,
                 is_vector, raster_url, context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(document_id, content_hash) DO UPDATE SET
                chunk_id = excluded.chunk_id,
                page = excluded.page,
                bbox = excluded.bbox,
                blob_url = excluded.blob_url,
                is_vector = excluded.is_vector,
                raster_url = excluded.raster_url,
                context = excluded.context
            "#,
            params![
                image.id,
                image.document_id,
                image.chunk_id,
                image.page as i64,
                image.bbox.map(|b| json(&b)).transpose()?,
                image.content_hash,
                image.blob_url,
                image.is_vector as i64,
                image.raster_url,
                json(&image.context)?,
            ],
        )?;
        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn list_tables_by_document(&self, document_id: &str) -> PlatenResult<Vec<TableItem>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM tables WHERE document_id = ?1 ORDER BY page, id")?;
        let tables = stmt
            .query_map(params![document_id], row_to_table)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn upsert_table(&self, table: &TableItem) -> PlatenResult<UpsertOutcome> {
        let conn = self.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM tables WHERE document_id = ?1 AND content_hash = ?2",
                params![table.document_id, table.content_hash],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO tables
                (id, document_id, chunk_id, page, bbox, content_hash, headers, rows, context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(document_id, content_hash) DO UPDATE SET
                chunk_id = excluded.chunk_id,
                page = excluded.page,
                bbox = excluded.bbox,
                headers = excluded.headers,
                rows = excluded.rows,
                context = excluded.context
            "#,
            params![
                table.id,
                table.document_id,
                table.chunk_id,
                table.page as i64,
                table.bbox.map(|b| json(&b)).transpose()?,
                table.content_hash,
                json(&table.headers)?,
                json(&table.rows)?,
                json(&table.context)?,
            ],
        )?;
        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn upsert_error_code(&self, code: &ErrorCode) -> PlatenResult<UpsertOutcome> {
        let conn = self.lock();
        let existing: Option<(String, f32)> = conn
            .query_row(
                "SELECT id, confidence FROM error_codes
                 WHERE code = ?1 AND manufacturer = ?2 AND product = ?3
                   AND document_id = ?4 AND video_id = ?5",
                params![
                    code.code,
                    code.manufacturer,
                    opt_empty(code.product.as_deref()),
                    opt_empty(code.document_id.as_deref()),
                    opt_empty(code.video_id.as_deref()),
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    r#"
                    INSERT INTO error_codes
                        (id, code, manufacturer, product, document_id, video_id,
                         description, solution_text, confidence, extraction_method,
                         chunk_id, image_id, linked_parts, oem_manufacturer)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                    params![
                        code.id,
                        code.code,
                        code.manufacturer,
                        opt_empty(code.product.as_deref()),
                        opt_empty(code.document_id.as_deref()),
                        opt_empty(code.video_id.as_deref()),
                        code.description,
                        code.solution_text,
                        code.confidence,
                        code.extraction_method.as_str(),
                        code.chunk_id,
                        code.image_id,
                        json(&code.linked_parts)?,
                        code.oem_manufacturer,
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some((id, confidence)) if code.confidence > confidence => {
                conn.execute(
                    r#"
                    UPDATE error_codes SET
                        description = ?2,
                        solution_text = ?3,
                        confidence = ?4,
                        extraction_method = ?5,
                        chunk_id = ?6,
                        image_id = ?7,
                        linked_parts = ?8,
                        oem_manufacturer = ?9
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        code.description,
                        code.solution_text,
                        code.confidence,
                        code.extraction_method.as_str(),
                        code.chunk_id,
                        code.image_id,
                        json(&code.linked_parts)?,
                        code.oem_manufacturer,
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Unchanged),
        }
    }

    fn link_error_code(
        &self,
        error_code_id: &str,
        parts: &[String],
        image_id: Option<&str>,
    ) -> PlatenResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE error_codes SET linked_parts = ?2, image_id = COALESCE(?3, image_id)
             WHERE id = ?1",
            params![error_code_id, json(&parts)?, image_id],
        )?;
        if changed == 0 {
            return Err(PlatenError::NotFound(format!("error code {error_code_id}")));
        }
        Ok(())
    }

    fn tag_error_codes_oem(&self, document_id: &str, oem: &str) -> PlatenResult<usize> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE error_codes SET oem_manufacturer = ?2
             WHERE document_id = ?1
               AND (oem_manufacturer IS NULL OR oem_manufacturer != ?2)",
            params![document_id, oem],
        )?;
        Ok(changed)
    }

    fn list_error_codes_by_document(&self, document_id: &str) -> PlatenResult<Vec<ErrorCode>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM error_codes WHERE document_id = ?1 ORDER BY code")?;
        let codes = stmt
            .query_map(params![document_id], row_to_error_code)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    fn list_error_codes_by_manufacturer(
        &self,
        manufacturer: &str,
    ) -> PlatenResult<Vec<ErrorCode>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM error_codes
             WHERE manufacturer = ?1 COLLATE NOCASE
                OR oem_manufacturer = ?1 COLLATE NOCASE
             ORDER BY code",
        )?;
        let codes = stmt
            .query_map(params![manufacturer], row_to_error_code)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    fn list_oem_relationships(&self) -> PlatenResult<Vec<OemRelationship>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM oem_relationships ORDER BY brand")?;
        let rels = stmt
            .query_map([], |row| {
                let relation: String = row.get("relation_type")?;
                Ok(OemRelationship {
                    id: row.get("id")?,
                    brand: row.get("brand")?,
                    series_pattern: row.get("series_pattern")?,
                    oem_manufacturer: row.get("oem_manufacturer")?,
                    relation_type: OemRelationType::parse(&relation)
                        .unwrap_or(OemRelationType::Rebrand),
                    confidence: row.get("confidence")?,
                    verified: row.get::<_, i64>("verified")? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    fn upsert_oem_relationship(&self, rel: &OemRelationship) -> PlatenResult<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO oem_relationships
                (id, brand, series_pattern, oem_manufacturer, relation_type, confidence, verified)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(brand, series_pattern) DO UPDATE SET
                oem_manufacturer = excluded.oem_manufacturer,
                relation_type = excluded.relation_type,
                confidence = excluded.confidence,
                verified = excluded.verified
            "#,
            params![
                rel.id,
                rel.brand,
                rel.series_pattern,
                rel.oem_manufacturer,
                rel.relation_type.as_str(),
                rel.confidence,
                rel.verified as i64,
            ],
        )?;
        Ok(())
    }

    fn get_stage_status(
        &self,
        document_id: &str,
        stage: Stage,
    ) -> PlatenResult<Option<StageState>> {
        let conn = self.lock();
        let state = conn
            .query_row(
                "SELECT stage, status, started_at, completed_at, error
                 FROM stage_status WHERE document_id = ?1 AND stage = ?2",
                params![document_id, stage.name()],
                |row| {
                    let stage_name: String = row.get("stage")?;
                    let status: String = row.get("status")?;
                    let started: Option<String> = row.get("started_at")?;
                    let completed: Option<String> = row.get("completed_at")?;
                    Ok(StageState {
                        stage: Stage::from_str(&stage_name).unwrap_or(stage),
                        status: match status.as_str() {
                            "running" => StageStatus::Running,
                            "completed" => StageStatus::Completed,
                            "failed" => StageStatus::Failed,
                            "skipped" => StageStatus::Skipped,
                            _ => StageStatus::Pending,
                        },
                        started_at: started.and_then(|s| s.parse().ok()),
                        completed_at: completed.and_then(|s| s.parse().ok()),
                        error: row.get("error")?,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn set_stage_status(
        &self,
        document_id: &str,
        stage: Stage,
        status: StageStatus,
        error: Option<&str>,
    ) -> PlatenResult<()> {
        let now = Utc::now().to_rfc3339();
        let (started_at, completed_at) = match status {
            StageStatus::Running => (Some(now.clone()), None),
            s if s.is_terminal() => (None, Some(now.clone())),
            _ => (None, None),
        };
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO stage_status
                (document_id, stage, status, started_at, completed_at, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(document_id, stage) DO UPDATE SET
                status = excluded.status,
                started_at = COALESCE(excluded.started_at, stage_status.started_at),
                completed_at = excluded.completed_at,
                error = excluded.error
            "#,
            params![
                document_id,
                stage.name(),
                status.as_str(),
                started_at,
                completed_at,
                error,
            ],
        )?;
        Ok(())
    }

    fn get_all_stage_status(&self, document_id: &str) -> PlatenResult<Vec<StageState>> {
        let mut states = Vec::new();
        for stage in Stage::all() {
            if let Some(state) = self.get_stage_status(document_id, stage)? {
                states.push(state);
            }
        }
        Ok(states)
    }
}
