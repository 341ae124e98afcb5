//! Pipeline controller.
//!
//! Drives documents through the stage graph: prechecks, per-stage
//! timeouts, and failure attribution all live here. A failed item inside
//! a batch stage never fails sibling items; a failed stage never blocks
//! unrelated branches of the graph. Only storage errors abort a run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use platen_extractors::{ExtractedDocument, ExtractionRouter, PageRecord, RawImage, RawTable};

use crate::config::PipelineConfig;
use crate::embed::{BatchReport, MultiModalEmbedder};
use crate::error::{PlatenError, PlatenResult};
use crate::extract::{
    detect_manufacturer, find_parts_near, ErrorCodeExtractor, OemResolver, RuleTable,
};
use crate::fingerprint::content_hash;
use crate::pipeline::{Progress, Stage, StageTracker};
use crate::structure::ChunkBuilder;
use crate::traits::{BlobStore, Embedder, Llm, Rasterizer, Repository, VisualEmbedder};
use crate::types::{
    BoundingBox, ChunkOutcome, Document, ErrorCode, ExtractionMethod, ImageItem, MediaContext,
    ProcessingStatus, StageState, StageStatus, TableItem,
};

/// Document metadata key holding the blob URL of the persisted extraction.
const EXTRACTION_KEY: &str = "extraction_url";
/// Document metadata key holding the thumbnail blob URL.
const THUMBNAIL_KEY: &str = "thumbnail_url";

/// Confidence assigned to codes parsed out of an explicit code table.
const TABLE_PARSE_CONFIDENCE: f32 = 0.9;

/// Outcome of driving one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

enum ExecOutcome {
    Completed(String),
    Skipped(String),
}

/// Orchestrates the ingestion pipeline for documents.
pub struct PipelineController {
    config: PipelineConfig,
    repository: Arc<dyn Repository>,
    blob_store: Arc<dyn BlobStore>,
    tracker: StageTracker,
    router: ExtractionRouter,
    chunker: ChunkBuilder,
    code_extractor: ErrorCodeExtractor,
    embedder: MultiModalEmbedder,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    llm: Option<Arc<dyn Llm>>,
}

impl PipelineController {
    /// Build a controller over the given backends. Loads the manufacturer
    /// rule table and, on first run, seeds the OEM relationship list.
    pub fn new(
        config: PipelineConfig,
        repository: Arc<dyn Repository>,
        blob_store: Arc<dyn BlobStore>,
        text_embedder: Arc<dyn Embedder>,
        visual_embedder: Option<Arc<dyn VisualEmbedder>>,
        rasterizer: Option<Arc<dyn Rasterizer>>,
    ) -> PlatenResult<Self> {
        let table = RuleTable::load(config.extraction.rules_path.as_deref())?;
        let code_extractor = ErrorCodeExtractor::new(table, config.extraction.clone());

        if repository.list_oem_relationships()?.is_empty() {
            for rel in OemResolver::seed() {
                repository.upsert_oem_relationship(&rel)?;
            }
        }

        let embedder = MultiModalEmbedder::new(
            text_embedder,
            visual_embedder,
            Arc::clone(&repository),
            Arc::clone(&blob_store),
            config.batch_concurrency,
        );

        Ok(Self {
            tracker: StageTracker::new(Arc::clone(&repository)),
            chunker: ChunkBuilder::new(config.chunking.clone()),
            router: ExtractionRouter::with_defaults(),
            code_extractor,
            embedder,
            config,
            repository,
            blob_store,
            rasterizer,
            llm: None,
        })
    }

    /// Attach a generation model used to caption figures that carry no
    /// caption of their own.
    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// All stages in canonical order.
    pub fn list_stages(&self) -> Vec<Stage> {
        Stage::all()
    }

    /// Register uploaded bytes as a document and complete the upload
    /// stage. Re-uploading identical bytes returns the existing document
    /// unchanged.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> PlatenResult<Document> {
        let hash = content_hash(bytes);
        if let Some(existing) = self.repository.find_document_by_hash(&hash)? {
            info!(
                document_id = %existing.id,
                filename,
                "duplicate upload; returning existing document"
            );
            return Ok(existing);
        }

        let url = self.blob_store.put(bytes, mime_for(filename)).await?;
        let mut doc = Document::new(filename, hash).with_blob_url(url);
        doc.processing_status = ProcessingStatus::Processing;
        self.repository.upsert_document(&doc)?;
        self.tracker.mark_completed(&doc.id, Stage::Upload)?;
        info!(document_id = %doc.id, filename, "document ingested");
        Ok(doc)
    }

    /// Run one stage for a document.
    ///
    /// A stage already in a satisfied state is a no-op unless `force` is
    /// set. A precheck failure returns an error without recording a failed
    /// state, so attribution stays with the upstream stage that actually
    /// failed. Non-fatal execution errors are recorded on the stage and
    /// returned as a failed `StageResult`; fatal storage errors propagate.
    pub async fn run_stage(
        &self,
        document_id: &str,
        stage: Stage,
        force: bool,
    ) -> PlatenResult<StageResult> {
        let start = Instant::now();
        let doc = self.require_document(document_id)?;

        let current = self.tracker.status(document_id, stage)?;
        if !force && current.satisfies_precondition() {
            return Ok(StageResult {
                stage,
                status: current,
                duration_ms: start.elapsed().as_millis(),
                error: None,
                detail: Some("already satisfied".to_string()),
            });
        }

        self.tracker.precheck(document_id, stage)?;
        self.tracker.mark_running(document_id, stage)?;

        let timeout = Duration::from_secs(self.config.stage_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.execute(&doc, stage)).await {
            Ok(result) => result,
            Err(_) => Err(PlatenError::Timeout {
                stage: stage.name(),
                seconds: self.config.stage_timeout_secs,
            }),
        };

        match outcome {
            Ok(ExecOutcome::Completed(detail)) => {
                self.tracker.mark_completed(document_id, stage)?;
                Ok(StageResult {
                    stage,
                    status: StageStatus::Completed,
                    duration_ms: start.elapsed().as_millis(),
                    error: None,
                    detail: Some(detail),
                })
            }
            Ok(ExecOutcome::Skipped(reason)) => {
                self.tracker.mark_skipped(document_id, stage, &reason)?;
                Ok(StageResult {
                    stage,
                    status: StageStatus::Skipped,
                    duration_ms: start.elapsed().as_millis(),
                    error: None,
                    detail: Some(reason),
                })
            }
            Err(e) if e.is_fatal() => {
                // Best effort; the store that failed may be the one we
                // record state in.
                let _ = self.tracker.mark_failed(document_id, stage, &e.to_string());
                Err(e)
            }
            Err(e) => {
                self.tracker.mark_failed(document_id, stage, &e.to_string())?;
                Ok(StageResult {
                    stage,
                    status: StageStatus::Failed,
                    duration_ms: start.elapsed().as_millis(),
                    error: Some(e.to_string()),
                    detail: None,
                })
            }
        }
    }

    /// Run a list of stages in order.
    ///
    /// A stage whose precheck fails is reported as still pending; with
    /// `stop_on_error` the run stops at the first failed or blocked stage,
    /// otherwise later stages on unaffected branches still run.
    pub async fn run_stages(
        &self,
        document_id: &str,
        stages: &[Stage],
        stop_on_error: bool,
    ) -> PlatenResult<Vec<StageResult>> {
        let mut results = Vec::with_capacity(stages.len());
        for stage in stages {
            let start = Instant::now();
            match self.run_stage(document_id, *stage, false).await {
                Ok(result) => {
                    let failed = result.status == StageStatus::Failed;
                    results.push(result);
                    if failed && stop_on_error {
                        break;
                    }
                }
                Err(e @ PlatenError::PrecheckFailed { .. }) => {
                    results.push(StageResult {
                        stage: *stage,
                        status: StageStatus::Pending,
                        duration_ms: start.elapsed().as_millis(),
                        error: Some(e.to_string()),
                        detail: None,
                    });
                    if stop_on_error {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Resume a document: run every stage not yet in a satisfied state, in
    /// canonical order, retrying failed stages and leaving blocked ones
    /// pending.
    pub async fn run_missing(&self, document_id: &str) -> PlatenResult<Vec<StageResult>> {
        let missing = self.tracker.missing_stages(document_id)?;
        self.run_stages(document_id, &missing, false).await
    }

    pub fn get_progress(&self, document_id: &str) -> PlatenResult<Progress> {
        self.tracker.progress(document_id)
    }

    pub fn get_stage_status(&self, document_id: &str) -> PlatenResult<Vec<StageState>> {
        self.repository.get_all_stage_status(document_id)
    }

    fn require_document(&self, document_id: &str) -> PlatenResult<Document> {
        self.repository
            .get_document(document_id)?
            .ok_or_else(|| PlatenError::NotFound(format!("document {document_id}")))
    }

    async fn execute(&self, doc: &Document, stage: Stage) -> PlatenResult<ExecOutcome> {
        match stage {
            Stage::Upload => self.stage_upload(doc),
            Stage::TextExtraction => self.stage_text_extraction(doc).await,
            Stage::Chunking => self.stage_chunking(doc).await,
            Stage::TextEmbedding => self.stage_text_embedding(doc).await,
            Stage::ImageExtraction => self.stage_image_extraction(doc).await,
            Stage::VisualEmbedding => self.stage_visual_embedding(doc).await,
            Stage::TableExtraction => self.stage_table_extraction(doc).await,
            Stage::TableEmbedding => self.stage_table_embedding(doc).await,
            Stage::ErrorCodeExtraction => self.stage_error_code_extraction(doc),
            Stage::PartsLinking => self.stage_parts_linking(doc),
            Stage::LinkEnrichment => self.stage_link_enrichment(doc),
            Stage::SearchIndexing => self.stage_search_indexing(doc),
            Stage::QualityCheck => self.stage_quality_check(doc),
            Stage::Thumbnail => self.stage_thumbnail(doc).await,
            Stage::Done => self.stage_done(doc),
        }
    }

    fn stage_upload(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        // Upload normally completes inside `ingest`; reaching here means
        // the stage was forced or the state row was lost.
        if doc.blob_url.is_some() {
            Ok(ExecOutcome::Completed("original bytes present".to_string()))
        } else {
            Err(PlatenError::validation("document has no uploaded content"))
        }
    }

    async fn stage_text_extraction(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let bytes = self.fetch_original(doc).await?;
        let extracted = self
            .router
            .extract(&bytes, mime_for(&doc.filename))
            .await
            .map_err(|e| PlatenError::Extraction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        if extracted.is_empty() {
            return Err(PlatenError::extraction("document yielded no text"));
        }

        // Persist the extraction with image bytes stripped; the image
        // stage re-reads the original rather than bloating the blob.
        let mut stripped = extracted.clone();
        for image in &mut stripped.images {
            image.data = Vec::new();
        }
        let url = self
            .blob_store
            .put(&serde_json::to_vec(&stripped)?, "application/json")
            .await?;

        let mut doc = doc.clone();
        doc.page_count = Some(extracted.pages.len());
        doc.word_count = Some(extracted.word_count());
        if doc.manufacturer.is_none() {
            if let Some((name, confidence)) =
                detect_manufacturer(self.code_extractor.rule_table(), &extracted.full_text())
            {
                info!(document_id = %doc.id, manufacturer = %name, confidence, "manufacturer detected");
                doc.manufacturer = Some(name);
                doc.manufacturer_confidence = Some(confidence);
            }
        }
        doc.metadata.insert(EXTRACTION_KEY.to_string(), url.into());
        doc.metadata.insert(
            "front_matter_pages".to_string(),
            extracted.front_matter_pages.into(),
        );
        self.repository.upsert_document(&doc)?;

        Ok(ExecOutcome::Completed(format!(
            "{} pages, {} words",
            extracted.pages.len(),
            extracted.word_count()
        )))
    }

    async fn stage_chunking(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let extracted = self.load_extraction(doc).await?;
        let chunks = self
            .chunker
            .build(&doc.id, &extracted.pages, extracted.front_matter_pages);
        if chunks.is_empty() {
            return Ok(ExecOutcome::Skipped("no text to chunk".to_string()));
        }

        let mut ids: Vec<String> = Vec::with_capacity(chunks.len());
        let mut created = 0;
        for chunk in &chunks {
            let outcome = self.repository.upsert_chunk(chunk)?;
            if matches!(outcome, ChunkOutcome::Created(_)) {
                created += 1;
            }
            // Repeated text resolves to an existing id; link each id once
            // so the prev/next chain stays a straight line.
            let id = outcome.chunk_id().to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        for (i, id) in ids.iter().enumerate() {
            let prev = if i > 0 { Some(ids[i - 1].as_str()) } else { None };
            let next = ids.get(i + 1).map(String::as_str);
            self.repository.link_chunks(id, prev, next)?;
        }

        Ok(ExecOutcome::Completed(format!(
            "{} chunks ({created} new)",
            ids.len()
        )))
    }

    async fn stage_text_embedding(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let chunks = self.repository.list_chunks_by_document(&doc.id)?;
        let report = self.embedder.embed_chunks(&chunks).await;
        report_outcome(report, "chunks")
    }

    async fn stage_image_extraction(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let bytes = self.fetch_original(doc).await?;
        let extracted = self
            .router
            .extract(&bytes, mime_for(&doc.filename))
            .await
            .map_err(|e| PlatenError::Extraction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        if extracted.images.is_empty() {
            return Ok(ExecOutcome::Skipped("no embedded images".to_string()));
        }

        let mut report = BatchReport::default();
        for raw in &extracted.images {
            match self.store_image(doc, raw, &extracted.pages).await {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.skipped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(page = raw.page, error = %e, "image not stored");
                    report.failed += 1;
                    report.errors.push((format!("page {}", raw.page), e.to_string()));
                }
            }
        }
        report_outcome(report, "images")
    }

    async fn store_image(
        &self,
        doc: &Document,
        raw: &RawImage,
        pages: &[PageRecord],
    ) -> PlatenResult<bool> {
        if raw.data.is_empty() {
            return Ok(false);
        }
        let content_type = match raw.format.as_str() {
            "png" => "image/png",
            "jpeg" | "jpg" => "image/jpeg",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        };
        let url = self.blob_store.put(&raw.data, content_type).await?;

        let mut image = ImageItem::new(&doc.id, raw.page, content_hash(&raw.data), url);
        if raw.is_vector {
            image = image.with_vector_source();
        }
        if let Some([x, y, width, height]) = raw.bbox {
            image.bbox = Some(BoundingBox {
                x,
                y,
                width,
                height,
            });
        }

        let mut context = MediaContext {
            context_caption: raw.caption.clone(),
            ..Default::default()
        };
        if let Some(page) = pages.iter().find(|p| p.number == raw.page) {
            context.page_header = page.header.clone();
            context.surrounding_paragraphs = page
                .text
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .take(2)
                .map(String::from)
                .collect();
        }
        if context.context_caption.is_none() {
            if let Some(llm) = &self.llm {
                let prose = context.surrounding_paragraphs.join("\n");
                if !prose.is_empty() {
                    let prompt = format!(
                        "Write a one-line caption for a figure appearing next to this \
                         service-manual text:\n{prose}"
                    );
                    match llm.generate(&prompt).await {
                        Ok(caption) if !caption.trim().is_empty() => {
                            context.context_caption = Some(caption.trim().to_string());
                        }
                        Ok(_) => {}
                        Err(e) => warn!(page = raw.page, error = %e, "caption generation failed"),
                    }
                }
            }
        }
        image = image.with_context(context);

        if image.is_vector {
            if let Some(rasterizer) = &self.rasterizer {
                match rasterizer.rasterize(&raw.data).await {
                    Ok(png) => {
                        let raster_url = self.blob_store.put(&png, "image/png").await?;
                        image = image.with_raster_url(raster_url);
                    }
                    // Degrade to an unembeddable vector; visual embedding
                    // skips it rather than failing.
                    Err(e) => warn!(page = raw.page, error = %e, "rasterization failed"),
                }
            }
        }

        self.repository.upsert_image(&image)?;
        Ok(true)
    }

    async fn stage_visual_embedding(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let images = self.repository.list_images_by_document(&doc.id)?;
        let report = self.embedder.embed_images(&images).await;
        report_outcome(report, "images")
    }

    async fn stage_table_extraction(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let extracted = self.load_extraction(doc).await?;
        if extracted.tables.is_empty() {
            return Ok(ExecOutcome::Skipped("no tables detected".to_string()));
        }

        let mut stored = 0;
        for raw in &extracted.tables {
            self.repository.upsert_table(&table_item(&doc.id, raw)?)?;
            stored += 1;
        }
        Ok(ExecOutcome::Completed(format!("{stored} tables")))
    }

    async fn stage_table_embedding(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let tables = self.repository.list_tables_by_document(&doc.id)?;
        let report = self.embedder.embed_tables(&tables).await;
        report_outcome(report, "tables")
    }

    fn stage_error_code_extraction(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let Some(manufacturer) = &doc.manufacturer else {
            return Ok(ExecOutcome::Skipped("no manufacturer detected".to_string()));
        };
        let chunks = self.repository.list_chunks_by_document(&doc.id)?;
        if chunks.is_empty() {
            return Ok(ExecOutcome::Skipped("no chunks".to_string()));
        }
        let images = self.repository.list_images_by_document(&doc.id)?;

        let mut found = 0;
        for chunk in &chunks {
            for code in self.code_extractor.extract_from_chunk(
                chunk,
                manufacturer,
                doc.model.as_deref(),
                &images,
            ) {
                self.repository.upsert_error_code(&code)?;
                found += 1;
            }
        }
        Ok(ExecOutcome::Completed(format!("{found} error codes")))
    }

    fn stage_parts_linking(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let codes = self.repository.list_error_codes_by_document(&doc.id)?;
        if codes.is_empty() {
            return Ok(ExecOutcome::Skipped("no error codes".to_string()));
        }
        let chunks: HashMap<String, _> = self
            .repository
            .list_chunks_by_document(&doc.id)?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut linked = 0;
        for code in &codes {
            let Some(chunk) = code.chunk_id.as_ref().and_then(|id| chunks.get(id)) else {
                continue;
            };
            let Some(pos) = chunk.text.find(&code.code) else {
                continue;
            };
            let parts = find_parts_near(
                &chunk.text,
                pos,
                pos + code.code.len(),
                self.config.extraction.part_link_window,
            );
            if !parts.is_empty() {
                self.repository
                    .link_error_code(&code.id, &parts, code.image_id.as_deref())?;
                linked += 1;
            }
        }
        Ok(ExecOutcome::Completed(format!(
            "{linked} codes linked to parts"
        )))
    }

    /// Parse explicit code tables and apply OEM widening.
    fn stage_link_enrichment(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let mut from_tables = 0;
        if let Some(manufacturer) = &doc.manufacturer {
            if let Some(rule) = self.code_extractor.rule_table().for_manufacturer(manufacturer) {
                for table in self.repository.list_tables_by_document(&doc.id)? {
                    if !is_code_table(&table) {
                        continue;
                    }
                    for row in &table.rows {
                        let Some(cell) = row.first() else { continue };
                        let Some(m) = rule.pattern.find(cell) else { continue };
                        let mut code = ErrorCode::new(
                            m.as_str(),
                            &rule.rule.manufacturer,
                            TABLE_PARSE_CONFIDENCE,
                            ExtractionMethod::TableParse,
                        )
                        .with_document(&doc.id);
                        if let Some(description) =
                            row.get(1).filter(|c| !c.trim().is_empty())
                        {
                            code = code.with_description(description.trim());
                        }
                        if let Some(solution) = solution_cell(&table.headers, row) {
                            code = code.with_solution(solution);
                        }
                        if let Some(model) = doc.model.as_deref() {
                            code = code.with_product(model);
                        }
                        self.repository.upsert_error_code(&code)?;
                        from_tables += 1;
                    }
                }
            }
        }

        let mut widened = 0;
        if let (Some(manufacturer), Some(model)) = (&doc.manufacturer, &doc.model) {
            let resolver = OemResolver::new(self.repository.list_oem_relationships()?);
            if let Some(rel) = resolver.resolve(manufacturer, model) {
                widened = self
                    .repository
                    .tag_error_codes_oem(&doc.id, &rel.oem_manufacturer)?;
                info!(
                    document_id = %doc.id,
                    oem = %rel.oem_manufacturer,
                    widened,
                    "OEM widening applied"
                );
            }
        }

        if from_tables == 0 && widened == 0 {
            return Ok(ExecOutcome::Skipped("nothing to enrich".to_string()));
        }
        Ok(ExecOutcome::Completed(format!(
            "{from_tables} codes from tables, {widened} OEM-tagged"
        )))
    }

    fn stage_search_indexing(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let count = self.repository.count_embeddings(&doc.id)?;
        if count == 0 {
            return Ok(ExecOutcome::Skipped("no vectors to index".to_string()));
        }
        let mut doc = doc.clone();
        doc.metadata
            .insert("indexed_vectors".to_string(), count.into());
        self.repository.upsert_document(&doc)?;
        Ok(ExecOutcome::Completed(format!("indexed {count} vectors")))
    }

    fn stage_quality_check(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        let chunks = self.repository.list_chunks_by_document(&doc.id)?;
        let vectors = self.repository.count_embeddings(&doc.id)?;
        let codes = self.repository.list_error_codes_by_document(&doc.id)?;

        let mut issues: Vec<String> = Vec::new();
        if chunks.is_empty() {
            issues.push("document has no chunks".to_string());
        }
        if !chunks.is_empty() && vectors == 0 {
            issues.push("chunks present but nothing indexed".to_string());
        }
        for code in &codes {
            if code.confidence < self.config.extraction.min_confidence {
                issues.push(format!(
                    "error code {} stored below minimum confidence",
                    code.code
                ));
            }
        }

        if issues.is_empty() {
            Ok(ExecOutcome::Completed(format!(
                "{} chunks, {} vectors, {} codes",
                chunks.len(),
                vectors,
                codes.len()
            )))
        } else {
            Err(PlatenError::validation(issues.join("; ")))
        }
    }

    async fn stage_thumbnail(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        if !self.config.thumbnails_enabled {
            return Ok(ExecOutcome::Skipped("thumbnails disabled".to_string()));
        }
        let Some(rasterizer) = &self.rasterizer else {
            return Ok(ExecOutcome::Skipped("no rasterizer configured".to_string()));
        };

        let bytes = self.fetch_original(doc).await?;
        let png = rasterizer.thumbnail(&bytes, 512).await?;
        let url = self.blob_store.put(&png, "image/png").await?;

        let mut doc = doc.clone();
        doc.metadata.insert(THUMBNAIL_KEY.to_string(), url.into());
        self.repository.upsert_document(&doc)?;
        Ok(ExecOutcome::Completed("thumbnail stored".to_string()))
    }

    fn stage_done(&self, doc: &Document) -> PlatenResult<ExecOutcome> {
        self.repository
            .set_processing_status(&doc.id, ProcessingStatus::Completed)?;
        info!(document_id = %doc.id, "pipeline complete");
        Ok(ExecOutcome::Completed("pipeline complete".to_string()))
    }

    async fn fetch_original(&self, doc: &Document) -> PlatenResult<Vec<u8>> {
        let url = doc
            .blob_url
            .as_deref()
            .ok_or_else(|| PlatenError::validation("document has no uploaded content"))?;
        self.blob_store.get(url).await
    }

    async fn load_extraction(&self, doc: &Document) -> PlatenResult<ExtractedDocument> {
        let url = doc
            .metadata
            .get(EXTRACTION_KEY)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PlatenError::validation("document has no persisted extraction"))?;
        let bytes = self.blob_store.get(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Translate a batch report into a stage outcome. All-failed batches fail
/// the stage; partial success completes it with the counts on record.
fn report_outcome(report: BatchReport, what: &str) -> PlatenResult<ExecOutcome> {
    if report.total() == 0 {
        return Ok(ExecOutcome::Skipped(format!("no {what}")));
    }
    if report.succeeded == 0 && report.failed > 0 {
        return Err(PlatenError::model_call(format!(
            "all {what} failed: {}",
            report.summary()
        )));
    }
    if report.succeeded == 0 {
        return Ok(ExecOutcome::Skipped(report.summary()));
    }
    Ok(ExecOutcome::Completed(report.summary()))
}

fn table_item(document_id: &str, raw: &RawTable) -> PlatenResult<TableItem> {
    let hash = content_hash(&serde_json::to_vec(&(&raw.headers, &raw.rows))?);
    let mut table = TableItem::new(document_id, raw.page, hash, raw.rows.clone())
        .with_headers(raw.headers.clone());
    if raw.caption.is_some() {
        table = table.with_context(MediaContext {
            context_caption: raw.caption.clone(),
            ..Default::default()
        });
    }
    Ok(table)
}

/// Whether a table looks like an explicit error-code listing.
fn is_code_table(table: &TableItem) -> bool {
    table
        .headers
        .iter()
        .next()
        .is_some_and(|h| h.to_lowercase().contains("code"))
}

/// The cell under a "Solution"/"Remedy"/"Correction"/"Actions" header.
fn solution_cell(headers: &[String], row: &[String]) -> Option<String> {
    let idx = headers.iter().position(|h| {
        let lower = h.to_lowercase();
        ["solution", "remedy", "correction", "action"]
            .iter()
            .any(|m| lower.contains(m))
    })?;
    row.get(idx)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(String::from)
}

fn mime_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("md") => "text/markdown",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalBlobStore, SqliteRepository};
    use async_trait::async_trait;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> PlatenResult<Vec<f32>> {
            Ok(vec![0.0; 4])
        }
        fn dimension(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl Llm for EchoLlm {
        async fn generate(&self, _prompt: &str) -> PlatenResult<String> {
            Ok("Figure: duplexer sensor location".to_string())
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_uncaptioned_image_gets_generated_caption() {
        let dir = tempfile::TempDir::new().unwrap();
        let repository: Arc<dyn Repository> = Arc::new(SqliteRepository::in_memory().unwrap());
        let controller = PipelineController::new(
            PipelineConfig::default(),
            Arc::clone(&repository),
            Arc::new(LocalBlobStore::new(dir.path())),
            Arc::new(FixedEmbedder),
            None,
            None,
        )
        .unwrap()
        .with_llm(Arc::new(EchoLlm));

        let doc = Document::new("manual.txt", "hash");
        repository.upsert_document(&doc).unwrap();
        let raw = RawImage {
            page: 3,
            data: vec![1, 2, 3, 4],
            format: "png".to_string(),
            is_vector: false,
            bbox: None,
            caption: None,
        };
        let pages = vec![PageRecord::new(3, "Remove the rear cover.\n\nLift the sensor arm.")];

        let stored = controller.store_image(&doc, &raw, &pages).await.unwrap();
        assert!(stored);

        let images = repository.list_images_by_document(&doc.id).unwrap();
        assert_eq!(
            images[0].context.context_caption.as_deref(),
            Some("Figure: duplexer sensor location")
        );
    }

    #[tokio::test]
    async fn test_existing_caption_not_overwritten() {
        let dir = tempfile::TempDir::new().unwrap();
        let repository: Arc<dyn Repository> = Arc::new(SqliteRepository::in_memory().unwrap());
        let controller = PipelineController::new(
            PipelineConfig::default(),
            Arc::clone(&repository),
            Arc::new(LocalBlobStore::new(dir.path())),
            Arc::new(FixedEmbedder),
            None,
            None,
        )
        .unwrap()
        .with_llm(Arc::new(EchoLlm));

        let doc = Document::new("manual.txt", "hash");
        repository.upsert_document(&doc).unwrap();
        let raw = RawImage {
            page: 3,
            data: vec![1, 2, 3, 4],
            format: "png".to_string(),
            is_vector: false,
            bbox: None,
            caption: Some("Figure 9: fuser unit".to_string()),
        };

        controller.store_image(&doc, &raw, &[]).await.unwrap();
        let images = repository.list_images_by_document(&doc.id).unwrap();
        assert_eq!(
            images[0].context.context_caption.as_deref(),
            Some("Figure 9: fuser unit")
        );
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for("manual.PDF"), "application/pdf");
        assert_eq!(mime_for("notes.md"), "text/markdown");
        assert_eq!(mime_for("raw.txt"), "text/plain");
        assert_eq!(mime_for("no_extension"), "text/plain");
    }

    #[test]
    fn test_report_outcome_thresholds() {
        let all_failed = BatchReport {
            failed: 3,
            errors: vec![],
            ..Default::default()
        };
        assert!(report_outcome(all_failed, "chunks").is_err());

        let partial = BatchReport {
            succeeded: 9,
            failed: 1,
            ..Default::default()
        };
        assert!(matches!(
            report_outcome(partial, "images"),
            Ok(ExecOutcome::Completed(_))
        ));

        let empty = BatchReport::default();
        assert!(matches!(
            report_outcome(empty, "tables"),
            Ok(ExecOutcome::Skipped(_))
        ));

        let all_skipped = BatchReport {
            skipped: 2,
            ..Default::default()
        };
        assert!(matches!(
            report_outcome(all_skipped, "images"),
            Ok(ExecOutcome::Skipped(_))
        ));
    }

    #[test]
    fn test_solution_cell_by_header() {
        let headers = vec!["Code".to_string(), "Cause".to_string(), "Remedy".to_string()];
        let row = vec![
            "SC542".to_string(),
            "thermistor".to_string(),
            "replace the fusing lamp".to_string(),
        ];
        assert_eq!(
            solution_cell(&headers, &row).as_deref(),
            Some("replace the fusing lamp")
        );
        assert_eq!(solution_cell(&["Code".to_string()], &row), None);
    }

    #[test]
    fn test_is_code_table() {
        let t = TableItem::new("d1", 1, "h", vec![])
            .with_headers(vec!["Error Code".to_string(), "Meaning".to_string()]);
        assert!(is_code_table(&t));
        let t = TableItem::new("d1", 1, "h", vec![])
            .with_headers(vec!["Part".to_string(), "Qty".to_string()]);
        assert!(!is_code_table(&t));
    }
}
