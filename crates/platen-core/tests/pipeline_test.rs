//! End-to-end pipeline tests over the real repository and blob store with
//! stubbed model backends.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use platen_core::config::PipelineConfig;
use platen_core::error::{PlatenError, PlatenResult};
use platen_core::pipeline::{PipelineController, Stage};
use platen_core::storage::{LocalBlobStore, SqliteRepository};
use platen_core::traits::{
    BlobStore, Embedder, Rasterizer, Repository, VisualEmbedder,
};
use platen_core::types::{Document, ImageItem, MediaContext, ProcessingStatus, StageStatus};

/// Deterministic text embedder.
struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> PlatenResult<Vec<f32>> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        Ok((0..8).map(|i| ((sum + i) % 97) as f32 / 97.0).collect())
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "stub-text"
    }
}

/// Visual embedder that fails for any image whose bytes start with "FAIL".
struct StubVisualEmbedder;

#[async_trait]
impl VisualEmbedder for StubVisualEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> PlatenResult<Vec<f32>> {
        if bytes.starts_with(b"FAIL") {
            return Err(PlatenError::model_call("backend rejected image"));
        }
        Ok(vec![bytes.len() as f32; 4])
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "stub-visual"
    }
}

struct StubRasterizer;

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, _bytes: &[u8]) -> PlatenResult<Vec<u8>> {
        Ok(b"RASTER".to_vec())
    }

    async fn thumbnail(&self, _document_bytes: &[u8], _max_width: u32) -> PlatenResult<Vec<u8>> {
        Ok(b"THUMB".to_vec())
    }
}

struct Harness {
    _dir: TempDir,
    repository: Arc<SqliteRepository>,
    controller: PipelineController,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let repository = Arc::new(SqliteRepository::in_memory().unwrap());
    let blob_store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
    let mut config = PipelineConfig::default();
    config.batch_concurrency = 2;

    let controller = PipelineController::new(
        config,
        repository.clone() as Arc<dyn Repository>,
        blob_store,
        Arc::new(StubEmbedder),
        Some(Arc::new(StubVisualEmbedder)),
        Some(Arc::new(StubRasterizer)),
    )
    .unwrap();

    Harness {
        _dir: dir,
        repository,
        controller,
    }
}

/// An HP service manual: 41 filler pages, then the troubleshooting page
/// with the jam error, then a code table page. Pages are form-feed
/// delimited.
fn hp_manual() -> Vec<u8> {
    let mut pages: Vec<String> = (1..=41)
        .map(|n| format!("HP LaserJet Enterprise M607 Service Manual\nPage content {n}.\n"))
        .collect();
    pages.push(
        "TROUBLESHOOTING\n\
         Error 13.20.01 Paper Jam in the duplexer. Cause: sensor fault.\n\
         Solution: replace sensor PS-3\n"
            .to_string(),
    );
    pages.push(
        "ERROR CODES\n\
         | Code | Cause | Remedy |\n\
         | --- | --- | --- |\n\
         | 50.01 | Fuser below temperature | replace the fuser assembly |\n\
         | 59.00 | Motor startup failure | reseat the main motor connector |\n"
            .to_string(),
    );
    pages.join("\x0c").into_bytes()
}

#[tokio::test]
async fn test_full_pipeline_finds_jam_error_with_solution() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();
    let results = h.controller.run_missing(&doc.id).await.unwrap();

    for result in &results {
        assert_ne!(
            result.status,
            StageStatus::Failed,
            "stage {} failed: {:?}",
            result.stage,
            result.error
        );
    }

    let doc = h.repository.get_document(&doc.id).unwrap().unwrap();
    assert_eq!(doc.processing_status, ProcessingStatus::Completed);
    assert_eq!(doc.manufacturer.as_deref(), Some("HP"));
    assert_eq!(doc.page_count, Some(43));

    let codes = h.repository.list_error_codes_by_document(&doc.id).unwrap();
    let jam = codes.iter().find(|c| c.code == "13.20.01").expect("jam code extracted");
    assert!(jam.confidence > 0.8);
    assert!(jam
        .solution_text
        .as_deref()
        .unwrap()
        .contains("replace sensor PS-3"));
    assert_eq!(jam.linked_parts, vec!["PS-3".to_string()]);

    // The code is anchored to the troubleshooting page
    let chunks = h.repository.list_chunks_by_document(&doc.id).unwrap();
    let chunk = chunks
        .iter()
        .find(|c| c.id == *jam.chunk_id.as_ref().unwrap())
        .unwrap();
    assert!(chunk.page_start <= 42 && 42 <= chunk.page_end);

    // Chunks carry text vectors and got indexed
    assert!(h.repository.count_embeddings(&doc.id).unwrap() >= chunks.len());

    // Thumbnail was produced by the rasterizer
    assert!(doc.metadata.contains_key("thumbnail_url"));
}

#[tokio::test]
async fn test_code_table_rows_become_error_codes() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();
    h.controller.run_missing(&doc.id).await.unwrap();

    let codes = h.repository.list_error_codes_by_document(&doc.id).unwrap();
    let fuser = codes.iter().find(|c| c.code == "50.01").expect("table code extracted");
    assert_eq!(
        fuser.solution_text.as_deref(),
        Some("replace the fuser assembly")
    );
    assert!(codes.iter().any(|c| c.code == "59.00"));
}

#[tokio::test]
async fn test_reingest_and_forced_rerun_are_idempotent() {
    let h = harness();
    let bytes = hp_manual();
    let doc = h.controller.ingest("m607-service.txt", &bytes).await.unwrap();
    h.controller.run_missing(&doc.id).await.unwrap();

    // Same bytes come back as the same document
    let again = h.controller.ingest("renamed-copy.txt", &bytes).await.unwrap();
    assert_eq!(again.id, doc.id);

    let chunks_before = h.repository.list_chunks_by_document(&doc.id).unwrap().len();
    let codes_before = h.repository.list_error_codes_by_document(&doc.id).unwrap().len();
    let vectors_before = h.repository.count_embeddings(&doc.id).unwrap();

    // Nothing is missing, so a resume is a no-op
    let results = h.controller.run_missing(&doc.id).await.unwrap();
    assert!(results.is_empty());

    // Forced re-runs converge on the same rows
    for stage in [
        Stage::Chunking,
        Stage::TextEmbedding,
        Stage::ErrorCodeExtraction,
        Stage::LinkEnrichment,
    ] {
        let result = h.controller.run_stage(&doc.id, stage, true).await.unwrap();
        assert_eq!(result.status, StageStatus::Completed);
    }

    assert_eq!(
        h.repository.list_chunks_by_document(&doc.id).unwrap().len(),
        chunks_before
    );
    assert_eq!(
        h.repository.list_error_codes_by_document(&doc.id).unwrap().len(),
        codes_before
    );
    assert_eq!(h.repository.count_embeddings(&doc.id).unwrap(), vectors_before);
}

#[tokio::test]
async fn test_resume_retries_only_failed_stage() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();
    h.controller
        .run_stages(
            &doc.id,
            &[Stage::TextExtraction, Stage::Chunking],
            true,
        )
        .await
        .unwrap();

    // Simulate a crash mid-embedding
    h.repository
        .set_stage_status(&doc.id, Stage::TextEmbedding, StageStatus::Failed, Some("backend down"))
        .unwrap();

    let results = h.controller.run_missing(&doc.id).await.unwrap();
    let rerun: Vec<Stage> = results.iter().map(|r| r.stage).collect();
    assert!(!rerun.contains(&Stage::TextExtraction));
    assert!(!rerun.contains(&Stage::Chunking));
    assert!(rerun.contains(&Stage::TextEmbedding));

    let embedding = results
        .iter()
        .find(|r| r.stage == Stage::TextEmbedding)
        .unwrap();
    assert_eq!(embedding.status, StageStatus::Completed);
}

#[tokio::test]
async fn test_precheck_failure_leaves_stage_pending() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();

    let err = h
        .controller
        .run_stage(&doc.id, Stage::Chunking, false)
        .await
        .unwrap_err();
    assert!(matches!(err, PlatenError::PrecheckFailed { .. }));

    // Attribution stays upstream: chunking was never marked failed
    let state = h.repository.get_stage_status(&doc.id, Stage::Chunking).unwrap();
    assert!(state.is_none() || state.unwrap().status == StageStatus::Pending);
}

#[tokio::test]
async fn test_one_bad_image_does_not_fail_the_batch() {
    let h = harness();
    let dir = TempDir::new().unwrap();
    let blobs = LocalBlobStore::new(dir.path());

    let doc = Document::new("scans.txt", "scan-hash");
    h.repository.upsert_document(&doc).unwrap();
    h.repository
        .set_stage_status(&doc.id, Stage::ImageExtraction, StageStatus::Completed, None)
        .unwrap();

    // One poisoned image among ten
    for i in 0..10u8 {
        let bytes = if i == 7 {
            b"FAIL payload".to_vec()
        } else {
            vec![i; 64]
        };
        let url = blobs.put(&bytes, "image/png").await.unwrap();
        let image = ImageItem::new(&doc.id, usize::from(i) + 1, format!("hash-{i}"), url);
        h.repository.upsert_image(&image).unwrap();
    }

    // Controller over the same blob directory so it can fetch the images
    let repository = h.repository.clone();
    let controller = PipelineController::new(
        PipelineConfig::default(),
        repository.clone() as Arc<dyn Repository>,
        Arc::new(LocalBlobStore::new(dir.path())),
        Arc::new(StubEmbedder),
        Some(Arc::new(StubVisualEmbedder)),
        None,
    )
    .unwrap();

    let result = controller
        .run_stage(&doc.id, Stage::VisualEmbedding, false)
        .await
        .unwrap();
    assert_eq!(result.status, StageStatus::Completed);
    assert_eq!(
        result.detail.as_deref(),
        Some("9 succeeded / 1 failed / 0 skipped")
    );
    assert_eq!(repository.count_embeddings(&doc.id).unwrap(), 9);
}

#[tokio::test]
async fn test_unknown_page_image_links_to_code() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();
    h.controller
        .run_stages(&doc.id, &[Stage::TextExtraction, Stage::Chunking], true)
        .await
        .unwrap();

    // An image recovered without page attribution, captioned with the code
    let image = ImageItem::new(&doc.id, 0, "jam-fig-hash", "blob://jam.jpg").with_context(
        MediaContext {
            context_caption: Some("Figure 12: 13.20.01 jam sensor location".to_string()),
            ..Default::default()
        },
    );
    h.repository.upsert_image(&image).unwrap();
    h.repository
        .set_stage_status(&doc.id, Stage::ImageExtraction, StageStatus::Completed, None)
        .unwrap();

    let result = h
        .controller
        .run_stage(&doc.id, Stage::ErrorCodeExtraction, false)
        .await
        .unwrap();
    assert_eq!(result.status, StageStatus::Completed);

    let codes = h.repository.list_error_codes_by_document(&doc.id).unwrap();
    let jam = codes.iter().find(|c| c.code == "13.20.01").unwrap();
    assert_eq!(jam.image_id.as_deref(), Some(image.id.as_str()));
}

#[tokio::test]
async fn test_repeated_boilerplate_keeps_chunk_chain_intact() {
    let h = harness();
    // The caution page appears twice verbatim, so both resolve to one chunk
    let text = "INTRODUCTION\nGeneral service notes.\n\
        \x0cCAUTION\nUnplug the printer before removing any cover.\n\
        \x0cASSEMBLY\nRefit all covers in reverse order.\n\
        \x0cCAUTION\nUnplug the printer before removing any cover.\n";
    let doc = h.controller.ingest("notes.txt", text.as_bytes()).await.unwrap();
    h.controller
        .run_stages(&doc.id, &[Stage::TextExtraction, Stage::Chunking], true)
        .await
        .unwrap();

    let chunks = h.repository.list_chunks_by_document(&doc.id).unwrap();
    assert_eq!(chunks.len(), 3);

    // Walk from the head: every chunk visited exactly once, no revisits
    let head = chunks.iter().find(|c| c.prev_chunk_id.is_none()).unwrap();
    let mut seen = vec![head.id.clone()];
    let mut next = head.next_chunk_id.clone();
    while let Some(id) = next {
        assert!(!seen.contains(&id), "chain revisits chunk {id}");
        let chunk = chunks.iter().find(|c| c.id == id).unwrap();
        seen.push(id);
        next = chunk.next_chunk_id.clone();
    }
    assert_eq!(seen.len(), chunks.len());
}

#[tokio::test]
async fn test_oem_widening_tags_codes_with_engine_manufacturer() {
    let h = harness();
    let text = "Ricoh Aficio SP 204 Service Manual\n\
        Ricoh service documentation.\n\
        \x0c\
        SC542 fusing error at power on. Cause: thermistor out of range.\n\
        Solution: replace the fusing thermistor\n";
    let mut doc = h.controller.ingest("sp204.txt", text.as_bytes()).await.unwrap();
    doc.model = Some("Aficio SP 204".to_string());
    h.repository.upsert_document(&doc).unwrap();

    let results = h.controller.run_missing(&doc.id).await.unwrap();
    for result in &results {
        assert_ne!(result.status, StageStatus::Failed, "{:?}", result);
    }

    let codes = h.repository.list_error_codes_by_document(&doc.id).unwrap();
    let sc = codes.iter().find(|c| c.code == "SC542").expect("code extracted");
    assert_eq!(sc.manufacturer, "Ricoh");
    assert_eq!(sc.oem_manufacturer.as_deref(), Some("Brother"));

    // Cross-brand lookup finds it under the engine manufacturer too
    let widened = h.repository.list_error_codes_by_manufacturer("Brother").unwrap();
    assert!(widened.iter().any(|c| c.code == "SC542"));
}

#[tokio::test]
async fn test_progress_reports_current_stage() {
    let h = harness();
    let doc = h.controller.ingest("m607-service.txt", &hp_manual()).await.unwrap();

    let progress = h.controller.get_progress(&doc.id).unwrap();
    assert_eq!(progress.total, 15);
    assert_eq!(progress.completed, 1); // upload
    assert_eq!(progress.current_stage, Some(Stage::TextExtraction));

    h.controller.run_missing(&doc.id).await.unwrap();
    let progress = h.controller.get_progress(&doc.id).unwrap();
    assert_eq!(progress.completed, 15);
    assert_eq!(progress.current_stage, None);
}
