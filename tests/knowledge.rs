mod common;

use std::sync::Arc;

use blogforge::knowledge::{SearchRequest, UploadRequest};
use blogforge_core::error::classify;
use blogforge_core::testing::ScriptedClient;

use common::{app, prose, DIMS};

#[tokio::test]
async fn test_upload_10k_document_chunks_and_embeds() {
    let (_tmp, ctx) = app(Arc::new(ScriptedClient::new(DIMS))).await;
    let content = prose(10_000);
    assert_eq!(content.chars().count(), 10_000);

    let report = ctx
        .knowledge
        .upload(UploadRequest::new("Apex governor limits", content))
        .await
        .unwrap();

    // ceil(10000 / (1000 - 100)) = 12
    assert!(
        (11..=13).contains(&report.chunks_created),
        "got {} chunks",
        report.chunks_created
    );
    assert_eq!(report.collection, "user_content");
    assert_eq!(report.dims, DIMS);
    assert_eq!(ctx.store.collection_dims("user_content").await.unwrap(), Some(DIMS));

    let doc = ctx.knowledge.get(&report.document_id).await.unwrap();
    assert_eq!(doc.chunks.len(), report.chunks_created);
    assert!(doc.chunks.iter().all(|c| c.text.chars().count() <= 1000));
    let indices: Vec<i64> = doc.chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indices, (0..report.chunks_created as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_search_finds_uploaded_text_and_filters_by_type() {
    let (_tmp, ctx) = app(Arc::new(ScriptedClient::new(DIMS))).await;

    let mut apex = UploadRequest::new(
        "Apex REST",
        "Apex REST services use the RestResource annotation to expose endpoints.",
    );
    apex.document_type = "salesforce".into();
    ctx.knowledge.upload(apex).await.unwrap();

    let mut react = UploadRequest::new(
        "React hooks",
        "React hooks such as useEffect manage side effects in function components.",
    );
    react.document_type = "fullstack".into();
    ctx.knowledge.upload(react).await.unwrap();

    let response = ctx
        .knowledge
        .search(&SearchRequest::new("Apex REST services RestResource"))
        .await
        .unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].metadata["title"], "Apex REST");
    assert!(response.results[0].score >= response.results[1].score);

    let mut filtered = SearchRequest::new("Apex REST services RestResource");
    filtered.document_type = Some("fullstack".into());
    let response = ctx.knowledge.search(&filtered).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].metadata["title"], "React hooks");
}

#[tokio::test]
async fn test_delete_removes_every_chunk_vector() {
    let (_tmp, ctx) = app(Arc::new(ScriptedClient::new(DIMS))).await;
    let report = ctx
        .knowledge
        .upload(UploadRequest::new("Batch Apex", prose(3_000)))
        .await
        .unwrap();
    assert!(report.chunks_created > 1);

    let deleted = ctx.knowledge.delete(&report.document_id).await.unwrap();
    assert_eq!(deleted.vectors_removed, report.chunks_created);

    let query = vec![1.0f32; DIMS];
    let hits = ctx.store.query("user_content", &query, 100, None).await.unwrap();
    assert!(hits.iter().all(|h| !report.chunk_ids.contains(&h.chunk_id)));

    let err = ctx.knowledge.get(&report.document_id).await.unwrap_err();
    assert_eq!(classify(&err).map(|e| e.kind()), Some("not_found"));
    let err = ctx.knowledge.delete(&report.document_id).await.unwrap_err();
    assert_eq!(classify(&err).map(|e| e.kind()), Some("not_found"));
}

#[tokio::test]
async fn test_upload_and_search_bounds() {
    let (_tmp, ctx) = app(Arc::new(ScriptedClient::new(DIMS))).await;

    let err = ctx
        .knowledge
        .upload(UploadRequest::new("ok title", "short"))
        .await
        .unwrap_err();
    assert_eq!(classify(&err).map(|e| e.kind()), Some("invalid_request"));

    let mut search = SearchRequest::new("apex");
    search.top_k = 21;
    let err = ctx.knowledge.search(&search).await.unwrap_err();
    assert_eq!(classify(&err).map(|e| e.kind()), Some("invalid_request"));

    assert!(ctx.knowledge.list("anonymous").await.unwrap().is_empty());
}
