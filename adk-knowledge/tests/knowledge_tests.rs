//! Directory loading and the agent-facing search tool.

mod common;

use std::fs;
use std::sync::Arc;

use adk_knowledge::{
    KnowledgeBase, KnowledgeConfig, KnowledgeSearchTool, LoadPolicy, RecursiveChunker,
    SearchMode,
};
use common::fixture;
use serde_json::json;

fn corpus() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path().join("corpus");
    fs::create_dir_all(base.join("guides")).unwrap();
    fs::write(base.join("apples.txt"), "Apples grow on trees in orchards.").unwrap();
    fs::write(base.join("guides/bananas.md"), "Bananas grow in bunches.").unwrap();
    fs::write(base.join("photo.jpg"), [0xffu8, 0xd8, 0xff]).unwrap();
    temp
}

#[tokio::test]
async fn load_then_reuse_then_append_then_recreate() {
    let temp = corpus();
    let f = fixture(KnowledgeConfig::default());
    let store = Arc::new(f.store);
    let knowledge = KnowledgeBase::new(store.clone(), temp.path().join("corpus"));

    let first = knowledge.load(LoadPolicy::default()).await.unwrap();
    assert_eq!(first.files, 2);
    assert!(!first.reused);
    assert!(first.report.is_success());
    assert_eq!(store.document_count().await.unwrap(), 2);
    assert!(store.doc_exists("corpus/apples.txt_0").await);
    assert!(store.doc_exists("corpus/guides/bananas.md_0").await);

    let second = knowledge.load(LoadPolicy::default()).await.unwrap();
    assert!(second.reused);
    assert!(second.report.is_empty());

    fs::write(temp.path().join("corpus/cherries.log"), "Cherries are red.").unwrap();
    let appended = knowledge.load(LoadPolicy::append()).await.unwrap();
    assert_eq!(appended.files, 3);
    assert_eq!(store.document_count().await.unwrap(), 3);

    fs::remove_file(temp.path().join("corpus/apples.txt")).unwrap();
    let recreated = knowledge.load(LoadPolicy::recreate()).await.unwrap();
    assert_eq!(recreated.files, 2);
    assert_eq!(store.document_count().await.unwrap(), 2);
    assert!(!store.doc_exists("corpus/apples.txt_0").await);
}

#[tokio::test]
async fn chunks_carry_source_metadata() {
    let temp = corpus();
    let f = fixture(KnowledgeConfig::default());
    let store = Arc::new(f.store);
    let knowledge = KnowledgeBase::new(store.clone(), temp.path().join("corpus"))
        .with_chunker(Arc::new(RecursiveChunker::new(12, 0)));
    knowledge.load(LoadPolicy::default()).await.unwrap();

    let results = store.search_with_mode("bananas", SearchMode::Keyword, 5, None).await;
    assert!(!results.is_empty());
    let hit = &results[0];
    assert_eq!(hit.metadata["filename"], "bananas.md");
    assert_eq!(hit.metadata["source_path"], "corpus/guides/bananas.md");
    assert_eq!(hit.metadata["file_type"], "text");
    assert_eq!(hit.metadata["document_id"], "corpus/guides/bananas.md");
}

#[tokio::test]
async fn missing_source_directory_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let f = fixture(KnowledgeConfig::default());
    let knowledge = KnowledgeBase::new(Arc::new(f.store), temp.path().join("absent"));
    assert!(knowledge.load(LoadPolicy::default()).await.is_err());
}

#[tokio::test]
async fn tool_returns_documents_as_json() {
    let temp = corpus();
    let f = fixture(KnowledgeConfig::default());
    let store = Arc::new(f.store);
    KnowledgeBase::new(store.clone(), temp.path().join("corpus"))
        .load(LoadPolicy::default())
        .await
        .unwrap();

    let tool = KnowledgeSearchTool::new(store);
    assert_eq!(tool.name(), "search_knowledge_base");
    assert_eq!(tool.parameters_schema()["required"], json!(["query"]));

    let results = tool
        .execute(json!({
            "query": "apples",
            "mode": "keyword",
            "limit": 3,
            "filters": {"metadata.file_type": "text"}
        }))
        .await
        .unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "corpus/apples.txt_0");
    assert_eq!(results[0]["metadata"]["filename"], "apples.txt");
}

#[tokio::test]
async fn tool_rejects_malformed_arguments() {
    let f = fixture(KnowledgeConfig::default());
    let tool = KnowledgeSearchTool::new(Arc::new(f.store));

    assert!(tool.execute(json!({})).await.is_err());
    assert!(tool.execute(json!({"query": "x", "mode": "semantic"})).await.is_err());
    assert!(tool.execute(json!({"query": "x", "limit": 0})).await.is_err());
    assert!(tool.execute(json!({"query": "x", "filters": [1, 2]})).await.is_err());
}
