//! HTTP-level tests for the Typesense engine against a mock server.

use std::sync::Arc;
use std::time::Duration;

use adk_knowledge::{
    CollectionDescriptor, CollectionManager, DistanceMetric, KnowledgeError, SearchEngine,
    SearchExecutor, SearchStats, TypesenseConfig, TypesenseEngine, build_schema,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn engine(server: &MockServer) -> TypesenseEngine {
    let config = TypesenseConfig::builder()
        .api_key(API_KEY)
        .retry_interval(Duration::from_millis(10))
        .num_retries(2)
        .build()
        .unwrap();
    TypesenseEngine::with_base_url(config, server.uri()).unwrap()
}

fn collection_body(name: &str, num_documents: u64) -> serde_json::Value {
    json!({
        "name": name,
        "num_documents": num_documents,
        "fields": [
            {"name": "id", "type": "string"},
            {"name": "embedding", "type": "float[]", "num_dim": 3, "optional": true}
        ],
        "created_at": 1_700_000_000
    })
}

#[tokio::test]
async fn create_collection_posts_schema_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .and(header("X-TYPESENSE-API-KEY", API_KEY))
        .and(body_partial_json(json!({
            "name": "docs",
            "enable_nested_fields": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(collection_body("docs", 0)))
        .expect(1)
        .mount(&server)
        .await;

    let schema = build_schema(&CollectionDescriptor::new("docs", 3));
    let info = engine(&server).create_collection(&schema).await.unwrap();
    assert_eq!(info.name, "docs");
    assert_eq!(info.fields[1].num_dim, Some(3));
}

#[tokio::test]
async fn missing_collection_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/ghost"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = engine(&server).retrieve_collection("ghost").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn inner_product_collections_are_recognised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "docs",
            "fields": [{"name": "embedding", "type": "float[]", "num_dim": 3, "vec_dist": "ip"}]
        })))
        .mount(&server)
        .await;
    let engine = Arc::new(engine(&server));

    let info = engine.retrieve_collection("docs").await.unwrap();
    assert_eq!(info.fields[0].vec_dist, Some(DistanceMetric::DotProduct));

    let manager = CollectionManager::new(engine);
    assert!(manager.exists("docs").await);
    manager.create(&CollectionDescriptor::new("docs", 3)).await.unwrap();
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([collection_body("docs", 4)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let collections = engine(&server).list_collections().await.unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].num_documents, 4);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/documents"))
        .and(query_param("action", "upsert"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "Field `embedding` must have 3 dimensions."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = engine(&server)
        .upsert_document("docs", &json!({"id": "a", "content": "x", "embedding": [1.0]}))
        .await
        .unwrap_err();
    match err {
        KnowledgeError::EngineError { status, message, .. } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("must have 3 dimensions"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn document_ids_are_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/docs/documents/corpus%2Fa.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "corpus/a.txt", "content": "a"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let document = engine(&server).retrieve_document("docs", "corpus/a.txt").await.unwrap();
    assert_eq!(document["id"], "corpus/a.txt");
}

#[tokio::test]
async fn vector_search_sends_wildcard_and_vector_clause() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/multi_search"))
        .and(body_partial_json(json!({
            "searches": [{
                "collection": "docs",
                "q": "*",
                "vector_query": "embedding:([1,0,0], k:2, ef:64)",
                "filter_by": "metadata.topic:=rust",
                "limit": 2
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "found": 1,
                "hits": [
                    {"document": {"id": "a", "content": "apple", "metadata": {"topic": "rust"}},
                     "vector_distance": 0.0},
                    {"document": {"content": "no id"}, "vector_distance": 0.5}
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = SearchExecutor::new(Arc::new(engine(&server)), "docs", Some(64));
    let filters = json!({"metadata.topic": "rust"}).as_object().cloned().unwrap();
    let results = executor.vector_search(&[1.0, 0.0, 0.0], 2, Some(&filters)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
    assert_eq!(results[0].metadata["topic"], "rust");
    assert_eq!(results[0].metadata["vector_distance"], 0.0);
}

#[tokio::test]
async fn per_query_errors_count_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/multi_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"error": "Could not find a field named `colour` in the schema.", "code": 404}]
        })))
        .mount(&server)
        .await;

    let executor = SearchExecutor::new(Arc::new(engine(&server)), "docs", None);
    let results = executor.keyword_search("apple", 5, None).await;

    assert!(results.is_empty());
    assert_eq!(executor.stats(), SearchStats { hits: 0, empty: 0, failed: 1 });
}

#[test]
fn config_requires_api_key() {
    assert!(TypesenseConfig::builder().build().is_err());
}
