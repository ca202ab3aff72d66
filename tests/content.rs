//! Generation services wired from config.

mod common;

use std::sync::Arc;

use blogforge::content::ExplainParams;
use blogforge_core::content::ExplainRequest;
use blogforge_core::models::ExplainMode;
use blogforge_core::testing::ScriptedClient;
use common::{app_with, DIMS};

#[tokio::test]
async fn test_llm_sampling_config_reaches_provider() {
    let client = Arc::new(
        ScriptedClient::new(DIMS)
            .with_replies([r#"{"explanation": "A trigger runs when records change."}"#]),
    );
    let (_tmp, ctx) = app_with(client.clone(), "[llm]\ntemperature = 0.4\nmax_tokens = 900\n").await;

    let saved = ctx
        .content
        .explain(ExplainParams {
            request: ExplainRequest {
                concept: "Apex triggers".into(),
                mode: ExplainMode::Technical,
                include_examples: true,
                include_analogies: true,
            },
            owner: "ana".into(),
        })
        .await
        .unwrap();
    assert!(!saved.record_id.is_empty());

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].options.temperature, 0.4);
    assert_eq!(requests[0].options.max_tokens, 900);
}
