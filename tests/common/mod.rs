#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use blogforge::config::{parse_config, Config};
use blogforge::context::AppContext;
use blogforge::db;
use blogforge::migrate::run_migrations;
use blogforge_core::testing::ScriptedClient;

pub const DIMS: usize = 256;

pub fn test_config(root: &Path) -> Config {
    test_config_with(root, "")
}

/// Test config with `extra` TOML appended.
pub fn test_config_with(root: &Path, extra: &str) -> Config {
    parse_config(&format!(
        r#"[db]
path = "{}/data/blogforge.sqlite"

[embedding]
dims = {}

[retrieval]
collections = ["user_content"]
min_context_score = 0.0

{}
"#,
        root.display(),
        DIMS,
        extra
    ))
    .unwrap()
}

/// App context on a fresh database, answering completions from `client`.
pub async fn app(client: Arc<ScriptedClient>) -> (TempDir, AppContext) {
    app_with(client, "").await
}

pub async fn app_with(client: Arc<ScriptedClient>, extra: &str) -> (TempDir, AppContext) {
    let tmp = TempDir::new().unwrap();
    let config = test_config_with(tmp.path(), extra);
    let pool = db::connect(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let ctx = AppContext::assemble(config, pool, client, None);
    (tmp, ctx)
}

/// About `chars` characters of whitespace-separated prose.
pub fn prose(chars: usize) -> String {
    let words = [
        "apex", "rest", "service", "callout", "trigger", "governor", "limits", "batch",
        "queueable", "platform", "events", "salesforce",
    ];
    let mut out = String::new();
    let mut i = 0;
    while out.chars().count() < chars {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(words[i % words.len()]);
        i += 1;
    }
    out.chars().take(chars).collect()
}
