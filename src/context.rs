//! Process-wide services, built once at startup and passed explicitly.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use blogforge_core::completion::{CompletionClient, CompletionOptions};
use blogforge_core::content::ContentGenerator;
use blogforge_core::research::{Researcher, WebSearch};
use blogforge_core::store::VectorStore;
use blogforge_core::workflow::GeneratorSteps;

use crate::config::Config;
use crate::content::ContentService;
use crate::db;
use crate::knowledge::KnowledgeService;
use crate::migrate::run_migrations;
use crate::provider::create_client;
use crate::sqlite_store::SqliteVectorStore;
use crate::web_search::ExaSearch;
use crate::workflow::WorkflowRunner;

pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub client: Arc<dyn CompletionClient>,
    pub store: Arc<dyn VectorStore>,
    pub knowledge: KnowledgeService,
    pub content: ContentService,
    pub workflow: WorkflowRunner,
}

impl AppContext {
    /// Open the database, run migrations and connect the configured
    /// providers.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        run_migrations(&pool).await?;
        let client = create_client(&config)?;
        let web: Option<Arc<dyn WebSearch>> = match ExaSearch::from_config(&config.web_search)? {
            Some(exa) => Some(Arc::new(exa)),
            None => None,
        };
        Ok(Self::assemble(config, pool, client, web))
    }

    /// Wire services around an existing pool and client. The pool must
    /// already be migrated.
    pub fn assemble(
        config: Config,
        pool: SqlitePool,
        client: Arc<dyn CompletionClient>,
        web: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        let config = Arc::new(config);
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool.clone()));

        let settings = config
            .retrieval
            .research_settings(config.web_search.num_results);
        let mut researcher = Researcher::new(client.clone(), store.clone(), settings);
        if let Some(web) = web {
            researcher = researcher.with_web_search(web);
        }
        let researcher = Arc::new(researcher);

        let generator = Arc::new(
            ContentGenerator::new(client.clone())
                .with_min_context_score(config.retrieval.min_context_score)
                .with_options(CompletionOptions {
                    temperature: config.llm.temperature,
                    max_tokens: config.llm.max_tokens,
                }),
        );

        let knowledge = KnowledgeService::new(
            pool.clone(),
            client.clone(),
            store.clone(),
            config.chunking.clone(),
            config.retrieval.default_collection.clone(),
        );
        let content = ContentService::new(pool.clone(), researcher.clone(), generator.clone());
        let workflow = WorkflowRunner::new(
            pool.clone(),
            Arc::new(GeneratorSteps::new(researcher, generator)),
            config.workflow.max_revisions,
        );

        Self {
            config,
            pool,
            client,
            store,
            knowledge,
            content,
            workflow,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
