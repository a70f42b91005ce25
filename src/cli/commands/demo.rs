//! Demo Command
//!
//! Run the full pipeline against a seeded synthetic corpus, no database needed.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::load::{LoadFlags, emit, ensure_loaded};
use crate::cli::util::{CommandContext, ctrl_c_token};
use crate::storage::{InMemoryDocumentStore, MockCorpus};
use crate::types::{DocumentType, ProjectId, Result};

const DEMO_PROJECT: &str = "demo";

pub struct DemoArgs {
    pub documents: usize,
    pub seed: u64,
    pub target: DocumentType,
    pub flags: LoadFlags,
    pub format: String,
}

pub async fn run(ctx: &CommandContext, args: DemoArgs) -> Result<()> {
    let corpus = MockCorpus::new(args.seed).generate(args.documents, Utc::now());
    info!(
        documents = corpus.len(),
        seed = args.seed,
        "Generated synthetic corpus"
    );

    let store = InMemoryDocumentStore::with_documents(DEMO_PROJECT, corpus);
    let engine = ctx.engine(Arc::new(store))?;
    let options = args.flags.apply(ctx.config.load_options());

    let loaded = engine
        .load_context(
            &ProjectId::new(DEMO_PROJECT),
            args.target,
            &options,
            &ctrl_c_token(),
        )
        .await?;

    emit(&loaded, &args.format, None)?;
    ensure_loaded(&loaded)
}
