//! Load Command
//!
//! Assemble the context payload for one target document.
//!
//! Usage:
//!   contextweave load <project> --target <type> [--max-tokens N] [-f text|json|payload] [-o payload.md]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::info;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, ctrl_c_token};
use crate::context::LoadedContext;
use crate::types::{
    ClusteringStrategy, CostSensitivity, DocumentComplexity, DocumentType, LoadOptions, ProjectId,
    Result, WeaveError,
};

/// Per-request overrides of the configured load defaults
#[derive(Debug, Clone, Default, Args)]
pub struct LoadFlags {
    /// Share of the context window usable for input (0-100)
    #[arg(long)]
    pub utilization: Option<f64>,

    /// Hard cap on input tokens
    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Maximum number of documents to consider
    #[arg(long)]
    pub max_documents: Option<usize>,

    /// Clustering strategy: category, relevance, temporal, hierarchical
    #[arg(long)]
    pub cluster: Option<ClusteringStrategy>,

    /// Cost sensitivity for provider selection: high, low
    #[arg(long)]
    pub cost: Option<CostSensitivity>,

    /// Target complexity: simple, moderate, complex
    #[arg(long)]
    pub complexity: Option<DocumentComplexity>,

    /// Keep corpus order instead of ranking
    #[arg(long)]
    pub no_prioritization: bool,

    /// Disable the summarized fallback
    #[arg(long)]
    pub no_summarization: bool,

    /// Disable the chunked fallback
    #[arg(long)]
    pub no_chunking: bool,

    /// Allow critical documents to be dropped
    #[arg(long)]
    pub no_preserve_critical: bool,

    /// Exclude stakeholder documents
    #[arg(long)]
    pub no_stakeholders: bool,

    /// Exclude compliance documents
    #[arg(long)]
    pub no_compliance: bool,
}

impl LoadFlags {
    /// Apply the overrides on top of `base`
    pub fn apply(&self, base: LoadOptions) -> LoadOptions {
        let mut options = base;
        if let Some(pct) = self.utilization {
            options.max_utilization_percentage = pct;
        }
        if self.max_tokens.is_some() {
            options.max_tokens = self.max_tokens;
        }
        if self.max_documents.is_some() {
            options.max_documents = self.max_documents;
        }
        if self.cluster.is_some() {
            options.clustering_strategy = self.cluster;
        }
        if let Some(cost) = self.cost {
            options.cost_sensitivity = cost;
        }
        if let Some(complexity) = self.complexity {
            options.complexity = complexity;
        }
        options.enable_intelligent_prioritization &= !self.no_prioritization;
        options.enable_content_summarization &= !self.no_summarization;
        options.enable_chunking &= !self.no_chunking;
        options.preserve_critical_context &= !self.no_preserve_critical;
        options.include_stakeholders &= !self.no_stakeholders;
        options.include_compliance_data &= !self.no_compliance;
        options
    }
}

pub struct LoadArgs {
    pub project: String,
    pub target: DocumentType,
    pub flags: LoadFlags,
    pub format: String,
    pub output: Option<PathBuf>,
}

pub async fn run(ctx: &CommandContext, args: LoadArgs) -> Result<()> {
    let store = ctx.require_store()?;
    let known_projects = store.database().list_projects()?;
    let engine = ctx.engine(Arc::new(store))?;
    let options = args.flags.apply(ctx.config.load_options());
    let project = ProjectId::new(args.project);

    if !known_projects.iter().any(|p| p == project.as_str()) {
        Output::new().warning(&format!(
            "Unknown project '{}'. Known projects: {}",
            project,
            if known_projects.is_empty() {
                "(none)".to_string()
            } else {
                known_projects.join(", ")
            }
        ));
    }

    let loaded = engine
        .load_context(&project, args.target, &options, &ctrl_c_token())
        .await?;

    emit(&loaded, &args.format, args.output.as_deref())?;
    ensure_loaded(&loaded)
}

/// Turn an unsuccessful load into an error so the process exits non-zero
pub fn ensure_loaded(loaded: &LoadedContext) -> Result<()> {
    if loaded.result.success {
        return Ok(());
    }
    Err(WeaveError::ContextValidation {
        required: loaded.validation.required_tokens,
        budget: loaded.result.token_budget,
    })
}

/// Print the result and optionally write the payload to `output`
pub fn emit(loaded: &LoadedContext, format: &str, output: Option<&std::path::Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &loaded.payload)?;
        info!(
            "Wrote {} bytes of context to {}",
            loaded.payload.len(),
            path.display()
        );
    }

    match format {
        "json" => {
            let json = serde_json::json!({
                "result": loaded.result,
                "clusters": loaded.clusters,
                "validation": loaded.validation,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        // Bare payload for piping into another tool
        "payload" => println!("{}", loaded.payload),
        _ => {
            let output = Output::new();
            output.loaded(loaded);
            if !loaded.result.success && loaded.validation.shortfall() > 0 {
                output.info(&format!(
                    "Short by {} tokens on {}/{}",
                    loaded.validation.shortfall(),
                    loaded.validation.provider,
                    loaded.validation.model
                ));
            }
        }
    }
    Ok(())
}
