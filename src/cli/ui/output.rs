use console::style;

use crate::context::{Cluster, LoadedContext};
use crate::types::LoadResult;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Human-readable rendering of a load result
    pub fn load_result(&self, result: &LoadResult) {
        self.header("Context Load");
        if result.success {
            self.success(&result.summary());
        } else {
            self.error(&result.summary());
        }

        println!();
        println!(
            "  Provider:     {}",
            match (&result.provider, &result.model) {
                (Some(p), Some(m)) => format!("{}/{}", p, m),
                _ => "(none)".to_string(),
            }
        );
        println!("  Target:       {}", result.target_document_type);
        println!("  Strategy:     {}", result.strategy);
        println!(
            "  Documents:    {}/{}",
            result.documents_loaded, result.total_documents
        );
        if result.total_clusters > 0 {
            println!(
                "  Clusters:     {}/{}",
                result.clusters_loaded, result.total_clusters
            );
        }
        println!(
            "  Tokens:       {} of {} ({:.1}%)",
            result.total_tokens_used, result.token_budget, result.context_window_utilization
        );
        println!("  Time:         {} ms", result.loading_time_ms);

        if !result.partially_included.is_empty() {
            println!(
                "  Partial:      {}",
                result.partially_included.join(", ")
            );
        }

        if !result.compression_results.is_empty() {
            self.section("Compression");
            for c in &result.compression_results {
                println!(
                    "  {:<16} {:>7} -> {:>7} tokens  ratio {:.2}  quality {:.1}",
                    c.strategy.as_str(),
                    c.original_tokens,
                    c.compressed_tokens,
                    c.compression_ratio,
                    c.quality_score
                );
            }
        }

        if !result.warnings.is_empty() {
            self.section("Warnings");
            for w in &result.warnings {
                self.warning(w);
            }
        }
        if !result.errors.is_empty() {
            self.section("Errors");
            for e in &result.errors {
                self.error(e);
            }
        }
        if !result.recommendations.is_empty() {
            self.section("Recommendations");
            for r in &result.recommendations {
                println!("  • {}", r);
            }
        }
    }

    pub fn clusters(&self, clusters: &[Cluster]) {
        if clusters.is_empty() {
            return;
        }
        self.section("Clusters");
        for c in clusters {
            println!(
                "  {:<28} {:>4} docs  {:>8} tokens  relevance {:.1}",
                c.label,
                c.len(),
                c.aggregate_tokens,
                c.aggregate_relevance
            );
        }
    }

    /// Load result plus cluster table
    pub fn loaded(&self, loaded: &LoadedContext) {
        self.load_result(&loaded.result);
        self.clusters(&loaded.clusters);
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
