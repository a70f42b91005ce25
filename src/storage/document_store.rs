//! Document Store
//!
//! Read-only, paged access to a project's candidate documents. The engine
//! never writes through this interface.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::storage::DEFAULT_PAGE_SIZE;
use crate::types::{Document, DocumentType, LoadOptions, ProjectId, Result, WeaveError};

use super::database::SharedDatabase;

const STAKEHOLDER_CATEGORY: &str = "stakeholders";
const COMPLIANCE_CATEGORY: &str = "compliance";

/// Exclusions derived from the request options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub exclude_types: Vec<DocumentType>,
    pub exclude_categories: Vec<String>,
}

impl DocumentFilter {
    pub fn from_options(options: &LoadOptions) -> Self {
        let mut filter = Self::default();
        if !options.include_stakeholders {
            filter.exclude_types.push(DocumentType::StakeholderRegister);
            filter
                .exclude_categories
                .push(STAKEHOLDER_CATEGORY.to_string());
        }
        if !options.include_compliance_data {
            filter.exclude_types.push(DocumentType::ComplianceRecord);
            filter
                .exclude_categories
                .push(COMPLIANCE_CATEGORY.to_string());
        }
        filter
    }

    pub fn matches(&self, doc: &Document) -> bool {
        !self.exclude_types.contains(&doc.doc_type)
            && !self.exclude_categories.iter().any(|c| c == &doc.category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// Offset of the next page, `None` on the last page
    pub next_offset: Option<usize>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One page of documents in corpus order
    async fn list_documents(
        &self,
        project: &ProjectId,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<DocumentPage>;

    /// Store name for logging
    fn name(&self) -> &str;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// Drain every page of a listing, checking for cancellation between pages.
pub async fn list_all(
    store: &dyn DocumentStore,
    project: &ProjectId,
    filter: &DocumentFilter,
    page_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut page = PageRequest::first(page_size);
    let mut pages = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(WeaveError::Cancelled);
        }
        let batch = store.list_documents(project, filter, page).await?;
        pages += 1;
        documents.extend(batch.documents);
        match batch.next_offset {
            Some(offset) => page.offset = offset,
            None => break,
        }
    }

    debug!(
        store = store.name(),
        project = %project,
        documents = documents.len(),
        pages,
        "Listed documents"
    );
    Ok(documents)
}

// =============================================================================
// In-memory store
// =============================================================================

/// Corpus held in memory, for tests and the demo command
#[derive(Default)]
pub struct InMemoryDocumentStore {
    projects: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(project: impl Into<ProjectId>, documents: Vec<Document>) -> Self {
        let store = Self::new();
        store.insert(&project.into(), documents);
        store
    }

    /// Append documents, replacing any with the same id in place
    pub fn insert(&self, project: &ProjectId, documents: Vec<Document>) {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let corpus = projects.entry(project.as_str().to_string()).or_default();
        for doc in documents {
            match corpus.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc,
                None => corpus.push(doc),
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(
        &self,
        project: &ProjectId,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<DocumentPage> {
        let projects = self
            .projects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(corpus) = projects.get(project.as_str()) else {
            return Ok(DocumentPage::default());
        };

        let mut matching = corpus.iter().filter(|d| filter.matches(d)).skip(page.offset);
        let documents: Vec<Document> = matching.by_ref().take(page.limit).cloned().collect();
        let next_offset = matching
            .next()
            .map(|_| page.offset + documents.len());
        Ok(DocumentPage {
            documents,
            next_offset,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// =============================================================================
// SQLite store
// =============================================================================

/// Store backed by the pooled SQLite database
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: SharedDatabase,
}

impl SqliteDocumentStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Write path used by the import command
    pub async fn put_documents(&self, project: &ProjectId, documents: Vec<Document>) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let project = project.clone();
        tokio::task::spawn_blocking(move || db.upsert_documents(&project, &documents)).await?
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.db
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list_documents(
        &self,
        project: &ProjectId,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<DocumentPage> {
        let db = Arc::clone(&self.db);
        let project = project.clone();
        let filter = filter.clone();
        let (documents, has_more) = tokio::task::spawn_blocking(move || {
            db.list_documents_page(&project, &filter, page.offset, page.limit)
        })
        .await??;

        let next_offset = has_more.then(|| page.offset + documents.len());
        Ok(DocumentPage {
            documents,
            next_offset,
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn corpus(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| {
                let (doc_type, category) = match i % 3 {
                    0 => (DocumentType::Schedule, "planning"),
                    1 => (DocumentType::StakeholderRegister, "stakeholders"),
                    _ => (DocumentType::ComplianceRecord, "compliance"),
                };
                Document::new(format!("d{i}"), doc_type, format!("content {i}")).with_category(category)
            })
            .collect()
    }

    #[test]
    fn test_filter_from_options() {
        let options = LoadOptions {
            include_stakeholders: false,
            ..Default::default()
        };
        let filter = DocumentFilter::from_options(&options);
        assert_eq!(filter.exclude_types, vec![DocumentType::StakeholderRegister]);
        let stakeholder = Document::new("s", DocumentType::Other, "x").with_category("stakeholders");
        assert!(!filter.matches(&stakeholder));
        assert!(filter.matches(&Document::new("c", DocumentType::ComplianceRecord, "x")));
        assert_eq!(
            DocumentFilter::from_options(&LoadOptions::default()),
            DocumentFilter::default()
        );
    }

    #[tokio::test]
    async fn test_memory_store_pages() {
        let store = InMemoryDocumentStore::with_documents("p", corpus(7));
        let project = ProjectId::new("p");
        let filter = DocumentFilter::default();

        let first = store
            .list_documents(&project, &filter, PageRequest::first(3))
            .await
            .unwrap();
        assert_eq!(first.documents.len(), 3);
        assert_eq!(first.next_offset, Some(3));

        let last = store
            .list_documents(&project, &filter, PageRequest { offset: 6, limit: 3 })
            .await
            .unwrap();
        assert_eq!(last.documents.len(), 1);
        assert_eq!(last.next_offset, None);
    }

    #[tokio::test]
    async fn test_list_all_keeps_corpus_order_and_filters() {
        let store = InMemoryDocumentStore::with_documents("p", corpus(10));
        let options = LoadOptions {
            include_compliance_data: false,
            ..Default::default()
        };
        let docs = list_all(
            &store,
            &ProjectId::new("p"),
            &DocumentFilter::from_options(&options),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "d1", "d3", "d4", "d6", "d7", "d9"]);
    }

    #[tokio::test]
    async fn test_list_all_cancelled() {
        let store = InMemoryDocumentStore::with_documents("p", corpus(3));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = list_all(&store, &ProjectId::new("p"), &DocumentFilter::default(), 2, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WeaveError::Cancelled));
    }

    #[tokio::test]
    async fn test_unknown_project_is_empty() {
        let store = InMemoryDocumentStore::new();
        let docs = list_all(
            &store,
            &ProjectId::new("missing"),
            &DocumentFilter::default(),
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let store = SqliteDocumentStore::new(Arc::new(db));
        let project = ProjectId::new("p");
        assert_eq!(store.put_documents(&project, corpus(5)).await.unwrap(), 5);

        let docs = list_all(
            &store,
            &project,
            &DocumentFilter::default(),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "d1", "d2", "d3", "d4"]);
    }
}
