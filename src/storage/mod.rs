pub mod database;
pub mod document_store;
pub mod mock;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use document_store::{
    DocumentFilter, DocumentPage, DocumentStore, InMemoryDocumentStore, PageRequest,
    SharedDocumentStore, SqliteDocumentStore, list_all,
};
pub use mock::MockCorpus;
