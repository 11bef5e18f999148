pub mod chunker;
pub mod index;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

pub use index::{ IndexSettings, Node, ScoredNode, VectorIndex };
pub use loader::{ load_documents, Document, LoaderOptions };

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("document directory '{0}' does not exist or is not a directory")]
    DirectoryNotFound(PathBuf),
    #[error("no documents found in '{0}'")]
    NoDocuments(PathBuf),
    #[error("no indexable text in the loaded documents")]
    EmptyIndex,
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to extract text from '{path}': {message}")]
    Extract {
        path: PathBuf,
        message: String,
    },
    #[error("embedding failed: {0}")]
    Embedding(String),
}
