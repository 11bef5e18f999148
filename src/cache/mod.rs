use futures::Future;
use std::error::Error;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::rag::VectorIndex;

/// Process-lifetime memo for the document index.
///
/// The first caller runs the build; concurrent callers wait for it and then
/// share the same `Arc`. A failed build leaves the cell empty.
pub struct IndexCache {
    cell: OnceCell<Arc<VectorIndex>>,
    builds: AtomicUsize,
}

static GLOBAL_INDEX: IndexCache = IndexCache::new();

pub fn global() -> &'static IndexCache {
    &GLOBAL_INDEX
}

impl IndexCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub async fn get_or_build<F, Fut>(
        &self,
        build: F
    ) -> Result<Arc<VectorIndex>, Box<dyn Error + Send + Sync>>
        where
            F: FnOnce() -> Fut,
            Fut: Future<Output = Result<VectorIndex, Box<dyn Error + Send + Sync>>>
    {
        let index = self.cell.get_or_try_init(|| async move {
            self.builds.fetch_add(1, Ordering::SeqCst);
            build().await.map(Arc::new)
        }).await?;
        Ok(Arc::clone(index))
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}
