use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::pipeline::RetrievalPipeline;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<RetrievalPipeline>>,
    /// Bumped on every invalidation.
    epoch: u64,
}

/// Retrieval pipelines keyed by collection name.
///
/// Entries must be invalidated whenever their collection is re-ingested or
/// deleted; a cached pipeline holds the collection id it was built against.
#[derive(Clone, Default)]
pub struct PipelineCache {
    state: Arc<RwLock<CacheState>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<RetrievalPipeline>> {
        self.state.read().await.entries.get(name).cloned()
    }

    /// Current invalidation epoch; read it before building a pipeline and
    /// pass it to [`PipelineCache::insert`].
    pub async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    /// Caches a pipeline built at `epoch`.
    ///
    /// If any invalidation happened in the meantime the pipeline is returned
    /// uncached. If another request cached one first, that entry wins.
    pub async fn insert(&self, pipeline: RetrievalPipeline, epoch: u64) -> Arc<RetrievalPipeline> {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return Arc::new(pipeline);
        }

        let name = pipeline.collection().name.clone();
        state
            .entries
            .entry(name)
            .or_insert_with(|| Arc::new(pipeline))
            .clone()
    }

    /// Drops the cached pipeline for `name`. Returns whether one existed.
    pub async fn invalidate(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.entries.remove(name).is_some()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}
