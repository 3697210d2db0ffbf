use crate::map_cache::{DisabledMapCache, InMemoryMapCache, MapCache};
use crate::params::{cache_key, MapDefaults, MapQueryParams, MapScope, ResolvedMapParams};
use dashmap::DashMap;
use futures::future::join_all;
use postmap_core::config::MapConfig;
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::metrics::{MetricsCollector, MetricsSnapshot};
use postmap_core::model::{Embedding, PostEdge, PostId, PostMap, PostNode, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{IndexError, PostStore, StoreError, VectorIndex};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum MapError {
    #[error("post store error: {0}")]
    Store(#[from] StoreError),
    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
}

impl PostmapError for MapError {
    fn error_code(&self) -> ErrorCode {
        match self {
            MapError::Store(err) => err.error_code(),
            MapError::Index(err) => err.error_code(),
        }
    }
}

/// Builds the post similarity graph for all posts or for one author.
///
/// A build lists the posts in scope, fetches their embeddings in one batch, runs one
/// nearest-neighbour query per embedding concurrently and folds the matches into a set of
/// undirected edges. Finished maps are cached per scope and effective parameters.
pub struct SimilarityMapBuilder {
    posts: Arc<dyn PostStore>,
    index: Arc<dyn VectorIndex>,
    cache: Arc<dyn MapCache>,
    defaults: MapDefaults,
    ttl: Duration,
    metrics: MetricsCollector,
    // Per-key build locks so concurrent misses on one key build once.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl SimilarityMapBuilder {
    pub fn new(posts: Arc<dyn PostStore>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            posts,
            index,
            cache: Arc::new(InMemoryMapCache::new()),
            defaults: MapDefaults::default(),
            ttl: DEFAULT_CACHE_TTL,
            metrics: MetricsCollector::default(),
            in_flight: DashMap::new(),
        }
    }

    pub fn from_config(
        posts: Arc<dyn PostStore>,
        index: Arc<dyn VectorIndex>,
        config: &MapConfig,
    ) -> Self {
        let cache: Arc<dyn MapCache> = if config.cache_enabled {
            Arc::new(InMemoryMapCache::new())
        } else {
            Arc::new(DisabledMapCache)
        };
        Self::new(posts, index)
            .with_cache(cache)
            .with_defaults(MapDefaults::from(config))
            .with_ttl(Duration::from_secs(config.cache_ttl_secs))
    }

    pub fn with_cache(mut self, cache: Arc<dyn MapCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_defaults(mut self, defaults: MapDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn global_map(&self, params: &MapQueryParams) -> Result<PostMap, MapError> {
        self.build(MapScope::All, params).await
    }

    pub async fn author_map(
        &self,
        author_id: UserId,
        params: &MapQueryParams,
    ) -> Result<PostMap, MapError> {
        self.build(MapScope::ByAuthor(author_id), params).await
    }

    pub async fn build(
        &self,
        scope: MapScope,
        params: &MapQueryParams,
    ) -> Result<PostMap, MapError> {
        let started = Instant::now();
        let resolved = params.resolve(&self.defaults);
        let key = cache_key(scope, &resolved);

        if let Some(map) = self.cache.get(&key).await {
            debug!(cache_key = %key, "posts map served from cache");
            self.record(started, true);
            return Ok(map);
        }

        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let guard = lock.lock().await;

        // Another caller may have finished the same build while we waited.
        let outcome = match self.cache.get(&key).await {
            Some(map) => {
                debug!(cache_key = %key, "posts map built by concurrent request");
                Ok((map, true))
            }
            None => {
                let result = self.assemble(scope, &resolved).await;
                if let Ok(map) = &result {
                    self.cache.set(key.clone(), map.clone(), self.ttl).await;
                }
                result.map(|map| (map, false))
            }
        };

        drop(guard);
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &lock));

        match outcome {
            Ok((map, cache_hit)) => {
                self.record(started, cache_hit);
                Ok(map)
            }
            Err(err) => {
                self.record(started, false);
                Err(err)
            }
        }
    }

    fn record(&self, started: Instant, cache_hit: bool) {
        let latency_us = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
        self.metrics.record_request(latency_us, cache_hit);
    }

    async fn assemble(
        &self,
        scope: MapScope,
        params: &ResolvedMapParams,
    ) -> Result<PostMap, MapError> {
        info!(%scope, "Generating posts map");

        let posts = match scope {
            MapScope::All => self.posts.list_all().await?,
            MapScope::ByAuthor(author_id) => self.posts.list_by_author(author_id).await?,
        };

        let mut node_ids: HashSet<PostId> = HashSet::new();
        let nodes: Vec<PostNode> = posts
            .iter()
            .filter(|post| node_ids.insert(post.id))
            .take(params.max_nodes)
            .map(PostNode::from)
            .collect();

        if nodes.len() < 2 || params.max_edges == 0 {
            return Ok(PostMap::without_edges(nodes));
        }

        let ids: Vec<PostId> = nodes.iter().map(|node| node.id).collect();
        let embeddings = self.index.fetch_by_ids(&ids).await?;

        let mut queried: HashSet<PostId> = HashSet::new();
        let embeddings: Vec<Embedding> = embeddings
            .into_iter()
            .filter(|embedding| {
                node_ids.contains(&embedding.post_id) && queried.insert(embedding.post_id)
            })
            .collect();

        let searches = embeddings.iter().map(|embedding| async move {
            let matches = self
                .index
                .query(&embedding.vector, params.threshold, params.k)
                .await;
            (embedding.post_id, matches)
        });
        let results = join_all(searches).await;

        let mut edges: Vec<PostEdge> = Vec::new();
        let mut seen: HashSet<(PostId, PostId)> = HashSet::new();

        'results: for (post_id, matches) in results {
            let matches = match matches {
                Ok(matches) => matches,
                Err(err) => {
                    warn!(post_id, error = %err, "similarity query failed, treating as no matches");
                    self.metrics.record_failed_query();
                    continue;
                }
            };

            for similar in matches {
                if !node_ids.contains(&similar.post_id) {
                    continue;
                }
                let Some(edge) = PostEdge::canonical(post_id, similar.post_id, similar.similarity)
                else {
                    continue;
                };
                if seen.insert(edge.pair_key()) {
                    edges.push(edge);
                    if edges.len() >= params.max_edges {
                        break 'results;
                    }
                }
            }
        }

        info!(
            %scope,
            nodes = nodes.len(),
            edges = edges.len(),
            "Generated posts map"
        );
        Ok(PostMap { nodes, edges })
    }
}
