//! Entry point: strategy lookup, option merging, validation and the run

use super::builder::ChunkContext;
use super::config::ChunkingOptions;
use super::error::{ChunkingError, Result};
use super::normalizer;
use super::registry::{self, StrategyRegistry};
use super::strategy::ChunkingStrategy;
use super::tokens::{TiktokenCounter, TokenCounter};
use super::types::{Chunk, DocumentStructure, SourceFormat};
use crate::util::id_generator::{self, IDGenerator};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Registry entry as exposed to callers choosing a strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub default_options: ChunkingOptions,
}

impl From<&dyn ChunkingStrategy> for StrategyInfo {
    fn from(strategy: &dyn ChunkingStrategy) -> Self {
        Self {
            id: strategy.id().to_string(),
            name: strategy.name().to_string(),
            description: strategy.description().to_string(),
            default_options: strategy.default_options(),
        }
    }
}

/// Chunks documents with registered strategies.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
#[derive(Clone)]
pub struct DocumentChunker {
    registry: StrategyRegistry,
    counter: Arc<dyn TokenCounter>,
    id_generator: IDGenerator,
}

impl DocumentChunker {
    pub fn new(
        registry: StrategyRegistry,
        counter: Arc<dyn TokenCounter>,
        id_generator: IDGenerator,
    ) -> Self {
        Self {
            registry,
            counter,
            id_generator,
        }
    }

    /// Built-in strategies, `cl100k_base` token counts and snowflake ids.
    pub fn with_defaults() -> Result<Self> {
        let counter = TiktokenCounter::new()?;
        info!("Token counter ready: {}", counter.encoding_name());
        Ok(Self::new(
            registry::init(),
            Arc::new(counter),
            id_generator::new_generator_by_ip(),
        ))
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn register(
        &mut self,
        strategy: Arc<dyn ChunkingStrategy>,
    ) -> Option<Arc<dyn ChunkingStrategy>> {
        self.registry.register(strategy)
    }

    pub fn strategies(&self) -> Vec<StrategyInfo> {
        self.registry
            .list()
            .iter()
            .map(|s| StrategyInfo::from(s.as_ref()))
            .collect()
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Strategy defaults with `overrides` merged on top, validated.
    pub fn resolve_options(
        &self,
        strategy_id: &str,
        overrides: &ChunkingOptions,
    ) -> Result<ChunkingOptions> {
        let strategy = self.lookup(strategy_id)?;
        Self::merged_options(strategy.as_ref(), overrides)
    }

    fn lookup(&self, strategy_id: &str) -> Result<Arc<dyn ChunkingStrategy>> {
        self.registry
            .get(strategy_id)
            .ok_or_else(|| ChunkingError::strategy_not_found(strategy_id))
    }

    fn merged_options(
        strategy: &dyn ChunkingStrategy,
        overrides: &ChunkingOptions,
    ) -> Result<ChunkingOptions> {
        let options = strategy.default_options().merge(overrides);
        strategy
            .validate_options(&options)
            .map_err(ChunkingError::invalid_options)?;
        Ok(options)
    }

    /// Run `strategy_id` over `document`.
    ///
    /// Fails with `StrategyNotFound` or `InvalidOptions` before any work;
    /// otherwise returns the complete chunk list.
    pub fn chunk(
        &self,
        document: &DocumentStructure,
        strategy_id: &str,
        overrides: &ChunkingOptions,
        global_metadata: &Map<String, Value>,
    ) -> Result<Vec<Chunk>> {
        let result = self.lookup(strategy_id).and_then(|strategy| {
            let options = Self::merged_options(strategy.as_ref(), overrides)?;
            let ctx = ChunkContext::new(self.counter.as_ref(), &self.id_generator, global_metadata);
            strategy.chunk(document, &options, &ctx)
        });
        if let Err(e) = &result {
            warn!(
                "Chunking {:?} with {:?} failed ({}): {}",
                document.source_file,
                strategy_id,
                e.category(),
                e
            );
        }
        result
    }

    /// Normalize `markup` and chunk the resulting document.
    pub fn chunk_markup(
        &self,
        markup: &str,
        source_format: SourceFormat,
        source_file: &str,
        strategy_id: &str,
        overrides: &ChunkingOptions,
        global_metadata: &Map<String, Value>,
    ) -> Result<Vec<Chunk>> {
        let document = normalizer::normalize(markup, source_format, source_file);
        self.chunk(&document, strategy_id, overrides, global_metadata)
    }
}
