//! Strategy registry: id -> strategy lookup built at the composition point

use super::fixed_size::FixedSizeStrategy;
use super::heading_aware::HeadingAwareStrategy;
use super::paragraph_aware::ParagraphAwareStrategy;
use super::sliding_window::SlidingWindowStrategy;
use super::strategy::ChunkingStrategy;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered set of strategies keyed by `ChunkingStrategy::id`.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn ChunkingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `strategy`; an existing entry with the same id is replaced in
    /// place and returned.
    pub fn register(
        &mut self,
        strategy: Arc<dyn ChunkingStrategy>,
    ) -> Option<Arc<dyn ChunkingStrategy>> {
        let id = strategy.id();
        match self.strategies.iter_mut().find(|s| s.id() == id) {
            Some(slot) => {
                warn!("Strategy {:?} registered twice, replacing the earlier one", id);
                Some(std::mem::replace(slot, strategy))
            }
            None => {
                debug!("Registered strategy {:?}", id);
                self.strategies.push(strategy);
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ChunkingStrategy>> {
        self.strategies.iter().find(|s| s.id() == id).cloned()
    }

    pub fn list(&self) -> &[Arc<dyn ChunkingStrategy>] {
        &self.strategies
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// The built-in strategies in registration order.
pub fn strategies() -> Vec<Arc<dyn ChunkingStrategy>> {
    vec![
        Arc::new(FixedSizeStrategy),
        Arc::new(HeadingAwareStrategy),
        Arc::new(ParagraphAwareStrategy),
        Arc::new(SlidingWindowStrategy),
    ]
}

/// A registry holding every built-in strategy.
pub fn init() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    for strategy in strategies() {
        registry.register(strategy);
    }
    registry
}
