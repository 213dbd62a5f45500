//! Strategy capability shared by every chunking algorithm

use super::builder::ChunkContext;
use super::config::ChunkingOptions;
use super::error::Result;
use super::types::{Chunk, DocumentStructure};

/// A pluggable algorithm mapping a document and options to chunks.
///
/// `chunk` receives options already merged onto `default_options()` and
/// validated; it either returns the complete chunk list or fails.
pub trait ChunkingStrategy: Send + Sync {
    /// Registry key, e.g. `"fixed-size"`
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn default_options(&self) -> ChunkingOptions;

    /// Reject option combinations the algorithm cannot honor.
    fn validate_options(&self, _options: &ChunkingOptions) -> std::result::Result<(), String> {
        Ok(())
    }

    fn chunk(
        &self,
        document: &DocumentStructure,
        options: &ChunkingOptions,
        ctx: &ChunkContext<'_>,
    ) -> Result<Vec<Chunk>>;
}

impl std::fmt::Debug for dyn ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkingStrategy")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
