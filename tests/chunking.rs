use doc_chunking::text::chunking::{
    Block, BlockType, Chunk, ChunkContext, ChunkType, ChunkingOptions, ChunkingStrategy,
    DocumentChunker, DocumentStructure, SourceFormat, SourceMeta, StrategyRegistry,
    TiktokenCounter, TokenCounter, WordCounter, normalize, registry,
};
use doc_chunking::util::id_generator::new_sequential_generator;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn chunker() -> DocumentChunker {
    DocumentChunker::new(registry::init(), Arc::new(WordCounter), new_sequential_generator(1))
}

fn block(block_type: BlockType, level: u8, text: &str) -> Block {
    let tag = match block_type {
        BlockType::Heading => format!("h{level}"),
        BlockType::ListItem => "li".to_string(),
        _ => "p".to_string(),
    };
    Block::new(
        block_type,
        level,
        text.to_string(),
        format!("<{tag}>{text}</{tag}>"),
        SourceMeta::default(),
    )
}

fn words(prefix: &str, n: usize) -> String {
    (1..=n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

fn sample_document() -> DocumentStructure {
    let mut blocks = Vec::new();
    for (s, size) in [(1, 12), (2, 30), (3, 7)] {
        blocks.push(block(BlockType::Heading, 1, &format!("Section {s}")));
        for p in 0..4 {
            blocks.push(block(BlockType::Paragraph, 0, &words(&format!("s{s}p{p}w"), size)));
        }
        blocks.push(block(BlockType::ListItem, 1, &words(&format!("s{s}li"), 3)));
    }
    DocumentStructure::new(blocks, "sample.docx", SourceFormat::Word)
}

fn budget(max_tokens: usize, overlap_tokens: usize) -> ChunkingOptions {
    ChunkingOptions {
        max_tokens: Some(max_tokens),
        overlap_tokens: Some(overlap_tokens),
        min_chunk_tokens: Some(1),
        ..Default::default()
    }
}

fn all_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[test]
fn test_token_count_matches_plain_text() {
    let chunker = chunker();
    let doc = sample_document();
    for id in ["fixed-size", "heading-aware", "paragraph-aware", "sliding-window"] {
        let overrides = ChunkingOptions {
            window_size: Some(40),
            overlap_size: Some(10),
            ..budget(40, 10)
        };
        let chunks = chunker.chunk(&doc, id, &overrides, &Map::new()).unwrap();
        assert!(!chunks.is_empty(), "{id} produced no chunks");
        for chunk in &chunks {
            assert_eq!(chunk.token_count, WordCounter.count(&chunk.plain_text()), "{id}");
            assert!(!chunk.plain_text().trim().is_empty(), "{id}");
        }
    }
}

#[test]
fn test_budget_respected_for_splittable_text() {
    let chunker = chunker();
    let doc = sample_document();
    for id in ["heading-aware", "paragraph-aware"] {
        let chunks = chunker.chunk(&doc, id, &budget(25, 6), &Map::new()).unwrap();
        for chunk in &chunks {
            assert!(chunk.token_count <= 25, "{id}: {} tokens", chunk.token_count);
        }
    }
    // fixed-size only splits at sentences; unpunctuated blocks stay whole
    let chunks = chunker.chunk(&doc, "fixed-size", &budget(25, 6), &Map::new()).unwrap();
    for chunk in &chunks {
        if chunk.token_count > 25 {
            assert_eq!(chunk.metadata.chunk_type, ChunkType::Oversized);
            assert_eq!(chunk.token_count, 30);
        }
    }
}

#[test]
fn test_chunk_indexes_are_contiguous() {
    let chunks = chunker()
        .chunk(&sample_document(), "paragraph-aware", &budget(25, 0), &Map::new())
        .unwrap();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.chunk_index, i);
        assert!(chunk.title.starts_with(&format!("Chunk {}: ", i + 1)));
    }
}

#[test]
fn test_fixed_size_without_overlap_preserves_order() {
    let doc = sample_document();
    let chunks = chunker().chunk(&doc, "fixed-size", &budget(25, 0), &Map::new()).unwrap();
    let emitted: Vec<String> = chunks.iter().flat_map(|c| all_words(&c.plain_text())).collect();
    assert_eq!(emitted, all_words(&doc.plain_text()));
}

#[test]
fn test_paragraph_aware_without_overlap_preserves_order() {
    let doc = sample_document();
    let chunks = chunker().chunk(&doc, "paragraph-aware", &budget(25, 0), &Map::new()).unwrap();
    let emitted: Vec<String> = chunks.iter().flat_map(|c| all_words(&c.plain_text())).collect();
    let expected: Vec<String> = doc
        .blocks
        .iter()
        .filter(|b| b.block_type.is_paragraph_like())
        .flat_map(|b| all_words(&b.text))
        .collect();
    assert_eq!(emitted, expected);
}

#[test]
fn test_heading_aware_without_overlap_preserves_order() {
    let doc = sample_document();
    let chunks = chunker().chunk(&doc, "heading-aware", &budget(25, 0), &Map::new()).unwrap();
    let emitted: Vec<String> = chunks.iter().flat_map(|c| all_words(&c.plain_text())).collect();
    assert_eq!(emitted, all_words(&doc.plain_text()));
}

#[test]
fn test_whole_blocks_land_in_exactly_one_chunk() {
    let doc = sample_document();
    let chunker = chunker();
    // no block exceeds the budget, so every block moves whole
    for id in ["fixed-size", "heading-aware", "paragraph-aware"] {
        let chunks = chunker.chunk(&doc, id, &budget(40, 0), &Map::new()).unwrap();
        for block in &doc.blocks {
            if id == "paragraph-aware" && !block.block_type.is_paragraph_like() {
                continue;
            }
            let holders = chunks.iter().filter(|c| c.content.contains(&block.html)).count();
            assert_eq!(holders, 1, "{id}: {}", block.html);
        }
    }
}

#[test]
fn test_small_max_tokens_accepted_by_heading_aware() {
    let chunker = chunker();
    let overrides = ChunkingOptions {
        max_tokens: Some(180),
        ..Default::default()
    };
    let options = chunker.resolve_options("heading-aware", &overrides).unwrap();
    assert_eq!(options.min_chunk_tokens, Some(200));
    let blocks: Vec<Block> = (0..5)
        .map(|i| block(BlockType::Paragraph, 0, &words(&format!("p{i}w"), 70)))
        .collect();
    let doc = DocumentStructure::new(blocks, "flat.txt", SourceFormat::Text);
    let contents = |id: &str| {
        chunker
            .chunk(&doc, id, &overrides, &Map::new())
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
    };
    assert_eq!(contents("heading-aware"), contents("fixed-size"));
}

fn prose_document() -> DocumentStructure {
    let topics = ["Background", "Design", "Rollout"];
    let mut blocks = Vec::new();
    for (s, topic) in topics.iter().enumerate() {
        blocks.push(block(BlockType::Heading, 1, topic));
        for p in 1..=4 {
            let text = format!(
                "The {topic} notes, part {p}, describe how the service handles incoming requests. \
                 Each request is validated, logged and queued before a worker picks it up \
                 for section {s}."
            );
            blocks.push(block(BlockType::Paragraph, 0, &text));
        }
    }
    DocumentStructure::new(blocks, "design.docx", SourceFormat::Word)
}

#[test]
fn test_tiktoken_counts_and_budget() {
    let counter = Arc::new(TiktokenCounter::new().unwrap());
    let chunker =
        DocumentChunker::new(registry::init(), counter.clone(), new_sequential_generator(1));
    let doc = prose_document();
    let largest = doc.blocks.iter().map(|b| counter.count(&b.text)).max().unwrap();
    assert!(largest < 60, "paragraphs must fit the budget, got {largest}");

    for id in ["fixed-size", "heading-aware", "paragraph-aware", "sliding-window"] {
        let overrides = ChunkingOptions {
            window_size: Some(40),
            overlap_size: Some(10),
            ..budget(60, 15)
        };
        let chunks = chunker.chunk(&doc, id, &overrides, &Map::new()).unwrap();
        assert!(chunks.len() > 1, "{id}");
        for chunk in &chunks {
            assert_eq!(chunk.token_count, counter.count(&chunk.plain_text()), "{id}");
            if id != "sliding-window" {
                assert!(chunk.token_count <= 60, "{id}: {} tokens", chunk.token_count);
            }
        }
    }
}

#[test]
fn test_html_edge_cases_survive_chunking() {
    let markup = "<h1>Notes</h1><p>if a < b then swap</p>\
                  <script>document.write('<p>ignored</p>')</script>\
                  <p>second</p><div data-page=2><p>third</p></div>";
    let doc = normalize(markup, SourceFormat::Html, "notes.html");
    assert_eq!(doc.blocks.len(), 4);
    let chunks = chunker().chunk(&doc, "paragraph-aware", &budget(100, 0), &Map::new()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].plain_text(), "if a < b then swap\nsecond\nthird");
    assert_eq!(doc.blocks[3].source_meta.page, Some(2));
}

#[test]
fn test_heading_lineage_from_markup() {
    let chunks = chunker()
        .chunk_markup(
            "<h1>A</h1><p>alpha</p><h2>B</h2><p>beta</p><h3>C</h3><p>gamma</p><h2>D</h2><p>delta</p>",
            SourceFormat::Html,
            "lineage.html",
            "heading-aware",
            &ChunkingOptions::default(),
            &Map::new(),
        )
        .unwrap();
    let paths: Vec<Vec<String>> = chunks.iter().map(|c| c.metadata.section_path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            vec!["A".to_string()],
            vec!["A".to_string(), "B".to_string()],
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec!["A".to_string(), "D".to_string()],
        ]
    );
    assert_eq!(chunks[2].title, "Chunk 3: C");
}

#[test]
fn test_heading_aware_without_headings_equals_fixed_size() {
    let blocks: Vec<Block> = (0..6)
        .map(|i| block(BlockType::Paragraph, 0, &words(&format!("p{i}w"), 9)))
        .collect();
    let doc = DocumentStructure::new(blocks, "flat.txt", SourceFormat::Text);
    let chunker = chunker();
    let contents = |id: &str| {
        chunker
            .chunk(&doc, id, &budget(20, 6), &Map::new())
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
    };
    assert_eq!(contents("heading-aware"), contents("fixed-size"));
}

#[test]
fn test_sliding_window_positions() {
    let blocks: Vec<Block> = (0..18)
        .map(|i| block(BlockType::Paragraph, 0, &words(&format!("b{i}w"), 100)))
        .collect();
    let doc = DocumentStructure::new(blocks, "long.pdf", SourceFormat::Pdf);
    let chunks = chunker()
        .chunk(&doc, "sliding-window", &ChunkingOptions::default(), &Map::new())
        .unwrap();
    let spans: Vec<(Option<usize>, Option<usize>)> = chunks
        .iter()
        .map(|c| (c.metadata.window_start, c.metadata.window_end))
        .collect();
    assert_eq!(spans, vec![(Some(0), Some(1000)), (Some(800), Some(1800))]);
    assert_eq!(chunks[0].token_count, 1000);
    assert!(chunks[1].plain_text().starts_with("b8w1 "));
}

#[test]
fn test_slide_metadata_from_markup() {
    let chunks = chunker()
        .chunk_markup(
            "<section data-slide=\"1\"><h1>Welcome</h1><p>Agenda for today</p></section>\
             <section data-slide=\"2\"><h1>Results</h1><p>Revenue grew</p></section>",
            SourceFormat::Slides,
            "deck.pptx",
            "heading-aware",
            &ChunkingOptions::default(),
            &Map::new(),
        )
        .unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].metadata.slide, Some(1));
    assert_eq!(chunks[1].metadata.slide, Some(2));
    assert_eq!(chunks[1].title, "Chunk 2: Results");
}

#[test]
fn test_global_metadata_and_serialization() {
    let mut global = Map::new();
    global.insert("tenant".to_string(), Value::from("acme"));
    let chunks = chunker()
        .chunk_markup(
            "<h1>Intro</h1><p>Hello world.</p>",
            SourceFormat::Markdown,
            "readme.md",
            "fixed-size",
            &ChunkingOptions::default(),
            &global,
        )
        .unwrap();
    let value = serde_json::to_value(&chunks[0]).unwrap();
    assert_eq!(value["title"], "Chunk 1: Intro");
    assert_eq!(value["tokenCount"], 3);
    assert_eq!(value["metadata"]["strategy"], "fixed-size");
    assert_eq!(value["metadata"]["sourceFormat"], "markdown");
    assert_eq!(value["metadata"]["extra"]["tenant"], "acme");
    let back: Chunk = serde_json::from_value(value).unwrap();
    assert_eq!(back, chunks[0]);
}

struct Everything;

impl ChunkingStrategy for Everything {
    fn id(&self) -> &'static str {
        "fixed-size"
    }
    fn name(&self) -> &'static str {
        "Everything"
    }
    fn description(&self) -> &'static str {
        "one chunk holding the whole document"
    }
    fn default_options(&self) -> ChunkingOptions {
        ChunkingOptions::default()
    }
    fn chunk(
        &self,
        document: &DocumentStructure,
        options: &ChunkingOptions,
        ctx: &ChunkContext<'_>,
    ) -> doc_chunking::Result<Vec<Chunk>> {
        use doc_chunking::text::chunking::builder::ChunkDraft;
        let mut assembler = ctx.assembler(self.id(), document, options);
        let content = document.blocks.iter().map(|b| b.html.as_str()).collect::<String>();
        assembler.push(ChunkDraft::new(content, ChunkType::MergedBlocks))?;
        Ok(assembler.finish())
    }
}

#[test]
fn test_custom_strategy_replaces_builtin() {
    let mut chunker = chunker();
    let displaced = chunker.register(Arc::new(Everything));
    assert_eq!(displaced.map(|s| s.name()), Some("Fixed Size"));
    assert_eq!(chunker.registry().len(), 4);
    let chunks = chunker
        .chunk(&sample_document(), "fixed-size", &ChunkingOptions::default(), &Map::new())
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunker.strategies()[0].name, "Everything");
}

#[test]
fn test_empty_registry_reports_missing_strategy() {
    let chunker = DocumentChunker::new(
        StrategyRegistry::new(),
        Arc::new(WordCounter),
        new_sequential_generator(1),
    );
    let err = chunker
        .chunk(&sample_document(), "fixed-size", &ChunkingOptions::default(), &Map::new())
        .unwrap_err();
    assert_eq!(err.category(), "strategy_not_found");
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    doc_chunking::util::tracing::tracing_init_test(tracing::Level::DEBUG);
    let chunker = Arc::new(chunker());
    let doc = Arc::new(sample_document());
    let mut set = tokio::task::JoinSet::new();
    for i in 0..8 {
        let chunker = chunker.clone();
        let doc = doc.clone();
        let id = ["fixed-size", "heading-aware", "paragraph-aware", "sliding-window"][i % 4];
        set.spawn_blocking(move || {
            let overrides = ChunkingOptions {
                window_size: Some(30),
                overlap_size: Some(5),
                ..budget(30, 5)
            };
            (id, chunker.chunk(&doc, id, &overrides, &Map::new()).unwrap())
        });
    }
    let mut ids = HashSet::new();
    let mut by_strategy: Vec<(&str, Vec<Chunk>)> = Vec::new();
    while let Some(res) = set.join_next().await {
        let (strategy, chunks) = res.unwrap();
        for chunk in &chunks {
            assert!(ids.insert(chunk.id.clone()), "duplicate id {}", chunk.id);
        }
        by_strategy.push((strategy, chunks));
    }
    // same input, same output apart from ids
    let strip = |chunks: &[Chunk]| {
        chunks
            .iter()
            .map(|c| (c.title.clone(), c.content.clone(), c.metadata.clone()))
            .collect::<Vec<_>>()
    };
    for (strategy, chunks) in &by_strategy {
        for (other, other_chunks) in &by_strategy {
            if strategy == other {
                assert_eq!(strip(chunks), strip(other_chunks));
            }
        }
    }
}
