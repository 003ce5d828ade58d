#![cfg(feature = "lang-python")]

use std::sync::Arc;

use codescope_index::{
    ChunkKind, ChunkerConfig, CodeIndex, CodeIndexer, CodeParser, CodeRetriever, GrammarRegistry,
    HashingEmbedder, IndexError, IndexerConfig, Lang, ParserConfig, RetrievalConfig, SourceFile,
    TargetType, build_chunks,
};

fn embedder(model: &str) -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new(model, 384).unwrap())
}

fn corpus() -> Vec<SourceFile> {
    vec![
        SourceFile::new("a.py", Lang::Python, "def foo():\n    return 1\n"),
        SourceFile::new(
            "b.py",
            Lang::Python,
            "class Bar:\n    def baz(self):\n        return 2\n",
        ),
    ]
}

async fn indexed(model: &str) -> Arc<CodeIndex<HashingEmbedder>> {
    let index = Arc::new(CodeIndex::new(embedder(model)));
    let indexer = CodeIndexer::new(
        CodeParser::new(GrammarRegistry::new(), ParserConfig::default()),
        Arc::clone(&index),
        IndexerConfig::default(),
    );
    indexer.index_sources(corpus()).await.unwrap();
    index
}

fn retriever(index: &Arc<CodeIndex<HashingEmbedder>>) -> CodeRetriever<HashingEmbedder> {
    CodeRetriever::new(Arc::clone(index), RetrievalConfig::default())
}

#[tokio::test]
async fn search_finds_function_by_name() {
    let index = indexed("m1").await;
    let results = retriever(&index).search("foo", 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.kind, ChunkKind::Function);
    assert_eq!(results[0].chunk.name(), Some("foo"));
    assert_eq!(results[0].rank, 1);
}

#[tokio::test]
async fn class_chunk_lists_methods() {
    let index = indexed("m1").await;
    let snapshot = index.snapshot().unwrap();
    let class = snapshot
        .chunks()
        .iter()
        .find(|c| c.kind == ChunkKind::Class)
        .unwrap();
    assert_eq!(class.name(), Some("Bar"));
    assert_eq!(class.metadata.method_count, 1);
    assert!(class.content.contains("Methods: baz"));
}

#[test]
fn search_before_build_is_not_built() {
    let index = Arc::new(CodeIndex::new(embedder("m1")));
    let err = retriever(&index).search("foo", 3).unwrap_err();
    assert!(matches!(err, IndexError::IndexNotBuilt));
}

#[test]
fn empty_build_returns_no_results() {
    let index = Arc::new(CodeIndex::new(embedder("m1")));
    index.build(Vec::new()).unwrap();
    assert!(retriever(&index).search("anything", 5).unwrap().is_empty());
}

#[tokio::test]
async fn k_beyond_corpus_returns_everything() {
    let index = indexed("m1").await;
    let total = index.snapshot().unwrap().len();
    let results = retriever(&index).search("return", total + 10).unwrap();
    assert_eq!(results.len(), total);
}

#[tokio::test]
async fn saved_index_answers_like_the_live_one() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("index");
    let live = indexed("m1").await;
    live.save(&prefix).await.unwrap();

    let restored = Arc::new(CodeIndex::new(embedder("m1")));
    let report = restored.load(&prefix).await.unwrap();
    assert!(report.warning.is_none());

    for query in ["foo", "class Bar", "return 2", "baz method"] {
        let a = retriever(&live).search(query, 4).unwrap();
        let b = retriever(&restored).search(query, 4).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.rank, y.rank);
            assert_eq!(x.chunk, y.chunk);
            assert!((x.score - y.score).abs() < 1e-6, "{query}: {} vs {}", x.score, y.score);
        }
    }
}

#[tokio::test]
async fn loading_with_another_model_warns() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("index");
    indexed("m1").await.save(&prefix).await.unwrap();

    let other = Arc::new(CodeIndex::new(embedder("m2")));
    let report = other.load(&prefix).await.unwrap();
    let warning = report.warning.unwrap();
    assert_eq!(warning.stored, "m1");
    assert_eq!(warning.current, "m2");
    assert!(other.is_built());
}

#[test]
fn rebuilding_same_chunks_is_idempotent() {
    let parser = CodeParser::default();
    let chunks: Vec<_> = corpus()
        .iter()
        .flat_map(|f| {
            let parsed = parser.parse_file(f).unwrap();
            build_chunks(&f.path, f.language, &parsed.entities, &ChunkerConfig::default())
        })
        .collect();

    let index = Arc::new(CodeIndex::new(embedder("m1")));
    index.build(chunks.clone()).unwrap();
    let first = retriever(&index).search("foo bar", 3).unwrap();
    let first_len = index.snapshot().unwrap().len();

    index.build(chunks).unwrap();
    let second = retriever(&index).search("foo bar", 3).unwrap();
    assert_eq!(index.snapshot().unwrap().len(), first_len);
    assert_eq!(first, second);
}

#[tokio::test]
async fn documentation_context_mentions_related_code() {
    let index = indexed("m1").await;
    let mut config = RetrievalConfig::default();
    config.relevance_threshold = 0.0;
    let retriever = CodeRetriever::new(Arc::clone(&index), config);
    let context = retriever
        .context_for_documentation("def foo():\n    return 1\n", TargetType::Function)
        .unwrap();
    assert!(context.contains("Related function 'foo'"));
    assert!(context.lines().filter(|l| l.starts_with("Related ")).count() <= 3);
}

#[tokio::test]
async fn readers_see_whole_snapshots_during_rebuild() {
    let index = indexed("m1").await;
    let old_len = index.snapshot().unwrap().len();
    let extra = build_chunks(
        "c.py",
        Lang::Python,
        &CodeParser::default()
            .parse("def qux():\n    pass\n", Lang::Python)
            .unwrap()
            .entities,
        &ChunkerConfig::default(),
    );
    let mut bigger = index.snapshot().unwrap().chunks().to_vec();
    bigger.extend(extra);
    let new_len = bigger.len();

    std::thread::scope(|s| {
        for _ in 0..4 {
            let index = Arc::clone(&index);
            s.spawn(move || {
                let retriever = CodeRetriever::new(index, RetrievalConfig::default());
                for _ in 0..50 {
                    let n = retriever.search("foo", 100).unwrap().len();
                    assert!(n == old_len || n == new_len, "saw {n} results");
                }
            });
        }
        for _ in 0..5 {
            index.build(bigger.clone()).unwrap();
        }
    });
}
