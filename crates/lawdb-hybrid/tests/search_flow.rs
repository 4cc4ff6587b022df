use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use lawdb_core::config::{Bm25Settings, Settings};
use lawdb_core::error::Error;
use lawdb_core::traits::{CrossEncoder, Embedder};
use lawdb_core::types::{LawMetadata, SourceKind};
use lawdb_embed::{HashEmbedder, OverlapCrossEncoder};
use lawdb_hybrid::{DocumentStore, HybridRetriever, QueryClass};
use lawdb_text::AnalyzerTokenizer;
use lawdb_vector::snapshot::CURRENT_FILE;

const PIPL_13: &str = "《个人信息保护法》第十三条规定，符合下列情形之一的，个人信息处理者方可处理个人信息";

fn statutes() -> Vec<String> {
    vec![
        PIPL_13.to_string(),
        "《民法典》第一千零三十四条 自然人的个人信息受法律保护".to_string(),
        "《刑法》第二百五十三条 违反国家有关规定，向他人出售或者提供公民个人信息".to_string(),
        "《劳动法》第三十六条 国家实行劳动者每日工作时间不超过八小时的工时制度".to_string(),
    ]
}

fn metas(texts: &[String]) -> Vec<LawMetadata> {
    texts.iter().enumerate().map(|(i, t)| lawdb_core::data_processor::extract_metadata(t, i + 1)).collect()
}

/// Counts provider calls; optionally fails them.
#[derive(Clone, Default)]
struct Calls {
    embed: Arc<AtomicUsize>,
    rerank: Arc<AtomicUsize>,
}

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: Calls,
    fail: bool,
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.embed.fetch_add(1, Ordering::SeqCst);
        if self.fail { return Err(anyhow!("embedding backend offline")); }
        self.inner.embed_batch(texts)
    }
}

struct CountingCrossEncoder {
    inner: OverlapCrossEncoder,
    calls: Calls,
    fail: bool,
}

impl CrossEncoder for CountingCrossEncoder {
    fn score_pairs(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
        self.calls.rerank.fetch_add(1, Ordering::SeqCst);
        if self.fail { return Err(anyhow!("reranker timed out")); }
        self.inner.score_pairs(pairs)
    }
}

fn embedder(calls: &Calls, fail: bool) -> Box<dyn Embedder> {
    Box::new(CountingEmbedder { inner: HashEmbedder::new(128).expect("embedder"), calls: calls.clone(), fail })
}

fn retriever_with(store: DocumentStore, calls: &Calls, fail_rerank: bool) -> HybridRetriever {
    let ce = CountingCrossEncoder { inner: OverlapCrossEncoder::new(), calls: calls.clone(), fail: fail_rerank };
    HybridRetriever::new(store, Box::new(ce), &Settings::default()).expect("retriever")
}

fn in_memory(calls: &Calls) -> DocumentStore {
    DocumentStore::in_memory(embedder(calls, false), Box::new(AnalyzerTokenizer::default()), Bm25Settings::default())
}

fn on_disk(dir: &Path, calls: &Calls) -> DocumentStore {
    DocumentStore::load_or_create(dir, embedder(calls, false), Box::new(AnalyzerTokenizer::default()), Bm25Settings::default())
        .expect("load_or_create")
}

#[test]
fn single_statute_is_found_by_citation() {
    let calls = Calls::default();
    let mut store = in_memory(&calls);
    store.add_documents(vec![PIPL_13.to_string()], Vec::new()).expect("add");
    let retriever = retriever_with(store, &calls, false);

    assert_eq!(retriever.classify("第十三条规定").class, QueryClass::Exact);
    let results = retriever.search("第十三条规定", 10, 5).expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 0);
    assert_eq!(results[0].text, PIPL_13);
    // one document: every term has idf ln(0.5 / 1.5) < 0 and scores <= 0 are dropped, not clamped,
    // so the passage arrives through the vector list alone (see "One-document corpus" in DESIGN.md)
    assert_eq!(results[0].source, SourceKind::Vector);
    assert_eq!(results[0].lexical_score, None);
    assert!(results[0].fused_score.is_some());
}

#[test]
fn citation_query_ranks_the_cited_article_first_with_a_lexical_score() {
    let calls = Calls::default();
    let mut store = in_memory(&calls);
    let texts = statutes();
    store.add_documents(texts.clone(), metas(&texts)).expect("add");
    let retriever = retriever_with(store, &calls, false);

    let results = retriever.search("第十三条规定", 3, 2).expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, 0);
    assert_eq!(results[0].source, SourceKind::Hybrid);
    assert!(results[0].lexical_score.is_some_and(|s| s > 0.0));
    assert_eq!(results[0].metadata.article.as_deref(), Some("第十三条"));
    assert!(results[0].score >= results[1].score);
    assert_eq!(calls.rerank.load(Ordering::SeqCst), 1, "one cross-encoder call per search");
}

#[test]
fn empty_corpus_and_blank_queries_skip_every_provider() {
    let calls = Calls::default();
    let retriever = retriever_with(in_memory(&calls), &calls, false);
    assert!(retriever.search("anything", 10, 5).expect("search").is_empty());
    assert_eq!(calls.embed.load(Ordering::SeqCst), 0);

    let mut store = in_memory(&calls);
    store.add_documents(statutes(), Vec::new()).expect("add");
    let retriever = retriever_with(store, &calls, false);
    let before = calls.embed.load(Ordering::SeqCst);
    assert!(retriever.search("", 10, 5).expect("search").is_empty());
    assert!(retriever.search("   ", 10, 5).expect("search").is_empty());
    assert!(retriever.search("劳动", 0, 5).expect("search").is_empty());
    assert!(retriever.search("劳动", 10, 0).expect("search").is_empty());
    assert_eq!(calls.embed.load(Ordering::SeqCst), before);
    assert_eq!(calls.rerank.load(Ordering::SeqCst), 0);
}

#[test]
fn defaults_come_from_settings() {
    let calls = Calls::default();
    let mut store = in_memory(&calls);
    let texts: Vec<String> = (1..=12).map(|i| format!("《测试法》第{i}条 劳动者权利保障条款 {i}")).collect();
    store.add_documents(texts, Vec::new()).expect("add");
    let retriever = retriever_with(store, &calls, false);
    assert_eq!(retriever.search_with_defaults("劳动者权利").expect("search").len(), 5);
}

#[test]
fn add_documents_embeds_once_per_call() {
    let calls = Calls::default();
    let mut store = in_memory(&calls);
    store.add_documents(statutes(), Vec::new()).expect("add");
    assert_eq!(calls.embed.load(Ordering::SeqCst), 1);
    assert_eq!(store.len(), 4);
    assert_eq!(store.lexical_index().len(), 4);
    assert_eq!(store.vector_index().len(), 4);
}

#[test]
fn empty_add_is_a_no_op_on_disk() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let calls = Calls::default();
    let mut store = on_disk(tmp.path(), &calls);
    store.add_documents(statutes(), Vec::new()).expect("add");
    let pointer = fs::read_to_string(tmp.path().join(CURRENT_FILE)).expect("CURRENT");

    store.add_documents(Vec::new(), Vec::new()).expect("empty add");
    assert_eq!(store.len(), 4);
    assert_eq!(fs::read_to_string(tmp.path().join(CURRENT_FILE)).expect("CURRENT"), pointer);
    assert_eq!(calls.embed.load(Ordering::SeqCst), 1);
}

#[test]
fn reload_reproduces_the_corpus() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let calls = Calls::default();
    let texts = statutes();
    let mut store = on_disk(tmp.path(), &calls);
    store.add_documents(texts[..2].to_vec(), metas(&texts[..2])).expect("add");
    store.add_documents(texts[2..].to_vec(), Vec::new()).expect("add");
    let before: Vec<_> = store.documents().collect();
    let retriever = retriever_with(store, &calls, false);
    let expected = retriever.search("个人信息保护", 4, 4).expect("search");

    let reloaded = on_disk(tmp.path(), &calls);
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.dimension(), Some(128));
    assert_eq!(reloaded.documents().collect::<Vec<_>>(), before);
    assert_eq!(reloaded.lexical_index().doc_freq("个人"), retriever.store().lexical_index().doc_freq("个人"));
    let retriever = retriever_with(reloaded, &calls, false);
    let got = retriever.search("个人信息保护", 4, 4).expect("search");
    assert_eq!(got.iter().map(|r| r.id).collect::<Vec<_>>(), expected.iter().map(|r| r.id).collect::<Vec<_>>());
}

#[test]
fn mismatched_metadata_is_rejected() {
    let calls = Calls::default();
    let mut store = in_memory(&calls);
    let err = store
        .add_documents(statutes(), vec![LawMetadata::default()])
        .expect_err("length mismatch");
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(store.is_empty());
    assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
}

#[test]
fn provider_failures_propagate_unchanged() {
    let calls = Calls::default();
    let mut store =
        DocumentStore::in_memory(embedder(&calls, true), Box::new(AnalyzerTokenizer::default()), Bm25Settings::default());
    let err = store.add_documents(statutes(), Vec::new()).expect_err("embedder is down");
    assert!(matches!(err, Error::Provider { provider: "embedding", .. }));
    assert!(store.is_empty());

    let mut store = in_memory(&calls);
    store.add_documents(statutes(), Vec::new()).expect("add");
    let retriever = retriever_with(store, &calls, true);
    let err = retriever.search("劳动时间", 3, 2).expect_err("reranker is down");
    assert!(matches!(err, Error::Provider { provider: "cross-encoder", .. }));
}

#[test]
fn snapshot_with_another_dimension_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut narrow = DocumentStore::load_or_create(
        tmp.path(),
        Box::new(HashEmbedder::new(64).expect("embedder")),
        Box::new(AnalyzerTokenizer::default()),
        Bm25Settings::default(),
    )
    .expect("open");
    narrow.add_documents(vec!["《劳动法》第一条".to_string()], Vec::new()).expect("add");

    // a 128-d embedder cannot open a 64-d snapshot
    let calls = Calls::default();
    let res = DocumentStore::load_or_create(tmp.path(), embedder(&calls, false), Box::new(AnalyzerTokenizer::default()), Bm25Settings::default());
    assert!(matches!(res, Err(Error::DimensionMismatch { expected: 128, found: 64 })));
}

#[test]
fn failed_persist_rolls_back_the_append() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let calls = Calls::default();
    let index_dir = tmp.path().join("index");
    let mut store = on_disk(&index_dir, &calls);
    // the index directory cannot be created where a file already sits
    fs::write(&index_dir, b"not a directory").expect("block path");

    let err = store.add_documents(statutes(), Vec::new()).expect_err("persist fails");
    assert!(matches!(err, Error::Persistence { .. }));
    assert!(store.is_empty());
    assert_eq!(store.vector_index().len(), 0);
    assert_eq!(store.lexical_index().len(), 0);
}

#[test]
fn stats_and_deduplicating_rebuild() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let calls = Calls::default();
    let mut texts = statutes();
    texts.push(PIPL_13.to_string());
    texts.push("无标题的条文".to_string());
    let mut store = on_disk(tmp.path(), &calls);
    store.add_documents(texts.clone(), metas(&texts)).expect("add");

    let mut retriever = retriever_with(store, &calls, false);
    let stats = retriever.stats();
    assert_eq!(stats.count, 6);
    assert_eq!(stats.dim, Some(128));
    assert_eq!(stats.laws.get("《个人信息保护法》"), Some(&2));
    assert_eq!(stats.laws.get("未知"), Some(&1));

    let report = retriever.rebuild_deduplicated().expect("rebuild");
    assert_eq!((report.before, report.after), (6, 5));
    let texts_after: Vec<String> = retriever.store().documents().map(|d| d.text).collect();
    assert_eq!(texts_after[0], PIPL_13);
    assert_eq!(texts_after[4], "无标题的条文");

    let reloaded = on_disk(tmp.path(), &calls);
    assert_eq!(reloaded.len(), 5);
    assert_eq!(reloaded.metadata(4).and_then(|m| m.line_number), Some(6));
}
