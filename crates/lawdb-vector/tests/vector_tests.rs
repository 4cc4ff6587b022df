use std::fs;

use lawdb_core::error::Error;
use lawdb_core::types::LawMetadata;
use lawdb_embed::HashEmbedder;
use lawdb_vector::snapshot::{MANIFEST_FILE, METADATA_FILE, TEXTS_FILE};
use lawdb_vector::{Manifest, SnapshotDir, VectorIndex};
use proptest::prelude::*;

fn statutes() -> Vec<String> {
    vec![
        "《个人信息保护法》第十三条规定，符合下列情形之一的，个人信息处理者方可处理个人信息".to_string(),
        "《劳动法》第三十六条 国家实行劳动者每日工作时间不超过八小时的工时制度".to_string(),
        "《民法典》第一千零三十四条 自然人的个人信息受法律保护".to_string(),
    ]
}

fn index_with(texts: &[String]) -> VectorIndex {
    let mut idx = VectorIndex::new(Box::new(HashEmbedder::new(64).expect("embedder")));
    let rows = idx.embed_documents(texts).expect("embed");
    idx.append(rows).expect("append");
    idx
}

#[test]
fn nearest_passage_wins() {
    let idx = index_with(&statutes());
    let hits = idx.search("劳动者每日工作时间", 3).expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, 1);
}

#[test]
fn snapshot_round_trip_restores_vectors_texts_and_metadata() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = SnapshotDir::new(tmp.path().join("index"));
    let texts = statutes();
    let idx = index_with(&texts);
    let metas = vec![
        LawMetadata::default().with_law("《个人信息保护法》").with_article("第十三条").with_line_number(1),
        LawMetadata::default().with_extra("source", "labor"),
        LawMetadata::default(),
    ];
    let dim = idx.dim().expect("dim");
    dir.write(idx.embedder_id(), dim, idx.as_flat(), &texts, &metas).expect("write");

    let snap = dir.load().expect("load").expect("snapshot present");
    assert_eq!(snap.manifest.count, 3);
    assert_eq!(snap.manifest.embedder_id, "hash:xxh64:d64");
    assert_eq!(snap.texts, texts);
    assert_eq!(snap.metadatas, metas);
    assert_eq!(snap.vectors, idx.as_flat());

    let mut restored = VectorIndex::new(Box::new(HashEmbedder::new(64).expect("embedder")));
    restored.restore(snap.vectors, snap.manifest.dim).expect("restore");
    assert_eq!(
        restored.search("个人信息", 3).expect("search"),
        idx.search("个人信息", 3).expect("search")
    );
}

#[test]
fn tampered_artifact_fails_checksum() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = SnapshotDir::new(tmp.path());
    let texts = statutes();
    let idx = index_with(&texts);
    let metas = vec![LawMetadata::default(); 3];
    dir.write(idx.embedder_id(), 64, idx.as_flat(), &texts, &metas).expect("write");

    fs::write(tmp.path().join("gen-1").join(TEXTS_FILE), r#"["a","b","c"]"#).expect("tamper");
    assert!(matches!(dir.load(), Err(Error::IndexIntegrity(_))));
}

#[test]
fn missing_artifact_is_an_integrity_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = SnapshotDir::new(tmp.path());
    let texts = statutes();
    let idx = index_with(&texts);
    dir.write(idx.embedder_id(), 64, idx.as_flat(), &texts, &vec![LawMetadata::default(); 3]).expect("write");

    fs::remove_file(tmp.path().join("gen-1").join(METADATA_FILE)).expect("remove");
    let err = dir.load().expect_err("must fail");
    assert!(err.is_fatal(), "{err}");
}

#[test]
fn artifacts_with_disagreeing_lengths_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = SnapshotDir::new(tmp.path());
    let texts = statutes();
    let idx = index_with(&texts);
    dir.write(idx.embedder_id(), 64, idx.as_flat(), &texts, &vec![LawMetadata::default(); 3]).expect("write");

    // one extra text with a matching checksum, so only the length check can catch it
    let gen = tmp.path().join("gen-1");
    let mut longer = texts.clone();
    longer.push("《刑法》第二百五十三条".to_string());
    let text_bytes = serde_json::to_vec(&longer).expect("encode texts");
    fs::write(gen.join(TEXTS_FILE), &text_bytes).expect("rewrite texts");
    let mut manifest: Manifest =
        serde_json::from_slice(&fs::read(gen.join(MANIFEST_FILE)).expect("read manifest")).expect("decode manifest");
    manifest.checksums.insert(TEXTS_FILE.to_string(), blake3::hash(&text_bytes).to_hex().to_string());
    fs::write(gen.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest).expect("encode manifest"))
        .expect("rewrite manifest");

    match dir.load() {
        Err(Error::IndexIntegrity(msg)) => assert!(msg.contains("lengths disagree"), "{msg}"),
        other => panic!("expected an integrity error, got {other:?}"),
    }
}

#[test]
fn misaligned_corpus_is_never_written() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = SnapshotDir::new(tmp.path());
    let texts = statutes();
    let idx = index_with(&texts);
    let res = dir.write(idx.embedder_id(), 64, idx.as_flat(), &texts, &[LawMetadata::default()]);
    assert!(matches!(res, Err(Error::IndexIntegrity(_))));
    assert!(dir.load().expect("load").is_none());
}

#[test]
fn restoring_with_another_dimension_is_rejected() {
    let mut idx = VectorIndex::new(Box::new(HashEmbedder::new(32).expect("embedder")));
    let res = idx.restore(vec![0.0; 128], 64);
    assert!(matches!(res, Err(Error::DimensionMismatch { expected: 32, found: 64 })));
}

proptest! {
    #[test]
    fn search_is_bounded_sorted_and_unique(
        docs in prop::collection::vec("[a-z]{1,6}( [a-z]{1,6}){0,4}", 1..15),
        query in "[a-z]{1,6}",
        k in 0usize..20,
    ) {
        let idx = index_with(&docs);
        let hits = idx.search(&query, k).expect("search");
        prop_assert_eq!(hits.len(), k.min(docs.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].id < pair[1].id));
        }
        let mut ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), hits.len());
    }
}
