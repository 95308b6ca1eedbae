//! Property tests for the checker and the revision archive
//!
//! - Every shared checksum is reported exactly once
//! - Stack/path depth mismatches are informational only
//! - Archived snapshots restore the pre-update values

use std::collections::BTreeMap;

use pasta_engine::{
    CallerContext, CheckCode, DocumentChange, DocumentId, EngineConfig, Notebook, RawDocument,
    RevisionArchiver, Severity, UpdateOutcome,
};
use pasta_storage::MemoryStore;
use proptest::prelude::*;
use serde_json::{json, Value};

fn notebook_with(docs: Vec<Value>) -> Notebook<MemoryStore> {
    let raw: Vec<RawDocument> = docs
        .into_iter()
        .filter_map(|doc| doc.as_object().cloned())
        .collect();
    Notebook::open(MemoryStore::from_documents(raw).unwrap(), EngineConfig::default()).unwrap()
}

fn canonical(n: usize) -> String {
    format!("x-{:032x}", n)
}

proptest! {
    #[test]
    fn shared_checksums_reported_once(sums in prop::collection::vec(0usize..4, 1..10)) {
        let docs = sums
            .iter()
            .enumerate()
            .map(|(i, sum)| json!({
                "_id": format!("m-{}", i),
                "-type": ["measurement"],
                "-name": format!("m{}", i),
                "shasum": format!("sum{}", sum),
                "image": "",
                "-branch": [{"stack": [], "path": null, "child": 9999}]
            }))
            .collect();
        let report = notebook_with(docs).check_db(false).unwrap();

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for sum in &sums {
            *counts.entry(*sum).or_default() += 1;
        }
        let shared = counts.values().filter(|n| **n > 1).count();

        let duplicates: Vec<_> = report.with_code(CheckCode::ChecksumDuplicate).collect();
        prop_assert_eq!(duplicates.len(), shared);
        prop_assert!(duplicates.iter().all(|f| f.severity == Severity::Hard));
        prop_assert_eq!(report.with_code(CheckCode::MeasurementWithoutChecksum).count(), 0);
    }

    #[test]
    fn stack_path_mismatch_is_info(depth in 0usize..4, segments in 1usize..6) {
        let stack: Vec<String> = (0..depth).map(canonical).collect();
        let path: Vec<String> = (0..segments).map(|i| format!("dir{}", i)).collect();
        let doc = json!({
            "_id": "s-1",
            "-type": ["sample"],
            "-name": "s",
            "qrCode": [],
            "-branch": [{"stack": stack, "path": path.join("/"), "child": 9999}]
        });
        let report = notebook_with(vec![doc]).check_db(false).unwrap();

        let mismatches: Vec<_> = report.with_code(CheckCode::StackPathLength).collect();
        let expected = usize::from(segments != depth + 1);
        prop_assert_eq!(mismatches.len(), expected);
        prop_assert!(mismatches.iter().all(|f| f.severity == Severity::Info));
    }

    #[test]
    fn snapshot_restores_previous_values(
        weight in -1000i64..1000,
        new_weight in -1000i64..1000,
        name in "[a-z]{1,8}",
        new_name in "[a-z]{1,8}",
    ) {
        let notebook = notebook_with(vec![json!({
            "_id": "s-1",
            "-type": ["sample"],
            "-name": name,
            "weight": weight,
            "-branch": [{"stack": [], "path": null, "child": 9999}]
        })]);
        let id = DocumentId::new("s-1").unwrap();
        let change = DocumentChange::edit()
            .set("-name", json!(new_name))
            .set("weight", json!(new_weight));
        let outcome = notebook
            .update_doc(&id, &change, &CallerContext::default(), None)
            .unwrap();

        let unchanged = name == new_name && weight == new_weight;
        prop_assert_eq!(matches!(outcome, UpdateOutcome::Unchanged(_)), unchanged);
        if !unchanged {
            let history = notebook.history(&id).unwrap();
            prop_assert_eq!(history.len(), 1);
            let snapshot = history[0].1.as_object().cloned().unwrap();

            let current = notebook.get(&id).unwrap();
            let restored = RevisionArchiver::new(notebook.store())
                .restore(&current, &snapshot)
                .unwrap();
            prop_assert_eq!(restored.name.as_deref(), Some(name.as_str()));
            prop_assert_eq!(restored.extra.get("weight"), Some(&json!(weight)));
            prop_assert_eq!(restored.id, current.id);
        }
    }
}
