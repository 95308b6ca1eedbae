//! Smoke tests for the top-level re-exports

use pasta::{
    BranchChange, BranchOp, CallerContext, Document, EngineConfig, MemoryStore, Notebook,
    UpdateOutcome,
};
use serde_json::json;

#[test]
fn test_create_update_and_check_through_facade() {
    let notebook = Notebook::open(MemoryStore::new(), EngineConfig::default()).unwrap();
    let ctx = CallerContext::new("facade");

    let project = notebook
        .create_document(
            Document::new(vec!["x0".into()], "Project"),
            Some(&BranchChange::new(BranchOp::Create, vec![], Some("Project".into()), Some(0))),
            &ctx,
            None,
        )
        .unwrap();
    let id = project.id.clone().unwrap();
    assert!(id.is_canonical());

    let outcome = notebook
        .update_from_json(&id, json!({"-name": "Renamed"}), &ctx, None)
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Saved { .. }));
    assert_eq!(
        notebook.history(&id).unwrap(),
        vec![("v0.json".to_string(), json!({"-name": "Project"}))]
    );

    assert!(notebook.check_db(false).unwrap().is_clean());
}
