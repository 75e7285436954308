use std::sync::Arc;

use fedcatalog::{
    AccessRule, DescriptorStore, DuckdbDescriptorStore, HardFilters, MockEmbedding,
    SemanticRegistry, SensitivityClass, SourceDescriptor,
};
use tempfile::tempdir;

fn unit_vector(dim: usize, hot_index: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot_index] = 1.0;
    v
}

fn descriptor(urn: &str, geography: &str, class: SensitivityClass) -> SourceDescriptor {
    SourceDescriptor::new(
        urn,
        urn,
        "quarterly revenue by region",
        "sse://sources.test/q",
        geography,
        class,
        "finance",
        AccessRule::attribute("subject.location == object.geography"),
    )
    .with_acls(vec!["finance".to_string()])
    .with_attribute("retention_days", 30)
}

#[tokio::test]
async fn duckdb_descriptor_store_ranks_by_cosine_distance() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbDescriptorStore::new(&dir.path().join("catalog.duckdb"), 8).expect("open");

    store
        .upsert(&descriptor("urn:a", "EU", SensitivityClass::Internal).with_embedding(unit_vector(8, 0)))
        .await
        .expect("upsert a");
    store
        .upsert(&descriptor("urn:b", "EU", SensitivityClass::Internal).with_embedding(unit_vector(8, 1)))
        .await
        .expect("upsert b");

    let results = store
        .search(&unit_vector(8, 1), &HardFilters::new(), 10)
        .await
        .expect("search");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.urn(), "urn:b");
    assert!(results[0].1 < 1e-5, "identical vectors have zero distance");
    assert!((results[1].1 - 1.0).abs() < 1e-5, "orthogonal vectors have distance one");

    let stored = &results[0].0;
    assert_eq!(stored.acls(), ["finance".to_string()]);
    assert_eq!(stored.attributes()["retention_days"], 30);
    assert_eq!(stored.embedding(), unit_vector(8, 1).as_slice());
}

#[tokio::test]
async fn duckdb_descriptor_store_applies_hard_filters_and_limit() {
    let store = DuckdbDescriptorStore::in_memory(4).expect("open");
    let v = unit_vector(4, 0);
    for (urn, geography, class) in [
        ("urn:eu-internal", "EU", SensitivityClass::Internal),
        ("urn:eu-locked", "EU", SensitivityClass::RegulatedLocked),
        ("urn:us-internal", "US", SensitivityClass::Internal),
        ("urn:eu-public", "EU", SensitivityClass::Public),
    ] {
        store
            .upsert(&descriptor(urn, geography, class).with_embedding(v.clone()))
            .await
            .expect("upsert");
    }

    let filters = HardFilters::new()
        .with_geography("EU")
        .excluding_sensitivity(SensitivityClass::RegulatedLocked);
    let results = store.search(&v, &filters, 10).await.expect("search");
    let urns: Vec<&str> = results.iter().map(|(d, _)| d.urn()).collect();

    // Equal distances fall back to urn order.
    assert_eq!(urns, vec!["urn:eu-internal", "urn:eu-public"]);

    let limited = store.search(&v, &filters, 1).await.expect("search");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].0.urn(), "urn:eu-internal");
}

#[tokio::test]
async fn duckdb_descriptor_store_upsert_replaces_and_delete_reports() {
    let store = DuckdbDescriptorStore::in_memory(4).expect("open");
    let first = descriptor("urn:a", "EU", SensitivityClass::Internal).with_embedding(unit_vector(4, 0));
    let second = descriptor("urn:a", "US", SensitivityClass::Public).with_embedding(unit_vector(4, 2));

    store.upsert(&first).await.expect("upsert");
    store.upsert(&second).await.expect("upsert");

    assert_eq!(store.count().await.expect("count"), 1);
    let stored = store.get("urn:a").await.expect("get").expect("present");
    assert_eq!(stored.geography(), "US");
    assert_eq!(stored.sensitivity_class(), SensitivityClass::Public);

    assert!(store.delete("urn:a").await.expect("delete"));
    assert!(!store.delete("urn:a").await.expect("delete again"));
    assert!(store.get("urn:a").await.expect("get").is_none());
    assert!(store.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn duckdb_descriptor_store_rejects_wrong_vector_width() {
    let store = DuckdbDescriptorStore::in_memory(4).expect("open");

    let err = store
        .upsert(&descriptor("urn:a", "EU", SensitivityClass::Internal).with_embedding(unit_vector(3, 0)))
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn duckdb_descriptor_store_persists_and_checks_dimensions_on_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("catalog.duckdb");

    {
        let store = DuckdbDescriptorStore::new(&path, 4).expect("open");
        store
            .upsert(&descriptor("urn:a", "EU", SensitivityClass::Internal).with_embedding(unit_vector(4, 0)))
            .await
            .expect("upsert");
    }

    let reopened = DuckdbDescriptorStore::new(&path, 4).expect("reopen");
    assert_eq!(reopened.count().await.expect("count"), 1);
    drop(reopened);

    let err = DuckdbDescriptorStore::new(&path, 8).err().expect("dimension mismatch");
    assert!(err.is_storage_error());
}

#[tokio::test]
async fn registry_over_duckdb_finds_registered_sources() {
    let store = Arc::new(DuckdbDescriptorStore::in_memory(384).expect("open"));
    let registry = SemanticRegistry::new(store, Arc::new(MockEmbedding::new()));

    registry
        .register(descriptor("urn:revenue", "EU", SensitivityClass::Internal))
        .await
        .expect("register");

    let candidates = registry
        .find_candidates("revenue by region", &HardFilters::new(), 5)
        .await
        .expect("candidates");

    assert_eq!(candidates.urns(), vec!["urn:revenue"]);
}
