//! Tests for the sled-backed artifact cache

use inspection_features::cache::{ArtifactCache, SledArtifactCache};
use inspection_features::models::{FlattenedDocuments, LabelId, Role};
use inspection_features::PipelineError;
use tempfile::tempdir;

fn documents(entries: &[(&str, &str)]) -> FlattenedDocuments {
    FlattenedDocuments::from_ordered(
        entries
            .iter()
            .map(|(id, text)| (LabelId((*id).to_string()), (*text).to_string()))
            .collect(),
    )
}

#[test]
fn test_store_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let cache = SledArtifactCache::open(dir.path()).unwrap();
    let docs = documents(&[("L2", "second"), ("L1", ""), ("L3", "third one")]);

    cache.store(Role::Train, &docs).unwrap();
    let loaded = cache.load(Role::Train).unwrap();

    assert_eq!(loaded, docs);
    let ids: Vec<&str> = loaded.ids().map(|id| id.0.as_str()).collect();
    assert_eq!(ids, vec!["L2", "L1", "L3"]);
}

#[test]
fn test_missing_artifact_is_cache_miss() {
    let cache = SledArtifactCache::temporary().unwrap();

    assert!(!cache.contains(Role::Test).unwrap());
    assert!(cache.stored_at(Role::Test).unwrap().is_none());
    let err = cache.load(Role::Test).unwrap_err();
    assert!(matches!(err, PipelineError::CacheMiss(ref role) if role == "test"));
}

#[test]
fn test_roles_are_stored_separately() {
    let cache = SledArtifactCache::temporary().unwrap();
    let train = documents(&[("L1", "train text")]);
    let test = documents(&[("S1", "test text"), ("S2", "")]);

    cache.store(Role::Train, &train).unwrap();
    cache.store(Role::Test, &test).unwrap();

    assert_eq!(cache.load(Role::Train).unwrap(), train);
    assert_eq!(cache.load(Role::Test).unwrap(), test);
}

#[test]
fn test_store_replaces_previous_artifact() {
    let cache = SledArtifactCache::temporary().unwrap();
    cache.store(Role::Train, &documents(&[("L1", "old")])).unwrap();
    cache.store(Role::Train, &documents(&[("L1", "new"), ("L2", "")])).unwrap();

    let loaded = cache.load(Role::Train).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get(&LabelId("L1".to_string())), Some("new"));
}

#[test]
fn test_artifacts_survive_reopen() {
    let dir = tempdir().unwrap();
    let docs = documents(&[("L1", "persisted")]);
    {
        let cache = SledArtifactCache::open(dir.path()).unwrap();
        cache.store(Role::Test, &docs).unwrap();
        assert!(cache.stored_at(Role::Test).unwrap().is_some());
    }

    let cache = SledArtifactCache::open(dir.path()).unwrap();
    assert!(cache.contains(Role::Test).unwrap());
    assert_eq!(cache.load(Role::Test).unwrap(), docs);
}

#[test]
fn test_clear_removes_everything() {
    let cache = SledArtifactCache::temporary().unwrap();
    cache.store(Role::Train, &documents(&[("L1", "x")])).unwrap();

    cache.clear().unwrap();

    assert!(!cache.contains(Role::Train).unwrap());
}
