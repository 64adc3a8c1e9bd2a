//! The KV cache tool surface exposed to the agent (§6): thin, named
//! entry points over the Artifact Store's general `put`/`get`.

use std::collections::HashMap;

use ctxcore_core::{Artifact, ArtifactMetadata, Scope, StoreError};
use ctxcore_store::{AsType, ArtifactStore, RetrievedValue, ScopeStats};

const PROJECT_SUMMARY_KEY: &str = "project_summary";

fn instruction_key(tag: &str) -> String {
    format!("instruction_{tag}")
}

pub fn put_instruction(store: &ArtifactStore, tag: &str, content: &str, metadata: Option<ArtifactMetadata>) -> Result<(), StoreError> {
    store.put(Scope::Instructions, &instruction_key(tag), content.to_string(), None, metadata, Some("text/plain".to_string()))?;
    Ok(())
}

pub fn get_instruction(store: &ArtifactStore, tag: &str) -> Result<String, StoreError> {
    match store.get(Scope::Instructions, &instruction_key(tag), AsType::Str)? {
        RetrievedValue::Str(s) => Ok(s),
        _ => Err(StoreError::ValueError {
            key: instruction_key(tag),
            reason: "instruction value was not text".to_string(),
        }),
    }
}

pub fn list_instructions(store: &ArtifactStore) -> Result<Vec<String>, StoreError> {
    let artifacts = store.list_keys(Some(Scope::Instructions), None, false)?;
    Ok(artifacts
        .into_iter()
        .filter_map(|a| a.artifact_key.strip_prefix("instruction_").map(str::to_string))
        .collect())
}

pub fn put_artifact(
    store: &ArtifactStore,
    key: &str,
    value: impl Into<ctxcore_store::StoreValue>,
    ttl_hours: Option<i64>,
    metadata: Option<ArtifactMetadata>,
) -> Result<(), StoreError> {
    store.put(Scope::Artifacts, key, value, ttl_hours, metadata, None)?;
    Ok(())
}

pub fn get_artifact(store: &ArtifactStore, key: &str) -> Result<RetrievedValue, StoreError> {
    store.get(Scope::Artifacts, key, AsType::Auto)
}

pub fn put_project_summary(store: &ArtifactStore, summary: &str, metadata: Option<ArtifactMetadata>) -> Result<(), StoreError> {
    store.put(Scope::Project, PROJECT_SUMMARY_KEY, summary.to_string(), None, metadata, Some("text/plain".to_string()))?;
    Ok(())
}

pub fn get_project_summary(store: &ArtifactStore) -> Result<String, StoreError> {
    match store.get(Scope::Project, PROJECT_SUMMARY_KEY, AsType::Str)? {
        RetrievedValue::Str(s) => Ok(s),
        _ => Err(StoreError::ValueError {
            key: PROJECT_SUMMARY_KEY.to_string(),
            reason: "project summary value was not text".to_string(),
        }),
    }
}

pub fn get_cache_stats(store: &ArtifactStore, scope: Option<Scope>) -> Result<HashMap<Scope, ScopeStats>, StoreError> {
    store.get_stats(scope)
}

pub fn prune_cache(store: &ArtifactStore, scope: Option<Scope>) -> Result<HashMap<Scope, usize>, StoreError> {
    store.prune_expired(scope)
}

/// Not part of the exposed tool surface, but convenient for callers building
/// a planner catalog: the raw artifact records for a scope.
pub fn list_artifacts(store: &ArtifactStore, scope: Option<Scope>) -> Result<Vec<Artifact>, StoreError> {
    store.list_keys(scope, None, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn instruction_roundtrip_and_listing() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        put_instruction(&store, "coding_standards", "always write tests", None).unwrap();
        assert_eq!(get_instruction(&store, "coding_standards").unwrap(), "always write tests");
        assert_eq!(list_instructions(&store).unwrap(), vec!["coding_standards".to_string()]);
    }

    #[test]
    fn project_summary_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        put_project_summary(&store, "a summary of the project", None).unwrap();
        assert_eq!(get_project_summary(&store).unwrap(), "a summary of the project");
    }

    #[test]
    fn artifact_roundtrip_and_cache_stats() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        put_artifact(&store, "my_key", "some value", None, None).unwrap();
        let value = get_artifact(&store, "my_key").unwrap();
        assert_eq!(value, RetrievedValue::Str("some value".to_string()));

        let stats = get_cache_stats(&store, Some(Scope::Artifacts)).unwrap();
        assert_eq!(stats[&Scope::Artifacts].count, 1);
    }

    #[test]
    fn prune_cache_delegates_to_the_store() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        put_artifact(&store, "my_key", "some value", Some(-1), None).unwrap();
        let pruned = prune_cache(&store, Some(Scope::Artifacts)).unwrap();
        assert_eq!(pruned[&Scope::Artifacts], 1);
    }
}
