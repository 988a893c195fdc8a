//! Selection Query Builder: turns a [`ScopeSpec`] into the ordered,
//! deduplicated list of master-object ids the run will process.
//!
//! All scoping inputs are resolved here, before any mutation: an
//! unresolvable branch key or a malformed id file fails the whole run with a
//! [`ScopeError`]. The filter conjunction itself is delegated to
//! [`RecordStore::list_master_ids`], which owns the query semantics.

use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::contract::{ObjectId, RecordStore, SelectionFilter};
use crate::error::ScopeError;
use crate::scope::ScopeSpec;

/// Produce the ordered candidate list of master ids for the scope.
pub async fn select_masters<S>(store: &S, scope: &ScopeSpec) -> Result<Vec<ObjectId>, ScopeError>
where
    S: RecordStore,
{
    let filter = build_filter(store, scope).await?;

    let ids = store
        .list_master_ids(filter)
        .await
        .map_err(ScopeError::Store)?;

    info!(candidates = ids.len(), "Selected master objects");
    Ok(ids)
}

/// Resolve every scoping input into a [`SelectionFilter`].
pub async fn build_filter<S>(store: &S, scope: &ScopeSpec) -> Result<SelectionFilter, ScopeError>
where
    S: RecordStore,
{
    let bounds = match &scope.branch_root {
        Some(slug) => {
            let resolved = store
                .resolve_branch(slug.clone())
                .await
                .map_err(ScopeError::Store)?;
            match resolved {
                Some(bounds) => {
                    info!(slug = %slug, lft = bounds.lft, rgt = bounds.rgt, "Resolved branch root");
                    Some(bounds)
                }
                None => {
                    error!(slug = %slug, "Branch key does not resolve to a described item");
                    return Err(ScopeError::BranchNotFound { slug: slug.clone() });
                }
            }
        }
        None => None,
    };

    let id_allowlist = match &scope.id_file {
        Some(path) => Some(load_id_allowlist(path)?),
        None => None,
    };

    Ok(SelectionFilter {
        bounds,
        externals_only: scope.externals_only,
        id_allowlist,
        missing_derivatives_only: scope.missing_derivatives_only,
    })
}

/// Parse a JSON file containing a flat list of object ids.
fn load_id_allowlist(path: &Path) -> Result<Vec<ObjectId>, ScopeError> {
    let content = fs::read_to_string(path).map_err(|e| {
        error!(path = %path.display(), error = ?e, "Failed to read id file");
        ScopeError::IdFileRead {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    let ids: Vec<ObjectId> = serde_json::from_str(&content).map_err(|e| {
        error!(path = %path.display(), error = ?e, "Id file is not a JSON list of ids");
        ScopeError::IdFileFormat {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    info!(path = %path.display(), ids = ids.len(), "Loaded id allowlist");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{HierarchyBounds, MockRecordStore};
    use std::io::Write;

    #[tokio::test]
    async fn empty_scope_builds_empty_filter() {
        let store = MockRecordStore::new();
        let filter = build_filter(&store, &ScopeSpec::default()).await.unwrap();
        assert_eq!(filter, SelectionFilter::default());
    }

    #[tokio::test]
    async fn unresolvable_branch_key_is_fatal() {
        let mut store = MockRecordStore::new();
        store
            .expect_resolve_branch()
            .returning(|_| Ok(None));

        let scope = ScopeSpec {
            branch_root: Some("missing-fonds".into()),
            ..Default::default()
        };
        let err = build_filter(&store, &scope).await.unwrap_err();
        assert!(matches!(err, ScopeError::BranchNotFound { slug } if slug == "missing-fonds"));
    }

    #[tokio::test]
    async fn branch_key_resolves_to_bounds() {
        let mut store = MockRecordStore::new();
        store
            .expect_resolve_branch()
            .withf(|slug| slug == "fonds-a")
            .returning(|_| Ok(Some(HierarchyBounds { lft: 10, rgt: 21 })));

        let scope = ScopeSpec {
            branch_root: Some("fonds-a".into()),
            ..Default::default()
        };
        let filter = build_filter(&store, &scope).await.unwrap();
        assert_eq!(filter.bounds, Some(HierarchyBounds { lft: 10, rgt: 21 }));
    }

    #[tokio::test]
    async fn id_file_parses_json_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[5, 9]").unwrap();

        let store = MockRecordStore::new();
        let scope = ScopeSpec {
            id_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let filter = build_filter(&store, &scope).await.unwrap();
        assert_eq!(filter.id_allowlist, Some(vec![5, 9]));
    }

    #[tokio::test]
    async fn malformed_id_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"not\": \"a list\"}}").unwrap();

        let store = MockRecordStore::new();
        let scope = ScopeSpec {
            id_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = build_filter(&store, &scope).await.unwrap_err();
        assert!(matches!(err, ScopeError::IdFileFormat { .. }));
    }

    #[tokio::test]
    async fn missing_id_file_is_fatal() {
        let store = MockRecordStore::new();
        let scope = ScopeSpec {
            id_file: Some("/nonexistent/ids.json".into()),
            ..Default::default()
        };
        let err = build_filter(&store, &scope).await.unwrap_err();
        assert!(matches!(err, ScopeError::IdFileRead { .. }));
    }
}
