//! Derivative Regeneration Engine: the per-item delete-then-recreate
//! sequence.
//!
//! One master object is taken through an explicit phase sequence
//! (`Deleting -> Invoking -> Indexing`); a failure in any phase carries that
//! phase in the returned [`ItemError`] and aborts only this item. Each
//! item's deletions commit independently; there is no cross-item
//! transaction.

use tracing::{debug, info};

use crate::contract::{
    DerivativeCreator, DigitalObject, RecordStore, SearchIndex, TRANSCRIPT_PROPERTY,
};
use crate::error::{ItemError, Phase};
use crate::scope::DerivativeKind;

/// What one successful regeneration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenOutcome {
    pub derivatives_deleted: usize,
    pub transcripts_deleted: usize,
    pub derivatives_created: usize,
}

/// Regenerate the derivatives of one master object.
///
/// `update_index` is the run-level flag, resolved once from the top-level
/// options; the engine never re-derives it.
pub async fn regenerate<S, C, I>(
    store: &S,
    creator: &C,
    index: &I,
    master: &DigitalObject,
    kind: Option<DerivativeKind>,
    update_index: bool,
) -> Result<RegenOutcome, ItemError>
where
    S: RecordStore,
    C: DerivativeCreator,
    I: SearchIndex,
{
    let fail = |phase: Phase| {
        let object_id = master.id;
        move |source| ItemError {
            object_id,
            phase,
            source,
        }
    };

    // Phase 1: delete existing derivatives, full record deletes.
    let children = store
        .list_children(master.id)
        .await
        .map_err(fail(Phase::Deleting))?;
    let derivatives_deleted = children.len();
    for child in &children {
        debug!(master_id = master.id, child_id = child.id, usage = child.usage.as_str(),
            "Deleting stale derivative");
        store
            .delete_object(child.id)
            .await
            .map_err(fail(Phase::Deleting))?;
    }

    // Phase 1 continued: delete transcript properties orphaned with them.
    let properties = store
        .list_properties(master.id)
        .await
        .map_err(fail(Phase::Deleting))?;
    let mut transcripts_deleted = 0;
    for property in properties
        .iter()
        .filter(|p| p.name == TRANSCRIPT_PROPERTY)
    {
        debug!(master_id = master.id, property_id = property.id, "Deleting transcript property");
        store
            .delete_property(property.id)
            .await
            .map_err(fail(Phase::Deleting))?;
        transcripts_deleted += 1;
    }

    // Phase 2: hand the master to the media collaborator.
    let usage = DerivativeKind::to_usage(kind);
    let created = creator
        .create_derivatives(master.clone(), usage)
        .await
        .map_err(fail(Phase::Invoking))?;
    info!(
        master_id = master.id,
        name = %master.name,
        usage = usage.as_str(),
        created = created.len(),
        "Created derivatives"
    );

    // Phase 3: save-with-reindex, only when the run enabled index updates.
    if update_index {
        index
            .persist_and_index(master.clone())
            .await
            .map_err(fail(Phase::Indexing))?;
        debug!(master_id = master.id, "Persisted master with index refresh");
    }

    // Drop read caches so the rest of the run observes the new children.
    store.clear_caches().await;

    Ok(RegenOutcome {
        derivatives_deleted,
        transcripts_deleted,
        derivatives_created: created.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        MockDerivativeCreator, MockRecordStore, MockSearchIndex, PropertyRecord, UsageClass,
    };

    fn master() -> DigitalObject {
        DigitalObject {
            id: 7,
            information_object_id: 70,
            usage: UsageClass::Master,
            parent_id: None,
            name: "scan007.tif".into(),
            path: "masters/scan007.tif".into(),
        }
    }

    fn derivative(id: i64, usage: UsageClass) -> DigitalObject {
        DigitalObject {
            id,
            information_object_id: 70,
            usage,
            parent_id: Some(7),
            name: format!("scan007_{}.jpg", usage.as_str()),
            path: format!("derivatives/scan007_{}.jpg", usage.as_str()).into(),
        }
    }

    #[tokio::test]
    async fn deletes_children_and_transcripts_before_creating() {
        let mut store = MockRecordStore::new();
        store.expect_list_children().returning(|_| {
            Ok(vec![
                derivative(100, UsageClass::Reference),
                derivative(101, UsageClass::Thumbnail),
            ])
        });
        store
            .expect_delete_object()
            .times(2)
            .returning(|_| Ok(()));
        store.expect_list_properties().returning(|_| {
            Ok(vec![
                PropertyRecord {
                    id: 1,
                    object_id: 7,
                    name: "transcript".into(),
                    value: "extracted text".into(),
                },
                PropertyRecord {
                    id: 2,
                    object_id: 7,
                    name: "checksum".into(),
                    value: "abc".into(),
                },
            ])
        });
        // Only the transcript property goes; the checksum stays.
        store
            .expect_delete_property()
            .withf(|id| *id == 1)
            .times(1)
            .returning(|_| Ok(()));
        store.expect_clear_caches().times(1).return_const(());

        let mut creator = MockDerivativeCreator::new();
        creator
            .expect_create_derivatives()
            .withf(|_, usage| *usage == UsageClass::Master)
            .returning(|_, _| {
                Ok(vec![
                    derivative(200, UsageClass::Reference),
                    derivative(201, UsageClass::Thumbnail),
                ])
            });

        let index = MockSearchIndex::new();

        let outcome = regenerate(&store, &creator, &index, &master(), None, false)
            .await
            .unwrap();
        assert_eq!(outcome.derivatives_deleted, 2);
        assert_eq!(outcome.transcripts_deleted, 1);
        assert_eq!(outcome.derivatives_created, 2);
    }

    #[tokio::test]
    async fn kind_maps_to_requested_usage() {
        let mut store = MockRecordStore::new();
        store.expect_list_children().returning(|_| Ok(vec![]));
        store.expect_list_properties().returning(|_| Ok(vec![]));
        store.expect_clear_caches().return_const(());

        let mut creator = MockDerivativeCreator::new();
        creator
            .expect_create_derivatives()
            .withf(|_, usage| *usage == UsageClass::Thumbnail)
            .returning(|_, _| Ok(vec![derivative(200, UsageClass::Thumbnail)]));

        let index = MockSearchIndex::new();

        let outcome = regenerate(
            &store,
            &creator,
            &index,
            &master(),
            Some(DerivativeKind::Thumbnail),
            false,
        )
        .await
        .unwrap();
        assert_eq!(outcome.derivatives_created, 1);
    }

    #[tokio::test]
    async fn index_refresh_only_when_enabled() {
        let mut store = MockRecordStore::new();
        store.expect_list_children().returning(|_| Ok(vec![]));
        store.expect_list_properties().returning(|_| Ok(vec![]));
        store.expect_clear_caches().return_const(());

        let mut creator = MockDerivativeCreator::new();
        creator
            .expect_create_derivatives()
            .returning(|_, _| Ok(vec![]));

        let mut index = MockSearchIndex::new();
        index
            .expect_persist_and_index()
            .times(1)
            .returning(|_| Ok(()));

        regenerate(&store, &creator, &index, &master(), None, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creator_failure_carries_invoking_phase() {
        let mut store = MockRecordStore::new();
        store.expect_list_children().returning(|_| Ok(vec![]));
        store.expect_list_properties().returning(|_| Ok(vec![]));

        let mut creator = MockDerivativeCreator::new();
        creator
            .expect_create_derivatives()
            .returning(|_, _| Err("unsupported media type".into()));

        let index = MockSearchIndex::new();

        let err = regenerate(&store, &creator, &index, &master(), None, false)
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Invoking);
        assert_eq!(err.object_id, 7);
    }

    #[tokio::test]
    async fn delete_failure_carries_deleting_phase() {
        let mut store = MockRecordStore::new();
        store
            .expect_list_children()
            .returning(|_| Ok(vec![derivative(100, UsageClass::Reference)]));
        store
            .expect_delete_object()
            .returning(|_| Err("record store unavailable".into()));

        let creator = MockDerivativeCreator::new();
        let index = MockSearchIndex::new();

        let err = regenerate(&store, &creator, &index, &master(), None, false)
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Deleting);
    }
}
