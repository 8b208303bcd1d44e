//! Behaviour every `MetadataIndex` backend must share.
//!
//! Each check takes a `tag` that prefixes container ids and base names so the
//! checks can run against a persistent database shared between test runs.

use super::MetadataIndex;
use crate::{models::object_record::NewObjectRecord, services::error::SlicerError};

pub(crate) fn new_record(container_id: &str, base_name: &str) -> NewObjectRecord {
    NewObjectRecord {
        owner_id: "owner-1".into(),
        container_id: container_id.into(),
        base_name: base_name.into(),
        extension: "bin".into(),
        size_label: "20.00 MB".into(),
        part_count: 3,
    }
}

pub(crate) async fn ids_increase(index: &dyn MetadataIndex, tag: &str) {
    let first = index.insert(new_record(&format!("{tag}-c1"), "alpha")).await.unwrap();
    let second = index.insert(new_record(&format!("{tag}-c2"), "beta")).await.unwrap();
    assert!(second.object_id > first.object_id);
    assert_eq!(second.part_count, Some(3));
    assert_ne!(first.record_id, second.record_id);
}

pub(crate) async fn concurrent_inserts_get_distinct_ids(index: &dyn MetadataIndex, tag: &str) {
    let (a, b) = tokio::join!(
        index.insert(new_record(&format!("{tag}-left"), "left")),
        index.insert(new_record(&format!("{tag}-right"), "right")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.object_id, b.object_id);
    assert_eq!(
        index.find_container_by_object_id(a.object_id).await.unwrap(),
        Some(a.container_id)
    );
    assert_eq!(
        index.find_container_by_object_id(b.object_id).await.unwrap(),
        Some(b.container_id)
    );
}

pub(crate) async fn lookups_report_absence(index: &dyn MetadataIndex, tag: &str) {
    let missing = format!("{tag}-nope");
    assert!(index.find_by_container(&missing).await.unwrap().is_none());
    assert!(index.find_container_by_object_id(-1).await.unwrap().is_none());
    assert!(index.find_container_by_base_name(&missing).await.unwrap().is_none());
    assert!(
        index
            .find_container_by_container_id(&missing)
            .await
            .unwrap()
            .is_none()
    );
    assert!(!index.delete_by_container(&missing).await.unwrap());
}

pub(crate) async fn lookups_resolve(index: &dyn MetadataIndex, tag: &str) {
    let container = format!("{tag}-c1");
    let base = format!("{tag}-report");
    let rec = index.insert(new_record(&container, &base)).await.unwrap();

    assert_eq!(
        index.find_container_by_object_id(rec.object_id).await.unwrap(),
        Some(container.clone())
    );
    assert_eq!(
        index.find_container_by_base_name(&base).await.unwrap(),
        Some(container.clone())
    );
    assert_eq!(
        index.find_container_by_container_id(&container).await.unwrap(),
        Some(container.clone())
    );
    assert_eq!(index.find_by_container(&container).await.unwrap(), Some(rec));
}

pub(crate) async fn base_name_returns_first_match(index: &dyn MetadataIndex, tag: &str) {
    let base = format!("{tag}-report");
    let first = format!("{tag}-c1");
    index.insert(new_record(&first, &base)).await.unwrap();
    index.insert(new_record(&format!("{tag}-c2"), &base)).await.unwrap();
    assert_eq!(
        index.find_container_by_base_name(&base).await.unwrap(),
        Some(first)
    );
}

pub(crate) async fn second_record_for_container_is_rejected(index: &dyn MetadataIndex, tag: &str) {
    let container = format!("{tag}-c1");
    let original = index.insert(new_record(&container, "report")).await.unwrap();
    let err = index.insert(new_record(&container, "other")).await.unwrap_err();
    assert!(matches!(err, SlicerError::DuplicateObject(_)));
    assert_eq!(index.find_by_container(&container).await.unwrap(), Some(original));
}

pub(crate) async fn delete_reports_removal(index: &dyn MetadataIndex, tag: &str) {
    let container = format!("{tag}-c1");
    index.insert(new_record(&container, "report")).await.unwrap();
    assert!(index.delete_by_container(&container).await.unwrap());
    assert!(!index.delete_by_container(&container).await.unwrap());
    assert!(index.find_by_container(&container).await.unwrap().is_none());
}

/// Every check above, each under its own sub-tag.
pub(crate) async fn run_all(index: &dyn MetadataIndex, tag: &str) {
    ids_increase(index, &format!("{tag}-ids")).await;
    concurrent_inserts_get_distinct_ids(index, &format!("{tag}-concurrent")).await;
    lookups_report_absence(index, &format!("{tag}-absent")).await;
    lookups_resolve(index, &format!("{tag}-resolve")).await;
    base_name_returns_first_match(index, &format!("{tag}-first")).await;
    second_record_for_container_is_rejected(index, &format!("{tag}-dup")).await;
    delete_reports_removal(index, &format!("{tag}-delete")).await;
}
