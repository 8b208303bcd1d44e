//! Token resolution: numeric object id, then filename, then container name.

use crate::services::{error::SlicerResult, metadata::MetadataIndex, transport::Transport};
use std::path::Path;
use tracing::debug;

/// Resolve `token` to the container id of a stored object.
///
/// Tried in order, first match wins:
/// 1. all-digit tokens as an `object_id`;
/// 2. the token's file stem (path and extension stripped) as a base name;
/// 3. a live container literally named `token` inside the grouping
///    container (created if absent), confirmed against the index.
pub async fn resolve(
    index: &dyn MetadataIndex,
    transport: &dyn Transport,
    token: &str,
    grouping_name: &str,
) -> SlicerResult<Option<String>> {
    if let Some(object_id) = parse_object_id(token) {
        if let Some(container_id) = index.find_container_by_object_id(object_id).await? {
            debug!(token, %container_id, "resolved by object id");
            return Ok(Some(container_id));
        }
    }

    if let Some(base_name) = bare_name(token) {
        if let Some(container_id) = index.find_container_by_base_name(base_name).await? {
            debug!(token, %container_id, "resolved by filename");
            return Ok(Some(container_id));
        }
    }

    let grouping = transport.ensure_grouping(grouping_name).await?;
    if let Some(container) = transport
        .find_container_by_name(&grouping.id, token)
        .await?
    {
        let found = index.find_container_by_container_id(&container.id).await?;
        if found.is_some() {
            debug!(token, container_id = %container.id, "resolved by container name");
        }
        return Ok(found);
    }

    Ok(None)
}

fn parse_object_id(token: &str) -> Option<i64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// `dir/report.final.pdf` -> `report.final`.
fn bare_name(token: &str) -> Option<&str> {
    Path::new(token).file_stem().and_then(|stem| stem.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::object_record::NewObjectRecord,
        services::{
            metadata::sqlite::tests::{memory_index, new_record},
            transport::local::LocalTransport,
        },
    };
    use tempfile::tempdir;

    #[test]
    fn only_all_digit_tokens_are_ids() {
        assert_eq!(parse_object_id("7"), Some(7));
        assert_eq!(parse_object_id("007"), Some(7));
        assert_eq!(parse_object_id("7a"), None);
        assert_eq!(parse_object_id("-7"), None);
        assert_eq!(parse_object_id(""), None);
        assert_eq!(parse_object_id("99999999999999999999999"), None);
    }

    #[test]
    fn bare_name_strips_path_and_extension() {
        assert_eq!(bare_name("report"), Some("report"));
        assert_eq!(bare_name("report.pdf"), Some("report"));
        assert_eq!(bare_name("/home/me/report.pdf"), Some("report"));
        assert_eq!(bare_name("archive.tar.gz"), Some("archive.tar"));
    }

    #[tokio::test]
    async fn numeric_id_takes_precedence_over_names() {
        let tmp = tempdir().unwrap();
        let transport = LocalTransport::new(tmp.path());
        let index = memory_index().await;
        let grouping = transport.ensure_grouping("UPLOAD").await.unwrap();

        // Object ids 1..=7; id 7 is "report".
        for i in 1..7 {
            index
                .insert(new_record(&format!("filler-{i}"), &format!("f{i}")))
                .await
                .unwrap();
        }
        let report = transport.create_container(&grouping.id, "report").await.unwrap();
        let rec = index.insert(new_record(&report.id, "report")).await.unwrap();
        assert_eq!(rec.object_id, 7);

        // A different object whose name and container are literally "7".
        let seven = transport.create_container(&grouping.id, "7").await.unwrap();
        index.insert(new_record(&seven.id, "7")).await.unwrap();

        let resolved = resolve(&index, &transport, "7", "UPLOAD").await.unwrap();
        assert_eq!(resolved, Some(report.id));
    }

    #[tokio::test]
    async fn falls_back_to_filename_then_container_name() {
        let tmp = tempdir().unwrap();
        let transport = LocalTransport::new(tmp.path());
        let index = memory_index().await;
        let grouping = transport.ensure_grouping("UPLOAD").await.unwrap();

        let by_name = transport.create_container(&grouping.id, "my-notes").await.unwrap();
        index
            .insert(NewObjectRecord {
                base_name: "My Notes".into(),
                ..new_record(&by_name.id, "")
            })
            .await
            .unwrap();

        assert_eq!(
            resolve(&index, &transport, "/tmp/My Notes.txt", "UPLOAD")
                .await
                .unwrap(),
            Some(by_name.id.clone())
        );
        assert_eq!(
            resolve(&index, &transport, "my-notes", "UPLOAD").await.unwrap(),
            Some(by_name.id)
        );
    }

    #[tokio::test]
    async fn container_without_record_does_not_resolve() {
        let tmp = tempdir().unwrap();
        let transport = LocalTransport::new(tmp.path());
        let index = memory_index().await;

        assert_eq!(
            resolve(&index, &transport, "orphan", "UPLOAD").await.unwrap(),
            None
        );
        // The grouping container is created on the way.
        let grouping = transport.find_grouping("UPLOAD").await.unwrap().unwrap();

        transport.create_container(&grouping.id, "orphan").await.unwrap();
        assert_eq!(
            resolve(&index, &transport, "orphan", "UPLOAD").await.unwrap(),
            None
        );
    }
}
