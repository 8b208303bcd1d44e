//! Fixed-size pages over the full record set.

use crate::{
    models::object_record::ObjectRecord,
    services::{error::SlicerResult, slicer_service::SlicerService},
};
use serde::Serialize;

pub const PAGE_SIZE: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page actually shown.
    pub page: usize,
    pub total_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// A listed record plus whether its container still exists.
#[derive(Debug, Clone, Serialize)]
pub struct ListingEntry {
    #[serde(flatten)]
    pub record: ObjectRecord,
    pub container_present: bool,
}

/// Slice `records` into pages of `page_size` and return page `page_number`.
///
/// Any out-of-range page number (including 0 and negatives) shows page 1.
pub fn page<T: Clone>(records: &[T], page_number: i64, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = records.len().div_ceil(page_size);
    let page = match usize::try_from(page_number) {
        Ok(n) if n >= 1 && n <= total_pages => n,
        _ => 1,
    };
    let items = records
        .chunks(page_size)
        .nth(page - 1)
        .map(<[T]>::to_vec)
        .unwrap_or_default();
    Page {
        items,
        page,
        total_pages,
        has_previous: page > 1,
        has_next: page < total_pages,
    }
}

impl SlicerService {
    /// Page `page_number` of every stored object, re-read on each call.
    pub async fn list_page(&self, page_number: i64) -> SlicerResult<Page<ListingEntry>> {
        let records = self.index.list_all().await?;
        let view = page(&records, page_number, PAGE_SIZE);

        let mut items = Vec::with_capacity(view.items.len());
        for record in view.items {
            let container_present = self
                .transport
                .find_container_by_id(&record.container_id)
                .await?
                .is_some();
            items.push(ListingEntry {
                record,
                container_present,
            });
        }
        Ok(Page {
            items,
            page: view.page,
            total_pages: view.total_pages,
            has_previous: view.has_previous,
            has_next: view.has_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        metadata::sqlite::tests::new_record, slicer_service::tests::test_service,
    };

    #[test]
    fn total_pages_is_ceiling_of_page_size() {
        for (k, expected) in [(0, 0), (1, 1), (8, 1), (9, 2), (17, 3)] {
            let records: Vec<usize> = (0..k).collect();
            assert_eq!(page(&records, 1, PAGE_SIZE).total_pages, expected, "k={k}");
        }
    }

    #[test]
    fn out_of_range_pages_clamp_to_first() {
        let records: Vec<usize> = (0..20).collect();
        let first: Vec<usize> = (0..8).collect();
        assert_eq!(page(&records, 0, PAGE_SIZE).items, first);
        assert_eq!(page(&records, 4, PAGE_SIZE).items, first);
        assert_eq!(page(&records, -3, PAGE_SIZE).page, 1);

        let last = page(&records, 3, PAGE_SIZE);
        assert_eq!(last.items, vec![16, 17, 18, 19]);
        assert!(last.has_previous);
        assert!(!last.has_next);
    }

    #[test]
    fn empty_set_yields_empty_first_page() {
        let view = page::<usize>(&[], 1, PAGE_SIZE);
        assert!(view.items.is_empty());
        assert_eq!(view.page, 1);
        assert!(!view.has_next);
    }

    #[tokio::test]
    async fn listing_reflects_changes_between_pages() {
        let (service, _tmp) = test_service(8).await;
        for i in 0..9 {
            service
                .index
                .insert(new_record(&format!("c{i}"), &format!("f{i}")))
                .await
                .unwrap();
        }
        let second = service.list_page(2).await.unwrap();
        assert_eq!(second.total_pages, 2);
        assert_eq!(second.items.len(), 1);
        assert!(!second.items[0].container_present);

        service.index.delete_by_container("c8").await.unwrap();
        let again = service.list_page(2).await.unwrap();
        assert_eq!(again.total_pages, 1);
        assert_eq!(again.page, 1);
        assert_eq!(again.items.len(), 8);
    }
}
