//! Keyset pagination engine.
//!
//! One implementation serves every growing collection: callers supply the
//! scoping filter and fetch `limit + 1` rows ordered by
//! `(updated_at desc, id desc)` starting just after the cursor row; the
//! engine trims the probe row and derives the next cursor from the last
//! row actually returned. Comparisons are always relative to the last seen
//! row, never an offset, so concurrent inserts ahead of the boundary can
//! neither duplicate nor skip rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vido_models::Cursor;

use crate::types::{Filter, Order, QueryCursor, StructuredQuery, Value};

/// Pagination limits.
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Primary sort field for every paginated collection.
pub const SORT_FIELD: &str = "updated_at";
/// Tie-break field.
pub const TIE_FIELD: &str = "id";

/// Clamp a requested page size into the allowed range.
pub fn clamp_limit(limit: Option<u32>) -> usize {
    limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE) as usize
}

/// A row that can anchor a cursor.
pub trait PageItem {
    fn sort_value(&self) -> DateTime<Utc>;
    fn tie_id(&self) -> &str;
}

/// One page of a traversal.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Anchor of the next page; `None` once the collection is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl<T: PageItem> Page<T> {
    /// Assemble a page from a `limit + 1` probe fetch.
    ///
    /// `rows` must already be keyset-filtered (strictly after the cursor)
    /// and ordered `(sort desc, tie desc)`. An extra row proves more pages
    /// exist; it is dropped and the next cursor anchors on the last kept
    /// row.
    pub fn assemble(mut rows: Vec<T>, limit: usize) -> Page<T> {
        let has_more = rows.len() > limit;
        if has_more {
            rows.truncate(limit);
        }

        let next_cursor = if has_more {
            rows.last()
                .map(|last| Cursor::new(last.sort_value(), last.tie_id()))
        } else {
            None
        };

        Page {
            items: rows,
            next_cursor,
        }
    }
}

/// Build the structured query for one page fetch.
///
/// The `start_at` cursor over `(updated_at, id)` with `before = false` is
/// the query-plan form of the boundary predicate
/// `sort < c.sort OR (sort == c.sort AND tie < c.tie)` under descending
/// order on both fields (see [`Cursor::matches`]).
pub fn page_query(
    collection: &str,
    scope: Option<Filter>,
    cursor: Option<&Cursor>,
    limit: usize,
) -> StructuredQuery {
    StructuredQuery {
        from: vec![crate::types::CollectionSelector {
            collection_id: collection.to_string(),
            all_descendants: None,
        }],
        filter: scope,
        order_by: Some(vec![Order::desc(SORT_FIELD), Order::desc(TIE_FIELD)]),
        start_at: cursor.map(|c| QueryCursor {
            values: vec![
                Value::timestamp(c.sort_value),
                Value::string(c.tie_id.clone()),
            ],
            before: Some(false),
        }),
        // Probe row on top of the page size
        limit: Some(limit as i32 + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        updated_at: DateTime<Utc>,
    }

    impl PageItem for Row {
        fn sort_value(&self) -> DateTime<Utc> {
            self.updated_at
        }
        fn tie_id(&self) -> &str {
            self.id
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn row(id: &'static str, secs: i64) -> Row {
        Row {
            id,
            updated_at: ts(secs),
        }
    }

    /// In-memory equivalent of the store-side fetch: keyset filter, order
    /// (sort desc, tie desc), probe `limit + 1`.
    fn fetch(rows: &[Row], cursor: Option<&Cursor>, limit: usize) -> Vec<Row> {
        let mut matching: Vec<Row> = rows
            .iter()
            .filter(|r| match cursor {
                Some(c) => c.matches(r.updated_at, r.id),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(a.id))
        });
        matching.truncate(limit + 1);
        matching
    }

    #[test]
    fn test_two_page_walk() {
        // (5,"c"), (5,"b"), (4,"a") with limit 2
        let rows = vec![row("c", 5), row("b", 5), row("a", 4)];

        let first = Page::assemble(fetch(&rows, None, 2), 2);
        assert_eq!(
            first.items.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec!["c", "b"]
        );
        let cursor = first.next_cursor.expect("more pages");
        assert_eq!(cursor, Cursor::new(ts(5), "b"));

        let second = Page::assemble(fetch(&rows, Some(&cursor), 2), 2);
        assert_eq!(
            second.items.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec!["a"]
        );
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn test_exact_page_boundary_has_no_cursor() {
        let rows = vec![row("b", 2), row("a", 1)];
        let page = Page::assemble(fetch(&rows, None, 2), 2);
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_empty_collection_is_not_an_error() {
        let page = Page::assemble(fetch(&[], None, 10), 10);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_total_order_across_pages() {
        let rows: Vec<Row> = vec![
            row("f", 9),
            row("e", 9),
            row("d", 7),
            row("c", 7),
            row("b", 7),
            row("a", 3),
        ];

        let mut cursor: Option<Cursor> = None;
        let mut pages = Vec::new();
        loop {
            let page = Page::assemble(fetch(&rows, cursor.as_ref(), 2), 2);
            let done = page.next_cursor.is_none();
            pages.push(page.items.clone());
            cursor = page.next_cursor;
            if done {
                break;
            }
        }

        // max sort key of page n+1 is strictly below min of page n (ties by id)
        for window in pages.windows(2) {
            let last_prev = window[0].last().unwrap();
            let first_next = window[1].first().unwrap();
            let prev_key = (last_prev.updated_at, last_prev.id);
            let next_key = (first_next.updated_at, first_next.id);
            assert!(next_key < prev_key);
        }
    }

    #[test]
    fn test_completeness_no_duplicates_no_omissions() {
        let rows: Vec<Row> = (0..23)
            .map(|i| Row {
                id: Box::leak(format!("id_{:02}", i).into_boxed_str()),
                updated_at: ts(100 - (i as i64 % 5)),
            })
            .collect();

        let mut seen = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = Page::assemble(fetch(&rows, cursor.as_ref(), 4), 4);
            seen.extend(page.items.iter().map(|r| r.id.to_string()));
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        let mut expected: Vec<String> = rows.iter().map(|r| r.id.to_string()).collect();
        expected.sort();
        let mut got = seen.clone();
        got.sort();
        assert_eq!(got, expected);
        assert_eq!(seen.len(), rows.len());
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(None), 25);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(100)), 100);
        assert_eq!(clamp_limit(Some(5000)), 100);
    }

    #[test]
    fn test_page_query_shape() {
        let cursor = Cursor::new(ts(5), "b");
        let query = page_query("videos", None, Some(&cursor), 2);
        assert_eq!(query.limit, Some(3));
        let start_at = query.start_at.unwrap();
        assert_eq!(start_at.before, Some(false));
        assert_eq!(start_at.values.len(), 2);
    }
}
