//! Length-aware page envelope and its navigation links.

use serde::Serialize;
use url::form_urlencoded;

use super::filters::ListQuery;

/// Pages shown on each side of the current page in the link window.
const ON_EACH_SIDE: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub page: Option<u64>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub path: String,
    pub prev_page_url: Option<String>,
    pub next_page_url: Option<String>,
    pub links: Vec<PageLink>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, query: &ListQuery, path: &str) -> Self {
        let per_page = query.per_page.max(1);
        let current_page = query.page.max(1);
        let last_page = total.div_ceil(per_page).max(1);

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = query.offset() + 1;
            (Some(from), Some(from + data.len() as u64 - 1))
        };

        let url_for = |page: u64| page_url(path, query, page);
        let prev_page_url = (current_page > 1).then(|| url_for(current_page - 1));
        let next_page_url = (current_page < last_page).then(|| url_for(current_page + 1));

        let mut links = Vec::new();
        links.push(PageLink {
            url: prev_page_url.clone(),
            label: "« Previous".into(),
            page: (current_page > 1).then(|| current_page - 1),
            active: false,
        });
        for element in window(current_page, last_page) {
            match element {
                Some(page) => links.push(PageLink {
                    url: Some(url_for(page)),
                    label: page.to_string(),
                    page: Some(page),
                    active: page == current_page,
                }),
                None => links.push(PageLink {
                    url: None,
                    label: "...".into(),
                    page: None,
                    active: false,
                }),
            }
        }
        links.push(PageLink {
            url: next_page_url.clone(),
            label: "Next »".into(),
            page: (current_page < last_page).then(|| current_page + 1),
            active: false,
        });

        Self {
            data,
            total,
            current_page,
            last_page,
            per_page,
            from,
            to,
            path: path.to_string(),
            prev_page_url,
            next_page_url,
            links,
        }
    }
}

fn page_url(path: &str, query: &ListQuery, page: u64) -> String {
    let qs = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.to_query_pairs(page))
        .finish();
    format!("{path}?{qs}")
}

/// Page numbers to render; `None` marks a `...` gap.
fn window(current: u64, last: u64) -> Vec<Option<u64>> {
    let range = |from: u64, to: u64| (from..=to).map(Some).collect::<Vec<_>>();

    if last < ON_EACH_SIDE * 2 + 8 {
        return range(1, last);
    }

    let edge = ON_EACH_SIDE + 4;
    let mut out;
    if current <= edge {
        out = range(1, edge + ON_EACH_SIDE);
        out.push(None);
        out.extend(range(last - 1, last));
    } else if current > last - edge {
        out = range(1, 2);
        out.push(None);
        out.extend(range(last - (edge + ON_EACH_SIDE - 1), last));
    } else {
        out = range(1, 2);
        out.push(None);
        out.extend(range(current - ON_EACH_SIDE, current + ON_EACH_SIDE));
        out.push(None);
        out.extend(range(last - 1, last));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListingConfig;
    use crate::users::filters::RawFilters;

    fn query(page: u64, per_page: u64) -> ListQuery {
        let raw = RawFilters {
            per_page: Some(per_page.to_string()),
            page: Some(page.to_string()),
            ..Default::default()
        };
        ListQuery::from_raw(&raw, &ListingConfig::default())
    }

    fn labels(page: &Page<u32>) -> Vec<String> {
        page.links.iter().map(|l| l.label.clone()).collect()
    }

    #[test]
    fn first_page_metadata() {
        let page = Page::new(vec![1_u32; 50], 60, &query(1, 50), "/user-management");
        assert_eq!(page.total, 60);
        assert_eq!(page.per_page, 50);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.from, Some(1));
        assert_eq!(page.to, Some(50));
        assert!(page.prev_page_url.is_none());
        assert_eq!(
            page.next_page_url.as_deref(),
            Some("/user-management?sort_by=created_at&sort_direction=desc&per_page=50&page=2")
        );
        assert_eq!(labels(&page), vec!["« Previous", "1", "2", "Next »"]);
        assert!(page.links[1].active);
        assert!(!page.links[2].active);
    }

    #[test]
    fn last_partial_page_metadata() {
        let page = Page::new(vec![1_u32; 10], 60, &query(2, 50), "/user-management");
        assert_eq!(page.from, Some(51));
        assert_eq!(page.to, Some(60));
        assert!(page.next_page_url.is_none());
        assert_eq!(page.links.last().unwrap().url, None);
        assert_eq!(page.links[0].page, Some(1));
    }

    #[test]
    fn empty_result_has_one_page_and_no_range() {
        let page: Page<u32> = Page::new(vec![], 0, &query(1, 50), "/user-management");
        assert_eq!(page.last_page, 1);
        assert_eq!(page.from, None);
        assert_eq!(page.to, None);
        assert_eq!(labels(&page), vec!["« Previous", "1", "Next »"]);
    }

    #[test]
    fn past_the_end_page_is_empty_but_consistent() {
        let page: Page<u32> = Page::new(vec![], 5, &query(9, 10), "/user-management");
        assert_eq!(page.current_page, 9);
        assert_eq!(page.last_page, 1);
        assert!(page.next_page_url.is_none());
        assert!(page.prev_page_url.is_some());
    }

    #[test]
    fn search_is_encoded_in_links() {
        let raw = RawFilters {
            search: Some("New User".into()),
            ..Default::default()
        };
        let q = ListQuery::from_raw(&raw, &ListingConfig::default());
        let page = Page::new(vec![1_u32], 1, &q, "/user-management");
        assert_eq!(
            page.links[1].url.as_deref(),
            Some("/user-management?search=New+User&sort_by=created_at&sort_direction=desc&per_page=50&page=1")
        );
    }

    #[test]
    fn small_page_counts_list_every_page() {
        let w = window(5, 13);
        assert_eq!(w, (1..=13).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn window_near_beginning() {
        let w = window(2, 30);
        let mut expected: Vec<Option<u64>> = (1..=10).map(Some).collect();
        expected.push(None);
        expected.extend([Some(29), Some(30)]);
        assert_eq!(w, expected);
    }

    #[test]
    fn window_near_end() {
        let w = window(28, 30);
        let mut expected = vec![Some(1), Some(2), None];
        expected.extend((21..=30).map(Some));
        assert_eq!(w, expected);
    }

    #[test]
    fn window_in_the_middle() {
        let w = window(15, 30);
        let mut expected = vec![Some(1), Some(2), None];
        expected.extend((12..=18).map(Some));
        expected.extend([None, Some(29), Some(30)]);
        assert_eq!(w, expected);
    }
}
