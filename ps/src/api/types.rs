//! Request and response types for the itinerary API

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort order: {}. Valid: asc, desc", s)),
        }
    }
}

/// Paging and filtering for `GET /plans`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            sort: None,
            order: None,
        }
    }
}

impl ListQuery {
    /// Query-string pairs; blank search and sort values are left out
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.max(1).to_string()), ("limit", self.limit.max(1).to_string())];
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            pairs.push(("search", search.to_string()));
        }
        if let Some(sort) = self.sort.as_deref().map(str::trim)
            && !sort.is_empty()
        {
            pairs.push(("sort", sort.to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.to_string()));
        }
        pairs
    }
}

/// One row of a plan listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub destination: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
}

/// A page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page<T> {
    #[serde(alias = "items", alias = "plans")]
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl<T> Page<T> {
    /// Number of pages at this limit
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.page_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_pairs() {
        let pairs = ListQuery::default().pairs();
        assert_eq!(pairs, vec![("page", "1".to_string()), ("limit", "10".to_string())]);
    }

    #[test]
    fn test_query_pairs_skip_blank_search() {
        let query = ListQuery {
            search: Some("   ".to_string()),
            sort: Some("createdAt".to_string()),
            order: Some(SortOrder::Asc),
            ..ListQuery::default()
        };
        let keys: Vec<_> = query.pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["page", "limit", "sort", "order"]);
    }

    #[test]
    fn test_sort_order_from_str() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("descending".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_page_deserialize() {
        let page: Page<PlanSummary> = serde_json::from_str(
            r#"{"items":[{"_id":"p1","title":"Pokhara Trip","createdAt":"2026-01-01"}],"total":21,"page":2,"limit":10}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, "p1");
        assert_eq!(page.data[0].created_at.as_deref(), Some("2026-01-01"));
        assert_eq!(page.page_count(), 3);
        assert!(page.has_next());
    }

    #[test]
    fn test_page_defaults() {
        let page: Page<PlanSummary> = serde_json::from_str("{}").unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.page, 1);
        assert!(!page.has_next());
    }
}
