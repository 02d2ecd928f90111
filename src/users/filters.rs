//! Normalization of untrusted listing parameters.
//!
//! Invalid input is coerced to safe defaults, never rejected: the listing
//! endpoint always succeeds for an authorized caller.

use serde::{Deserialize, Serialize};

use crate::config::ListingConfig;

/// Listing parameters exactly as they arrive in the query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawFilters {
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
}

/// Columns the listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    Name,
    Email,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    /// Exact, case-sensitive match against the allow-list.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Fully-defaulted, validated listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort_by: SortColumn,
    pub sort_direction: SortDirection,
    pub per_page: u64,
    #[serde(skip)]
    pub page: u64,
}

impl ListQuery {
    pub fn from_raw(raw: &RawFilters, listing: &ListingConfig) -> Self {
        let search = raw.search.clone().filter(|s| !s.is_empty());

        let sort_by = raw
            .sort_by
            .as_deref()
            .and_then(SortColumn::parse)
            .unwrap_or_default();

        let sort_direction = raw
            .sort_direction
            .as_deref()
            .and_then(SortDirection::parse)
            .unwrap_or_default();

        let per_page = match raw.per_page.as_deref().and_then(parse_int) {
            Some(n) if n >= 1 && (n as u64) <= listing.max_per_page => n as u64,
            _ => listing.default_per_page,
        };

        let page = match raw.page.as_deref().and_then(parse_int) {
            Some(n) if n >= 1 => n as u64,
            _ => 1,
        };

        Self {
            search,
            sort_by,
            sort_direction,
            per_page,
            page,
        }
    }

    /// Number of rows skipped before the current page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Query-string pairs that reproduce this listing on another page.
    pub fn to_query_pairs(&self, page: u64) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs.push(("sort_by", self.sort_by.as_sql().to_string()));
        pairs.push(("sort_direction", self.sort_direction.as_param().to_string()));
        pairs.push(("per_page", self.per_page.to_string()));
        pairs.push(("page", page.to_string()));
        pairs
    }
}

fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}
