//! Pagination parameters shared by all list endpoints.

use serde::{Deserialize, Serialize};

/// Sort direction for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse the `order` query parameter.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("order must be asc or desc, got {other:?}")),
        }
    }
}

/// Pagination block: request parameters on the way in, request parameters
/// plus the total hit count on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub per_page: usize,
    pub page: usize,
    pub sort_by: String,
    pub order: SortOrder,
    #[serde(default)]
    pub count: usize,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: usize = 50;

    /// Defaults for one entity: `perPage=50, page=0, order=asc`, sorted by
    /// the entity's id field.
    pub fn for_entity(sort_by: impl Into<String>) -> Self {
        Self {
            per_page: Self::DEFAULT_PER_PAGE,
            page: 0,
            sort_by: sort_by.into(),
            order: SortOrder::Asc,
            count: 0,
        }
    }

    /// Apply optional query-parameter overrides to a default block.
    pub fn with_overrides(
        mut self,
        per_page: Option<usize>,
        page: Option<usize>,
        sort_by: Option<String>,
        order: Option<&str>,
    ) -> Result<Self, String> {
        if let Some(per_page) = per_page {
            self.per_page = per_page;
        }
        if let Some(page) = page {
            self.page = page;
        }
        if let Some(sort_by) = sort_by {
            self.sort_by = sort_by;
        }
        if let Some(order) = order {
            self.order = SortOrder::parse(order)?;
        }
        Ok(self)
    }

    /// The index of the first hit on this page.
    pub fn offset(&self) -> usize {
        self.per_page.saturating_mul(self.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_wire_contract() {
        let page = Pagination::for_entity("eventId");
        assert_eq!(page.per_page, 50);
        assert_eq!(page.page, 0);
        assert_eq!(page.sort_by, "eventId");
        assert_eq!(page.order, SortOrder::Asc);
    }

    #[test]
    fn overrides_are_applied() {
        let page = Pagination::for_entity("triggerId")
            .with_overrides(Some(10), Some(3), None, Some("desc"))
            .unwrap();
        assert_eq!(page.per_page, 10);
        assert_eq!(page.page, 3);
        assert_eq!(page.sort_by, "triggerId");
        assert_eq!(page.order, SortOrder::Desc);
        assert_eq!(page.offset(), 30);
    }

    #[test]
    fn bad_order_is_rejected() {
        let err = Pagination::for_entity("alertId")
            .with_overrides(None, None, None, Some("sideways"))
            .unwrap_err();
        assert!(err.contains("asc or desc"));
    }
}
