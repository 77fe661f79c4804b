use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("date range starts {from} after it ends {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

/// Body shared by the search and export endpoints. Filter facets are sent
/// as top-level fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(flatten)]
    pub filters: BTreeMap<String, String>,
}

/// The filter, sort and paging controls of one report view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    page: u32,
    page_size: u32,
    search: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    sort_by: Option<String>,
    direction: SortDirection,
    filters: BTreeMap<String, String>,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ReportQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            search: None,
            from: None,
            to: None,
            sort_by: None,
            direction: SortDirection::Desc,
            filters: BTreeMap::new(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn sort(&self) -> (Option<&str>, SortDirection) {
        (self.sort_by.as_deref(), self.direction)
    }

    /// Sets or, with `None` or a blank value, clears one facet.
    pub fn set_filter(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => {
                self.filters.insert(key.to_string(), value.to_string());
            }
            None => {
                self.filters.remove(key);
            }
        }
        self.page = 1;
        self
    }

    pub fn set_search(&mut self, text: &str) -> &mut Self {
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_string());
        self.page = 1;
        self
    }

    pub fn set_date_range(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<&mut Self, QueryError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(QueryError::InvalidRange { from, to });
            }
        }
        self.from = from;
        self.to = to;
        self.page = 1;
        Ok(self)
    }

    pub fn clear_filters(&mut self) -> &mut Self {
        self.filters.clear();
        self.search = None;
        self.from = None;
        self.to = None;
        self.page = 1;
        self
    }

    /// Same column flips the direction; a new column starts descending.
    pub fn toggle_sort(&mut self, column: &str) -> &mut Self {
        if self.sort_by.as_deref() == Some(column) {
            self.direction = self.direction.flipped();
        } else {
            self.sort_by = Some(column.to_string());
            self.direction = SortDirection::Desc;
        }
        self
    }

    pub fn set_page(&mut self, page: u32) -> &mut Self {
        self.page = page.max(1);
        self
    }

    pub fn next_page(&mut self) -> &mut Self {
        self.page = self.page.saturating_add(1);
        self
    }

    pub fn prev_page(&mut self) -> &mut Self {
        self.page = self.page.saturating_sub(1).max(1);
        self
    }

    pub fn set_page_size(&mut self, page_size: u32) -> &mut Self {
        self.page_size = page_size.max(1);
        self.page = 1;
        self
    }

    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            page: self.page,
            page_size: self.page_size,
            search: self.search.clone(),
            from_date: self.from,
            to_date: self.to,
            sort_by: self.sort_by.clone(),
            sort_direction: self.direction,
            filters: self.filters.clone(),
        }
    }
}
