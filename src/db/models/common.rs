//! Common types and utilities shared across models.

use serde::{Deserialize, Serialize};

/// One page of results plus the numbers a client needs to page further
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

/// Normalise `page`/`per_page` query values into (page, per_page, offset)
pub fn page_window(
    page: Option<i64>,
    per_page: Option<i64>,
    default_per_page: i64,
    max_per_page: i64,
) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, max_per_page);
    (page, per_page, (page - 1) * per_page)
}

/// Format integer minor units as a decimal amount, e.g. 125050 -> "1250.50"
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window_defaults_and_clamping() {
        assert_eq!(page_window(None, None, 20, 100), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(10), 20, 100), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(1000), 20, 100), (1, 100, 0));
        assert_eq!(page_window(Some(-4), Some(0), 20, 100), (1, 1, 0));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(Paginated::<()>::new(vec![], 0, 1, 20).total_pages, 0);
        assert_eq!(Paginated::<()>::new(vec![], 20, 1, 20).total_pages, 1);
        assert_eq!(Paginated::<()>::new(vec![], 21, 1, 20).total_pages, 2);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(125050), "1250.50");
        assert_eq!(format_amount(7), "0.07");
        assert_eq!(format_amount(-300), "-3.00");
    }
}
