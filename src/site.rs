//! Taqeem portal URLs, selectors and status markers

use std::sync::LazyLock;

use regex::Regex;

pub const BASE_URL: &str = "https://qima.taqeem.sa";

/// Macro id cells of the report table (first column links)
pub const MACRO_ID_CELLS: &str = "#m-table tbody tr td:nth-child(1) a";
/// Status column of the report table
pub const STATUS_CELLS: &str = "#m-table tbody tr td:nth-child(6)";
/// DataTables "next" control of the in-page pagination
pub const SUBPAGE_NEXT: &str = "#m-table_next";
/// Outer (site) pagination links
pub const PAGINATION_LINKS: &str = "ul.pagination li a";
pub const PAGINATION_ITEM: &str = "li";
pub const DELETE_REPORT_BUTTON: &str = "#delete_report";
/// Present once the asset creation form is rendered
pub const ASSET_FORM_ANCHOR: &str = "#macros";
/// Present once the macro edit form is rendered
pub const MACRO_EDIT_ANCHOR: &str = "#value_base_id";
pub const SUBMIT_BUTTON: &str = "input[type='submit']";

/// "incomplete" as rendered in the status column
pub const INCOMPLETE_MARKER: &str = "غير مكتملة";
/// "You do not have permission to be here!"
pub const NO_PERMISSION_MARKER: &str = "ليس لديك صلاحية للتواجد هنا !";
/// "This page does not exist!"
pub const PAGE_MISSING_MARKER: &str = "هذه الصفحة غير موجودة!";

/// Rows shown per outer page
pub const ROWS_PER_PAGE: usize = 15;

static MACRO_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/report/macro/(\d+)/(?:show|edit|delete)?").unwrap());

pub fn report_url(report_id: &str) -> String {
    format!("{}/report/{}", BASE_URL, report_id)
}

/// Outer page `n` of a report; page 1 has no query string.
pub fn report_page_url(report_id: &str, page: usize) -> String {
    if page > 1 {
        format!("{}?page={}", report_url(report_id), page)
    } else {
        report_url(report_id)
    }
}

pub fn asset_create_url(report_id: &str) -> String {
    format!("{}/report/asset/create/{}", BASE_URL, report_id)
}

pub fn macro_edit_url(macro_id: &str) -> String {
    format!("{}/report/macro/{}/edit", BASE_URL, macro_id)
}

pub fn is_incomplete(status_text: &str) -> bool {
    status_text.contains(INCOMPLETE_MARKER)
}

pub fn is_missing_page(html: &str) -> bool {
    html.contains(NO_PERMISSION_MARKER) || html.contains(PAGE_MISSING_MARKER)
}

/// Macro id from a row link such as `/report/macro/123/show`
pub fn macro_id_from_href(href: &str) -> Option<u64> {
    MACRO_LINK
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
