use serde::{Deserialize, Serialize};

/// Validated list request for one entity.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort: Vec<crate::filter::SortDirective>,
    pub filters: Vec<crate::filter::FilterCondition>,
    pub search: String,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        offset(self.page, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortInfo {
    pub empty: bool,
    pub sorted: bool,
    pub unsorted: bool,
}

impl SortInfo {
    pub fn new(sorted: bool) -> Self {
        Self { empty: !sorted, sorted, unsorted: !sorted }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub offset: i64,
    pub page_number: i64,
    pub page_size: i64,
    pub paged: bool,
    pub unpaged: bool,
    pub sort: SortInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub sort: SortInfo,
    pub total_pages: i64,
    pub total_elements: i64,
    pub size: i64,
    pub number: i64,
    pub number_of_elements: i64,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

/// Row offset of a page; negative indexes read from the start.
pub fn offset(page_index: i64, page_size: i64) -> i64 {
    if page_index >= 0 {
        page_index.saturating_mul(page_size)
    } else {
        0
    }
}

/// Ceiling division without floating point. A non-positive size yields zero pages.
pub fn total_pages(total_elements: i64, page_size: i64) -> i64 {
    if page_size <= 0 || total_elements <= 0 {
        return 0;
    }
    let pages = total_elements / page_size;
    if total_elements % page_size == 0 {
        pages
    } else {
        pages + 1
    }
}

/// Shape one page of content into its pagination envelope.
///
/// An empty result (zero elements, zero pages) reports `last = true` for page 0 so that
/// clients iterating until `last` terminate.
pub fn assemble<T>(content: Vec<T>, total_elements: i64, page_index: i64, page_size: i64, sorted: bool) -> Page<T> {
    let total_pages = total_pages(total_elements, page_size);
    let first = page_index == 0;
    let last = if total_pages == 0 {
        page_index == 0
    } else {
        page_index == total_pages - 1
    };
    let number_of_elements = content.len() as i64;

    Page {
        content,
        pageable: Pageable {
            offset: offset(page_index, page_size),
            page_number: page_index,
            page_size,
            paged: true,
            unpaged: false,
            sort: SortInfo::new(sorted),
        },
        sort: SortInfo::new(sorted),
        total_pages,
        total_elements,
        size: page_size,
        number: page_index,
        number_of_elements,
        first,
        last,
        empty: total_elements <= 0,
    }
}
