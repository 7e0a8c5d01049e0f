//! Page requests (`page`, `size`, `sort`) and the `X-Total-Count` / `Link` response headers.

use crate::error::AppError;
use crate::model::ResolvedEntity;
use axum::http::{HeaderMap, HeaderValue};

/// `X-Total-Count`, in the lowercase form `HeaderMap` stores.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One ORDER BY term, already resolved to a database column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<SortOrder>,
}

impl PageRequest {
    /// Reads `page`, `size` and repeated `sort=field[,field...][,asc|desc]` pairs.
    ///
    /// Unparseable `page`/`size` fall back to the defaults; size is capped at `max_size`.
    /// The primary key is appended as a final sort term unless already present.
    pub fn parse(
        entity: &ResolvedEntity,
        pairs: &[(String, String)],
        default_size: u32,
        max_size: u32,
    ) -> Result<Self, AppError> {
        let mut page = 0u32;
        let mut size = default_size;
        let mut sort: Vec<SortOrder> = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = value.trim().parse().unwrap_or(0),
                "size" => {
                    size = match value.trim().parse::<u32>() {
                        Ok(n) if n > 0 => n,
                        _ => default_size,
                    }
                }
                "sort" => {
                    let mut parts: Vec<&str> = value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
                    let direction = match parts.last().map(|s| s.to_ascii_lowercase()) {
                        Some(d) if d == "asc" => {
                            parts.pop();
                            Direction::Asc
                        }
                        Some(d) if d == "desc" => {
                            parts.pop();
                            Direction::Desc
                        }
                        _ => Direction::Asc,
                    };
                    for field in parts {
                        let col = entity
                            .column_by_field(field)
                            .filter(|c| c.kind.is_sortable())
                            .ok_or_else(|| AppError::BadRequest(format!("cannot sort by '{}'", field)))?;
                        if !sort.iter().any(|s| s.column == col.name) {
                            sort.push(SortOrder {
                                column: col.name.clone(),
                                direction,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        let pk = &entity.pk().name;
        if !sort.iter().any(|s| &s.column == pk) {
            sort.push(SortOrder {
                column: pk.clone(),
                direction: Direction::Asc,
            });
        }
        Ok(PageRequest {
            page,
            size: size.min(max_size),
            sort,
        })
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

pub fn total_pages(total: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size as u64)
}

/// `Link` header value with `next`, `prev`, `last` and `first` relations.
///
/// Each link keeps the request's other query pairs and replaces `page` / `size`.
pub fn link_header(path: &str, pairs: &[(String, String)], page: &PageRequest, total: u64) -> String {
    let pages = total_pages(total, page.size);
    let current = page.page as u64;
    let last = pages.saturating_sub(1);
    let mut links = Vec::with_capacity(4);
    if current + 1 < pages {
        links.push(page_link(path, pairs, current + 1, page.size, "next"));
    }
    if current > 0 {
        links.push(page_link(path, pairs, current - 1, page.size, "prev"));
    }
    links.push(page_link(path, pairs, last, page.size, "last"));
    links.push(page_link(path, pairs, 0, page.size, "first"));
    links.join(",")
}

fn page_link(path: &str, pairs: &[(String, String)], page: u64, size: u32, rel: &str) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs.iter().filter(|(k, _)| k != "page" && k != "size") {
        query.append_pair(k, v);
    }
    query.append_pair("page", &page.to_string());
    query.append_pair("size", &size.to_string());
    format!("<{}?{}>; rel=\"{}\"", path, query.finish(), rel)
}

pub fn pagination_headers(path: &str, pairs: &[(String, String)], page: &PageRequest, total: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    match HeaderValue::from_str(&link_header(path, pairs, page, total)) {
        Ok(v) => {
            headers.insert(axum::http::header::LINK, v);
        }
        Err(e) => tracing::warn!(error = %e, "link header not representable"),
    }
    headers
}
