//! List query parsing: criteria filters, paging and sort.

mod criteria;
mod pagination;

pub use criteria::{Criteria, Filter, FilterOp, FilterTarget};
pub use pagination::{
    link_header, pagination_headers, total_pages, Direction, PageRequest, SortOrder, TOTAL_COUNT_HEADER,
};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};

/// Query keys consumed by paging and loading options; never treated as filters.
pub const RESERVED_KEYS: &[&str] = &["page", "size", "sort", "eagerload", "distinct"];

/// Raw request path and query pairs, in request order.
///
/// Repeated keys are kept, which `sort` and `in` filters rely on. The path is
/// the one the client sent, before any router nesting stripped a prefix.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub path: String,
    pub pairs: Vec<(String, String)>,
}

impl ListQuery {
    pub fn from_uri(path: &str, query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        ListQuery {
            path: path.to_string(),
            pairs,
        }
    }

    /// `eagerload=true` asks for many-to-many relations on list rows.
    pub fn eagerload(&self) -> bool {
        self.pairs
            .iter()
            .any(|(k, v)| k == "eagerload" && v.trim().eq_ignore_ascii_case("true"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|u| u.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        Ok(ListQuery::from_uri(uri.path(), uri.query()))
    }
}

#[cfg(test)]
mod tests {
    use super::ListQuery;

    #[test]
    fn keeps_repeated_keys_and_decodes() {
        let q = ListQuery::from_uri("/api/films", Some("sort=title%2Cdesc&sort=id&title.contains=the+matrix"));
        assert_eq!(q.path, "/api/films");
        assert_eq!(
            q.pairs,
            vec![
                ("sort".to_string(), "title,desc".to_string()),
                ("sort".to_string(), "id".to_string()),
                ("title.contains".to_string(), "the matrix".to_string()),
            ]
        );
        assert!(!q.eagerload());
    }

    #[test]
    fn eagerload_flag() {
        assert!(ListQuery::from_uri("/api/films", Some("eagerload=true")).eagerload());
        assert!(!ListQuery::from_uri("/api/films", Some("eagerload=false")).eagerload());
        assert!(!ListQuery::from_uri("/api/films", None).eagerload());
    }
}
