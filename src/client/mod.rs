//! Typed REST client for the catalog API.
//!
//! One [`ResourceClient`] per entity wraps `/api/<resource>` using [`reqwest`].
//! Successful writes carry the server's alert headers back as [`AlertInfo`].

mod entities;
mod request;

pub use entities::{CatalogEntity, Episode, EntityRef, Film, FilmSummary, FilmType, Gender, Person};
pub use request::{parse_links, sort_param, FilterOptions, RequestOptions};

use crate::error::Problem;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LINK};
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;

const MERGE_PATCH_JSON: &str = "application/merge-patch+json";

/// Errors from the catalog client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("catalog API error ({status}): {body}")]
    Http {
        status: u16,
        /// Parsed problem document, when the body was one.
        problem: Option<Problem>,
        body: String,
    },

    /// Update and patch need the entity id.
    #[error("entity has no id")]
    MissingId,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Alert notice sent back in `X-<app>-alert` / `X-<app>-error` and `X-<app>-params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertInfo {
    /// Translation key, e.g. `streamingApp.film.created` or `error.idexists`.
    pub key: String,
    pub param: Option<String>,
    pub is_error: bool,
}

impl AlertInfo {
    /// Reads the alert headers; the application prefix is not known up front so headers
    /// are matched by suffix.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let mut key = None;
        let mut param = None;
        let mut is_error = false;
        for (name, value) in headers {
            let name = name.as_str();
            if !name.starts_with("x-") {
                continue;
            }
            let Ok(value) = value.to_str() else { continue };
            if name.ends_with("-alert") {
                key = Some(value.to_string());
            } else if name.ends_with("-error") {
                key = Some(value.to_string());
                is_error = true;
            } else if name.ends_with("-params") {
                let decoded = url::form_urlencoded::parse(format!("v={}", value).as_bytes())
                    .next()
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_else(|| value.to_string());
                param = Some(decoded);
            }
        }
        key.map(|key| AlertInfo { key, param, is_error })
    }
}

/// A response body together with any alert the server attached.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub body: T,
    pub alert: Option<AlertInfo>,
}

/// One page of a list query.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `X-Total-Count`, or the item count when the header is missing.
    pub total: u64,
    /// Page number per `Link` relation.
    pub links: BTreeMap<String, u64>,
}

/// Client for one resource under `/api`.
pub struct ResourceClient<T> {
    client: reqwest::Client,
    resource_url: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            resource_url: self.resource_url.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: CatalogEntity> ResourceClient<T> {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            resource_url: format!("{}/api/{}", base_url.trim_end_matches('/'), T::RESOURCE),
            _entity: PhantomData,
        }
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// `POST /api/<resource>`; the server assigns the id.
    pub async fn create(&self, entity: &T) -> Result<ApiResponse<T>, ClientError> {
        let response = self.client.post(&self.resource_url).json(entity).send().await?;
        Self::parse_with_alert(response).await
    }

    /// `PUT /api/<resource>/<id>` replacing every field.
    pub async fn update(&self, entity: &T) -> Result<ApiResponse<T>, ClientError> {
        let id = entity.id().ok_or(ClientError::MissingId)?;
        let response = self
            .client
            .put(format!("{}/{}", self.resource_url, id))
            .json(entity)
            .send()
            .await?;
        Self::parse_with_alert(response).await
    }

    /// `PATCH /api/<resource>/<id>` as a merge patch; absent fields stay untouched.
    pub async fn partial_update(&self, entity: &T) -> Result<ApiResponse<T>, ClientError> {
        let id = entity.id().ok_or(ClientError::MissingId)?;
        let response = self
            .client
            .patch(format!("{}/{}", self.resource_url, id))
            .header(CONTENT_TYPE, MERGE_PATCH_JSON)
            .body(serde_json::to_vec(entity)?)
            .send()
            .await?;
        Self::parse_with_alert(response).await
    }

    pub async fn find(&self, id: i64) -> Result<T, ClientError> {
        let response = self
            .client
            .get(format!("{}/{}", self.resource_url, id))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /api/<resource>` with paging, sorting and criteria.
    pub async fn query(&self, options: &RequestOptions) -> Result<Page<T>, ClientError> {
        let response = self
            .client
            .get(&self.resource_url)
            .query(&options.to_query())
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let headers = response.headers().clone();
        let items: Vec<T> = response.json().await?;
        let total = match headers.get(crate::query::TOTAL_COUNT_HEADER) {
            Some(v) => v
                .to_str()
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ClientError::Decode("bad X-Total-Count header".into()))?,
            None => items.len() as u64,
        };
        let links = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_links)
            .unwrap_or_default();
        Ok(Page { items, total, links })
    }

    /// `GET /api/<resource>/count` with the criteria of `options`.
    pub async fn count(&self, filter: &FilterOptions) -> Result<u64, ClientError> {
        let options = RequestOptions {
            filter: filter.clone(),
            ..Default::default()
        };
        let response = self
            .client
            .get(format!("{}/count", self.resource_url))
            .query(&options.to_query())
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn delete(&self, id: i64) -> Result<Option<AlertInfo>, ClientError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.resource_url, id))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(AlertInfo::from_headers(response.headers()))
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let problem = serde_json::from_str::<Problem>(&body).ok();
            tracing::debug!(status = status.as_u16(), body = %body, "catalog request failed");
            return Err(ClientError::Http {
                status: status.as_u16(),
                problem,
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<R: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<R, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<R>().await?)
    }

    async fn parse_with_alert(response: reqwest::Response) -> Result<ApiResponse<T>, ClientError> {
        let response = Self::ensure_success(response).await?;
        let alert = AlertInfo::from_headers(response.headers());
        let body = response.json::<T>().await?;
        Ok(ApiResponse { body, alert })
    }
}

/// Clients for every catalog resource, sharing one connection pool.
#[derive(Clone)]
pub struct CatalogClient {
    pub films: ResourceClient<Film>,
    pub episodes: ResourceClient<Episode>,
    pub people: ResourceClient<Person>,
}

impl CatalogClient {
    /// * `base_url` - Server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            films: ResourceClient::new(client.clone(), base_url),
            episodes: ResourceClient::new(client.clone(), base_url),
            people: ResourceClient::new(client, base_url),
        }
    }
}

/// Same entity when both are present with equal ids, or when both are absent.
pub fn compare_entity<T: CatalogEntity>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id().is_some() && a.id() == b.id(),
        (None, None) => true,
        _ => false,
    }
}

/// Prepends the entities of `to_check` whose id is not yet in `collection`.
/// Entities without an id are skipped, as are repeats within `to_check`.
pub fn add_to_collection_if_missing<T: CatalogEntity>(collection: Vec<T>, to_check: &[Option<T>]) -> Vec<T> {
    let mut seen: HashSet<i64> = collection.iter().filter_map(|e| e.id()).collect();
    let mut added: Vec<T> = to_check
        .iter()
        .flatten()
        .filter(|e| e.id().is_some_and(|id| seen.insert(id)))
        .cloned()
        .collect();
    if added.is_empty() {
        return collection;
    }
    added.extend(collection);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn film(id: Option<i64>) -> Film {
        Film {
            id,
            ..Default::default()
        }
    }

    #[test]
    fn compare_by_id() {
        assert!(compare_entity(Some(&film(Some(1))), Some(&film(Some(1)))));
        assert!(!compare_entity(Some(&film(Some(1))), Some(&film(Some(2)))));
        assert!(!compare_entity(Some(&film(None)), Some(&film(None))));
        assert!(!compare_entity(Some(&film(Some(1))), None));
        assert!(compare_entity::<Film>(None, None));
    }

    #[test]
    fn add_missing_prepends_new_ids_once() {
        let collection = vec![film(Some(1)), film(Some(2))];
        let out = add_to_collection_if_missing(
            collection,
            &[Some(film(Some(3))), None, Some(film(Some(2))), Some(film(Some(3))), Some(film(None))],
        );
        let ids: Vec<_> = out.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![Some(3), Some(1), Some(2)]);

        let unchanged = add_to_collection_if_missing(vec![film(Some(1))], &[None]);
        assert_eq!(unchanged.len(), 1);
    }

    #[test]
    fn alert_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-streamingapp-alert", HeaderValue::from_static("streamingApp.film.created"));
        headers.insert("x-streamingapp-params", HeaderValue::from_static("1051"));
        let alert = AlertInfo::from_headers(&headers).unwrap();
        assert_eq!(alert.key, "streamingApp.film.created");
        assert_eq!(alert.param.as_deref(), Some("1051"));
        assert!(!alert.is_error);

        let mut headers = HeaderMap::new();
        headers.insert("x-streamingapp-error", HeaderValue::from_static("error.idexists"));
        headers.insert("x-streamingapp-params", HeaderValue::from_static("Film+Noir"));
        let alert = AlertInfo::from_headers(&headers).unwrap();
        assert!(alert.is_error);
        assert_eq!(alert.param.as_deref(), Some("Film Noir"));

        assert!(AlertInfo::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn resource_urls() {
        let client = CatalogClient::new("http://localhost:8080/");
        assert_eq!(client.films.resource_url(), "http://localhost:8080/api/films");
        assert_eq!(client.people.resource_url(), "http://localhost:8080/api/people");
    }
}
