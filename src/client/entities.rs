//! Typed catalog records as exchanged with the REST API.

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A resource served under `/api/<RESOURCE>`.
pub trait CatalogEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Path segment under `/api`, e.g. `films`.
    const RESOURCE: &'static str;

    fn id(&self) -> Option<i64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Comedy,
    Drama,
    Adventure,
    Action,
    Crime,
    Thriller,
    Romance,
    Documentary,
    Animated,
    Fantasy,
    Musicals,
    Scifi,
    Horror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilmType {
    Movie,
    Series,
    Documentary,
}

/// Reference to another entity by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
}

/// The film fields embedded in an episode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilmSummary {
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<i32>,
    /// Base64 image data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub film_type: Option<FilmType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_date: Option<NaiveDateTime>,
    /// Present on single reads and on eagerly loaded lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<EntityRef>>,
}

impl CatalogEntity for Film {
    const RESOURCE: &'static str = "films";

    fn id(&self) -> Option<i64> {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub film: Option<FilmSummary>,
}

impl CatalogEntity for Episode {
    const RESOURCE: &'static str = "episodes";

    fn id(&self) -> Option<i64> {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_content_type: Option<String>,
}

impl CatalogEntity for Person {
    const RESOURCE: &'static str = "people";

    fn id(&self) -> Option<i64> {
        self.id
    }
}
