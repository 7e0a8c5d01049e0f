//! Alert headers: success and failure notices the admin client broadcasts to the user.
//!
//! Handlers and errors attach an [`Alert`] to the response extensions; the
//! [`alert_headers`] middleware renders it as `X-<app>-alert` / `X-<app>-error`
//! plus `X-<app>-params`, using the application name from settings.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::Response,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Alert {
    /// `<app>.<entity>.<action>` with the entity id as parameter.
    Success { entity: String, action: &'static str, param: String },
    /// `error.<key>` with the entity name as parameter.
    Failure { entity: String, key: String },
}

impl Alert {
    pub fn created(entity: &str, id: i64) -> Self {
        Alert::Success {
            entity: entity.to_string(),
            action: "created",
            param: id.to_string(),
        }
    }

    pub fn updated(entity: &str, id: i64) -> Self {
        Alert::Success {
            entity: entity.to_string(),
            action: "updated",
            param: id.to_string(),
        }
    }

    pub fn deleted(entity: &str, id: i64) -> Self {
        Alert::Success {
            entity: entity.to_string(),
            action: "deleted",
            param: id.to_string(),
        }
    }

    pub fn failure(entity: &str, key: &str) -> Self {
        Alert::Failure {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Header pairs for this alert under the given application name.
    pub fn header_pairs(&self, app_name: &str) -> Vec<(String, String)> {
        let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        match self {
            Alert::Success { entity, action, param } => vec![
                (format!("X-{}-alert", app_name), format!("{}.{}.{}", app_name, entity, action)),
                (format!("X-{}-params", app_name), encode(param)),
            ],
            Alert::Failure { entity, key } => vec![
                (format!("X-{}-error", app_name), format!("error.{}", key)),
                (format!("X-{}-params", app_name), encode(entity)),
            ],
        }
    }
}

/// Renders an [`Alert`] extension, if any, into response headers.
pub async fn alert_headers(State(state): State<AppState>, mut response: Response) -> Response {
    let Some(alert) = response.extensions_mut().remove::<Alert>() else {
        return response;
    };
    for (name, value) in alert.header_pairs(&state.settings.app_name) {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "alert header not representable"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_alert_uses_app_prefix() {
        let pairs = Alert::created("film", 42).header_pairs("streamingApp");
        assert_eq!(
            pairs,
            vec![
                ("X-streamingApp-alert".to_string(), "streamingApp.film.created".to_string()),
                ("X-streamingApp-params".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn failure_alert_carries_error_key() {
        let pairs = Alert::failure("episode", "idnotfound").header_pairs("streamingApp");
        assert_eq!(pairs[0].1, "error.idnotfound");
        assert_eq!(pairs[1].1, "episode");
    }
}
