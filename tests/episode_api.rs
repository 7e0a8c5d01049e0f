//! HTTP-level tests for `/api/episodes` and the episode to film reference.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, create, delete, film_body, get, header, patch_json, post_json, put_json, ALERT};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = false)]
async fn episode_embeds_film_summary(pool: PgPool) {
    let app = build_test_app(pool).await;
    let film = create(&app, "/api/films", film_body("Twin Peaks")).await;
    let film_id = film["id"].as_i64().unwrap();

    let response = post_json(
        &app,
        "/api/episodes",
        json!({ "title": "Pilot", "order": 1, "film": { "id": film_id } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(header(&response, ALERT), Some("streamingApp.episode.created"));
    let episode = body_json(response).await;
    assert_eq!(episode["film"], json!({ "id": film_id, "title": "Twin Peaks" }));

    let id = episode["id"].as_i64().unwrap();
    let fetched = body_json(get(&app, &format!("/api/episodes/{}", id)).await).await;
    assert_eq!(fetched["order"], 1);
    assert_eq!(fetched["film"]["title"], "Twin Peaks");
}

#[sqlx::test(migrations = false)]
async fn episode_without_film_has_null_reference(pool: PgPool) {
    let app = build_test_app(pool).await;
    let episode = create(&app, "/api/episodes", json!({ "title": "Standalone" })).await;
    assert!(episode["film"].is_null());
}

#[sqlx::test(migrations = false)]
async fn episode_title_is_required(pool: PgPool) {
    let app = build_test_app(pool).await;
    let response = post_json(&app, "/api/episodes", json!({ "synopsis": "no title", "film": 3 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let fields: Vec<&str> = json["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"film"));
    assert_eq!(json["fieldErrors"][0]["objectName"], "episode");
}

#[sqlx::test(migrations = false)]
async fn episodes_filter_by_film(pool: PgPool) {
    let app = build_test_app(pool).await;
    let peaks = create(&app, "/api/films", film_body("Twin Peaks")).await["id"].as_i64().unwrap();
    let lost = create(&app, "/api/films", film_body("Lost")).await["id"].as_i64().unwrap();
    for (title, film) in [("Pilot", peaks), ("Traces to Nowhere", peaks), ("Pilot Part 1", lost)] {
        create(&app, "/api/episodes", json!({ "title": title, "film": { "id": film } })).await;
    }

    let json = body_json(get(&app, &format!("/api/episodes?filmId.equals={}&sort=title", peaks)).await).await;
    let titles: Vec<&str> = json.as_array().unwrap().iter().map(|e| e["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Pilot", "Traces to Nowhere"]);

    let count = body_json(get(&app, "/api/films/count?episodesId.specified=true").await).await;
    assert_eq!(count, 2);
}

#[sqlx::test(migrations = false)]
async fn update_moves_episode_between_films(pool: PgPool) {
    let app = build_test_app(pool).await;
    let first = create(&app, "/api/films", film_body("First")).await["id"].as_i64().unwrap();
    let second = create(&app, "/api/films", film_body("Second")).await["id"].as_i64().unwrap();
    let id = create(&app, "/api/episodes", json!({ "title": "Pilot", "film": { "id": first } })).await["id"]
        .as_i64()
        .unwrap();
    let uri = format!("/api/episodes/{}", id);

    let json = body_json(patch_json(&app, &uri, json!({ "id": id, "film": { "id": second } })).await).await;
    assert_eq!(json["film"]["id"], second);
    assert_eq!(json["title"], "Pilot");

    let response = put_json(&app, &uri, json!({ "id": id, "title": "Pilot" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["film"].is_null());
}

#[sqlx::test(migrations = false)]
async fn unknown_film_reference_conflicts(pool: PgPool) {
    let app = build_test_app(pool).await;
    let response = post_json(&app, "/api/episodes", json!({ "title": "Orphan", "film": { "id": 424242 } })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = false)]
async fn deleting_referenced_film_conflicts(pool: PgPool) {
    let app = build_test_app(pool).await;
    let film = create(&app, "/api/films", film_body("Twin Peaks")).await["id"].as_i64().unwrap();
    let episode = create(&app, "/api/episodes", json!({ "title": "Pilot", "film": { "id": film } })).await["id"]
        .as_i64()
        .unwrap();

    let response = delete(&app, &format!("/api/films/{}", film)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["message"], "error.concurrency");

    assert_eq!(delete(&app, &format!("/api/episodes/{}", episode)).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(&app, &format!("/api/films/{}", film)).await.status(), StatusCode::NO_CONTENT);
}
