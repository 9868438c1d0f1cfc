use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    entities::{genre, language},
    error::{AppError, AppResult},
    models::{
        CreateMovieRequest, GenreRequest, MovieDetails, MovieFilterQuery, MovieFilterResult,
        MovieSort, UpdateMovieRequest, required,
    },
};

/// JSON body extractor whose rejections come back as `400 {"message": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/filter", get(filter_movies))
        .route("/movies/by-genre/{name}", get(movies_by_genre))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
        .route("/genres", get(list_genres).post(create_genre))
        .route("/genres/{id}", put(update_genre).delete(delete_genre))
        .route("/languages", get(list_languages))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
}

pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    state.catalog.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<MovieDetails>>> {
    Ok(Json(state.catalog.list_movies().await?))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MovieDetails>> {
    Ok(Json(state.catalog.get_movie(id).await?))
}

pub async fn filter_movies(
    State(state): State<Arc<AppState>>,
    AppQuery(q): AppQuery<MovieFilterQuery>,
) -> AppResult<Json<MovieFilterResult>> {
    let language = q.language.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let sort = q.sort.as_deref().and_then(MovieSort::from_param);
    Ok(Json(state.catalog.filter_movies(language, sort).await?))
}

pub async fn movies_by_genre(
    State(state): State<Arc<AppState>>,
    AppPath(name): AppPath<String>,
) -> AppResult<Json<Vec<MovieDetails>>> {
    Ok(Json(state.catalog.movies_by_genre(&name).await?))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateMovieRequest>,
) -> AppResult<StatusCode> {
    let new = req.validate()?;
    state.catalog.create_movie(new).await?;
    Ok(StatusCode::CREATED)
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(req): AppJson<UpdateMovieRequest>,
) -> AppResult<StatusCode> {
    let patch = req.validate()?;
    state.catalog.update_movie(id, patch).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> AppResult<StatusCode> {
    state.catalog.delete_movie(id).await?;
    Ok(StatusCode::OK)
}

pub async fn list_genres(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<genre::Model>>> {
    Ok(Json(state.catalog.list_genres().await?))
}

pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GenreRequest>,
) -> AppResult<(StatusCode, Json<genre::Model>)> {
    let name = required(req.name, "name")?;
    let genre = state.catalog.create_genre(name).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(req): AppJson<GenreRequest>,
) -> AppResult<Json<genre::Model>> {
    let name = required(req.name, "name")?;
    Ok(Json(state.catalog.update_genre(id, name).await?))
}

pub async fn delete_genre(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> AppResult<StatusCode> {
    state.catalog.delete_genre(id).await?;
    Ok(StatusCode::OK)
}

pub async fn list_languages(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<language::Model>>> {
    Ok(Json(state.catalog.list_languages().await?))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{catalog::Catalog, db::connect_in_memory};

    async fn app() -> Router {
        let catalog = Catalog::new(connect_in_memory().await.unwrap());
        router(Arc::new(AppState { catalog }))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            },
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value =
            if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, uri, Some(body)).await
    }

    async fn put_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::PUT, uri, Some(body)).await
    }

    fn dune() -> Value {
        json!({
            "tittle": "Dune",
            "genre_id": 1,
            "language_id": 1,
            "oscar_count": 2,
            "release_date": "2021-10-21"
        })
    }

    #[tokio::test]
    async fn genre_lifecycle() {
        let app = app().await;

        let (status, body) = post_json(&app, "/genres", json!({ "name": "Action" })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "id": 1, "name": "Action" }));

        let (status, body) = post_json(&app, "/genres", json!({ "name": "action" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].is_string());

        let (status, body) = send(&app, Method::DELETE, "/genres/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&app, Method::DELETE, "/genres/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn genre_name_is_required() {
        let app = app().await;

        let (status, _) = post_json(&app, "/genres", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post_json(&app, "/genres", json!({ "name": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        post_json(&app, "/genres", json!({ "name": "Drama" })).await;
        let (status, _) = put_json(&app, "/genres/1", json!({ "name": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn genre_update() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Drama" })).await;
        post_json(&app, "/genres", json!({ "name": "Comedy" })).await;

        let (status, body) = put_json(&app, "/genres/1", json!({ "name": "DRAMA" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "name": "DRAMA" }));

        let (status, _) = put_json(&app, "/genres/1", json!({ "name": "comedy" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = put_json(&app, "/genres/99", json!({ "name": "Noir" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, Method::GET, "/genres", None).await;
        assert_eq!(body, json!([{ "id": 2, "name": "Comedy" }, { "id": 1, "name": "DRAMA" }]));
    }

    #[tokio::test]
    async fn movie_create_and_duplicate_title() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Sci-Fi" })).await;

        let (status, body) = post_json(&app, "/movies", dune()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, Value::Null);

        let mut lower = dune();
        lower["tittle"] = json!("dune");
        let (status, _) = post_json(&app, "/movies", lower).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, Method::GET, "/movies", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Dune");
        assert_eq!(body[0]["release_date"], "2021-10-21");
        assert_eq!(body[0]["genre"]["name"], "Sci-Fi");
        assert_eq!(body[0]["language"]["name"], "English");
    }

    #[tokio::test]
    async fn movie_create_rejects_bad_input() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Sci-Fi" })).await;

        let mut bad_date = dune();
        bad_date["release_date"] = json!("someday");
        let (status, _) = post_json(&app, "/movies", bad_date).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(&app, "/movies", json!({ "tittle": "Dune" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let mut unknown_genre = dune();
        unknown_genre["genre_id"] = json!(404);
        let (status, body) = post_json(&app, "/movies", unknown_genre).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to create movie");
    }

    #[tokio::test]
    async fn movie_update_and_delete() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Sci-Fi" })).await;
        post_json(&app, "/movies", dune()).await;

        let (status, _) = put_json(&app, "/movies/999", json!({ "oscar_count": 5 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let patch = json!({
            "oscar_count": 6,
            "release_date": "2021-09-03T00:00:00Z",
            "duration": 155
        });
        let (status, body) = put_json(&app, "/movies/1", patch).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        let (_, body) = send(&app, Method::GET, "/movies/1", None).await;
        assert_eq!(body["title"], "Dune");
        assert_eq!(body["oscar_count"], 6);
        assert_eq!(body["release_date"], "2021-09-03");
        assert_eq!(body["duration"], 155);

        let (status, _) = send(&app, Method::DELETE, "/movies/1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, "/movies/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::GET, "/movies/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn filter_envelope() {
        let app = app().await;

        let (status, body) = send(&app, Method::GET, "/movies/filter", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalMovies"], 0);
        assert_eq!(body["averageDuration"], 0.0);
        assert_eq!(body["movies"], json!([]));

        post_json(&app, "/genres", json!({ "name": "Drama" })).await;
        let mut movie = dune();
        movie["duration"] = json!(155);
        post_json(&app, "/movies", movie).await;
        let (_, languages) = send(&app, Method::GET, "/languages", None).await;
        let japanese = languages
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["name"] == "Japanese")
            .unwrap()["id"]
            .clone();
        let ran = json!({
            "title": "Ran",
            "genre_id": 1,
            "language_id": japanese,
            "oscar_count": 1,
            "release_date": "1985-06-01"
        });
        post_json(&app, "/movies", ran).await;

        let (_, body) = send(&app, Method::GET, "/movies/filter?language=ENGLISH", None).await;
        assert_eq!(body["totalMovies"], 1);
        assert_eq!(body["movies"][0]["title"], "Dune");

        let (_, body) = send(&app, Method::GET, "/movies/filter?sort=release_date", None).await;
        assert_eq!(body["totalMovies"], 2);
        assert_eq!(body["averageDuration"], 77.5);
        assert_eq!(body["movies"][0]["title"], "Ran");
        assert_eq!(body["movies"][1]["title"], "Dune");
    }

    #[tokio::test]
    async fn by_genre_does_not_shadow_id_routes() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Sci-Fi" })).await;
        post_json(&app, "/movies", dune()).await;

        let (status, body) = send(&app, Method::GET, "/movies/by-genre/sci-fi", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, Method::GET, "/movies/by-genre/western", None).await;
        assert_eq!(body, json!([]));

        let (status, body) = send(&app, Method::GET, "/movies/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Dune");
    }

    #[tokio::test]
    async fn malformed_path_and_query_get_json_errors() {
        let app = app().await;

        for (method, uri) in [
            (Method::DELETE, "/genres/abc"),
            (Method::GET, "/movies/abc"),
            (Method::DELETE, "/movies/1.5"),
        ] {
            let (status, body) = send(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["message"].is_string(), "{uri}");
        }

        let (status, body) = put_json(&app, "/genres/abc", json!({ "name": "Noir" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let uri = "/movies/filter?language=a&language=b";
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn release_date_year_is_bounded() {
        let app = app().await;
        post_json(&app, "/genres", json!({ "name": "Epic" })).await;

        let mut caesar = dune();
        caesar["release_date"] = json!("-000044-03-15");
        let (status, body) = post_json(&app, "/movies", caesar).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
