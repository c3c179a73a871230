// End-to-end tests driving the router against both storage backends

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use filmorate::{
    config::{Config, StorageKind},
    create_router, AppState,
};

async fn memory_app() -> Router {
    let state = AppState::new(Config::in_memory()).await.unwrap();
    create_router(state)
}

async fn sqlite_app() -> Router {
    let mut config = Config::in_memory();
    config.storage = StorageKind::Sqlite;
    let state = AppState::new(config).await.unwrap();
    create_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(app: &Router, method: &str, uri: &str, body: &str) -> StatusCode {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

fn user_body(login: &str) -> Value {
    json!({
        "login": login,
        "name": format!("{} name", login),
        "email": format!("{}@mail.ru", login),
        "birthday": "1946-08-20"
    })
}

fn film_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "adipisicing",
        "releaseDate": "1967-03-25",
        "duration": 100,
        "mpa": { "id": 1 }
    })
}

async fn create_users(app: &Router, logins: &[&str]) {
    for login in logins {
        let (status, _) = send(app, "POST", "/users", Some(user_body(login))).await;
        assert_eq!(status, StatusCode::OK);
    }
}

async fn create_films(app: &Router, names: &[&str]) {
    for name in names {
        let (status, _) = send(app, "POST", "/films", Some(film_body(name))).await;
        assert_eq!(status, StatusCode::OK);
    }
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

async fn user_lifecycle(app: Router) {
    let mut body = user_body("dolore");
    body["name"] = json!("");
    let (status, created) = send(&app, "POST", "/users", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], 1);
    assert_eq!(created["name"], "dolore");

    let mut changed = created.clone();
    changed["email"] = json!("changed@mail.ru");
    let (status, updated) = send(&app, "PUT", "/users", Some(changed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["email"], "changed@mail.ru");

    let (status, all) = send(&app, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&all), vec![1]);

    let mut ghost = updated.clone();
    ghost["id"] = json!(9999);
    let (status, error) = send(&app, "PUT", "/users", Some(ghost)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["status"], 404);

    let mut duplicate = user_body("other");
    duplicate["id"] = json!(1);
    let (status, _) = send(&app, "POST", "/users", Some(duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

async fn user_validation(app: Router) {
    let mut spaced = user_body("dolore");
    spaced["login"] = json!("dolore ullamco");
    assert_eq!(send(&app, "POST", "/users", Some(spaced)).await.0, StatusCode::BAD_REQUEST);

    let mut bad_email = user_body("dolore");
    bad_email["email"] = json!("mail.ru");
    assert_eq!(send(&app, "POST", "/users", Some(bad_email)).await.0, StatusCode::BAD_REQUEST);

    let mut unborn = user_body("dolore");
    unborn["birthday"] = json!("2446-08-20");
    assert_eq!(send(&app, "POST", "/users", Some(unborn)).await.0, StatusCode::BAD_REQUEST);

    let missing_email = json!({ "login": "dolore", "birthday": "1946-08-20" });
    assert_eq!(
        send(&app, "POST", "/users", Some(missing_email)).await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(send_raw(&app, "POST", "/users", "{\"login\": ").await, StatusCode::BAD_REQUEST);

    let (status, all) = send(&app, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all.as_array().unwrap().is_empty());
}

async fn path_parameters(app: Router) {
    create_users(&app, &["a"]).await;

    assert_eq!(send(&app, "GET", "/users/1", None).await.0, StatusCode::OK);
    assert_eq!(send(&app, "GET", "/users/1a2", None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "GET", "/users/9999", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/films/abc", None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "GET", "/films/1", None).await.0, StatusCode::NOT_FOUND);

    let (status, error) = send(&app, "GET", "/no/such/route", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "Resource not found");
}

async fn friendship(app: Router) {
    create_users(&app, &["a", "b", "c"]).await;

    let (status, friend) = send(&app, "PUT", "/users/1/friends/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(friend["id"], 2);

    let (_, friends) = send(&app, "GET", "/users/1/friends", None).await;
    assert_eq!(ids(&friends), vec![2]);
    assert_eq!(friends[0]["acknowledged"], false);
    let (_, reverse) = send(&app, "GET", "/users/2/friends", None).await;
    assert!(reverse.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "PUT", "/users/1/friends/2", None).await;
    assert_eq!(status, StatusCode::OK);

    send(&app, "PUT", "/users/2/friends/1", None).await;
    let (_, friends) = send(&app, "GET", "/users/1/friends", None).await;
    assert_eq!(friends[0]["acknowledged"], true);

    send(&app, "PUT", "/users/1/friends/3", None).await;
    let (_, acknowledged) = send(&app, "GET", "/users/1/friends/acknowledged", None).await;
    assert_eq!(ids(&acknowledged), vec![2]);

    let (_, user) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(user["friends"], json!({ "2": true, "3": false }));

    assert_eq!(send(&app, "PUT", "/users/1/friends/1", None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "PUT", "/users/1/friends/99", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "PUT", "/users/99/friends/1", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/users/99/friends", None).await.0, StatusCode::NOT_FOUND);
}

async fn common_friends(app: Router) {
    create_users(&app, &["a", "b", "c", "d"]).await;
    send(&app, "PUT", "/users/1/friends/3", None).await;
    send(&app, "PUT", "/users/1/friends/4", None).await;
    send(&app, "PUT", "/users/2/friends/3", None).await;
    send(&app, "PUT", "/users/2/friends/1", None).await;

    let (status, common) = send(&app, "GET", "/users/1/friends/common/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&common), vec![3]);

    let (status, _) = send(&app, "GET", "/users/1/friends/common/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn removing_friends(app: Router) {
    create_users(&app, &["a", "b"]).await;

    let (status, body) = send(&app, "DELETE", "/users/1/friends/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "userId": 1, "friendId": 2, "deleted": false }));

    send(&app, "PUT", "/users/1/friends/2", None).await;
    let (_, body) = send(&app, "DELETE", "/users/1/friends/2", None).await;
    assert_eq!(body["deleted"], true);
    let (_, friends) = send(&app, "GET", "/users/1/friends", None).await;
    assert!(friends.as_array().unwrap().is_empty());
}

async fn likes(app: Router) {
    create_films(&app, &["Heat"]).await;
    create_users(&app, &["a", "b"]).await;

    send(&app, "PUT", "/films/1/like/1", None).await;
    let (status, film) = send(&app, "PUT", "/films/1/like/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(film["likes"], json!([1]));

    send(&app, "PUT", "/films/1/like/2", None).await;
    let (_, likers) = send(&app, "GET", "/films/1/likes", None).await;
    assert_eq!(ids(&likers), vec![1, 2]);

    let (status, film) = send(&app, "DELETE", "/films/1/like/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(film["likes"], json!([1]));
    assert_eq!(send(&app, "DELETE", "/films/1/like/2", None).await.0, StatusCode::OK);

    assert_eq!(send(&app, "PUT", "/films/1/like/0", None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "PUT", "/films/1/like/-1", None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "PUT", "/films/1/like/99", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "PUT", "/films/99/like/1", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "DELETE", "/films/99/like/1", None).await.0, StatusCode::NOT_FOUND);
}

async fn popular_films(app: Router) {
    create_films(&app, &["one", "two", "three", "four"]).await;
    create_users(&app, &["a", "b", "c"]).await;
    for (film, user) in [(3, 1), (3, 2), (3, 3), (2, 1), (4, 1), (4, 2)] {
        let uri = format!("/films/{}/like/{}", film, user);
        assert_eq!(send(&app, "PUT", &uri, None).await.0, StatusCode::OK);
    }

    let (status, top) = send(&app, "GET", "/films/popular", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&top), vec![3, 4, 2, 1]);

    let (_, top) = send(&app, "GET", "/films/popular?count=2", None).await;
    assert_eq!(ids(&top), vec![3, 4]);

    for query in ["count=0", "count=-5", "count=1a2"] {
        let uri = format!("/films/popular?{}", query);
        assert_eq!(send(&app, "GET", &uri, None).await.0, StatusCode::BAD_REQUEST, "{}", query);
    }
}

async fn film_validation(app: Router) {
    let mut first_screening = film_body("Arrival of a Train");
    first_screening["releaseDate"] = json!("1895-12-28");
    assert_eq!(send(&app, "POST", "/films", Some(first_screening)).await.0, StatusCode::OK);

    let mut too_early = film_body("Too early");
    too_early["releaseDate"] = json!("1895-12-27");
    assert_eq!(send(&app, "POST", "/films", Some(too_early)).await.0, StatusCode::BAD_REQUEST);

    let mut long = film_body("Long");
    long["description"] = json!("a".repeat(201));
    assert_eq!(send(&app, "POST", "/films", Some(long)).await.0, StatusCode::BAD_REQUEST);

    let mut blank = film_body("");
    blank["name"] = json!("   ");
    assert_eq!(send(&app, "POST", "/films", Some(blank)).await.0, StatusCode::BAD_REQUEST);

    let mut instant = film_body("Instant");
    instant["duration"] = json!(0);
    assert_eq!(send(&app, "POST", "/films", Some(instant)).await.0, StatusCode::BAD_REQUEST);

    let mut unknown_genre = film_body("Genre");
    unknown_genre["genres"] = json!([{ "id": 99 }]);
    assert_eq!(send(&app, "POST", "/films", Some(unknown_genre)).await.0, StatusCode::NOT_FOUND);

    let mut unknown_mpa = film_body("Mpa");
    unknown_mpa["mpa"] = json!({ "id": 9 });
    assert_eq!(send(&app, "POST", "/films", Some(unknown_mpa)).await.0, StatusCode::NOT_FOUND);

    let (_, all) = send(&app, "GET", "/films", None).await;
    assert_eq!(ids(&all), vec![1]);
}

async fn film_references(app: Router) {
    let mut body = film_body("Heat");
    body["genres"] = json!([{ "id": 2 }, { "id": 1 }, { "id": 2 }]);
    body["mpa"] = json!({ "id": 4 });

    let (status, film) = send(&app, "POST", "/films", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        film["genres"],
        json!([{ "id": 1, "name": "Comedy" }, { "id": 2, "name": "Drama" }])
    );
    assert_eq!(film["mpa"], json!({ "id": 4, "name": "R" }));

    let mut changed = film.clone();
    changed["genres"] = json!([]);
    changed["mpa"] = json!({ "id": 3 });
    let (status, updated) = send(&app, "PUT", "/films", Some(changed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["genres"], json!([]));
    assert_eq!(updated["mpa"]["name"], "PG-13");

    let (_, fetched) = send(&app, "GET", "/films/1", None).await;
    assert_eq!(fetched, updated);
}

async fn reference_data(app: Router) {
    let (status, genres) = send(&app, "GET", "/genres", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&genres), vec![1, 2, 3, 4, 5, 6]);

    let (_, genre) = send(&app, "GET", "/genres/1", None).await;
    assert_eq!(genre, json!({ "id": 1, "name": "Comedy" }));

    let (_, ratings) = send(&app, "GET", "/mpa", None).await;
    assert_eq!(ids(&ratings), vec![1, 2, 3, 4, 5]);
    let (_, rating) = send(&app, "GET", "/mpa/5", None).await;
    assert_eq!(rating["name"], "NC-17");

    assert_eq!(send(&app, "GET", "/genres/7", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/mpa/0", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/mpa/x", None).await.0, StatusCode::BAD_REQUEST);
}

async fn deletes_cascade(app: Router) {
    create_films(&app, &["Heat", "Ronin"]).await;
    create_users(&app, &["a", "b"]).await;
    send(&app, "PUT", "/films/1/like/1", None).await;
    send(&app, "PUT", "/films/2/like/1", None).await;
    send(&app, "PUT", "/users/2/friends/1", None).await;

    let (status, deleted) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["login"], "a");
    assert_eq!(send(&app, "DELETE", "/users/1", None).await.0, StatusCode::NOT_FOUND);

    let (_, film) = send(&app, "GET", "/films/1", None).await;
    assert_eq!(film["likes"], json!([]));
    let (_, friends) = send(&app, "GET", "/users/2/friends", None).await;
    assert!(friends.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "DELETE", "/films/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(send(&app, "GET", "/films/2", None).await.0, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "DELETE", "/films", None).await;
    assert_eq!(body, json!({ "deleted": 1 }));
    let (_, body) = send(&app, "DELETE", "/users", None).await;
    assert_eq!(body, json!({ "deleted": 1 }));

    let (_, user) = send(&app, "POST", "/users", Some(user_body("fresh"))).await;
    assert_eq!(user["id"], 1);
}

async fn request_ids(app: Router) {
    let request = Request::builder()
        .uri("/genres")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");

    let request = Request::builder().uri("/users/77").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(generated.starts_with("req-"));
}

async fn friends_in_user_bodies(app: Router) {
    create_users(&app, &["a", "b", "c"]).await;
    send(&app, "PUT", "/users/3/friends/1", None).await;

    let (_, mut user) = send(&app, "GET", "/users/1", None).await;
    user["friends"] = json!({ "2": false });
    let (status, updated) = send(&app, "PUT", "/users", Some(user.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["friends"], json!({ "2": false }));

    // user 3 is not in the map, so its edge to user 1 is gone
    let (_, friends) = send(&app, "GET", "/users/3/friends", None).await;
    assert!(friends.as_array().unwrap().is_empty());
    let (_, friends) = send(&app, "GET", "/users/2/friends", None).await;
    assert!(friends.as_array().unwrap().is_empty());

    user["friends"] = json!({ "2": true });
    send(&app, "PUT", "/users", Some(user)).await;
    let (_, friends) = send(&app, "GET", "/users/2/friends", None).await;
    assert_eq!(ids(&friends), vec![1]);
    assert_eq!(friends[0]["acknowledged"], true);

    let mut fresh = user_body("d");
    fresh["friends"] = json!({ "1": true, "3": false });
    let (status, created) = send(&app, "POST", "/users", Some(fresh)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], 4);
    assert_eq!(created["friends"], json!({ "1": true, "3": false }));
    let (_, friends) = send(&app, "GET", "/users/1/friends", None).await;
    assert_eq!(ids(&friends), vec![2, 4]);
    let (_, friends) = send(&app, "GET", "/users/3/friends", None).await;
    assert!(friends.as_array().unwrap().is_empty());

    let mut unknown = user_body("e");
    unknown["friends"] = json!({ "42": true });
    assert_eq!(send(&app, "POST", "/users", Some(unknown)).await.0, StatusCode::NOT_FOUND);
    let (_, all) = send(&app, "GET", "/users", None).await;
    assert_eq!(ids(&all), vec![1, 2, 3, 4]);
}

async fn null_fields(app: Router) {
    let mut user = user_body("a");
    user["id"] = Value::Null;
    user["friends"] = Value::Null;
    let (status, created) = send(&app, "POST", "/users", Some(user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], 1);
    assert_eq!(created["friends"], json!({}));

    let mut film = film_body("Heat");
    film["id"] = Value::Null;
    film["genres"] = Value::Null;
    film["likes"] = Value::Null;
    let (status, created) = send(&app, "POST", "/films", Some(film)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], 1);
    assert_eq!(created["genres"], json!([]));
    assert_eq!(created["likes"], json!([]));

    let mut wrong_type = user_body("b");
    wrong_type["friends"] = json!([2]);
    assert_eq!(send(&app, "POST", "/users", Some(wrong_type)).await.0, StatusCode::BAD_REQUEST);
}

async fn wrong_methods(app: Router) {
    create_users(&app, &["a"]).await;

    let (status, error) = send(&app, "PUT", "/users/1/friends/acknowledged", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error, json!({ "error": "Method not allowed", "status": 405 }));

    assert_eq!(send(&app, "PATCH", "/users", None).await.0, StatusCode::METHOD_NOT_ALLOWED);
    let (status, error) = send(&app, "DELETE", "/genres", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error["status"], 405);
}

macro_rules! on_both_backends {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $scenario() {
                    super::$scenario(super::memory_app().await).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $scenario() {
                    super::$scenario(super::sqlite_app().await).await;
                }
            )*
        }
    };
}

on_both_backends!(
    user_lifecycle,
    user_validation,
    path_parameters,
    friendship,
    common_friends,
    removing_friends,
    likes,
    popular_films,
    film_validation,
    film_references,
    reference_data,
    deletes_cascade,
    request_ids,
    friends_in_user_bodies,
    null_fields,
    wrong_methods,
);

#[tokio::test]
async fn sqlite_file_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::in_memory();
    config.storage = StorageKind::Sqlite;
    config.database.url = format!("sqlite://{}", dir.path().join("filmorate.db").display());
    config.database.max_connections = 4;

    let app = create_router(AppState::new(config.clone()).await.unwrap());
    create_users(&app, &["a", "b"]).await;
    create_films(&app, &["Heat"]).await;
    send(&app, "PUT", "/films/1/like/2", None).await;
    send(&app, "PUT", "/users/1/friends/2", None).await;
    drop(app);

    let app = create_router(AppState::new(config).await.unwrap());
    let (_, users) = send(&app, "GET", "/users", None).await;
    assert_eq!(ids(&users), vec![1, 2]);
    let (_, film) = send(&app, "GET", "/films/1", None).await;
    assert_eq!(film["likes"], json!([2]));
    assert_eq!(film["mpa"]["name"], "G");
    let (_, friends) = send(&app, "GET", "/users/1/friends", None).await;
    assert_eq!(ids(&friends), vec![2]);
}
