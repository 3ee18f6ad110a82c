// tests/profile_tests.rs
//
// Runs against a live Postgres at DATABASE_URL: `cargo test -- --ignored`

use std::sync::Arc;

use metaclass::{
    config::Config, exam::service::ExamService, routes, state::AppState, store::PgExamStore,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

async fn spawn_app() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "profile_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: Vec::new(),
        admin_email: None,
        admin_password: None,
    };

    let state = AppState {
        exams: ExamService::new(Arc::new(PgExamStore::new(pool.clone()))),
        pool,
        config,
    };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

struct TestUser {
    email: String,
    nickname: String,
    token: String,
}

async fn sign_up(client: &reqwest::Client, address: &str, prefix: &str) -> TestUser {
    let tag = &uuid::Uuid::new_v4().to_string()[..8];
    let email = format!("{}_{}@example.com", prefix, tag);
    let nickname = format!("{}_{}", prefix, tag);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({"email": email, "password": "password123", "nickname": nickname}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({"email": email, "password": "password123"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["nickname"], nickname.as_str());
    assert_eq!(login["role"], "user");

    TestUser {
        email,
        nickname,
        token: login["token"].as_str().unwrap().to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn profile_and_community_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let alice = sign_up(&client, &address, "ua").await;
    let bob = sign_up(&client, &address, "ub").await;

    // Fresh profile: no posts, no results, no password in the payload.
    let me: Value = client
        .get(format!("{}/api/profile/me", address))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], alice.email.as_str());
    assert_eq!(me["posts_count"], 0);
    assert_eq!(me["results_count"], 0);
    assert!(me.get("password").is_none());

    // Taking Bob's nickname is a conflict; a bad phone number is rejected.
    let response = client
        .put(format!("{}/api/profile/me", address))
        .bearer_auth(&alice.token)
        .json(&json!({"nickname": bob.nickname}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = client
        .put(format!("{}/api/profile/me", address))
        .bearer_auth(&alice.token)
        .json(&json!({"phone": "call me"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let updated: Value = client
        .put(format!("{}/api/profile/me", address))
        .bearer_auth(&alice.token)
        .json(&json!({"name": "Alice", "bio": "Strength coach"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Alice");
    assert_eq!(updated["bio"], "Strength coach");
    assert_eq!(updated["nickname"], alice.nickname.as_str());

    // Alice posts; Bob cannot edit it but can comment and react.
    let post: Value = client
        .post(format!("{}/api/posts", address))
        .bearer_auth(&alice.token)
        .json(&json!({"category": "question", "title": "Hip hinge cues", "content": "What works for you?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_url = format!("{}/api/posts/{}", address, post["id"]);
    assert_eq!(post["author"], alice.nickname.as_str());

    let response = client
        .put(&post_url)
        .bearer_auth(&bob.token)
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    for text in ["Broomstick on the spine", "Push the hips back"] {
        let response = client
            .post(format!("{}/comments", post_url))
            .bearer_auth(&bob.token)
            .json(&json!({"content": text}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let comments: Vec<Value> = client
        .get(format!("{}/comments", post_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "Push the hips back");
    assert_eq!(comments[0]["nickname"], bob.nickname.as_str());

    let state: Value = client
        .post(format!("{}/reaction", post_url))
        .bearer_auth(&bob.token)
        .json(&json!({"reaction": "like"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["likes"], 1);

    let detail: Value = client
        .get(&post_url)
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["my_reaction"], "like");

    let mine: Vec<Value> = client
        .get(format!("{}/api/profile/posts", address))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    // Deleting the account takes the post and its comments with it.
    let response = client
        .delete(format!("{}/api/profile/me", address))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client.get(&post_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({"email": alice.email, "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}
