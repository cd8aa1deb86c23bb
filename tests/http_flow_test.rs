use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tempfile::TempDir;

use hearth::config::Config;
use hearth::routes;
use hearth::state::AppState;
use hearth::store::{NewPost, Post, PostId, PostQuery, RemoteStore, SortKey, SqliteStore};

struct TestServer {
    base: String,
    client: reqwest::Client,
    store: Arc<SqliteStore>,
    state: AppState,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(&dir.path().join("hearth.db")).unwrap());
        let state = AppState::new(store.clone(), Config::default());
        let app = routes::app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap();

        Self {
            base: format!("http://{addr}"),
            client,
            store,
            state,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, String) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> (StatusCode, String) {
        let response = self
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    /// Wait for a fire-and-forget write to land in the store.
    async fn settled(&self, id: PostId, done: impl Fn(&Post) -> bool) -> Post {
        for _ in 0..50 {
            if let Some(post) = self.store.select_post(id).await.unwrap() {
                if done(&post) {
                    return post;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("write to post {id} never landed");
    }
}

#[tokio::test]
async fn empty_board_renders_without_a_session() {
    let server = TestServer::start().await;

    let response = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("set-cookie").is_none());

    let body = response.text().await.unwrap();
    assert!(body.contains("Family Memories"));
    assert!(body.contains("No posts found."));
}

#[tokio::test]
async fn cookieless_reads_keep_no_sessions() {
    let server = TestServer::start().await;

    for _ in 0..50 {
        let (status, _) = server.get("/").await;
        assert_eq!(status, StatusCode::OK);
    }
    assert!(server.state.sessions.lock().await.is_empty());
}

#[tokio::test]
async fn first_form_post_issues_the_view_cookie() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(server.url("/create"))
        .form(&[("title", ""), ("content", ""), ("image_url", "")])
        .send()
        .await
        .unwrap();
    let cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("hearth_view="));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(server.state.sessions.lock().await.len(), 1);

    // The browser's later reads reuse it rather than starting more.
    server.get("/").await;
    server.get("/create").await;
    assert_eq!(server.state.sessions.lock().await.len(), 1);
}

#[tokio::test]
async fn upvote_from_a_cookieless_page_keeps_its_filters() {
    let server = TestServer::start().await;
    let post = server
        .store
        .insert_post(&NewPost::new("Lake house", "", ""))
        .await
        .unwrap();
    server
        .store
        .insert_post(&NewPost::new("Birthday cake", "", ""))
        .await
        .unwrap();

    let (status, body) = server
        .post(
            &format!("/post/{}/upvote?sort=popularity&q=lake", post.id),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Upvotes: 1"));
    assert!(!body.contains("Birthday cake"));
    assert!(body.contains("value=\"popularity\" selected"));
}

#[tokio::test]
async fn blank_title_stays_on_form_with_notice() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post("/create", &[("title", "   "), ("content", "kept"), ("image_url", "")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("A title is required."));
    assert!(body.contains("kept"));

    let posts = server
        .store
        .select_posts(&PostQuery::new(SortKey::Recency, ""))
        .await
        .unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn full_memory_lifecycle() {
    let server = TestServer::start().await;

    // Create lands back on the list, which reloads and shows the post
    let (status, body) = server
        .post(
            "/create",
            &[
                ("title", "Beach day"),
                ("content", "Sand in everything"),
                ("image_url", ""),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Beach day"));
    assert!(body.contains("Upvotes: 0"));

    let posts = server
        .store
        .select_posts(&PostQuery::new(SortKey::Recency, ""))
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    let id = posts[0].id;

    // Upvote shows the new count straight away
    let (status, body) = server.post(&format!("/post/{id}/upvote"), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Upvotes: 1"));

    // Comment appears under the card and the input is cleared
    let (_, body) = server
        .post(&format!("/post/{id}/comments"), &[("comment", "Best summer")])
        .await;
    assert!(body.contains("Best summer"));
    assert!(body.contains("Comments (1)"));

    let stored = server
        .settled(id, |post| post.upvotes == 1 && post.comments.len() == 1)
        .await;
    assert_eq!(stored.comments[0].comment, "Best summer");

    // Detail page reads the stored post
    let (status, body) = server.get(&format!("/post/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Sand in everything"));
    assert!(body.contains("Upvotes: 1"));
    assert!(body.contains("Best summer"));

    // Edit, then save; a blank title keeps the form open
    let (_, body) = server.post(&format!("/post/{id}/edit"), &[]).await;
    assert!(body.contains("value=\"Beach day\""));
    let (_, body) = server
        .post(
            &format!("/post/{id}/save"),
            &[("title", "  "), ("content", ""), ("image_url", "")],
        )
        .await;
    assert!(body.contains("A title is required."));
    assert_eq!(
        server.store.select_post(id).await.unwrap().unwrap().title,
        "Beach day"
    );
    let (_, body) = server
        .post(
            &format!("/post/{id}/save"),
            &[
                ("title", "Beach day, 2024"),
                ("content", "Sand in everything"),
                ("image_url", "http://img/beach.jpg"),
            ],
        )
        .await;
    assert!(body.contains("Edit Post"));
    assert!(body.contains("Beach day, 2024"));

    let saved = server.store.select_post(id).await.unwrap().unwrap();
    assert_eq!(saved.title, "Beach day, 2024");
    assert_eq!(saved.image_url.as_deref(), Some("http://img/beach.jpg"));
    assert_eq!(saved.upvotes, 1);

    // Delete returns to an empty list; the post is gone for good
    let (status, body) = server.post(&format!("/post/{id}/delete"), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No posts found."));

    let (status, body) = server.get(&format!("/post/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Post not found"));
}

#[tokio::test]
async fn list_filters_come_from_query_string() {
    let server = TestServer::start().await;
    for title in ["Lake house", "Birthday cake", "Lake fishing"] {
        server
            .post("/create", &[("title", title), ("content", ""), ("image_url", "")])
            .await;
    }

    let (_, body) = server.get("/?sort=popularity&q=lake").await;
    assert!(body.contains("Lake house"));
    assert!(body.contains("Lake fishing"));
    assert!(!body.contains("Birthday cake"));
    assert!(body.contains("value=\"popularity\" selected"));
}

#[tokio::test]
async fn bad_routes_are_rejected() {
    let server = TestServer::start().await;

    let (status, _) = server.get("/post/abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/post/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Post not found"));

    let (status, _) = server.get("/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.get("/?sort=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
