use std::sync::Arc;

use spin_sdk::http::{Method, Request, Response};
use tracing::debug;

use crate::core::db::DocumentStore;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{json_response, path_segments};
use crate::{feed, follow, posts, users};

/// Routes requests to the core components, all sharing one store handle.
pub struct Router<S> {
    store: Arc<S>,
}

impl<S> Clone for Router<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> Router<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Never fails: every error becomes a JSON error response.
    pub fn handle(&self, req: &Request) -> Response {
        let path = req.path().to_string();
        debug!(method = ?req.method(), path = %path, "request");
        match self.route(req, &path) {
            Ok(resp) => resp,
            Err(err) => err.into(),
        }
    }

    fn route(&self, req: &Request, path: &str) -> ApiResult<Response> {
        let store = self.store();
        let segments = path_segments(path);

        match (req.method(), segments.as_slice()) {
            (Method::Get, ["health"]) => {
                json_response(200, &serde_json::json!({ "status": "ok" }))
            }
            (Method::Post, ["users"]) => users::handle_create_user(store, req),
            (Method::Get, ["users", user_id]) => users::get_user_details(store, user_id),
            (Method::Post, ["users", user_id, "follow"]) => {
                follow::handle_follow(store, req, user_id)
            }
            (Method::Post, ["users", user_id, "unfollow"]) => {
                follow::handle_unfollow(store, req, user_id)
            }
            (Method::Get, ["users", user_id, "following"]) => {
                follow::get_followings_list(store, user_id)
            }
            (Method::Get, ["users", user_id, "followers"]) => {
                follow::get_followers_list(store, user_id)
            }
            (Method::Get, ["users", user_id, "feed"]) => feed::get_feed(store, user_id),
            (Method::Post, ["posts"]) => posts::create_post(store, req),
            (Method::Delete, ["posts", post_id]) => posts::delete_post(store, req, post_id),
            _ => Err(ApiError::NotFound("No route found".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemoryStore;
    use serde_json::{json, Value};

    fn router() -> Router<MemoryStore> {
        Router::new(Arc::new(MemoryStore::new()))
    }

    fn send(
        app: &Router<MemoryStore>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let bytes = body.map(|b| b.to_string().into_bytes()).unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(bytes)
            .build();
        let resp = app.handle(&req);
        let value = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
        (*resp.status(), value)
    }

    fn create_user(app: &Router<MemoryStore>, name: &str) -> String {
        let (status, user) = send(app, Method::Post, "/users", Some(json!({ "username": name })));
        assert_eq!(status, 201);
        user["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn duplicate_username_is_400() {
        let app = router();
        create_user(&app, "alice");
        let body = json!({ "username": "alice" });
        let (status, body) = send(&app, Method::Post, "/users", Some(body));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Username already exists");
    }

    #[test]
    fn malformed_bodies_are_400() {
        let app = router();
        let (status, _) = send(&app, Method::Post, "/users", Some(json!({ "name": "x" })));
        assert_eq!(status, 400);
        let (status, _) = send(&app, Method::Post, "/posts", None);
        assert_eq!(status, 400);
    }

    #[test]
    fn follow_feed_unfollow_scenario() {
        let app = router();
        let alice = create_user(&app, "alice");
        let bob = create_user(&app, "bob");

        let (status, post) = send(
            &app,
            Method::Post,
            "/posts",
            Some(json!({ "userId": alice, "content": "hello" })),
        );
        assert_eq!(status, 201);
        assert_eq!(post["author"], alice.as_str());
        assert!(post["createdAt"].is_string());

        let follow_uri = format!("/users/{}/follow", alice);
        let follower = json!({ "followerId": bob });
        let (status, ack) = send(&app, Method::Post, &follow_uri, Some(follower));
        assert_eq!(status, 200);
        assert_eq!(ack["message"], "User followed");

        let feed_uri = format!("/users/{}/feed", bob);
        let (status, feed) = send(&app, Method::Get, &feed_uri, None);
        assert_eq!(status, 200);
        let feed = feed.as_array().unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0]["content"], "hello");
        assert_eq!(feed[0]["author"]["username"], "alice");

        let unfollow_uri = format!("/users/{}/unfollow", alice);
        let follower = json!({ "followerId": bob });
        let (status, _) = send(&app, Method::Post, &unfollow_uri, Some(follower));
        assert_eq!(status, 200);
        let (_, feed) = send(&app, Method::Get, &feed_uri, None);
        assert_eq!(feed, json!([]));
    }

    #[test]
    fn delete_post_status_codes() {
        let app = router();
        let alice = create_user(&app, "alice");
        let bob = create_user(&app, "bob");
        let (_, post) = send(
            &app,
            Method::Post,
            "/posts",
            Some(json!({ "userId": alice, "content": "mine" })),
        );
        let uri = format!("/posts/{}", post["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::Delete, &uri, Some(json!({ "userId": bob })));
        assert_eq!(status, 403);
        let (status, body) = send(&app, Method::Delete, &uri, Some(json!({ "userId": alice })));
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Post deleted successfully");
        let (status, _) = send(&app, Method::Delete, &uri, Some(json!({ "userId": alice })));
        assert_eq!(status, 404);
    }

    #[test]
    fn unknown_users_and_routes_are_404() {
        let app = router();
        let (status, _) = send(&app, Method::Get, "/users/not-a-user/feed", None);
        assert_eq!(status, 404);
        let body = json!({ "userId": "x", "content": "c" });
        let (status, _) = send(&app, Method::Post, "/posts", Some(body));
        assert_eq!(status, 404);
        let (status, body) = send(&app, Method::Get, "/nowhere", None);
        assert_eq!(status, 404);
        assert_eq!(body["error"], "No route found");
    }

    #[test]
    fn following_and_followers_lists() {
        let app = router();
        let alice = create_user(&app, "alice");
        let bob = create_user(&app, "bob");
        send(
            &app,
            Method::Post,
            &format!("/users/{}/follow", alice),
            Some(json!({ "followerId": bob })),
        );

        let (_, following) = send(&app, Method::Get, &format!("/users/{}/following", bob), None);
        assert_eq!(following, json!([alice]));
        let (_, followers) = send(&app, Method::Get, &format!("/users/{}/followers", alice), None);
        assert_eq!(followers, json!([bob]));
        let (status, user) = send(&app, Method::Get, &format!("/users/{}", bob), None);
        assert_eq!(status, 200);
        assert_eq!(user["following"], json!([alice]));
    }
}
