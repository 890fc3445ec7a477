use spin_sdk::http::{Request, Response};
use tracing::{debug, info};

use crate::config::*;
use crate::core::db::DocumentStore;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{json_response, new_id, now, parse_body, validate_uuid};
use crate::models::models::{Ack, CreatePostRequest, DeletePostRequest, Post};
use crate::users::UserDirectory;

pub struct PostLedger<'s, S> {
    store: &'s S,
}

impl<'s, S: DocumentStore> PostLedger<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn create_post(&self, author_id: &str, content: &str) -> ApiResult<Post> {
        UserDirectory::new(self.store).get_user(author_id)?;

        let post = Post {
            id: new_id(),
            content: content.to_string(),
            author: author_id.to_string(),
            created_at: now(),
        };
        self.store.set_json(&post_key(&post.id), &post)?;

        // Per-author index, newest first
        self.store
            .update_json::<Vec<String>, _>(&posts_by_key(author_id), |ids| {
                ids.get_or_insert_with(Vec::new).insert(0, post.id.clone());
                true
            })?;

        info!(post_id = %post.id, author_id, "post created");
        Ok(post)
    }

    pub fn find_post(&self, post_id: &str) -> anyhow::Result<Option<Post>> {
        if !validate_uuid(post_id) {
            return Ok(None);
        }
        self.store.get_json::<Post>(&post_key(post_id))
    }

    pub fn get_post(&self, post_id: &str) -> ApiResult<Post> {
        self.find_post(post_id)?.ok_or_else(ApiError::post_not_found)
    }

    /// Deletes a post on behalf of its author. Anyone else gets `Forbidden`.
    pub fn delete_post(&self, post_id: &str, requester_id: &str) -> ApiResult<()> {
        let post = self.get_post(post_id)?;
        if post.author != requester_id {
            return Err(ApiError::Forbidden);
        }

        self.store.delete(&post_key(post_id))?;
        self.store
            .update_json::<Vec<String>, _>(&posts_by_key(&post.author), |ids| {
                match ids {
                    Some(ids) => {
                        let before = ids.len();
                        ids.retain(|id| id != post_id);
                        ids.len() != before
                    }
                    None => false,
                }
            })?;

        info!(post_id, author_id = %post.author, "post deleted");
        Ok(())
    }

    /// Every post by `author_id`, newest first by insertion.
    pub fn posts_by(&self, author_id: &str) -> anyhow::Result<Vec<Post>> {
        self.recent_posts_by(author_id, usize::MAX)
    }

    /// The newest `limit` posts by `author_id`; only those documents are read.
    pub fn recent_posts_by(&self, author_id: &str, limit: usize) -> anyhow::Result<Vec<Post>> {
        let ids: Vec<String> = self
            .store
            .get_json(&posts_by_key(author_id))?
            .unwrap_or_default();

        let mut posts = Vec::with_capacity(ids.len().min(limit));
        for id in ids.into_iter().take(limit) {
            match self.store.get_json::<Post>(&post_key(&id))? {
                Some(post) => posts.push(post),
                None => debug!(post_id = %id, "index entry without post"),
            }
        }
        Ok(posts)
    }
}

// === HTTP Handlers ===

pub fn create_post<S: DocumentStore>(store: &S, req: &Request) -> ApiResult<Response> {
    let body: CreatePostRequest = parse_body(req)?;
    let post = PostLedger::new(store).create_post(&body.user_id, &body.content)?;
    json_response(201, &post)
}

pub fn delete_post<S: DocumentStore>(
    store: &S,
    req: &Request,
    post_id: &str,
) -> ApiResult<Response> {
    let body: DeletePostRequest = parse_body(req)?;
    PostLedger::new(store).delete_post(post_id, &body.user_id)?;
    json_response(200, &Ack::new("Post deleted successfully"))
}
