use std::cmp::Ordering;
use std::collections::HashMap;

use spin_sdk::http::Response;
use tracing::{debug, warn};

use crate::config::FEED_LIMIT;
use crate::core::db::DocumentStore;
use crate::core::errors::ApiResult;
use crate::core::helpers::json_response;
use crate::models::models::{FeedPost, Post, User};
use crate::posts::PostLedger;
use crate::users::UserDirectory;

/// Newest first; equal timestamps fall back to descending post id.
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

pub struct FeedAssembler<'s, S> {
    store: &'s S,
}

impl<'s, S: DocumentStore> FeedAssembler<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// The most recent posts by the accounts `user_id` follows, at most `FEED_LIMIT`.
    pub fn get_feed(&self, user_id: &str) -> ApiResult<Vec<FeedPost>> {
        let users = UserDirectory::new(self.store);
        let ledger = PostLedger::new(self.store);
        let user = users.get_user(user_id)?;

        let mut authors: HashMap<String, User> = HashMap::new();
        let mut posts: Vec<Post> = Vec::new();
        for followee_id in &user.following {
            if authors.contains_key(followee_id) {
                continue;
            }
            match users.find_user(followee_id)? {
                Some(author) => {
                    posts.extend(ledger.recent_posts_by(&author.id, FEED_LIMIT)?);
                    authors.insert(author.id.clone(), author);
                }
                None => warn!(user_id, followee_id = %followee_id, "followee no longer exists"),
            }
        }

        posts.sort_by(feed_order);
        posts.truncate(FEED_LIMIT);

        let feed: Vec<FeedPost> = posts
            .into_iter()
            .filter_map(|post| {
                let author = authors.get(&post.author)?;
                Some(FeedPost::new(post, author))
            })
            .collect();

        debug!(user_id, entries = feed.len(), "feed assembled");
        Ok(feed)
    }
}

// === HTTP Handlers ===

pub fn get_feed<S: DocumentStore>(store: &S, user_id: &str) -> ApiResult<Response> {
    let feed = FeedAssembler::new(store).get_feed(user_id)?;
    json_response(200, &feed)
}
