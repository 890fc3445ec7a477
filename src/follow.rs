use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::core::db::DocumentStore;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{json_response, parse_body};
use crate::models::models::{Ack, FollowRequest, Followers, Followings, User};
use crate::users::UserDirectory;

/// Adds `target` unless already present. Returns whether the list changed.
pub fn add_following(followings: &mut Followings, target: &str) -> bool {
    if followings.iter().any(|id| id == target) {
        return false;
    }
    followings.push(target.to_string());
    true
}

/// Drops every occurrence of `target`. Returns whether the list changed.
pub fn remove_following(followings: &mut Followings, target: &str) -> bool {
    let before = followings.len();
    followings.retain(|id| id != target);
    followings.len() != before
}

impl<'s, S: DocumentStore> UserDirectory<'s, S> {
    pub fn follow(&self, follower_id: &str, target_id: &str) -> ApiResult<()> {
        self.update_followings(follower_id, target_id, add_following)?;
        info!(follower_id, target_id, "followed");
        Ok(())
    }

    pub fn unfollow(&self, follower_id: &str, target_id: &str) -> ApiResult<()> {
        self.update_followings(follower_id, target_id, remove_following)?;
        info!(follower_id, target_id, "unfollowed");
        Ok(())
    }

    fn update_followings(
        &self,
        follower_id: &str,
        target_id: &str,
        mutate: fn(&mut Followings, &str) -> bool,
    ) -> ApiResult<()> {
        self.get_user(target_id)?;

        let updated = self
            .store
            .update_json::<User, _>(&user_key(follower_id), |follower| match follower {
                Some(follower) => mutate(&mut follower.following, target_id),
                None => false,
            })?;
        updated.map(|_| ()).ok_or_else(ApiError::user_not_found)
    }

    pub fn followings(&self, user_id: &str) -> ApiResult<Followings> {
        Ok(self.get_user(user_id)?.following)
    }

    pub fn followers(&self, user_id: &str) -> ApiResult<Followers> {
        self.get_user(user_id)?;
        let mut followers = Vec::new();
        for id in self.user_ids()? {
            if let Some(user) = self.find_user(&id)? {
                if user.following.iter().any(|f| f == user_id) {
                    followers.push(user.id);
                }
            }
        }
        Ok(followers)
    }
}

// === HTTP Handlers ===

pub fn handle_follow<S: DocumentStore>(
    store: &S,
    req: &Request,
    target_id: &str,
) -> ApiResult<Response> {
    let body: FollowRequest = parse_body(req)?;
    UserDirectory::new(store).follow(&body.follower_id, target_id)?;
    json_response(200, &Ack::new("User followed"))
}

pub fn handle_unfollow<S: DocumentStore>(
    store: &S,
    req: &Request,
    target_id: &str,
) -> ApiResult<Response> {
    let body: FollowRequest = parse_body(req)?;
    UserDirectory::new(store).unfollow(&body.follower_id, target_id)?;
    json_response(200, &Ack::new("User unfollowed"))
}

pub fn get_followings_list<S: DocumentStore>(store: &S, user_id: &str) -> ApiResult<Response> {
    let followings = UserDirectory::new(store).followings(user_id)?;
    json_response(200, &followings)
}

pub fn get_followers_list<S: DocumentStore>(store: &S, user_id: &str) -> ApiResult<Response> {
    let followers = UserDirectory::new(store).followers(user_id)?;
    json_response(200, &followers)
}
