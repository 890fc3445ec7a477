use spin_sdk::http::{Request, Response};
use tracing::{debug, info, warn};

use crate::config::*;
use crate::core::db::DocumentStore;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{json_response, new_id, parse_body, validate_uuid};
use crate::models::models::{CreateUserRequest, User};

/// Owns user records, the username index and (see `follow.rs`) follow edges.
pub struct UserDirectory<'s, S> {
    pub(crate) store: &'s S,
}

impl<'s, S: DocumentStore> UserDirectory<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn create_user(&self, username: &str) -> ApiResult<User> {
        if username.trim().is_empty() {
            return Err(ApiError::BadRequest("Username is required".to_string()));
        }

        // Claiming the index entry first keeps usernames unique even if two
        // signups race on the same name.
        let id = new_id();
        let owner = self
            .store
            .update_json::<String, _>(&username_key(username), |owner| {
                if owner.is_some() {
                    return false;
                }
                *owner = Some(id.clone());
                true
            })?;
        if owner.as_deref() != Some(id.as_str()) {
            return Err(ApiError::Conflict("Username already exists".to_string()));
        }

        let user = User {
            id: id.clone(),
            username: username.to_string(),
            following: Vec::new(),
        };
        if let Err(err) = self.insert_user(&user) {
            self.release_username(username, &id);
            return Err(err.into());
        }

        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        self.store.set_json(&user_key(&user.id), user)?;
        let listed = self
            .store
            .update_json::<Vec<String>, _>(USERS_LIST_KEY, |ids| {
                ids.get_or_insert_with(Vec::new).push(user.id.clone());
                true
            });
        if let Err(err) = listed {
            if let Err(e) = self.store.delete(&user_key(&user.id)) {
                warn!(user_id = %user.id, error = %e, "failed to remove partial user record");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Gives the username back, unless another signup has since taken it.
    fn release_username(&self, username: &str, id: &str) {
        let released = self
            .store
            .update_json::<String, _>(&username_key(username), |owner| {
                if owner.as_deref() != Some(id) {
                    return false;
                }
                *owner = None;
                true
            });
        if let Err(e) = released {
            warn!(username, error = %e, "failed to release username claim");
        }
    }

    /// Ids that are not UUIDs were never issued, so they resolve to nothing.
    pub fn find_user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        if !validate_uuid(user_id) {
            return Ok(None);
        }
        self.store.get_json::<User>(&user_key(user_id))
    }

    pub fn get_user(&self, user_id: &str) -> ApiResult<User> {
        self.find_user(user_id)?.ok_or_else(ApiError::user_not_found)
    }

    pub fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        match self.store.get_json::<String>(&username_key(username))? {
            Some(id) => self.find_user(&id),
            None => Ok(None),
        }
    }

    pub fn user_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.store.get_json(USERS_LIST_KEY)?.unwrap_or_default())
    }
}

// === HTTP Handlers ===

pub fn handle_create_user<S: DocumentStore>(store: &S, req: &Request) -> ApiResult<Response> {
    let body: CreateUserRequest = parse_body(req)?;
    let user = UserDirectory::new(store).create_user(&body.username)?;
    json_response(201, &user)
}

pub fn get_user_details<S: DocumentStore>(store: &S, user_id: &str) -> ApiResult<Response> {
    let user = UserDirectory::new(store).get_user(user_id)?;
    debug!(user_id = %user.id, "user fetched");
    json_response(200, &user)
}
