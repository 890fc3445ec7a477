use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::*;
use crate::core::errors::ApiError;
use crate::models::models::User;
use crate::posts::PostLedger;
use crate::users::UserDirectory;

/// JSON document storage keyed by string, shaped after the Spin key-value API.
pub trait DocumentStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>;

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>;

    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Read-modify-write of a single document.
    ///
    /// `f` sees the current value (`None` when absent) and returns whether it
    /// changed it. Changed values are written back, or deleted when left as
    /// `None`. Returns the value as it stands afterwards.
    ///
    /// The default is a plain read followed by a write; stores that can hold a
    /// lock across both steps override it.
    fn update_json<T, F>(&self, key: &str, f: F) -> anyhow::Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Option<T>) -> bool,
    {
        let mut current = self.get_json::<T>(key)?;
        if f(&mut current) {
            match &current {
                Some(value) => self.set_json(key, value)?,
                None => self.delete(key)?,
            }
        }
        Ok(current)
    }
}

/// Process-local store used by the native host and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

impl DocumentStore for MemoryStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let docs = self.docs.read().map_err(poisoned)?;
        match docs.get(key) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.docs.write().map_err(poisoned)?.insert(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.docs.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn update_json<T, F>(&self, key: &str, f: F) -> anyhow::Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Option<T>) -> bool,
    {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let mut current = match docs.get(key) {
            Some(bytes) => Some(serde_json::from_slice::<T>(bytes)?),
            None => None,
        };
        if f(&mut current) {
            match &current {
                Some(value) => {
                    docs.insert(key.to_string(), serde_json::to_vec(value)?);
                }
                None => {
                    docs.remove(key);
                }
            }
        }
        Ok(current)
    }
}

/// Spin key-value store, used when running as a Spin component.
pub struct SpinStore(spin_sdk::key_value::Store);

impl SpinStore {
    pub fn open(label: &str) -> anyhow::Result<Self> {
        let store = spin_sdk::key_value::Store::open(label)
            .map_err(|e| anyhow!("failed to open key-value store '{}': {}", label, e))?;
        Ok(Self(store))
    }
}

impl DocumentStore for SpinStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        self.0.get_json(key)
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.0.set_json(key, value)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.0.delete(key)?;
        Ok(())
    }
}

const DEMO_POST: &str = "Welcome to murmur! Excited to share thoughts here.";

/// Looks the user up, creating it when missing. A signup that takes the name
/// between the lookup and the create counts as already existing.
fn ensure_user<S: DocumentStore>(store: &S, username: &str) -> anyhow::Result<(User, bool)> {
    let users = UserDirectory::new(store);
    if let Some(user) = users.find_by_username(username)? {
        return Ok((user, false));
    }
    match users.create_user(username) {
        Ok(user) => Ok((user, true)),
        Err(ApiError::Conflict(_)) => users
            .find_by_username(username)?
            .map(|user| (user, false))
            .ok_or_else(|| anyhow!("user '{}' claimed but not yet stored", username)),
        Err(err) => Err(err.into()),
    }
}

/// Creates `alice` and `bob`, one post by alice, and bob following alice.
/// Running it again leaves existing demo records alone.
pub fn seed_demo_data<S: DocumentStore>(store: &S) -> anyhow::Result<()> {
    let (alice, alice_created) = ensure_user(store, "alice")?;
    let (bob, _) = ensure_user(store, "bob")?;

    if alice_created {
        PostLedger::new(store).create_post(&alice.id, DEMO_POST)?;
    }
    UserDirectory::new(store).follow(&bob.id, &alice.id)?;

    tracing::info!("demo data seeded");
    Ok(())
}

/// Removes every user, post and index document.
pub fn reset_db_data<S: DocumentStore>(store: &S) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    for id in &users {
        if let Some(user) = store.get_json::<User>(&user_key(id))? {
            store.delete(&username_key(&user.username))?;
        }
        let posts: Vec<String> = store.get_json(&posts_by_key(id))?.unwrap_or_default();
        for post_id in posts {
            store.delete(&post_key(&post_id))?;
        }
        store.delete(&posts_by_key(id))?;
        store.delete(&user_key(id))?;
    }

    store.delete(USERS_LIST_KEY)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Hides the first username lookup, as if a signup landed right after it.
    #[derive(Default)]
    struct LateSignupStore {
        inner: MemoryStore,
        hidden: AtomicBool,
    }

    impl DocumentStore for LateSignupStore {
        fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
            if key.starts_with("username:") && !self.hidden.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_json(key)
        }

        fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
            self.inner.set_json(key, value)
        }

        fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.inner.delete(key)
        }

        fn update_json<T, F>(&self, key: &str, f: F) -> anyhow::Result<Option<T>>
        where
            T: Serialize + DeserializeOwned,
            F: FnOnce(&mut Option<T>) -> bool,
        {
            self.inner.update_json(key, f)
        }
    }

    #[test]
    fn seeding_tolerates_a_concurrent_signup() {
        let store = LateSignupStore::default();
        let alice = UserDirectory::new(&store.inner).create_user("alice").unwrap();

        seed_demo_data(&store).unwrap();

        let users = UserDirectory::new(&store.inner);
        assert_eq!(users.user_ids().unwrap().len(), 2);
        let bob = users.find_by_username("bob").unwrap().unwrap();
        assert_eq!(bob.following, vec![alice.id.clone()]);
        // alice already existed, so no demo post was written for her
        assert!(PostLedger::new(&store.inner).posts_by(&alice.id).unwrap().is_empty());
    }

    #[test]
    fn update_json_writes_only_on_change() {
        let store = MemoryStore::new();
        let untouched = store
            .update_json::<Vec<String>, _>("list", |_| false)
            .unwrap();
        assert!(untouched.is_none());
        assert!(store.is_empty());

        store
            .update_json::<Vec<String>, _>("list", |ids| {
                ids.get_or_insert_with(Vec::new).push("a".into());
                true
            })
            .unwrap();
        let stored: Option<Vec<String>> = store.get_json("list").unwrap();
        assert_eq!(stored, Some(vec!["a".to_string()]));
    }

    #[test]
    fn update_json_to_none_deletes() {
        let store = MemoryStore::new();
        store.set_json("k", &1u32).unwrap();
        let after = store
            .update_json::<u32, _>("k", |v| {
                *v = None;
                true
            })
            .unwrap();
        assert!(after.is_none());
        assert!(store.get_json::<u32>("k").unwrap().is_none());
    }

    #[test]
    fn seeding_is_idempotent() {
        let store = MemoryStore::new();
        seed_demo_data(&store).unwrap();
        let docs_after_first = store.len();
        seed_demo_data(&store).unwrap();
        assert_eq!(store.len(), docs_after_first);

        let users: Vec<String> = store.get_json(USERS_LIST_KEY).unwrap().unwrap();
        assert_eq!(users.len(), 2);

        let bob_id: String = store.get_json(&username_key("bob")).unwrap().unwrap();
        let alice_id: String = store.get_json(&username_key("alice")).unwrap().unwrap();
        let bob: User = store.get_json(&user_key(&bob_id)).unwrap().unwrap();
        assert_eq!(bob.following, vec![alice_id.clone()]);

        let alice_posts: Vec<String> = store.get_json(&posts_by_key(&alice_id)).unwrap().unwrap();
        assert_eq!(alice_posts.len(), 1);
    }

    #[test]
    fn reset_clears_everything_seeded() {
        let store = MemoryStore::new();
        seed_demo_data(&store).unwrap();
        reset_db_data(&store).unwrap();
        assert!(store.is_empty());
    }
}
