pub mod config;
pub mod feed;
pub mod follow;
pub mod posts;
pub mod router;
pub mod users;

pub mod core {
    pub mod db;
    pub mod errors;
    pub mod helpers;
}

pub mod models {
    #[allow(clippy::module_inception)]
    pub mod models;
}

#[cfg(not(target_arch = "wasm32"))]
pub mod server;

#[cfg(target_arch = "wasm32")]
use spin_sdk::{
    http::{IntoResponse, Request},
    http_component,
};

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    use std::sync::Arc;

    let config = crate::config::Config::from_env();
    let store = crate::core::db::SpinStore::open(&config.store_label)?;
    if config.seed_demo {
        crate::core::db::seed_demo_data(&store)?;
    }

    let router = crate::router::Router::new(Arc::new(store));
    Ok(router.handle(&req))
}
