//! Native host: serves the same router through actix-web, backed by a `MemoryStore`.

use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::{error, info};

use crate::config::Config;
use crate::core::db::{seed_demo_data, MemoryStore};
use crate::router::Router;

pub type NativeRouter = Router<MemoryStore>;

mod adapter {
    use actix_web::HttpRequest;
    use spin_sdk::http::{Method, Request, Response};

    pub fn actix_to_spin_request(req: &HttpRequest, body: actix_web::web::Bytes) -> Request {
        let method = match req.method().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => Method::Other(other.to_string()),
        };

        let uri = req.uri().to_string();
        let mut builder = Request::builder();
        builder.method(method).uri(uri);
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                builder.header(name.as_str(), value);
            }
        }
        builder.body(body.to_vec()).build()
    }

    pub fn spin_to_actix_response(spin_resp: Response) -> actix_web::HttpResponse {
        let status = actix_web::http::StatusCode::from_u16(*spin_resp.status())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = actix_web::HttpResponse::build(status);
        if let Some(content_type) = spin_resp.header("content-type").and_then(|v| v.as_str()) {
            response.content_type(content_type.to_string());
        }
        response.body(spin_resp.body().to_vec())
    }
}

/// Registers a catch-all route that hands every request to the router in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{tail:.*}", web::route().to(handle_all));
}

async fn handle_all(
    req: HttpRequest,
    body: web::Bytes,
    router: web::Data<NativeRouter>,
) -> HttpResponse {
    let spin_req = adapter::actix_to_spin_request(&req, body);
    let spin_resp = router.handle(&spin_req);
    adapter::spin_to_actix_response(spin_resp)
}

pub fn native_router(config: &Config) -> anyhow::Result<NativeRouter> {
    let store = MemoryStore::new();
    if config.seed_demo {
        seed_demo_data(&store)?;
    }
    Ok(Router::new(Arc::new(store)))
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let router = native_router(&config).map_err(|e| {
        error!(error = %e, "failed to prepare store");
        std::io::Error::other(e.to_string())
    })?;
    let router = web::Data::new(router);

    info!(
        port = config.port,
        store = %config.store_label,
        "server listening on http://0.0.0.0:{}",
        config.port
    );

    HttpServer::new(move || App::new().app_data(router.clone()).configure(configure))
        .bind(("0.0.0.0", config.port))?
        .run()
        .await
}
