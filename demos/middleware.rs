//! Middlewares and lifecycle hooks.
//!
//! Every request is logged, requests under `/admin` need an API key, and
//! routing failures are answered with a small HTML page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::info;
use sketch::server::Error;
use sketch::{access_log, Application, HttpRequest, HttpResponse, Next, RouterError, ServerConfig, StatusCode};

const API_KEY: &str = "let-me-in";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut app = Application::new(ServerConfig::new("127.0.0.1", 8081)?);

    app.on_startup(|_app| async move {
        info!("Warming caches...");
        Ok(())
    })?;
    app.on_shutdown(|app| async move {
        info!("Served {} request(s), goodbye", app.stats().requests_served());
        Ok(())
    })?;

    app.add_middleware_fn(access_log())?;

    app.add_middleware(|req: HttpRequest, next: Next| async move {
        match next.run(req).await {
            Err(Error::Routing(RouterError::NotFound(path))) => Ok(HttpResponse::new(StatusCode::NotFound)
                .with_content_type("text/html")
                .with_body_string(format!("<h1>Nothing at {path}</h1>"))),
            other => other,
        }
    })?;

    app.add_middleware(|req: HttpRequest, next: Next| async move {
        if req.raw_path().starts_with("/admin") && req.get_header("x-api-key").map(String::as_str) != Some(API_KEY) {
            return Err(Error::http(StatusCode::Unauthorized, "Missing or wrong API key"));
        }
        next.run(req).await
    })?;

    let hits = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&hits);
    app.get("/", move |_req| {
        let hits = counter.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            Ok(HttpResponse::new(StatusCode::Ok)
                .with_content_type("text/plain")
                .with_body_string(format!("Visit #{hits}")))
        }
    })?;

    app.get("/admin/stats", |_req| async move {
        Ok(HttpResponse::new(StatusCode::Ok).with_body_string("all systems nominal"))
    })?;

    app.post("/admin/shutdown", |_req| async move {
        Err::<HttpResponse, _>(Error::http(StatusCode::Forbidden, "Use Ctrl+C"))
    })?;

    app.run()?;
    Ok(())
}
