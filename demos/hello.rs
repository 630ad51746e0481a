//! A basic application greeting users by the name in the path.

use log::info;
use sketch::{Application, HttpResponse, ServerConfig, StatusCode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::init();

    let mut app = Application::new(ServerConfig::new("127.0.0.1", 8080)?);

    // Literal segments win over variables, so this one is not shadowed by /{username}
    app.get("/", |_req| async move {
        Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string("Hello, World!"))
    })?;

    app.get("/{username}", |req| async move {
        let username = req.param("username").unwrap_or("stranger").to_string();
        Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string(format!("Hello, {username}")))
    })?;

    app.get("/users/{id}/posts/{post}", |req| async move {
        let body = serde_json::json!({
            "user": req.param("id"),
            "post": req.param("post"),
        });
        Ok(HttpResponse::new(StatusCode::Ok).with_json(&body)?)
    })?;

    info!("Try: curl http://127.0.0.1:8080/oleh");

    // Blocks until Ctrl+C
    app.run()?;

    Ok(())
}
