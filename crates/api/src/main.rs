use pitstop_api::app;

#[tokio::main]
async fn main() {
    pitstop_observability::init();

    let secret = match std::env::var("JWT_SECRET") {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        }
    };
    let addr = std::env::var("PITSTOP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let router = app::build_app(secret.as_bytes());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!(%addr, "pitstop api listening");

    axum::serve(listener, router)
        .await
        .expect("server exited with an error");
}
