use axum::Router;
use backchannel::{AppState, contacts, db, dm};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "backchannel=info".into()),
        )
        .init();

    let db_pool = db::connect(&dotenv::var("DATABASE_URL")?).await?;
    let app_state = AppState::new(db_pool);

    let app = Router::new()
        .nest("/dm", dm::router())
        .nest("/contacts", contacts::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
