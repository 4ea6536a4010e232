use chat_history_admin::config::AppConfig;
use chat_history_admin::{app, AppState, SessionPaginator};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let tables = match config.load_tables() {
        Ok(tables) => tables,
        Err(e) => {
            tracing::error!("Failed to load table registry: {}", e);
            std::process::exit(1);
        }
    };

    let store = match config.connect_store().await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to initialize backend: {}", e);
            std::process::exit(1);
        }
    };

    // One backend handle for the whole process
    if let Err(e) = store.ping().await {
        tracing::warn!("Backend ({}) is not reachable yet: {}", store.backend_name(), e);
    } else {
        tracing::info!("Backend ({}) reachable", store.backend_name());
    }

    let shared_state = Arc::new(AppState {
        paginator: SessionPaginator::new(store),
        tables,
    });

    for table in shared_state.tables.iter() {
        tracing::info!("Serving history for table {}", table.table_name());
    }

    let app = app(shared_state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {}", e);
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,chat_history_admin=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,chat_history_admin=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized");
    Ok(())
}
