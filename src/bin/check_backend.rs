use chat_history_admin::config::{AppConfig, BackendConfig};
use chat_history_admin::filters::DateRange;
use chat_history_admin::paginator::last_activity_by_session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    match &config.backend {
        BackendConfig::Postgres { .. } => println!("Backend: postgres (DATABASE_URL)"),
        BackendConfig::Postgrest { base_url, .. } => println!("Backend: postgrest ({})", base_url),
    }

    let tables = config.load_tables()?;
    let store = config.connect_store().await?;

    println!("Pinging backend...");
    match store.ping().await {
        Ok(()) => println!("✅ Backend reachable"),
        Err(e) => {
            println!("❌ Backend not reachable: {}", e);
            return Ok(());
        }
    }

    for table in tables.iter() {
        let rows = store
            .session_activity(table.table_name(), &DateRange::default())
            .await;
        match rows {
            Ok(rows) => {
                let sessions = last_activity_by_session(&rows);
                println!(
                    "✅ {}: {} rows across {} sessions",
                    table.table_name(),
                    rows.len(),
                    sessions.len()
                );
            }
            Err(e) => println!("❌ {}: {}", table.table_name(), e),
        }
    }

    Ok(())
}
