use std::sync::Arc;

use certdesk::app::build_router;
use certdesk::orm::{Db, apply_migration_files, auto_migrate};
use certdesk::settings::Settings;
use certdesk::state::AppState;
use certdesk::template::set_display_logs;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let settings = Settings::from_env()?;
    set_display_logs(settings.template.debug);

    let db = Arc::new(Db::connect(&settings.database_url).await?);
    auto_migrate(db.clone()).await?;
    apply_migration_files(db.clone(), &settings.migrations_dir).await?;

    let state = AppState::from_settings(db, settings)?;
    let router = build_router(&state);
    router.run_http(state).await
}
