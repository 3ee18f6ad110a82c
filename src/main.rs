// src/main.rs

use std::{process, sync::Arc, time::Duration};

use metaclass::{
    config::Config,
    error::AppError,
    exam::service::ExamService,
    routes,
    state::AppState,
    store::PgExamStore,
    utils::hash::hash_password,
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > DB_CONNECT_RETRIES {
                    tracing::error!(
                        "Failed to connect to database after {} retries: {}",
                        DB_CONNECT_RETRIES,
                        e
                    );
                    process::exit(1);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        process::exit(1);
    }
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {}", e);
    }

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        exams: ExamService::new(Arc::new(PgExamStore::new(pool))),
    };

    let app = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            process::exit(1);
        }
    };
    tracing::info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

/// Creates the admin account named by ADMIN_EMAIL / ADMIN_PASSWORD if it is missing.
async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        tracing::info!("Seeding admin user: {}", email);
        let hashed_password = hash_password(password)?;

        sqlx::query(
            "INSERT INTO users (email, password, role, nickname) VALUES ($1, $2, 'admin', 'admin')",
        )
        .bind(email)
        .bind(hashed_password)
        .execute(pool)
        .await?;
        tracing::info!("Admin user created successfully.");
    }
    Ok(())
}
