/**
 * Server Configuration
 *
 * Loads the optional PostgreSQL pool the stores run on.
 *
 * # Error Handling
 *
 * Database problems are logged but do not prevent server startup. Without a
 * pool the server falls back to the in-memory store.
 */

#[cfg(feature = "ssr")]
use sqlx::PgPool;

/// Database pool, or `None` when the database is not available
#[cfg(feature = "ssr")]
pub type DatabaseConfig = Option<PgPool>;

/// Connect to `database_url` and run the sync migrations
///
/// Returns `None` when no URL is configured or the connection fails.
#[cfg(feature = "ssr")]
pub async fn load_database(database_url: Option<&str>) -> DatabaseConfig {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set. Database features will be disabled.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Database features will be disabled.");
            return None;
        }
    };

    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => {
            tracing::info!("Database migrations completed successfully");
        }
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}
