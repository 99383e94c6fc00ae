use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
/// Postgres holds the workflow reference rows and the profile tables.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates a handle to the MongoDB database that holds the flexible
/// achievement payload documents.
pub async fn create_mongo_database(mongo_url: &str, db_name: &str) -> Result<mongodb::Database> {
    info!("Connecting to MongoDB...");

    let options = mongodb::options::ClientOptions::parse(mongo_url).await?;
    let client = mongodb::Client::with_options(options)?;
    let database = client.database(db_name);

    info!("MongoDB client initialized (database: {db_name})");
    Ok(database)
}
