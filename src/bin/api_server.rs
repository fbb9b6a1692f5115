// HTTP API server binary: JSON search endpoints over the toy store

use anyhow::Result;
use toy_catalog::api::ApiServer;
use toy_catalog::database_ops::db::Db;
use toy_catalog::logging::{init_tracing, DEFAULT_FILTER};
use toy_catalog::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing(&format!("{DEFAULT_FILTER},actix_web=info"))?;
    env_util::bootstrap_cli("api_server");

    tracing::info!("Initializing toy catalog API server");

    let server = ApiServer::from_env()?;

    let db = Db::connect(&env_util::db_path()).await?;
    let stats = db.stats().await?;
    tracing::info!(toys = stats.toys, images = stats.images, "Database connected successfully");

    server.run(db).await?;

    Ok(())
}
