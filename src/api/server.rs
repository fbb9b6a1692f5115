// API server implementation using actix-web

use crate::api::{middleware, routes};
use crate::database_ops::db::Db;
use crate::util::env::{env_opt, env_parse};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 5000;
const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://localhost:5000";

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("API_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid API_PORT {raw:?}"))?,
            None => env_parse("PORT", DEFAULT_PORT),
        };
        let allowed_origins = middleware::parse_origins(
            &env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ORIGINS.to_string()),
        );

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            origins = ?self.allowed_origins,
            "Starting toy catalog API server"
        );

        let db_data = web::Data::new(db);
        let allowed_origins = self.allowed_origins;

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(db_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
