// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::database_ops::search;
use actix_web::{web, HttpResponse, Result};

fn internal_error(context: &str, err: anyhow::Error) -> HttpResponse {
    tracing::error!(error = %err, "{context} failed");
    HttpResponse::InternalServerError().json(ErrorResponse::new(format!("{context} failed")))
}

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    let (status, database, toys) = if !db.ping().await {
        ("degraded", "disconnected", 0)
    } else {
        match db.stats().await {
            Ok(stats) => ("healthy", "connected", stats.toys),
            Err(e) => {
                tracing::warn!(error = %e, "health stats unavailable");
                ("degraded", "connected", 0)
            }
        }
    };

    Ok(HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        toys,
        timestamp: chrono::Utc::now(),
    }))
}

/// Non-archived feature names
pub async fn list_features(db: web::Data<Db>) -> Result<HttpResponse> {
    Ok(match search::available_features(&db).await {
        Ok(features) => HttpResponse::Ok().json(features),
        Err(e) => internal_error("feature listing", e),
    })
}

pub async fn get_price_range(db: web::Data<Db>) -> Result<HttpResponse> {
    Ok(match search::price_range(&db).await {
        Ok(range) => HttpResponse::Ok().json(range),
        Err(e) => internal_error("price range", e),
    })
}

pub async fn list_age_ranges(db: web::Data<Db>) -> Result<HttpResponse> {
    Ok(match search::age_ranges(&db).await {
        Ok(ranges) => HttpResponse::Ok().json(ranges),
        Err(e) => internal_error("age range listing", e),
    })
}

pub async fn list_toy_types(db: web::Data<Db>) -> Result<HttpResponse> {
    Ok(match search::toy_types(&db).await {
        Ok(types) => HttpResponse::Ok().json(types),
        Err(e) => internal_error("toy type listing", e),
    })
}

/// Filtered search; answers `{count, toys}`
pub async fn search_toys(
    payload: web::Json<SearchRequest>,
    db: web::Data<Db>,
) -> Result<HttpResponse> {
    let criteria = payload.into_inner().into_criteria();
    tracing::info!(
        age_from = ?criteria.age_from,
        min_price = ?criteria.min_price,
        max_price = ?criteria.max_price,
        text = ?criteria.text,
        toy_type = ?criteria.toy_type,
        features = criteria.features.len(),
        sort = ?criteria.sort,
        "search requested"
    );

    Ok(match search::search_toys(&db, &criteria).await {
        Ok(hits) => HttpResponse::Ok().json(SearchResponse::from(hits)),
        Err(e) => internal_error("search", e),
    })
}
