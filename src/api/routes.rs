// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api")
                // Filter controls
                .route("/features", web::get().to(handlers::list_features))
                .route("/price-range", web::get().to(handlers::get_price_range))
                .route("/age-ranges", web::get().to(handlers::list_age_ranges))
                .route("/toy-types", web::get().to(handlers::list_toy_types))
                // Search
                .route("/search", web::post().to(handlers::search_toys)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::db::Db;
    use crate::database_ops::ingest::{load_entries, LoadMode};
    use crate::model::RawEntry;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    async fn app_db() -> Db {
        let db = Db::in_memory().await.unwrap();
        let entries: Vec<RawEntry> = serde_json::from_value(json!([
            { "toy": { "id": "a", "name": "Blocks", "price": 200, "type": "PUZZLE",
                "ageGroup": { "minAge": 12, "maxAge": 36 },
                "facilitates": [{ "id": "f1", "name": "Motor Skills" }] } },
            { "toy": { "id": "b", "name": "Abacus", "price": 350, "type": "EDUCATIONAL",
                "ageGroup": { "minAge": 36, "maxAge": 72 } } }
        ]))
        .unwrap();
        load_entries(&db, &entries, LoadMode::Append).await.unwrap();
        db
    }

    #[actix_web::test]
    async fn search_and_controls_round_trip_over_http() {
        let db = app_db().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(json!({ "age": 2, "sort_by": "name_asc" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["toys"][0]["name"], "Blocks");
        assert_eq!(body["toys"][0]["max_age_years"], 3.0);
        assert_eq!(body["toys"][0]["features"], json!(["Motor Skills"]));

        let req = test::TestRequest::get().uri("/api/price-range").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "min": 200.0, "max": 350.0 }));

        let req = test::TestRequest::get().uri("/api/toy-types").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!(["EDUCATIONAL", "PUZZLE"]));

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["toys"], 2);
    }

    #[actix_web::test]
    async fn health_reports_a_lost_store_as_degraded() {
        let db = app_db().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .configure(configure_routes),
        )
        .await;
        db.pool.close().await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "disconnected");
        assert_eq!(body["toys"], 0);
    }

    #[actix_web::test]
    async fn malformed_search_body_is_a_client_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_db().await))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(json!({ "sort_by": "cheapest" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }
}
