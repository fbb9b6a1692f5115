// Request logging, compression and CORS

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, Logger};

/// Access-log format: client, request line, status, size, duration.
const ACCESS_LOG: &str = r#"%a "%r" %s %b %Dms"#;

pub fn setup_middleware() -> (Logger, Compress) {
    (Logger::new(ACCESS_LOG), Compress::default())
}

/// Parse a comma-separated origin list; `*` allows any origin.
pub fn parse_origins(allowed_origins: &str) -> Vec<String> {
    allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn setup_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" http://localhost:3000 ,, http://localhost:5000"),
            vec!["http://localhost:3000", "http://localhost:5000"]
        );
        assert!(parse_origins("").is_empty());
    }
}
