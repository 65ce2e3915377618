use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: String,
    timestamp: i64,
}

// GET /health - Liveness plus a round trip to the database
pub async fn health_check(State(pool): State<SqlitePool>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::warn!("Health check could not reach the database: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let response = HealthResponse {
        status: (if status.is_success() { "ok" } else { "degraded" }).to_string(),
        database: database.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::db;
    use crate::routes::{app, testing::send};

    #[tokio::test]
    async fn healthy_when_database_answers() {
        let app = app(db::test_pool().await);

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn unavailable_after_pool_is_closed() {
        let pool = db::test_pool().await;
        let app = app(pool.clone());
        pool.close().await;

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "unavailable");
    }
}
