use axum::{routing::get, Router};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db;
use crate::error::{ApiError, FieldError};

pub mod health;
pub mod heroes;
pub mod teams;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 100;

/// Build the full application router around a shared pool
pub fn app(pool: SqlitePool) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Root and health
        .route("/", get(|| async { "Herobase API - v1.0" }))
        .route("/health", get(health::health_check))

        // Hero endpoints
        .route("/heroes", get(heroes::list_heroes).post(heroes::create_hero))
        .route(
            "/heroes/{id}",
            get(heroes::get_hero).patch(heroes::update_hero).delete(heroes::delete_hero),
        )

        // Team endpoints
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route(
            "/teams/{id}",
            get(teams::get_team).patch(teams::update_team).delete(teams::delete_team),
        )

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

// Query parameters shared by both list endpoints
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    offset: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Pagination {
    /// Checked `(offset, limit)`: offset must be >= 0, limit within 1..=100
    pub fn bounds(&self) -> Result<(i64, i64), ApiError> {
        let mut errors = Vec::new();
        if self.offset < 0 {
            errors.push(FieldError::new("offset", "must be greater than or equal to 0"));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            errors.push(FieldError::new("limit", format!("must be between 1 and {MAX_LIMIT}")));
        }

        if errors.is_empty() {
            Ok((self.offset, self.limit))
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// A hero may only point at a team that exists
async fn ensure_team_exists(conn: &mut SqliteConnection, team_id: i64) -> Result<(), ApiError> {
    if db::team_exists(conn, team_id).await? {
        Ok(())
    } else {
        Err(ApiError::invalid_field("team_id", format!("Team {team_id} does not exist")))
    }
}
