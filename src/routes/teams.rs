use axum::{extract::State, response::Json};
use sqlx::sqlite::SqlitePool;

use crate::db::{self, Session};
use crate::error::ApiError;
use crate::extract::{ValidId, ValidJson, ValidQuery};
use crate::models::{DeleteResponse, HeroPublic, TeamCreate, TeamPublic, TeamPublicWithHeroes, TeamUpdate};
use super::Pagination;

// POST /teams - Create a team
pub async fn create_team(
    State(pool): State<SqlitePool>,
    ValidJson(team): ValidJson<TeamCreate>,
) -> Result<Json<TeamPublic>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    let team = db::insert_team(&mut session, &team).await?;
    session.commit().await?;

    tracing::info!(team_id = team.id, "Created team");
    Ok(Json(team.into()))
}

// GET /teams?offset=0&limit=100 - List teams in insertion order
pub async fn list_teams(
    State(pool): State<SqlitePool>,
    ValidQuery(params): ValidQuery<Pagination>,
) -> Result<Json<Vec<TeamPublic>>, ApiError> {
    let (offset, limit) = params.bounds()?;

    let mut session = Session::begin(&pool).await?;
    let teams = db::list_teams(&mut session, offset, limit).await?;
    session.commit().await?;

    Ok(Json(teams.into_iter().map(TeamPublic::from).collect()))
}

// GET /teams/:id - Get team with its heroes
pub async fn get_team(
    State(pool): State<SqlitePool>,
    ValidId(team_id): ValidId,
) -> Result<Json<TeamPublicWithHeroes>, ApiError> {
    let mut session = Session::begin(&pool).await?;
    let team = db::get_team(&mut session, team_id)
        .await?
        .ok_or(ApiError::NotFound("Team"))?;

    let heroes = db::get_heroes_by_team(&mut session, team_id).await?;
    session.commit().await?;

    tracing::debug!(team_id, members = heroes.len(), "Fetched team");
    Ok(Json(TeamPublicWithHeroes {
        team: team.into(),
        heroes: heroes.into_iter().map(HeroPublic::from).collect(),
    }))
}

// PATCH /teams/:id - Merge the supplied fields into a team
pub async fn update_team(
    State(pool): State<SqlitePool>,
    ValidId(team_id): ValidId,
    ValidJson(update): ValidJson<TeamUpdate>,
) -> Result<Json<TeamPublic>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    let mut team = db::get_team(&mut session, team_id)
        .await?
        .ok_or(ApiError::NotFound("Team"))?;

    update.apply_to(&mut team);
    let team = db::update_team(&mut session, &team).await?;
    session.commit().await?;

    tracing::info!(team_id, "Updated team");
    Ok(Json(team.into()))
}

// DELETE /teams/:id - Member heroes stay, with their team_id cleared
pub async fn delete_team(
    State(pool): State<SqlitePool>,
    ValidId(team_id): ValidId,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    let detached = db::detach_heroes_from_team(&mut session, team_id).await?;
    if !db::delete_team(&mut session, team_id).await? {
        return Err(ApiError::NotFound("Team"));
    }
    session.commit().await?;

    tracing::info!(team_id, detached, "Deleted team");
    Ok(Json(DeleteResponse::ok()))
}
