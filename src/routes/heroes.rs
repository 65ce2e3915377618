use axum::{extract::State, response::Json};
use sqlx::sqlite::SqlitePool;

use crate::db::{self, Session};
use crate::error::ApiError;
use crate::extract::{ValidId, ValidJson, ValidQuery};
use crate::models::{DeleteResponse, HeroCreate, HeroPublic, HeroPublicWithTeam, HeroUpdate};
use super::{ensure_team_exists, Pagination};

// Sessions are opened only once the path, query and body have been validated.

// POST /heroes - Create a hero
pub async fn create_hero(
    State(pool): State<SqlitePool>,
    ValidJson(hero): ValidJson<HeroCreate>,
) -> Result<Json<HeroPublic>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    if let Some(team_id) = hero.team_id {
        ensure_team_exists(&mut session, team_id).await?;
    }

    let hero = db::insert_hero(&mut session, &hero).await?;
    session.commit().await?;

    tracing::info!(hero_id = hero.id, "Created hero");
    Ok(Json(hero.into()))
}

// GET /heroes?offset=0&limit=100 - List heroes in insertion order
pub async fn list_heroes(
    State(pool): State<SqlitePool>,
    ValidQuery(params): ValidQuery<Pagination>,
) -> Result<Json<Vec<HeroPublic>>, ApiError> {
    let (offset, limit) = params.bounds()?;

    let mut session = Session::begin(&pool).await?;
    let heroes = db::list_heroes(&mut session, offset, limit).await?;
    session.commit().await?;

    Ok(Json(heroes.into_iter().map(HeroPublic::from).collect()))
}

// GET /heroes/:id - Get hero with its team
pub async fn get_hero(
    State(pool): State<SqlitePool>,
    ValidId(hero_id): ValidId,
) -> Result<Json<HeroPublicWithTeam>, ApiError> {
    let mut session = Session::begin(&pool).await?;
    let hero = db::get_hero(&mut session, hero_id)
        .await?
        .ok_or(ApiError::NotFound("Hero"))?;

    let team = match hero.team_id {
        Some(team_id) => db::get_team(&mut session, team_id).await?,
        None => None,
    };
    session.commit().await?;

    tracing::debug!(hero_id, has_team = team.is_some(), "Fetched hero");
    Ok(Json(HeroPublicWithTeam {
        hero: hero.into(),
        team: team.map(Into::into),
    }))
}

// PATCH /heroes/:id - Merge the supplied fields into a hero
pub async fn update_hero(
    State(pool): State<SqlitePool>,
    ValidId(hero_id): ValidId,
    ValidJson(update): ValidJson<HeroUpdate>,
) -> Result<Json<HeroPublic>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    let mut hero = db::get_hero(&mut session, hero_id)
        .await?
        .ok_or(ApiError::NotFound("Hero"))?;

    if let Some(team_id) = update.new_team_id() {
        ensure_team_exists(&mut session, team_id).await?;
    }

    update.apply_to(&mut hero);
    let hero = db::update_hero(&mut session, &hero).await?;
    session.commit().await?;

    tracing::info!(hero_id, "Updated hero");
    Ok(Json(hero.into()))
}

// DELETE /heroes/:id
pub async fn delete_hero(
    State(pool): State<SqlitePool>,
    ValidId(hero_id): ValidId,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut session = Session::begin_write(&pool).await?;
    if !db::delete_hero(&mut session, hero_id).await? {
        return Err(ApiError::NotFound("Hero"));
    }
    session.commit().await?;

    tracing::info!(hero_id, "Deleted hero");
    Ok(Json(DeleteResponse::ok()))
}
