use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use crate::models::*;

mod session;

pub use session::Session;

/// How long a write waits for another writer's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Statements run at startup. Every one is a no-op when the object exists.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS team (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           name TEXT NOT NULL,
           headquarters TEXT NOT NULL
       )"#,
    r#"CREATE INDEX IF NOT EXISTS ix_team_name ON team (name)"#,
    r#"CREATE TABLE IF NOT EXISTS hero (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           name TEXT NOT NULL,
           secret_name TEXT NOT NULL,
           age INTEGER,
           team_id INTEGER REFERENCES team (id) ON DELETE SET NULL
       )"#,
    r#"CREATE INDEX IF NOT EXISTS ix_hero_name ON hero (name)"#,
    r#"CREATE INDEX IF NOT EXISTS ix_hero_age ON hero (age)"#,
    r#"CREATE INDEX IF NOT EXISTS ix_hero_team_id ON hero (team_id)"#,
];

/// Open a pool on `database_url`, creating the SQLite file if needed.
/// Foreign keys are enforced on every connection.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Create the `team` and `hero` tables and their indexes if they are missing
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *tx).await?;
    }
    tx.commit().await
}

// Hero queries
pub async fn insert_hero(conn: &mut SqliteConnection, hero: &HeroCreate) -> Result<Hero, sqlx::Error> {
    sqlx::query_as::<_, Hero>(
        r#"INSERT INTO hero (name, secret_name, age, team_id)
           VALUES (?, ?, ?, ?)
           RETURNING id, name, secret_name, age, team_id"#
    )
    .bind(&hero.name)
    .bind(&hero.secret_name)
    .bind(hero.age)
    .bind(hero.team_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_hero(conn: &mut SqliteConnection, hero_id: i64) -> Result<Option<Hero>, sqlx::Error> {
    sqlx::query_as::<_, Hero>(
        r#"SELECT id, name, secret_name, age, team_id FROM hero WHERE id = ?"#
    )
    .bind(hero_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list_heroes(conn: &mut SqliteConnection, offset: i64, limit: i64) -> Result<Vec<Hero>, sqlx::Error> {
    sqlx::query_as::<_, Hero>(
        r#"SELECT id, name, secret_name, age, team_id FROM hero
           ORDER BY id
           LIMIT ? OFFSET ?"#
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await
}

/// Write every column of `hero` back to its row and return the stored result
pub async fn update_hero(conn: &mut SqliteConnection, hero: &Hero) -> Result<Hero, sqlx::Error> {
    sqlx::query_as::<_, Hero>(
        r#"UPDATE hero
           SET name = ?, secret_name = ?, age = ?, team_id = ?
           WHERE id = ?
           RETURNING id, name, secret_name, age, team_id"#
    )
    .bind(&hero.name)
    .bind(&hero.secret_name)
    .bind(hero.age)
    .bind(hero.team_id)
    .bind(hero.id)
    .fetch_one(&mut *conn)
    .await
}

/// Returns `false` when no hero had that id
pub async fn delete_hero(conn: &mut SqliteConnection, hero_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM hero WHERE id = ?"#)
        .bind(hero_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Reverse side of the hero -> team relationship
pub async fn get_heroes_by_team(conn: &mut SqliteConnection, team_id: i64) -> Result<Vec<Hero>, sqlx::Error> {
    sqlx::query_as::<_, Hero>(
        r#"SELECT id, name, secret_name, age, team_id FROM hero
           WHERE team_id = ?
           ORDER BY id"#
    )
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await
}

/// Clear `team_id` on every member of a team. Returns how many heroes were detached.
pub async fn detach_heroes_from_team(conn: &mut SqliteConnection, team_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"UPDATE hero SET team_id = NULL WHERE team_id = ?"#)
        .bind(team_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// Team queries
pub async fn insert_team(conn: &mut SqliteConnection, team: &TeamCreate) -> Result<Team, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        r#"INSERT INTO team (name, headquarters)
           VALUES (?, ?)
           RETURNING id, name, headquarters"#
    )
    .bind(&team.name)
    .bind(&team.headquarters)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_team(conn: &mut SqliteConnection, team_id: i64) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        r#"SELECT id, name, headquarters FROM team WHERE id = ?"#
    )
    .bind(team_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn team_exists(conn: &mut SqliteConnection, team_id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(r#"SELECT id FROM team WHERE id = ?"#)
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

pub async fn list_teams(conn: &mut SqliteConnection, offset: i64, limit: i64) -> Result<Vec<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        r#"SELECT id, name, headquarters FROM team
           ORDER BY id
           LIMIT ? OFFSET ?"#
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn update_team(conn: &mut SqliteConnection, team: &Team) -> Result<Team, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        r#"UPDATE team
           SET name = ?, headquarters = ?
           WHERE id = ?
           RETURNING id, name, headquarters"#
    )
    .bind(&team.name)
    .bind(&team.headquarters)
    .bind(team.id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn delete_team(conn: &mut SqliteConnection, team_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM team WHERE id = ?"#)
        .bind(team_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fresh in-memory database with the schema applied.
/// One connection only, kept open for the life of the pool, so every
/// checkout sees the same data.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    pool
}

/// File-backed database in `dir`, opened the same way the server opens one
#[cfg(test)]
pub async fn file_pool(dir: &tempfile::TempDir) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("herobase.db").display());
    let pool = connect(&url, 5).await.unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_hero(name: &str, team_id: Option<i64>) -> HeroCreate {
        HeroCreate {
            name: name.to_string(),
            secret_name: format!("{name} (secret)"),
            age: None,
            team_id,
        }
    }

    fn new_team(name: &str) -> TeamCreate {
        TeamCreate {
            name: name.to_string(),
            headquarters: "Sorocaba".to_string(),
        }
    }

    #[tokio::test]
    async fn create_schema_is_idempotent() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_team(&mut conn, &new_team("Preventers")).await.unwrap();
        drop(conn);

        create_schema(&pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let teams = list_teams(&mut conn, 0, 100).await.unwrap();
        assert_eq!(teams.len(), 1);
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = insert_hero(&mut conn, &new_hero("Deadpond", None)).await.unwrap();
        let second = insert_hero(&mut conn, &new_hero("Spider-Boy", None)).await.unwrap();

        assert!(first.id > 0);
        assert!(second.id > first.id);
        assert_eq!(get_hero(&mut conn, first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = insert_hero(&mut conn, &new_hero("Deadpond", None)).await.unwrap();
        assert!(delete_hero(&mut conn, first.id).await.unwrap());

        let second = insert_hero(&mut conn, &new_hero("Spider-Boy", None)).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn list_applies_offset_and_limit_in_id_order() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            insert_hero(&mut conn, &new_hero(name, None)).await.unwrap();
        }

        let page = list_heroes(&mut conn, 1, 2).await.unwrap();
        let names: Vec<_> = page.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);

        let tail = list_heroes(&mut conn, 4, 100).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert!(list_heroes(&mut conn, 10, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn heroes_by_team_only_returns_members() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let team = insert_team(&mut conn, &new_team("Preventers")).await.unwrap();

        insert_hero(&mut conn, &new_hero("Rusty-Man", Some(team.id))).await.unwrap();
        insert_hero(&mut conn, &new_hero("Deadpond", None)).await.unwrap();

        let members = get_heroes_by_team(&mut conn, team.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Rusty-Man");
    }

    #[tokio::test]
    async fn foreign_key_is_enforced() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let result = insert_hero(&mut conn, &new_hero("Nobody", Some(42))).await;
        assert!(result.is_err());
        assert!(!team_exists(&mut conn, 42).await.unwrap());
    }

    #[tokio::test]
    async fn detach_clears_team_id() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let team = insert_team(&mut conn, &new_team("Preventers")).await.unwrap();
        let hero = insert_hero(&mut conn, &new_hero("Rusty-Man", Some(team.id))).await.unwrap();

        assert_eq!(detach_heroes_from_team(&mut conn, team.id).await.unwrap(), 1);
        assert!(delete_team(&mut conn, team.id).await.unwrap());

        let hero = get_hero(&mut conn, hero.id).await.unwrap().unwrap();
        assert_eq!(hero.team_id, None);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(!delete_hero(&mut conn, 999).await.unwrap());
        assert!(!delete_team(&mut conn, 999).await.unwrap());
    }

    #[tokio::test]
    async fn dropped_session_rolls_back() {
        let pool = test_pool().await;

        let mut session = Session::begin_write(&pool).await.unwrap();
        insert_team(&mut session, &new_team("Ghosts")).await.unwrap();
        drop(session);

        let mut session = Session::begin_write(&pool).await.unwrap();
        insert_team(&mut session, &new_team("Keepers")).await.unwrap();
        session.commit().await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let teams = list_teams(&mut conn, 0, 100).await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Keepers");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_write_sessions_wait_for_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir).await;

        let mut conn = pool.acquire().await.unwrap();
        let hero_id = insert_hero(&mut conn, &new_hero("Deadpond", None)).await.unwrap().id;
        drop(conn);

        // Both sessions read before they write
        let mut first = Session::begin_write(&pool).await.unwrap();
        let mut hero = get_hero(&mut first, hero_id).await.unwrap().unwrap();

        let second = tokio::spawn({
            let pool = pool.clone();
            async move {
                let mut session = Session::begin_write(&pool).await?;
                let mut hero = get_hero(&mut session, hero_id).await?.expect("hero exists");
                hero.secret_name = "second".to_string();
                update_hero(&mut session, &hero).await?;
                session.commit().await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        hero.age = Some(30);
        update_hero(&mut first, &hero).await.unwrap();
        first.commit().await.unwrap();

        second.await.unwrap().unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let hero = get_hero(&mut conn, hero_id).await.unwrap().unwrap();
        assert_eq!(hero.age, Some(30));
        assert_eq!(hero.secret_name, "second");
    }
}
