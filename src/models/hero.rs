use serde::{Deserialize, Serialize};

/// Hero row as stored in the `hero` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Hero {
    pub id: i64,
    pub name: String,
    pub secret_name: String,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
}

/// Payload for `POST /heroes`. Any `id` sent by the client is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HeroCreate {
    pub name: String,
    pub secret_name: String,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
}

/// Hero as returned to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeroPublic {
    pub id: i64,
    pub name: String,
    pub secret_name: String,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
}

impl From<Hero> for HeroPublic {
    fn from(hero: Hero) -> Self {
        Self {
            id: hero.id,
            name: hero.name,
            secret_name: hero.secret_name,
            age: hero.age,
            team_id: hero.team_id,
        }
    }
}

/// Payload for `PATCH /heroes/{id}`.
///
/// Outer `None` means the key was absent and the stored value is kept.
/// For the nullable columns, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeroUpdate {
    #[serde(default, deserialize_with = "super::present")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::present")]
    pub secret_name: Option<String>,
    #[serde(default, deserialize_with = "super::present")]
    pub age: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::present")]
    pub team_id: Option<Option<i64>>,
}

impl HeroUpdate {
    /// Team the hero will point at after this update, if the update sets one
    pub fn new_team_id(&self) -> Option<i64> {
        self.team_id.flatten()
    }

    /// Merge the supplied fields into `hero`, leaving the rest untouched
    pub fn apply_to(self, hero: &mut Hero) {
        if let Some(name) = self.name {
            hero.name = name;
        }
        if let Some(secret_name) = self.secret_name {
            hero.secret_name = secret_name;
        }
        if let Some(age) = self.age {
            hero.age = age;
        }
        if let Some(team_id) = self.team_id {
            hero.team_id = team_id;
        }
    }
}
