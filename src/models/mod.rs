use serde::{Deserialize, Deserializer, Serialize};

mod hero;
mod team;

pub use hero::{Hero, HeroCreate, HeroPublic, HeroUpdate};
pub use team::{Team, TeamCreate, TeamPublic, TeamUpdate};

/// Hero with its owning team resolved, for `GET /heroes/{id}`
#[derive(Debug, Serialize, PartialEq)]
pub struct HeroPublicWithTeam {
    #[serde(flatten)]
    pub hero: HeroPublic,
    pub team: Option<TeamPublic>,
}

/// Team with its member heroes, for `GET /teams/{id}`.
/// `heroes` is always a list, empty when nobody has joined.
#[derive(Debug, Serialize, PartialEq)]
pub struct TeamPublicWithHeroes {
    #[serde(flatten)]
    pub team: TeamPublic,
    pub heroes: Vec<HeroPublic>,
}

/// Body returned by both delete endpoints
#[derive(Debug, Serialize, PartialEq)]
pub struct DeleteResponse {
    pub ok: bool,
}

impl DeleteResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

// Used with `#[serde(default)]` so a key that is present always yields `Some`,
// even when its value is `null`. Absent keys fall back to `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
