use serde::{Deserialize, Serialize};

/// Team row as stored in the `team` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub headquarters: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamCreate {
    pub name: String,
    pub headquarters: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeamPublic {
    pub id: i64,
    pub name: String,
    pub headquarters: String,
}

impl From<Team> for TeamPublic {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            headquarters: team.headquarters,
        }
    }
}

/// Payload for `PATCH /teams/{id}`; absent keys keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamUpdate {
    #[serde(default, deserialize_with = "super::present")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::present")]
    pub headquarters: Option<String>,
}

impl TeamUpdate {
    pub fn apply_to(self, team: &mut Team) {
        if let Some(name) = self.name {
            team.name = name;
        }
        if let Some(headquarters) = self.headquarters {
            team.headquarters = headquarters;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_keeps_headquarters_when_only_name_sent() {
        let mut team = Team {
            id: 1,
            name: "Liga das Lendas".to_string(),
            headquarters: "Sorocaba".to_string(),
        };

        let update: TeamUpdate =
            serde_json::from_value(json!({"name": "Liga das Legendas"})).unwrap();
        update.apply_to(&mut team);

        assert_eq!(team.name, "Liga das Legendas");
        assert_eq!(team.headquarters, "Sorocaba");
    }

    #[test]
    fn create_rejects_missing_headquarters() {
        let result = serde_json::from_value::<TeamCreate>(json!({"name": "Liga das Legendas"}));
        assert!(result.is_err());
    }

    #[test]
    fn update_rejects_non_string_headquarters() {
        let result = serde_json::from_value::<TeamUpdate>(json!({"headquarters": 12}));
        assert!(result.is_err());
    }
}
