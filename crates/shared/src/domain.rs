use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(VoteId);

/// Shown in place of a continent when the upstream record lists none.
pub const UNKNOWN_CONTINENT: &str = "unknown";

/// A country as described by the external directory. The common name is the
/// only key shared with the vote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    pub population: u64,
    pub continents: Vec<String>,
}

impl CountryRecord {
    pub fn continent(&self) -> &str {
        self.continents
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CONTINENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub likes: u64,
    pub dislikes: u64,
}

impl VoteTally {
    pub fn total(&self) -> u64 {
        self.likes + self.dislikes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Like,
    Dislike,
}

impl Rating {
    pub const LIKE_TOKEN: &'static str = "curti";
    pub const DISLIKE_TOKEN: &'static str = "nao_curti";

    /// Parses the literal vote token accepted on the wire. Matching is exact.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            Self::LIKE_TOKEN => Some(Self::Like),
            Self::DISLIKE_TOKEN => Some(Self::Dislike),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Like => Self::LIKE_TOKEN,
            Self::Dislike => Self::DISLIKE_TOKEN,
        }
    }

    pub fn is_like(self) -> bool {
        matches!(self, Self::Like)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continent_falls_back_when_list_is_empty() {
        let record = CountryRecord {
            name: "Atlantis".into(),
            population: 0,
            continents: Vec::new(),
        };
        assert_eq!(record.continent(), UNKNOWN_CONTINENT);
    }

    #[test]
    fn continent_uses_first_entry() {
        let record = CountryRecord {
            name: "Russia".into(),
            population: 144_104_080,
            continents: vec!["Europe".into(), "Asia".into()],
        };
        assert_eq!(record.continent(), "Europe");
    }

    #[test]
    fn rating_tokens_are_exact() {
        assert_eq!(Rating::from_token("curti"), Some(Rating::Like));
        assert_eq!(Rating::from_token("nao_curti"), Some(Rating::Dislike));
        assert_eq!(Rating::from_token("Curti"), None);
        assert_eq!(Rating::from_token(" curti"), None);
        assert_eq!(Rating::from_token(""), None);
        assert_eq!(Rating::Dislike.as_token(), "nao_curti");
    }
}
