//! Request and response bodies of the `/paises` HTTP surface. Field names are
//! part of the public contract and stay in Portuguese.

use serde::{Deserialize, Serialize};

use crate::domain::{CountryRecord, VoteTally};

pub const VOTE_STATUS_SUCCESS: &str = "sucesso";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryView {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "populacao")]
    pub population: u64,
    #[serde(rename = "continente")]
    pub continent: String,
    #[serde(rename = "curtidas")]
    pub likes: u64,
    #[serde(rename = "nao_curtidas")]
    pub dislikes: u64,
}

impl CountryView {
    pub fn new(record: &CountryRecord, tally: VoteTally) -> Self {
        Self {
            name: record.name.clone(),
            population: record.population,
            continent: record.continent().to_string(),
            likes: tally.likes,
            dislikes: tally.dislikes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub nome: String,
    pub avaliacao: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(rename = "pais")]
    pub country: String,
    pub status: String,
    #[serde(rename = "quantidade_votos")]
    pub vote_count: u64,
}
