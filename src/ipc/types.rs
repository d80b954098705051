use serde::Deserialize;

use crate::model::Snapshot;
use crate::sessions::RatingPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub snapshot: Option<Snapshot>,
    pub policy: RatingPolicy,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            snapshot: None,
            policy: RatingPolicy::default(),
        }
    }
}
