use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub login: String,
}
