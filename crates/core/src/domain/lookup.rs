use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCount {
    pub channel_name: Option<String>,
    pub count: i64,
}

impl From<&crate::config::ChannelSeed> for Channel {
    fn from(seed: &crate::config::ChannelSeed) -> Self {
        Self { channel_id: seed.id.clone(), channel_name: seed.name.clone() }
    }
}

impl From<&crate::config::UserSeed> for User {
    fn from(seed: &crate::config::UserSeed) -> Self {
        Self { user_id: seed.id.clone(), user_name: seed.name.clone() }
    }
}
