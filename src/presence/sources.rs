//! Data sources that can fill template placeholders

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownDataSource;

const MAIN_MENU: &str = "Main Menu";
const SINGLEPLAYER: &str = "Singleplayer";
const DEFAULT_USERNAME: &str = "Player";
const DEFAULT_HEALTH: &str = "0.0";
const DEFAULT_HUNGER: &str = "0";
const DEFAULT_HELD_ITEM: &str = "Air";

/// Identifier of a data source, as written in the `formatArgs` config list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceId {
    Dimension,
    Username,
    Health,
    Hunger,
    Server,
    HeldItem,
}

impl DataSourceId {
    pub const ALL: [DataSourceId; 6] = [
        DataSourceId::Dimension,
        DataSourceId::Username,
        DataSourceId::Health,
        DataSourceId::Hunger,
        DataSourceId::Server,
        DataSourceId::HeldItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceId::Dimension => "DIMENSION",
            DataSourceId::Username => "USERNAME",
            DataSourceId::Health => "HEALTH",
            DataSourceId::Hunger => "HUNGER",
            DataSourceId::Server => "SERVER",
            DataSourceId::HeldItem => "HELD_ITEM",
        }
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceId {
    type Err = UnknownDataSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownDataSource(s.to_string()))
    }
}

/// Where the client is currently playing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLink {
    /// Connected to a remote server at this address
    Remote(String),
    /// Playing an integrated, local world
    Local,
}

/// Live view of the host application's state.
///
/// Called from the host's tick thread; every accessor must be cheap and may
/// report `None` when the value does not currently exist (no world loaded,
/// no player spawned, and so on).
pub trait HostContext: Send + Sync {
    /// Identifier of the world/dimension the player is in
    fn dimension(&self) -> Option<String>;

    fn username(&self) -> Option<String>;

    fn health(&self) -> Option<f32>;

    fn hunger(&self) -> Option<u32>;

    fn server(&self) -> Option<ServerLink>;

    /// Display name of the item in the player's main hand
    fn held_item(&self) -> Option<String>;
}

/// Renders data source values from a host, falling back to fixed labels
pub struct DataSources<'a> {
    host: &'a dyn HostContext,
}

impl<'a> DataSources<'a> {
    pub fn new(host: &'a dyn HostContext) -> Self {
        Self { host }
    }

    pub fn lookup(&self, id: DataSourceId) -> String {
        match id {
            DataSourceId::Dimension => self.dimension(),
            DataSourceId::Username => self
                .host
                .username()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            DataSourceId::Health => self
                .host
                .health()
                .map(|health| format!("{:?}", health))
                .unwrap_or_else(|| DEFAULT_HEALTH.to_string()),
            DataSourceId::Hunger => self
                .host
                .hunger()
                .map(|hunger| hunger.to_string())
                .unwrap_or_else(|| DEFAULT_HUNGER.to_string()),
            DataSourceId::Server => match self.host.server() {
                Some(ServerLink::Remote(address)) => address,
                Some(ServerLink::Local) => SINGLEPLAYER.to_string(),
                None => MAIN_MENU.to_string(),
            },
            DataSourceId::HeldItem => self
                .host
                .held_item()
                .unwrap_or_else(|| DEFAULT_HELD_ITEM.to_string()),
        }
    }

    pub fn dimension(&self) -> String {
        self.host
            .dimension()
            .unwrap_or_else(|| MAIN_MENU.to_string())
    }
}
