pub mod analytics;
pub mod events;
pub mod leaderboard;
pub mod user;
pub mod ws;

pub use analytics::{DauQuery, DauResponse};
pub use events::{EventMessage, EventType};
pub use leaderboard::{LeaderboardEntryResponse, TopQuery};
pub use user::{
    AddPointsRequest, AddPointsResponse, AwardBadgeResponse, ErrorResponse, OkResponse, SetLevelRequest,
    UserStateResponse,
};
pub use ws::{WsCloseCode, WsServerMessage};

/// Metric used when a request does not name one.
pub const DEFAULT_METRIC: &str = "xp";
