//! Typed HTTP client for the gamikit REST API.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{
    AddPointsRequest, AddPointsResponse, AwardBadgeResponse, DauResponse,
    LeaderboardEntryResponse, OkResponse, SetLevelRequest, UserStateResponse,
};

/// Typed HTTP client for the gamikit REST API.
///
/// `base_url` must include the server's path prefix, e.g.
/// `http://localhost:8080/api/`. User ids, badges and metrics are
/// percent-encoded as individual path segments.
#[derive(Debug, Clone)]
pub struct GamikitClient {
    http: Client,
    base_url: Url,
}

impl GamikitClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::CannotBeABase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `POST /users/{user_id}/points` – apply a signed delta and return the
    /// new total.
    pub async fn add_points(
        &self,
        user_id: &str,
        metric: Option<&str>,
        delta: i64,
    ) -> Result<i64, ClientError> {
        let url = self.endpoint(&["users", user_id, "points"])?;
        let body = AddPointsRequest {
            metric: metric.map(Into::into),
            delta,
        };
        let resp = self.http.post(url).json(&body).send().await?;
        let parsed: AddPointsResponse = parse_response(resp).await?;
        Ok(parsed.total)
    }

    /// `POST /users/{user_id}/badges/{badge}` – award a badge (idempotent).
    ///
    /// Returns `false` if the user already held it.
    pub async fn award_badge(&self, user_id: &str, badge: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&["users", user_id, "badges", badge])?;
        let resp = self.http.post(url).send().await?;
        let parsed: AwardBadgeResponse = parse_response(resp).await?;
        Ok(parsed.awarded)
    }

    /// `PUT /users/{user_id}/levels/{metric}` – administrative level override.
    pub async fn set_level(
        &self,
        user_id: &str,
        metric: &str,
        level: i64,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&["users", user_id, "levels", metric])?;
        let resp = self
            .http
            .put(url)
            .json(&SetLevelRequest { level })
            .send()
            .await?;
        let _: OkResponse = parse_response(resp).await?;
        Ok(())
    }

    /// `GET /users/{user_id}` – fetch the user's state snapshot.
    pub async fn get_state(&self, user_id: &str) -> Result<UserStateResponse, ClientError> {
        let url = self.endpoint(&["users", user_id])?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /leaderboard?limit={limit}` – top ranked users.
    pub async fn leaderboard(
        &self,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntryResponse>, ClientError> {
        let url = self.endpoint(&["leaderboard"])?;
        let resp = self
            .http
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /leaderboard/{user_id}` – a single user's rank, `None` if unranked.
    pub async fn leaderboard_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<LeaderboardEntryResponse>, ClientError> {
        let url = self.endpoint(&["leaderboard", user_id])?;
        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(resp).await.map(Some)
    }

    /// `GET /analytics/dau?date={date}` – distinct active users on a UTC
    /// day (`YYYY-MM-DD`), today when `date` is `None`.
    pub async fn daily_active_users(&self, date: Option<&str>) -> Result<DauResponse, ClientError> {
        let url = self.endpoint(&["analytics", "dau"])?;
        let mut req = self.http.get(url);
        if let Some(date) = date {
            req = req.query(&[("date", date)]);
        }
        parse_response(req.send().await?).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_prefix_and_encodes_segments() {
        let client = GamikitClient::new(Url::parse("http://localhost:8080/api/").unwrap());
        let url = client.endpoint(&["users", "a b/c", "points"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users/a%20b%2Fc/points");
    }
}
