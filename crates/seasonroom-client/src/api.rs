//! HTTP access to the season-room backend.
//!
//! Every call carries the stored bearer token. A 401 that the server marks
//! as an expired token triggers one shared refresh and a single retry; if
//! the refresh fails the stored session is cleared and the call fails with
//! [`ClientError::SessionExpired`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use seasonroom_core::calendar::format_iso_date;
use seasonroom_core::config::Config;
use seasonroom_core::{CalendarDate, CrewId, ReservationId, YearMonth};

use crate::dto::{
    CancelReservationRequest, CreateReservationRequest, CreateReservationResponse, CrewCalendar,
    CrewDetail, Envelope, ErrorBody, GuestInfo, MyCalendar, MyReservation, RefreshedTokens,
    ReservationDetail, UserDetail,
};
use crate::error::ClientError;
use crate::refresh::{RefreshCoordinator, RefreshError};
use crate::tokens::{TokenPair, TokenStore};

const EXPIRED_ACCESS_MARKER: &str = "만료된 JWT 토큰";
const EXPIRED_REFRESH_MARKER: &str = "리프레시 토큰";
const ENVELOPE_OK: i32 = 200;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    refresher: RefreshCoordinator,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Whether a non-success answer means "your access token expired".
pub fn is_token_expired(status: StatusCode, body: &ErrorBody) -> bool {
    status == StatusCode::UNAUTHORIZED
        && (body.code == Some(401)
            || body
                .message
                .as_deref()
                .is_some_and(|m| m.contains(EXPIRED_ACCESS_MARKER)))
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "built api client");
        Ok(Self {
            http,
            base_url,
            tokens,
            refresher: RefreshCoordinator::new(),
        })
    }

    pub fn from_config(cfg: &Config, tokens: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let base_url = cfg.base_url()?;
        let timeout = cfg.request_timeout()?;
        Self::new(base_url, timeout, tokens).context("failed building HTTP client")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn login(&self, tokens: &TokenPair) -> Result<(), ClientError> {
        self.tokens.save(tokens)?;
        info!("stored session tokens");
        Ok(())
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.tokens.clear()?;
        info!("cleared session tokens");
        Ok(())
    }

    pub async fn me(&self) -> Result<UserDetail, ClientError> {
        self.get_data("/users/me").await
    }

    pub async fn my_reservations(&self) -> Result<Vec<MyReservation>, ClientError> {
        let path = "/users/me/reservations";
        Ok(self.request(Method::GET, path, None::<&()>).await?.unwrap_or_default())
    }

    pub async fn crew(&self, crew_id: CrewId) -> Result<CrewDetail, ClientError> {
        self.get_data(&format!("/crews/{crew_id}")).await
    }

    pub async fn my_calendar(
        &self,
        crew_id: CrewId,
        month: YearMonth,
    ) -> Result<MyCalendar, ClientError> {
        let path = format!(
            "/crews/{crew_id}/calendar/my?date={}",
            format_iso_date(month.first_day())
        );
        Ok(self.request(Method::GET, &path, None::<&()>).await?.unwrap_or_default())
    }

    pub async fn crew_calendar(
        &self,
        crew_id: CrewId,
        month: YearMonth,
    ) -> Result<CrewCalendar, ClientError> {
        let path = format!(
            "/crews/{crew_id}/calendar?date={}",
            format_iso_date(month.first_day())
        );
        Ok(self.request(Method::GET, &path, None::<&()>).await?.unwrap_or_default())
    }

    pub async fn reservation_detail(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<ReservationDetail, ClientError> {
        let path = format!(
            "/crews/{crew_id}/reservations/detail?date={}",
            format_iso_date(date)
        );
        self.get_data(&path).await
    }

    pub async fn create_reservations(
        &self,
        crew_id: CrewId,
        dates: &[CalendarDate],
        guest: Option<&GuestInfo>,
    ) -> Result<CreateReservationResponse, ClientError> {
        if dates.is_empty() {
            return Err(ClientError::Validation("no dates to reserve".to_string()));
        }
        let body = CreateReservationRequest {
            dates: dates.iter().map(|d| format_iso_date(*d)).collect(),
            guest_info: guest.cloned(),
        };
        let path = format!("/crews/{crew_id}/reservations");
        Ok(self.request(Method::POST, &path, Some(&body)).await?.unwrap_or_default())
    }

    pub async fn cancel_reservations(
        &self,
        crew_id: CrewId,
        dates: &[CalendarDate],
    ) -> Result<(), ClientError> {
        let body = CancelReservationRequest {
            dates: dates.iter().map(|d| format_iso_date(*d)).collect(),
        };
        let path = format!("/crews/{crew_id}/reservations");
        self.request::<serde_json::Value, _>(Method::DELETE, &path, Some(&body))
            .await?;
        Ok(())
    }

    pub async fn apply_teaching(
        &self,
        crew_id: CrewId,
        reservation_id: ReservationId,
    ) -> Result<(), ClientError> {
        let path = format!("/crews/{crew_id}/reservations/{reservation_id}/teaching");
        self.request::<serde_json::Value, ()>(Method::POST, &path, None)
            .await?;
        Ok(())
    }

    pub async fn withdraw_teaching(
        &self,
        crew_id: CrewId,
        reservation_id: ReservationId,
    ) -> Result<(), ClientError> {
        let path = format!("/crews/{crew_id}/reservations/{reservation_id}/teaching");
        self.request::<serde_json::Value, ()>(Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None::<&()>)
            .await?
            .ok_or_else(|| ClientError::MissingData {
                path: path.to_string(),
            })
    }

    /// Sends one authenticated request and unwraps the envelope's `data`.
    #[tracing::instrument(skip(self, method, body), fields(method = %method))]
    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|source| ClientError::Decode {
                path: path.to_string(),
                source,
            })?;
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;

        loop {
            let sent_with = self.tokens.load()?.map(|t| t.access_token);
            let mut request = self
                .http
                .request(method.clone(), url.as_str())
                .header(ACCEPT, "application/json");
            if let Some(token) = &sent_with {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(bytes) = &payload {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    warn!(path, error = %error, "request failed");
                    return Err(error.into());
                }
            };
            let status = response.status();
            let bytes = response.bytes().await?;
            debug!(path, status = %status, len = bytes.len(), "response received");

            if status.is_success() {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let envelope: Envelope<T> =
                    serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
                        path: path.to_string(),
                        source,
                    })?;
                return Ok(envelope.data);
            }

            let error_body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            if !is_token_expired(status, &error_body) {
                warn!(path, status = %status, message = ?error_body.message, "request rejected");
                return Err(ClientError::Api {
                    status,
                    code: error_body.code,
                    message: error_body
                        .message
                        .unwrap_or_else(|| status.to_string()),
                });
            }

            if retried {
                warn!(path, "token rejected again after refresh");
                self.expire_session();
                return Err(ClientError::SessionExpired {
                    reason: RefreshError::Failed("token rejected after refresh".to_string()),
                });
            }
            retried = true;

            let current = self.tokens.load()?.map(|t| t.access_token);
            if current.is_some() && current != sent_with {
                debug!(path, "token already replaced; retrying");
                continue;
            }

            if let Err(reason) = self.refresher.refresh(|| self.refresh_tokens()).await {
                self.expire_session();
                return Err(ClientError::SessionExpired { reason });
            }
        }
    }

    /// Exchanges the stored refresh token for a new access token.
    async fn refresh_tokens(&self) -> Result<String, RefreshError> {
        let stored = self
            .tokens
            .load()
            .map_err(|err| RefreshError::Failed(format!("{err:#}")))?
            .ok_or(RefreshError::NoRefreshToken)?;

        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(url.as_str())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", stored.refresh_token))
            .send()
            .await
            .map_err(|err| RefreshError::Failed(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| RefreshError::Failed(err.to_string()))?;

        if !status.is_success() {
            let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            let message = body.message.unwrap_or_else(|| status.to_string());
            if status == StatusCode::UNAUTHORIZED && message.contains(EXPIRED_REFRESH_MARKER) {
                return Err(RefreshError::Expired);
            }
            return Err(RefreshError::Failed(message));
        }

        let envelope: Envelope<RefreshedTokens> = serde_json::from_slice(&bytes)
            .map_err(|err| RefreshError::Failed(format!("malformed refresh response: {err}")))?;
        let refreshed = envelope.data.filter(|_| envelope.code == ENVELOPE_OK);
        let Some(access_token) = refreshed
            .as_ref()
            .and_then(|d| d.access_token.clone())
            .filter(|t| !t.is_empty())
        else {
            return Err(RefreshError::Failed(format!(
                "refresh rejected: {}",
                envelope.message
            )));
        };
        let refresh_token = refreshed
            .and_then(|d| d.refresh_token)
            .filter(|t| !t.is_empty())
            .unwrap_or(stored.refresh_token);

        self.tokens
            .save(&TokenPair {
                access_token: access_token.clone(),
                refresh_token,
            })
            .map_err(|err| RefreshError::Failed(format!("{err:#}")))?;
        Ok(access_token)
    }

    fn expire_session(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!(error = %format!("{err:#}"), "failed clearing expired session");
        } else {
            info!("session expired; stored tokens cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::is_token_expired;
    use crate::dto::ErrorBody;

    fn body(code: Option<i32>, message: Option<&str>) -> ErrorBody {
        ErrorBody {
            code,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn expiry_detection() {
        assert!(is_token_expired(StatusCode::UNAUTHORIZED, &body(Some(401), None)));
        assert!(is_token_expired(
            StatusCode::UNAUTHORIZED,
            &body(None, Some("만료된 JWT 토큰입니다."))
        ));
        assert!(!is_token_expired(StatusCode::UNAUTHORIZED, &body(Some(4010), Some("bad signature"))));
        assert!(!is_token_expired(StatusCode::FORBIDDEN, &body(Some(401), None)));
    }
}
