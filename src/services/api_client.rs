use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{
    DataResponse, ErrorResponse, LoginData, LoginRequest, MessageResponse, PickupPayload, Plan,
    Reservation, ReturnPayload, SubmitPayload,
};
use crate::services::session::SessionStore;

pub const RESERVATION_RELATIONS: &[&str] = &[
    "helmetItems",
    "fakItems",
    "motorItems",
    "hardcaseItems",
    "return",
    "pickup",
    "motoritems.general",
];

#[async_trait]
pub trait ReservationApi: Send + Sync {
    async fn list_plans(&self) -> Result<Vec<Plan>, ApiError>;

    async fn list_reservations(&self) -> Result<Vec<Reservation>, ApiError>;

    async fn get_reservation(&self, id: i64) -> Result<Reservation, ApiError>;

    async fn create_reservation(&self, payload: &PickupPayload) -> Result<Reservation, ApiError>;

    async fn update_reservation(
        &self,
        id: i64,
        payload: &ReturnPayload,
    ) -> Result<Reservation, ApiError>;

    async fn submit(&self, payload: &SubmitPayload) -> Result<Reservation, ApiError> {
        match payload {
            SubmitPayload::Pickup(pickup) => self.create_reservation(pickup).await,
            SubmitPayload::Return { id, payload } => self.update_reservation(*id, payload).await,
        }
    }
}

#[derive(Clone)]
pub struct HttpReservationApi {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpReservationApi {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match self.session.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorized(request).await.send().await?;
        let response = self.check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorResponse = response.json().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST => Err(ApiError::Validation {
                message: body.describe().unwrap_or_else(|| "Invalid request".to_string()),
                errors: body.field_errors(),
            }),
            StatusCode::UNAUTHORIZED => {
                warn!("API rejected credentials, clearing session");
                if let Err(e) = self.session.clear_credentials().await {
                    warn!("Failed to clear session: {}", e);
                }
                Err(ApiError::Unauthorized)
            }
            status => Err(ApiError::Status {
                status: status.as_u16(),
                message: body
                    .describe()
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string()),
            }),
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginData, ApiError> {
        let response: DataResponse<LoginData> = self
            .send(self.client.post(self.url("auth")).json(request))
            .await?;
        let data = response.data;

        if let Err(e) = self.session.sign_in(data.token.clone(), data.user.clone()).await {
            warn!("Failed to persist session: {}", e);
        }
        info!("Signed in as {}", request.username);
        Ok(data)
    }

    // local credentials are cleared even when the call fails
    pub async fn logout(&self) -> Result<Option<String>, ApiError> {
        let result: Result<MessageResponse, ApiError> =
            self.send(self.client.post(self.url("logout"))).await;
        if let Err(e) = self.session.clear_credentials().await {
            warn!("Failed to clear session: {}", e);
        }
        result.map(|r| r.message)
    }
}

#[async_trait]
impl ReservationApi for HttpReservationApi {
    async fn list_plans(&self) -> Result<Vec<Plan>, ApiError> {
        let response: DataResponse<Vec<Plan>> =
            self.send(self.client.get(self.url("plans"))).await?;
        Ok(response.data)
    }

    async fn list_reservations(&self) -> Result<Vec<Reservation>, ApiError> {
        let response: DataResponse<Vec<Reservation>> =
            self.send(self.client.get(self.url("reservations"))).await?;
        Ok(response.data)
    }

    async fn get_reservation(&self, id: i64) -> Result<Reservation, ApiError> {
        let relations = RESERVATION_RELATIONS.join(",");
        let request = self
            .client
            .get(self.url(&format!("reservations/{}", id)))
            .query(&[("relations", relations.as_str())]);
        let response: DataResponse<Reservation> = self.send(request).await?;
        Ok(response.data)
    }

    async fn create_reservation(&self, payload: &PickupPayload) -> Result<Reservation, ApiError> {
        debug!("POST reservations {}", payload.reservation_code);
        let response: DataResponse<Reservation> = self
            .send(self.client.post(self.url("reservations")).json(payload))
            .await?;
        Ok(response.data)
    }

    async fn update_reservation(
        &self,
        id: i64,
        payload: &ReturnPayload,
    ) -> Result<Reservation, ApiError> {
        debug!("PUT reservations/{} {}", id, payload.reservation_code);
        let response: DataResponse<Reservation> = self
            .send(
                self.client
                    .put(self.url(&format!("reservations/{}", id)))
                    .json(payload),
            )
            .await?;
        Ok(response.data)
    }
}
