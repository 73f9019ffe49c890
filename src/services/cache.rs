use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiError;
use crate::models::Reservation;
use crate::services::api_client::ReservationApi;

#[derive(Debug, Default)]
struct CacheState {
    reservations: Option<Vec<Reservation>>,
    stale: bool,
}

#[derive(Debug, Default)]
pub struct ReservationCache {
    state: RwLock<CacheState>,
}

impl ReservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if state.reservations.is_some() {
            debug!("Reservation list marked stale");
        }
        state.stale = true;
    }

    pub async fn is_fresh(&self) -> bool {
        let state = self.state.read().await;
        state.reservations.is_some() && !state.stale
    }

    pub async fn reservations<A>(&self, api: &A) -> Result<Vec<Reservation>, ApiError>
    where
        A: ReservationApi + ?Sized,
    {
        {
            let state = self.state.read().await;
            if let (Some(list), false) = (&state.reservations, state.stale) {
                return Ok(list.clone());
            }
        }

        let mut state = self.state.write().await;
        // another reader may have refreshed while we waited for the lock
        if let (Some(list), false) = (&state.reservations, state.stale) {
            return Ok(list.clone());
        }
        let list = api.list_reservations().await?;
        debug!("Fetched {} reservations", list.len());
        state.reservations = Some(list.clone());
        state.stale = false;
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PickupPayload, Plan, ReturnPayload};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReservationApi for CountingApi {
        async fn list_plans(&self) -> Result<Vec<Plan>, ApiError> {
            Ok(Vec::new())
        }

        async fn list_reservations(&self) -> Result<Vec<Reservation>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn get_reservation(&self, id: i64) -> Result<Reservation, ApiError> {
            Err(ApiError::Status {
                status: 404,
                message: format!("Reservation {} not found", id),
            })
        }

        async fn create_reservation(&self, _: &PickupPayload) -> Result<Reservation, ApiError> {
            Err(ApiError::Transport("offline".to_string()))
        }

        async fn update_reservation(
            &self,
            _: i64,
            _: &ReturnPayload,
        ) -> Result<Reservation, ApiError> {
            Err(ApiError::Transport("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn refetches_only_after_invalidate() {
        let api = CountingApi::default();
        let cache = ReservationCache::new();
        assert!(!cache.is_fresh().await);

        cache.reservations(&api).await.unwrap();
        cache.reservations(&api).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_fresh().await);

        cache.invalidate().await;
        assert!(!cache.is_fresh().await);
        cache.reservations(&api).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }
}
