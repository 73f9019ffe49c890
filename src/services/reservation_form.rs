use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, AppResult, FieldError};
use crate::models::{ItemCategory, ItemStatus, Notice, Reservation};
use crate::services::api_client::ReservationApi;
use crate::services::cache::ReservationCache;
use crate::services::collection_editor::ItemCollections;
use crate::services::form_errors::{FormErrors, FormField};
use crate::services::transition::{self, FormMode, Phase, ReservationFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Editing,
    Submitting,
    Saved(i64),
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved {
        reservation: Reservation,
        notice: Notice,
    },
    Invalid(FormErrors),
    Rejected(FormErrors),
    Failed(Notice),
    SessionExpired,
    NothingToSave,
}

pub struct ReservationForm<A: ReservationApi + ?Sized> {
    api: Arc<A>,
    mode: FormMode,
    fields: ReservationFields,
    baseline: ReservationFields,
    collections: ItemCollections,
    errors: FormErrors,
    state: FormState,
    finished: bool,
    cache: Option<Arc<ReservationCache>>,
}

impl<A: ReservationApi + ?Sized> ReservationForm<A> {
    pub fn pickup(api: Arc<A>) -> Self {
        Self {
            api,
            mode: FormMode::Pickup,
            fields: ReservationFields::default(),
            baseline: ReservationFields::default(),
            collections: ItemCollections::pickup(),
            errors: FormErrors::new(),
            state: FormState::Editing,
            finished: false,
            cache: None,
        }
    }

    pub fn for_return(api: Arc<A>, reservation: &Reservation) -> AppResult<Self> {
        let mode = FormMode::for_reservation(Some(reservation))?;
        let fields = ReservationFields::from_reservation(reservation);
        Ok(Self {
            api,
            mode,
            baseline: fields.clone(),
            fields,
            collections: ItemCollections::returning(reservation),
            errors: FormErrors::new(),
            state: FormState::Editing,
            finished: false,
            cache: None,
        })
    }

    pub async fn open(api: Arc<A>, id: i64) -> AppResult<Self> {
        let reservation = api.get_reservation(id).await?;
        debug!(
            "Loaded reservation {} ({}) for return",
            reservation.id, reservation.reservation_code
        );
        Self::for_return(api, &reservation)
    }

    pub fn with_cache(mut self, cache: Arc<ReservationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn phase_indicator(&self) -> [(Phase, bool); 2] {
        self.mode.phase().tabs()
    }

    pub fn fields(&self) -> &ReservationFields {
        &self.fields
    }

    pub fn collections(&self) -> &ItemCollections {
        &self.collections
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    // a saved return closes the reservation for good
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_dirty(&self) -> bool {
        self.fields.trimmed() != self.baseline.trimmed() || self.collections.is_dirty()
    }

    pub fn can_save(&self) -> bool {
        !self.finished && self.state != FormState::Submitting && self.is_dirty()
    }

    pub fn known_codes(&self, category: ItemCategory) -> HashSet<String> {
        self.collections.get(category).code_set()
    }

    pub fn set_reservation_code(&mut self, value: impl Into<String>) {
        self.fields.reservation_code = value.into();
        self.touch(FormField::ReservationCode);
    }

    pub fn set_pickup_plan_code(&mut self, value: impl Into<String>) {
        self.fields.pickup_plan_code = value.into();
        self.touch(FormField::PickupPlanCode);
    }

    pub fn set_return_plan_code(&mut self, value: impl Into<String>) -> Result<(), FieldError> {
        if self.mode.phase() == Phase::Pickup {
            return Err(FieldError::ReturnPlanNotApplicable);
        }
        self.fields.return_plan_code = value.into();
        self.touch(FormField::ReturnPlanCode);
        Ok(())
    }

    pub fn set_information(&mut self, value: impl Into<String>) {
        self.fields.information = value.into();
        self.touch(FormField::Information);
    }

    pub fn add_item(&mut self, category: ItemCategory, code: &str) -> bool {
        let added = self.collections.get_mut(category).add(code);
        if added {
            self.touch(FormField::Items(category));
            self.errors.clear_entry(category, code.trim());
        }
        added
    }

    pub fn remove_item(&mut self, category: ItemCategory, code: &str) -> bool {
        let removed = self.collections.get_mut(category).remove(code);
        if removed {
            self.touch(FormField::Items(category));
            self.errors.clear_entry(category, code.trim());
        }
        removed
    }

    pub fn set_item_status(
        &mut self,
        category: ItemCategory,
        code: &str,
        status: ItemStatus,
    ) -> Result<(), FieldError> {
        let result = self.collections.get_mut(category).set_status(code, status);
        self.record_entry(category, code, result.clone());
        result
    }

    pub fn set_item_status_str(
        &mut self,
        category: ItemCategory,
        code: &str,
        raw: &str,
    ) -> Result<ItemStatus, FieldError> {
        let result = self.collections.get_mut(category).set_status_str(code, raw);
        self.record_entry(category, code, result.clone().map(|_| ()));
        result
    }

    fn touch(&mut self, field: FormField) {
        self.errors.clear_field(field);
        // a submission dropped mid-flight leaves Submitting behind
        self.state = FormState::Editing;
    }

    fn record_entry(&mut self, category: ItemCategory, code: &str, result: Result<(), FieldError>) {
        self.errors.clear_entry(category, code.trim());
        match result {
            Ok(()) => self.touch(FormField::Items(category)),
            Err(e) => self.errors.push(e),
        }
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.finished {
            debug!("Reservation already returned, nothing to submit");
            return SubmitOutcome::NothingToSave;
        }
        if !self.is_dirty() {
            return SubmitOutcome::NothingToSave;
        }

        let payload = match transition::build_payload(self.mode, &self.fields, &self.collections) {
            Ok(payload) => payload,
            Err(errors) => {
                debug!("Reservation form rejected locally: {:?}", errors);
                self.errors = errors.clone();
                self.state = FormState::Editing;
                return SubmitOutcome::Invalid(errors);
            }
        };

        self.errors = FormErrors::new();
        self.state = FormState::Submitting;
        info!(
            "Submitting {} of reservation {}",
            self.mode.phase(),
            payload.reservation_code()
        );

        match self.api.submit(&payload).await {
            Ok(reservation) => {
                self.apply_saved(&reservation);
                if let Some(cache) = &self.cache {
                    cache.invalidate().await;
                }
                info!(
                    "Reservation {} saved with id {}",
                    reservation.reservation_code, reservation.id
                );
                let notice = Notice::info(
                    "Successfully saved reservation",
                    format!(
                        "Reservation with the code \"{}\" has been saved.",
                        reservation.reservation_code
                    ),
                );
                SubmitOutcome::Saved {
                    reservation,
                    notice,
                }
            }
            Err(ApiError::Validation { message, errors }) => {
                warn!("Reservation rejected by API: {}", message);
                let mut form_errors = FormErrors::from_server(&errors, self.mode.phase());
                if form_errors.is_empty() {
                    form_errors.push_custom("message", message);
                }
                self.errors = form_errors.clone();
                self.state = FormState::Failed;
                SubmitOutcome::Rejected(form_errors)
            }
            Err(ApiError::Unauthorized) => {
                warn!("Session expired while saving reservation");
                self.state = FormState::Failed;
                SubmitOutcome::SessionExpired
            }
            Err(e) => {
                error!("Failed to save reservation: {}", e);
                self.state = FormState::Failed;
                SubmitOutcome::Failed(Notice::error(
                    "Failed saving reservation",
                    format!("An error has occured, {}", e),
                ))
            }
        }
    }

    fn apply_saved(&mut self, reservation: &Reservation) {
        match self.mode {
            FormMode::Pickup => {
                self.fields = ReservationFields::default();
                self.collections = ItemCollections::pickup();
            }
            FormMode::Return { .. } => {
                self.fields = ReservationFields::from_reservation(reservation);
                self.collections = ItemCollections::returning(reservation);
                self.finished = true;
            }
        }
        self.baseline = self.fields.clone();
        self.errors = FormErrors::new();
        self.state = FormState::Saved(reservation.id);
    }
}
