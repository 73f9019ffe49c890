use std::collections::{BTreeMap, HashSet};

use crate::error::FieldError;
use crate::models::{ItemCategory, ItemRef, ItemStatus, PickupEntry, Reservation, ReturnEntry};
use crate::services::transition::{self, Phase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub code: String,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone)]
pub struct ItemCollectionEditor {
    category: ItemCategory,
    phase: Phase,
    entries: Vec<CollectionEntry>,
    baseline: Vec<CollectionEntry>,
}

impl ItemCollectionEditor {
    pub fn pickup(category: ItemCategory) -> Self {
        Self {
            category,
            phase: Phase::Pickup,
            entries: Vec::new(),
            baseline: Vec::new(),
        }
    }

    pub fn returning(category: ItemCategory, items: &[ItemRef]) -> Self {
        let mut editor = Self {
            category,
            phase: Phase::Return,
            entries: Vec::with_capacity(items.len()),
            baseline: Vec::new(),
        };
        let status = transition::default_return_status(category);
        for item in items {
            if editor.add(&item.code) {
                if let Some(entry) = editor.entries.last_mut() {
                    entry.status = Some(status);
                }
            }
        }
        editor.mark_clean();
        editor
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn values(&self) -> &[CollectionEntry] {
        &self.entries
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.code.as_str())
    }

    pub fn code_set(&self) -> HashSet<String> {
        self.entries.iter().map(|e| e.code.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = code.trim();
        self.entries.iter().any(|e| e.code == code)
    }

    pub fn status_of(&self, code: &str) -> Option<ItemStatus> {
        let code = code.trim();
        self.entries
            .iter()
            .find(|e| e.code == code)
            .and_then(|e| e.status)
    }

    pub fn add(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || self.contains(code) {
            return false;
        }
        self.entries.push(CollectionEntry {
            code: code.to_string(),
            status: None,
        });
        true
    }

    pub fn remove(&mut self, code: &str) -> bool {
        let code = code.trim();
        let before = self.entries.len();
        self.entries.retain(|e| e.code != code);
        self.entries.len() != before
    }

    pub fn set_status(&mut self, code: &str, status: ItemStatus) -> Result<(), FieldError> {
        let code = code.trim();
        if self.phase == Phase::Pickup {
            return Err(FieldError::StatusNotApplicable {
                category: self.category,
                code: code.to_string(),
            });
        }
        transition::check_status(self.category, code, status)?;

        let category = self.category;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.code == code)
            .ok_or_else(|| FieldError::UnknownCode {
                category,
                code: code.to_string(),
            })?;
        entry.status = Some(status);
        Ok(())
    }

    pub fn set_status_str(&mut self, code: &str, raw: &str) -> Result<ItemStatus, FieldError> {
        if self.phase == Phase::Pickup {
            return Err(FieldError::StatusNotApplicable {
                category: self.category,
                code: code.trim().to_string(),
            });
        }
        let status = transition::parse_status(self.category, code.trim(), raw)?;
        self.set_status(code, status)?;
        Ok(status)
    }

    pub fn is_dirty(&self) -> bool {
        fn as_map(entries: &[CollectionEntry]) -> BTreeMap<&str, Option<ItemStatus>> {
            entries.iter().map(|e| (e.code.as_str(), e.status)).collect()
        }
        as_map(&self.entries) != as_map(&self.baseline)
    }

    pub fn mark_clean(&mut self) {
        self.baseline = self.entries.clone();
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for entry in &self.entries {
            if !seen.insert(entry.code.as_str()) {
                errors.push(FieldError::DuplicateCode {
                    category: self.category,
                    code: entry.code.clone(),
                });
            }
            match (self.phase, entry.status) {
                (Phase::Pickup, None) => {}
                (Phase::Pickup, Some(_)) => errors.push(FieldError::StatusNotApplicable {
                    category: self.category,
                    code: entry.code.clone(),
                }),
                (Phase::Return, None) => errors.push(FieldError::MissingStatus {
                    category: self.category,
                    code: entry.code.clone(),
                }),
                (Phase::Return, Some(status)) => {
                    if let Err(e) = transition::check_status(self.category, &entry.code, status) {
                        errors.push(e);
                    }
                }
            }
        }

        errors
    }

    pub fn pickup_entries(&self) -> Vec<PickupEntry> {
        self.entries
            .iter()
            .map(|e| PickupEntry {
                category: self.category,
                code: e.code.clone(),
            })
            .collect()
    }

    // entries without a status are skipped, validate catches them
    pub fn return_entries(&self) -> Vec<ReturnEntry> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.status.map(|status| ReturnEntry {
                    category: self.category,
                    code: e.code.clone(),
                    status,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ItemCollections {
    motor: ItemCollectionEditor,
    helmet: ItemCollectionEditor,
    fak: ItemCollectionEditor,
    hardcase: ItemCollectionEditor,
}

impl ItemCollections {
    pub fn pickup() -> Self {
        Self {
            motor: ItemCollectionEditor::pickup(ItemCategory::Motor),
            helmet: ItemCollectionEditor::pickup(ItemCategory::Helmet),
            fak: ItemCollectionEditor::pickup(ItemCategory::Fak),
            hardcase: ItemCollectionEditor::pickup(ItemCategory::Hardcase),
        }
    }

    pub fn returning(reservation: &Reservation) -> Self {
        let editor = |category| ItemCollectionEditor::returning(category, reservation.items(category));
        Self {
            motor: editor(ItemCategory::Motor),
            helmet: editor(ItemCategory::Helmet),
            fak: editor(ItemCategory::Fak),
            hardcase: editor(ItemCategory::Hardcase),
        }
    }

    pub fn get(&self, category: ItemCategory) -> &ItemCollectionEditor {
        match category {
            ItemCategory::Motor => &self.motor,
            ItemCategory::Helmet => &self.helmet,
            ItemCategory::Fak => &self.fak,
            ItemCategory::Hardcase => &self.hardcase,
        }
    }

    pub fn get_mut(&mut self, category: ItemCategory) -> &mut ItemCollectionEditor {
        match category {
            ItemCategory::Motor => &mut self.motor,
            ItemCategory::Helmet => &mut self.helmet,
            ItemCategory::Fak => &mut self.fak,
            ItemCategory::Hardcase => &mut self.hardcase,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemCollectionEditor> {
        [&self.motor, &self.helmet, &self.fak, &self.hardcase].into_iter()
    }

    pub fn is_dirty(&self) -> bool {
        self.iter().any(ItemCollectionEditor::is_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_adds_keep_one_copy() {
        let mut editor = ItemCollectionEditor::pickup(ItemCategory::Motor);
        for code in ["MTR1", "MTR2", "MTR1", " MTR2 ", "MTR1"] {
            editor.add(code);
        }
        assert_eq!(editor.codes().collect::<Vec<_>>(), ["MTR1", "MTR2"]);
        assert!(!editor.add(""));
        assert!(editor.validate().is_empty());
    }

    #[test]
    fn removing_absent_code_changes_nothing() {
        let mut editor = ItemCollectionEditor::pickup(ItemCategory::Helmet);
        editor.add("HLM1");
        let before = editor.values().to_vec();

        assert!(!editor.remove("HLM9"));
        assert_eq!(editor.values(), before.as_slice());

        assert!(editor.remove("HLM1"));
        assert!(editor.is_empty());
    }

    #[test]
    fn pickup_entries_take_no_status() {
        let mut editor = ItemCollectionEditor::pickup(ItemCategory::Fak);
        editor.add("FAK1");
        assert_eq!(
            editor.set_status("FAK1", ItemStatus::Complete),
            Err(FieldError::StatusNotApplicable {
                category: ItemCategory::Fak,
                code: "FAK1".to_string(),
            })
        );
        assert_eq!(editor.status_of("FAK1"), None);
    }

    #[test]
    fn illegal_status_keeps_previous_one() {
        let mut editor =
            ItemCollectionEditor::returning(ItemCategory::Motor, &[ItemRef::with_code("MTR1")]);
        assert_eq!(editor.status_of("MTR1"), Some(ItemStatus::ReadyForRent));

        let err = editor.set_status("MTR1", ItemStatus::Lost).unwrap_err();
        assert!(matches!(err, FieldError::StatusNotAllowed { ref code, .. } if code == "MTR1"));
        assert_eq!(editor.status_of("MTR1"), Some(ItemStatus::ReadyForRent));
        assert!(!editor.is_dirty());

        assert!(editor.set_status("MTR9", ItemStatus::OutOfService).is_err());
        assert_eq!(editor.len(), 1);

        editor.set_status("MTR1", ItemStatus::OutOfService).unwrap();
        assert_eq!(editor.status_of("MTR1"), Some(ItemStatus::OutOfService));
        assert!(editor.is_dirty());
    }

    #[test]
    fn status_text_is_checked_against_vocabulary() {
        let mut editor =
            ItemCollectionEditor::returning(ItemCategory::Hardcase, &[ItemRef::with_code("HC1")]);
        assert_eq!(editor.set_status_str("HC1", "scrap"), Ok(ItemStatus::Scrap));
        assert!(editor.set_status_str("HC1", "Incomplete").is_err());
        assert!(editor.set_status_str("HC1", "shiny").is_err());
        assert_eq!(editor.status_of("HC1"), Some(ItemStatus::Scrap));
    }

    #[test]
    fn dirty_tracking_ignores_order() {
        let mut editor = ItemCollectionEditor::returning(
            ItemCategory::Helmet,
            &[ItemRef::with_code("HLM1"), ItemRef::with_code("HLM2")],
        );
        assert!(!editor.is_dirty());

        editor.remove("HLM1");
        assert!(editor.is_dirty());
        editor.add("HLM1");
        // re-added entries come back without a status
        assert!(editor.is_dirty());
        editor.set_status("HLM1", ItemStatus::ReadyForRent).unwrap();
        assert!(!editor.is_dirty());
    }

    #[test]
    fn returning_collapses_duplicate_items_from_server() {
        let editor = ItemCollectionEditor::returning(
            ItemCategory::Fak,
            &[ItemRef::with_code("FAK1"), ItemRef::with_code("FAK1")],
        );
        assert_eq!(editor.len(), 1);
        assert_eq!(editor.status_of("FAK1"), Some(ItemStatus::Complete));
    }
}
