//! List reconciliation state.
//!
//! Owns the roster and the form draft for one screen and sequences user
//! actions with remote sync calls. Local state changes only after the remote
//! store has confirmed the operation.

use std::collections::BTreeSet;

use crate::errors::{RosterError, SyncError};
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};
use crate::sync::{FetchOutcome, SheetBackend};

/// Which screen is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Listing,
    Creating,
    /// Editing the record as it was when the form opened
    Editing(EmployeeRecord),
}

impl Screen {
    fn label(&self) -> &'static str {
        match self {
            Screen::Listing => "listing",
            Screen::Creating => "creating",
            Screen::Editing(_) => "editing",
        }
    }
}

/// What to do when a create succeeds without an echoed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierPolicy {
    /// Treat it as a failure; the row shows up on the next refresh.
    #[default]
    RequireEcho,
    /// Use one past the highest local id and mark it provisional until the
    /// next full fetch.
    NextLocal,
}

impl IdentifierPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require-echo" | "strict" => Some(IdentifierPolicy::RequireEcho),
            "next-local" | "local" => Some(IdentifierPolicy::NextLocal),
            _ => None,
        }
    }
}

/// Roster, draft and screen for one front end instance.
///
/// Every mutating action takes `&mut self`, so a second action cannot start
/// while a request is outstanding.
pub struct RosterState<B> {
    backend: B,
    roster: Vec<EmployeeRecord>,
    draft: EmployeeDraft,
    screen: Screen,
    id_policy: IdentifierPolicy,
    provisional: BTreeSet<EmployeeId>,
    /// One past the highest id ever seen; never lowered, so a deleted id is
    /// not handed out again.
    next_local: i64,
    loaded: bool,
}

impl<B: SheetBackend> RosterState<B> {
    pub fn new(backend: B, id_policy: IdentifierPolicy) -> Self {
        Self {
            backend,
            roster: Vec::new(),
            draft: EmployeeDraft::default(),
            screen: Screen::Listing,
            id_policy,
            provisional: BTreeSet::new(),
            next_local: 1,
            loaded: false,
        }
    }

    /// Start from a locally known roster, shown until the first fetch succeeds.
    ///
    /// Records whose id is already present are dropped.
    pub fn with_seed(mut self, records: Vec<EmployeeRecord>) -> Self {
        self.roster.clear();
        for record in records {
            if self.position(record.id).is_none() {
                self.observe(record.id);
                self.roster.push(record);
            }
        }
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn roster(&self) -> &[EmployeeRecord] {
        &self.roster
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn draft(&self) -> &EmployeeDraft {
        &self.draft
    }

    /// The form fields, for the active create or edit screen to fill in.
    pub fn draft_mut(&mut self) -> &mut EmployeeDraft {
        &mut self.draft
    }

    pub fn get(&self, id: EmployeeId) -> Option<&EmployeeRecord> {
        self.roster.iter().find(|r| r.id == id)
    }

    /// Ids assigned locally and not yet confirmed by a full fetch.
    pub fn provisional_ids(&self) -> impl Iterator<Item = EmployeeId> + '_ {
        self.provisional.iter().copied()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Fetch on first entry to the listing. Later calls are no-ops; use
    /// [`refresh`](Self::refresh) to reload.
    pub async fn load(&mut self) -> bool {
        if self.loaded {
            return true;
        }
        self.refresh().await
    }

    /// Replace the roster with the remote rows.
    ///
    /// A successful fetch replaces the roster even when the sheet is empty. A
    /// failed fetch leaves the current roster alone and returns false.
    pub async fn refresh(&mut self) -> bool {
        match self.backend.fetch_all().await {
            FetchOutcome::Loaded(records) => {
                tracing::info!("Loaded {} employees", records.len());
                for record in &records {
                    self.observe(record.id);
                }
                self.roster = records;
                self.provisional.clear();
                self.loaded = true;
                true
            }
            FetchOutcome::Unavailable(e) => {
                tracing::warn!(
                    "Keeping {} local employees, fetch failed: {}",
                    self.roster.len(),
                    e
                );
                false
            }
        }
    }

    /// Listing -> Creating with an empty form.
    pub fn begin_create(&mut self) -> Result<(), RosterError> {
        self.require_listing("create an employee")?;
        self.draft = EmployeeDraft::default();
        self.screen = Screen::Creating;
        Ok(())
    }

    /// Listing -> Editing(record) with the form seeded from the record.
    pub fn begin_edit(&mut self, id: EmployeeId) -> Result<(), RosterError> {
        self.require_listing("edit an employee")?;
        let record = self
            .get(id)
            .cloned()
            .ok_or(RosterError::UnknownEmployee(id))?;
        self.draft = record.draft();
        self.screen = Screen::Editing(record);
        Ok(())
    }

    /// Creating/Editing -> Listing, discarding the form.
    pub fn cancel(&mut self) -> Result<(), RosterError> {
        if self.screen == Screen::Listing {
            return Err(RosterError::InvalidTransition {
                screen: self.screen.label(),
                action: "cancel",
            });
        }
        self.draft = EmployeeDraft::default();
        self.screen = Screen::Listing;
        Ok(())
    }

    /// Send the form to the remote store.
    ///
    /// On success the roster is updated and the screen returns to the
    /// listing. On failure nothing changes and the form stays open.
    pub async fn submit(&mut self) -> Result<&EmployeeRecord, RosterError> {
        match self.screen.clone() {
            Screen::Listing => Err(RosterError::InvalidTransition {
                screen: self.screen.label(),
                action: "submit",
            }),
            Screen::Creating => self.submit_create().await,
            Screen::Editing(original) => self.submit_edit(original.id).await,
        }
    }

    async fn submit_create(&mut self) -> Result<&EmployeeRecord, RosterError> {
        self.draft.validate()?;

        let receipt = self.backend.create(&self.draft).await?;
        let id = match (receipt.id, self.id_policy) {
            (Some(id), _) => {
                if self.position(id).is_some() {
                    // The sheet reused an id we still show; our copy is stale.
                    tracing::warn!("Remote store reused id {}, replacing local row", id);
                    self.roster.retain(|r| r.id != id);
                }
                id
            }
            (None, IdentifierPolicy::RequireEcho) => {
                tracing::warn!("Create succeeded without an id; refresh to see the new row");
                return Err(SyncError::MissingIdentifier.into());
            }
            (None, IdentifierPolicy::NextLocal) => {
                let id = self.next_local_id();
                tracing::info!("Assigned provisional id {}", id);
                self.provisional.insert(id);
                id
            }
        };

        self.observe(id);
        let draft = std::mem::take(&mut self.draft);
        self.roster.push(EmployeeRecord::from_draft(id, draft));
        self.screen = Screen::Listing;
        tracing::info!("Created employee {}", id);

        let index = self.roster.len() - 1;
        Ok(&self.roster[index])
    }

    async fn submit_edit(&mut self, id: EmployeeId) -> Result<&EmployeeRecord, RosterError> {
        self.draft.validate()?;

        let record = EmployeeRecord::from_draft(id, self.draft.clone());
        self.backend.update(&record).await?;

        let index = match self.position(id) {
            Some(index) => {
                self.roster[index] = record;
                index
            }
            // Removed by a refresh while the form was open; the remote row exists.
            None => {
                self.roster.push(record);
                self.roster.len() - 1
            }
        };
        self.draft = EmployeeDraft::default();
        self.screen = Screen::Listing;
        tracing::info!("Updated employee {}", id);

        Ok(&self.roster[index])
    }

    /// Delete from the remote store, then from the roster.
    ///
    /// The roster is untouched unless the remote store confirms.
    pub async fn delete(&mut self, id: EmployeeId) -> Result<(), RosterError> {
        self.require_listing("delete an employee")?;

        if let Err(e) = self.backend.remove(id).await {
            tracing::warn!("Delete of employee {} failed: {}", id, e);
            return Err(e.into());
        }

        self.observe(id);
        self.roster.retain(|r| r.id != id);
        self.provisional.remove(&id);
        tracing::info!("Deleted employee {}", id);
        Ok(())
    }

    fn require_listing(&self, action: &'static str) -> Result<(), RosterError> {
        match self.screen {
            Screen::Listing => Ok(()),
            _ => Err(RosterError::InvalidTransition {
                screen: self.screen.label(),
                action,
            }),
        }
    }

    fn position(&self, id: EmployeeId) -> Option<usize> {
        self.roster.iter().position(|r| r.id == id)
    }

    fn observe(&mut self, id: EmployeeId) {
        self.next_local = self.next_local.max(id.get() + 1);
    }

    /// One past the highest id seen so far. For a roster numbered 1..=n with
    /// nothing deleted this is n + 1.
    fn next_local_id(&self) -> EmployeeId {
        EmployeeId(self.next_local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::models::{Department, EmploymentStatus};
    use crate::sync::CreateReceipt;

    /// In-process sheet with switchable failure modes.
    #[derive(Default)]
    struct FakeSheet {
        rows: Mutex<Vec<EmployeeRecord>>,
        next_id: Mutex<i64>,
        echo_ids: bool,
        offline: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSheet {
        fn with_rows(rows: Vec<EmployeeRecord>) -> Self {
            let next = rows.iter().map(|r| r.id.get()).max().unwrap_or(0) + 1;
            Self {
                rows: Mutex::new(rows),
                next_id: Mutex::new(next),
                echo_ids: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn offline_error() -> SyncError {
            SyncError::Network("connection refused".to_string())
        }
    }

    impl SheetBackend for FakeSheet {
        async fn fetch_all(&self) -> FetchOutcome {
            self.calls.lock().unwrap().push("fetch".to_string());
            if self.offline {
                return FetchOutcome::Unavailable(Self::offline_error());
            }
            FetchOutcome::Loaded(self.rows.lock().unwrap().clone())
        }

        async fn create(&self, draft: &EmployeeDraft) -> Result<CreateReceipt, SyncError> {
            self.calls.lock().unwrap().push("create".to_string());
            if self.offline {
                return Err(Self::offline_error());
            }
            let mut next = self.next_id.lock().unwrap();
            let id = EmployeeId(*next);
            *next += 1;
            self.rows
                .lock()
                .unwrap()
                .push(EmployeeRecord::from_draft(id, draft.clone()));
            Ok(CreateReceipt {
                id: self.echo_ids.then_some(id),
            })
        }

        async fn update(&self, record: &EmployeeRecord) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push(format!("update {}", record.id));
            if self.offline {
                return Err(Self::offline_error());
            }
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(row) => {
                    *row = record.clone();
                    Ok(())
                }
                None => Err(SyncError::RemoteRejected {
                    status: Some(404),
                    message: "no such row".to_string(),
                }),
            }
        }

        async fn remove(&self, id: EmployeeId) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push(format!("remove {}", id));
            if self.offline {
                return Err(Self::offline_error());
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            if rows.len() == before {
                return Err(SyncError::RemoteRejected {
                    status: Some(404),
                    message: "no such row".to_string(),
                });
            }
            Ok(())
        }
    }

    fn employee(id: i64, first: &str, last: &str) -> EmployeeRecord {
        EmployeeRecord::from_draft(
            EmployeeId(id),
            EmployeeDraft {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}@example.com", first.to_lowercase()),
                job_title: "Physical Therapist".to_string(),
                department: Some(Department::Therapy),
                status: EmploymentStatus::Active,
                ..Default::default()
            },
        )
    }

    fn seed() -> Vec<EmployeeRecord> {
        vec![employee(1, "John", "Doe"), employee(2, "Jane", "Smith")]
    }

    fn fill_mike(draft: &mut EmployeeDraft) {
        draft.set_full_name("Mike Chen");
        draft.email = "mike@x.com".to_string();
        draft.job_title = "Intern".to_string();
        draft.department = Some(Department::Admin);
        draft.status = EmploymentStatus::Active;
    }

    #[tokio::test]
    async fn test_load_replaces_roster() {
        let sheet = FakeSheet::with_rows(vec![employee(5, "Ana", "Ruiz")]);
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        assert!(state.load().await);
        let ids: Vec<i64> = state.roster().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![5]);

        // Second load does not refetch
        assert!(state.load().await);
        assert_eq!(state.backend().calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_seeded_roster() {
        let sheet = FakeSheet {
            offline: true,
            ..Default::default()
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        assert!(!state.load().await);
        assert!(!state.is_loaded());
        assert_eq!(state.roster(), seed().as_slice());
    }

    #[tokio::test]
    async fn test_empty_sheet_empties_roster() {
        let sheet = FakeSheet::with_rows(Vec::new());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        assert!(state.refresh().await);
        assert!(state.roster().is_empty());
    }

    #[tokio::test]
    async fn test_create_uses_echoed_id() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.begin_create().unwrap();
        assert_eq!(state.screen(), &Screen::Creating);
        fill_mike(state.draft_mut());

        let created = state.submit().await.unwrap().clone();
        assert_eq!(created.id, EmployeeId(3));
        assert_eq!(created.full_name(), "Mike Chen");
        assert_eq!(state.screen(), &Screen::Listing);
        assert_eq!(state.roster().len(), 3);
        assert_eq!(state.draft(), &EmployeeDraft::default());
        assert_eq!(state.provisional_ids().count(), 0);
    }

    #[tokio::test]
    async fn test_create_without_echo_requires_id_by_default() {
        let sheet = FakeSheet {
            echo_ids: false,
            ..FakeSheet::with_rows(seed())
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());

        let err = state.submit().await.unwrap_err();
        assert_eq!(err, RosterError::Sync(SyncError::MissingIdentifier));
        assert_eq!(state.screen(), &Screen::Creating);
        assert_eq!(state.draft().email, "mike@x.com");
        assert_eq!(state.roster().len(), 2);
    }

    #[tokio::test]
    async fn test_create_without_echo_next_local() {
        let sheet = FakeSheet {
            echo_ids: false,
            ..FakeSheet::with_rows(seed())
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::NextLocal).with_seed(seed());

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        let created = state.submit().await.unwrap().clone();

        assert_eq!(created.id, EmployeeId(3));
        assert_eq!(state.provisional_ids().collect::<Vec<_>>(), vec![EmployeeId(3)]);

        // The next successful fetch settles provisional ids
        assert!(state.refresh().await);
        assert_eq!(state.provisional_ids().count(), 0);
        assert_eq!(state.roster().len(), 3);
    }

    #[tokio::test]
    async fn test_next_local_id_skips_gaps() {
        let sheet = FakeSheet {
            echo_ids: false,
            ..FakeSheet::with_rows(Vec::new())
        };
        let seeded = vec![employee(2, "Jane", "Smith"), employee(7, "Ana", "Ruiz")];
        let mut state = RosterState::new(sheet, IdentifierPolicy::NextLocal).with_seed(seeded);

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        let created = state.submit().await.unwrap();
        assert_eq!(created.id, EmployeeId(8));
    }

    #[tokio::test]
    async fn test_next_local_id_not_reused_after_delete() {
        let sheet = FakeSheet {
            echo_ids: false,
            ..FakeSheet::with_rows(seed())
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::NextLocal).with_seed(seed());

        state.delete(EmployeeId(2)).await.unwrap();

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        let created = state.submit().await.unwrap().clone();
        assert_eq!(created.id, EmployeeId(3));

        // A refresh that no longer shows ids 2 or 3 does not lower the mark
        state.delete(EmployeeId(3)).await.unwrap();
        assert!(state.refresh().await);
        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        let created = state.submit().await.unwrap();
        assert!(created.id.get() > 3, "reused id {}", created.id);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_not_sent() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho);

        state.begin_create().unwrap();
        state.draft_mut().set_full_name("Mike Chen");

        let err = state.submit().await.unwrap_err();
        assert!(matches!(err, RosterError::InvalidDraft(_)));
        assert_eq!(state.screen(), &Screen::Creating);
        assert!(state.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_keeps_form_open() {
        let sheet = FakeSheet {
            offline: true,
            ..Default::default()
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::NextLocal).with_seed(seed());

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        let err = state.submit().await.unwrap_err();

        assert!(matches!(err, RosterError::Sync(SyncError::Network(_))));
        assert_eq!(state.screen(), &Screen::Creating);
        assert_eq!(state.draft().full_name(), "Mike Chen");
        assert_eq!(state.roster().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_discards_draft() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.begin_create().unwrap();
        fill_mike(state.draft_mut());
        state.cancel().unwrap();

        assert_eq!(state.screen(), &Screen::Listing);
        assert_eq!(state.draft(), &EmployeeDraft::default());
        assert_eq!(state.roster().len(), 2);
        assert!(state.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_replaces_matching_record() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.begin_edit(EmployeeId(2)).unwrap();
        assert_eq!(state.screen(), &Screen::Editing(seed()[1].clone()));
        assert_eq!(state.draft().first_name, "Jane");

        state.draft_mut().status = EmploymentStatus::OnLeave;
        let updated = state.submit().await.unwrap().clone();

        assert_eq!(updated.id, EmployeeId(2));
        assert_eq!(updated.fields.status, EmploymentStatus::OnLeave);
        assert_eq!(state.screen(), &Screen::Listing);
        assert_eq!(state.roster()[0], seed()[0]);
        assert_eq!(state.roster()[1], updated);
        assert_eq!(state.backend().calls(), vec!["update 2"]);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_roster() {
        let sheet = FakeSheet {
            offline: true,
            ..Default::default()
        };
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.begin_edit(EmployeeId(1)).unwrap();
        state.draft_mut().job_title = "Clinic Director".to_string();
        assert!(state.submit().await.is_err());

        assert!(matches!(state.screen(), Screen::Editing(_)));
        assert_eq!(state.roster(), seed().as_slice());

        state.cancel().unwrap();
        assert_eq!(state.screen(), &Screen::Listing);
    }

    #[tokio::test]
    async fn test_begin_edit_unknown_id() {
        let sheet = FakeSheet::default();
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        assert_eq!(
            state.begin_edit(EmployeeId(9)),
            Err(RosterError::UnknownEmployee(EmployeeId(9)))
        );
        assert_eq!(state.screen(), &Screen::Listing);
    }

    #[tokio::test]
    async fn test_delete_confirmed() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        state.delete(EmployeeId(1)).await.unwrap();
        let ids: Vec<i64> = state.roster().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_roster() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        let err = state.delete(EmployeeId(42)).await.unwrap_err();
        match err {
            RosterError::Sync(e) => assert!(e.is_not_found()),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(state.roster(), seed().as_slice());

        let offline = FakeSheet {
            offline: true,
            ..Default::default()
        };
        let mut state = RosterState::new(offline, IdentifierPolicy::RequireEcho).with_seed(seed());
        assert!(state.delete(EmployeeId(1)).await.is_err());
        assert_eq!(state.roster(), seed().as_slice());
    }

    #[tokio::test]
    async fn test_transitions_outside_listing_are_rejected() {
        let sheet = FakeSheet::with_rows(seed());
        let mut state = RosterState::new(sheet, IdentifierPolicy::RequireEcho).with_seed(seed());

        assert!(matches!(
            state.cancel(),
            Err(RosterError::InvalidTransition { .. })
        ));
        assert!(matches!(
            state.submit().await,
            Err(RosterError::InvalidTransition { .. })
        ));

        state.begin_create().unwrap();
        assert!(matches!(
            state.begin_edit(EmployeeId(1)),
            Err(RosterError::InvalidTransition { .. })
        ));
        assert!(matches!(
            state.begin_create(),
            Err(RosterError::InvalidTransition { .. })
        ));
        assert!(matches!(
            state.delete(EmployeeId(1)).await,
            Err(RosterError::InvalidTransition { .. })
        ));
        assert_eq!(state.screen(), &Screen::Creating);
        assert_eq!(state.roster().len(), 2);
        assert!(state.backend().calls().is_empty());
    }

    #[test]
    fn test_seed_drops_duplicate_ids() {
        let mut records = seed();
        records.push(employee(1, "Other", "John"));
        let state = RosterState::new(FakeSheet::default(), IdentifierPolicy::RequireEcho)
            .with_seed(records);
        assert_eq!(state.roster().len(), 2);
        assert_eq!(state.roster()[0].full_name(), "John Doe");
    }

    #[test]
    fn test_identifier_policy_parse() {
        assert_eq!(
            IdentifierPolicy::parse("Next-Local"),
            Some(IdentifierPolicy::NextLocal)
        );
        assert_eq!(
            IdentifierPolicy::parse("require-echo"),
            Some(IdentifierPolicy::RequireEcho)
        );
        assert_eq!(IdentifierPolicy::parse("uuid"), None);
    }
}
