// ── Provisioning workflow ──
//
// State machine driving Validate -> Check-Status -> (Confirm) -> Provision for
// a run of `address_count` consecutive addresses. Status lookups run
// concurrently and settle independently; provisioning is strictly sequential.
// Presentation subscribes to `WorkflowEvent`s and never drives state itself.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use serde_json::json;
use strum::{Display, IntoStaticStr};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use macprov_api::{
    ClassifiedError, DeviceRecord, LogEntry, LogLevel, LogSink, ProvisionRequest,
    ProvisioningClient,
};

use crate::defaults::{Assignment, ProvisioningDefaults};
use crate::error::CoreError;
use crate::mac::{MacAddress, generate_sequence};
use crate::oui::OuiAllowList;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Upper bound on `address_count`. Sequential generation is not a bulk importer.
pub const MAX_ADDRESS_COUNT: usize = 16;

// ── Per-address state ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LookupStatus {
    Pending,
    Checking,
    Found,
    NotFound,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProvisionState {
    Pending,
    Provisioning,
    Complete,
    Error,
}

/// Everything tracked for one address. Discarded on reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressState {
    pub address: MacAddress,
    pub assignment: Assignment,
    pub lookup_status: LookupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_record: Option<DeviceRecord>,
    pub provision_state: ProvisionState,
    /// Latest failure for this address, lookup or provisioning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl AddressState {
    fn new(address: MacAddress, assignment: Assignment) -> Self {
        Self {
            address,
            assignment,
            lookup_status: LookupStatus::Pending,
            device_record: None,
            provision_state: ProvisionState::Pending,
            error: None,
        }
    }

    fn request(&self) -> ProvisionRequest {
        ProvisionRequest {
            mac: self.address.to_string(),
            account: self.assignment.account.clone(),
            configfile: self.assignment.configfile.clone(),
            isp: self.assignment.isp.clone(),
        }
    }

    fn is_retryable_failure(&self) -> bool {
        self.provision_state == ProvisionState::Error
            && self.error.as_ref().is_some_and(|e| e.is_retryable)
    }
}

// ── Phases, gates, events ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Input,
    Status,
    /// Waiting for the user to accept overwriting existing registrations.
    Confirming,
    Provisioning,
}

/// Answer to [`WorkflowController::request_provision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionGate {
    /// Nothing would be overwritten; the workflow is now in `Provisioning`.
    Ready,
    /// These addresses are already registered; call `confirm()` or
    /// `cancel_confirmation()`.
    NeedsConfirmation { existing: Vec<MacAddress> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    pub succeeded: usize,
    pub total: usize,
}

impl ProvisionSummary {
    pub fn is_complete(self) -> bool {
        self.succeeded == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Validated {
        session: Uuid,
        addresses: Vec<MacAddress>,
    },
    LookupStarted {
        address: MacAddress,
    },
    LookupSettled {
        address: MacAddress,
        status: LookupStatus,
    },
    /// Non-blocking failure notice; the workflow can still proceed.
    Banner {
        address: MacAddress,
        error: ClassifiedError,
    },
    ConfirmationRequired {
        existing: Vec<MacAddress>,
    },
    ProvisionStarted {
        address: MacAddress,
    },
    ProvisionSettled {
        address: MacAddress,
        state: ProvisionState,
    },
    Summary {
        succeeded: usize,
        total: usize,
    },
    Reset,
}

// ── Controller ──────────────────────────────────────────────────────

/// One provisioning session at a time. Methods take `&mut self`, so a single
/// controller never issues overlapping requests for the same address.
pub struct WorkflowController {
    client: ProvisioningClient,
    allow_list: OuiAllowList,
    defaults: ProvisioningDefaults,
    address_count: usize,
    log_sink: Option<LogSink>,
    events: broadcast::Sender<WorkflowEvent>,
    phase: Phase,
    session: Option<Uuid>,
    addresses: Vec<AddressState>,
}

impl WorkflowController {
    /// `address_count` is 1 for the single-address workflow, or the length of
    /// the consecutive run (typically 4).
    pub fn new(
        client: ProvisioningClient,
        allow_list: OuiAllowList,
        defaults: ProvisioningDefaults,
        address_count: usize,
    ) -> Result<Self, CoreError> {
        if !(1..=MAX_ADDRESS_COUNT).contains(&address_count) {
            return Err(CoreError::ValidationFailed {
                message: format!("address_count: must be between 1 and {MAX_ADDRESS_COUNT}"),
            });
        }
        defaults.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Ok(Self {
            client,
            allow_list,
            defaults,
            address_count,
            log_sink: None,
            events,
            phase: Phase::Input,
            session: None,
            addresses: Vec::new(),
        })
    }

    /// Mirror key transitions to a remote log sink.
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn address_count(&self) -> usize {
        self.address_count
    }

    pub fn addresses(&self) -> &[AddressState] {
        &self.addresses
    }

    pub fn session(&self) -> Option<Uuid> {
        self.session
    }

    // ── Input ────────────────────────────────────────────────────────

    /// Validate `text` and enter `Status` with one pending record per
    /// generated address. No network traffic. On rejection the workflow
    /// stays in `Input`.
    pub fn validate(&mut self, text: &str) -> Result<&[AddressState], CoreError> {
        self.expect_phase(Phase::Input)?;

        let base: MacAddress = match text.parse() {
            Ok(base) => base,
            Err(e) => return Err(self.reject(e.into())),
        };
        let sequence = match generate_sequence(base, self.address_count) {
            Ok(sequence) => sequence,
            Err(e) => return Err(self.reject(e.into())),
        };
        // A run may cross into a neighbouring vendor block; every member must be approved.
        if let Some(unapproved) = sequence.iter().find(|mac| !self.allow_list.is_approved(**mac)) {
            let err = CoreError::OuiNotApproved {
                prefix: unapproved.vendor_prefix(),
            };
            return Err(self.reject(err));
        }

        let session = Uuid::new_v4();
        self.addresses = sequence
            .iter()
            .enumerate()
            .map(|(index, mac)| AddressState::new(*mac, self.defaults.resolve(index)))
            .collect();
        self.session = Some(session);
        self.phase = Phase::Status;

        info!(%session, base = %base, count = sequence.len(), "addresses validated");
        self.log(
            LogLevel::Info,
            "addresses validated",
            json!({ "base": base, "count": sequence.len() }),
        );
        self.emit(WorkflowEvent::Validated {
            session,
            addresses: sequence,
        });
        Ok(&self.addresses)
    }

    /// `validate` followed by `check_status`.
    pub async fn submit(&mut self, text: &str) -> Result<&[AddressState], CoreError> {
        self.validate(text)?;
        self.check_status().await?;
        Ok(&self.addresses)
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Look up every address still `Pending`. Lookups run concurrently and
    /// each result is applied as soon as it settles; one failing lookup marks
    /// only its own address `Unknown`.
    pub async fn check_status(&mut self) -> Result<&[AddressState], CoreError> {
        self.expect_phase(Phase::Status)?;
        self.run_lookups(LookupStatus::Pending).await;
        Ok(&self.addresses)
    }

    /// Repeat the lookup for addresses whose status is `Unknown`.
    pub async fn recheck_unknown(&mut self) -> Result<&[AddressState], CoreError> {
        self.expect_phase(Phase::Status)?;
        self.run_lookups(LookupStatus::Unknown).await;
        Ok(&self.addresses)
    }

    async fn run_lookups(&mut self, from: LookupStatus) {
        let targets: Vec<(usize, MacAddress)> = self
            .addresses
            .iter()
            .enumerate()
            .filter(|(_, state)| state.lookup_status == from)
            .map(|(index, state)| (index, state.address))
            .collect();

        for &(index, address) in &targets {
            if let Some(state) = self.addresses.get_mut(index) {
                state.lookup_status = LookupStatus::Checking;
            }
            self.emit(WorkflowEvent::LookupStarted { address });
        }

        let mut lookups: FuturesUnordered<_> = targets
            .into_iter()
            .map(|(index, address)| {
                let client = self.client.clone();
                async move { (index, client.search_by_mac(&address.to_string()).await) }
            })
            .collect();

        while let Some((index, result)) = lookups.next().await {
            self.apply_lookup(index, result);
        }
    }

    fn apply_lookup(&mut self, index: usize, result: Result<Vec<DeviceRecord>, ClassifiedError>) {
        let Some(state) = self.addresses.get_mut(index) else {
            return;
        };
        let address = state.address;
        let banner = match result {
            Ok(records) => {
                state.lookup_status = if records.is_empty() {
                    LookupStatus::NotFound
                } else {
                    LookupStatus::Found
                };
                state.device_record = records.into_iter().next();
                state.error = None;
                None
            }
            Err(err) => {
                state.lookup_status = LookupStatus::Unknown;
                state.device_record = None;
                state.error = Some(err.clone());
                Some(err)
            }
        };
        let status = state.lookup_status;

        debug!(%address, %status, "lookup settled");
        self.emit(WorkflowEvent::LookupSettled { address, status });
        if let Some(error) = banner {
            warn!(%address, category = %error.category, "status lookup failed");
            self.log(
                LogLevel::Warn,
                "status lookup failed",
                json!({ "mac": address, "category": error.category }),
            );
            self.emit(WorkflowEvent::Banner { address, error });
        }
    }

    /// Ask to move on to provisioning. Existing registrations require an
    /// explicit `confirm()` first.
    pub fn request_provision(&mut self) -> Result<ProvisionGate, CoreError> {
        self.expect_phase(Phase::Status)?;

        let existing: Vec<MacAddress> = self
            .addresses
            .iter()
            .filter(|state| state.lookup_status == LookupStatus::Found)
            .map(|state| state.address)
            .collect();

        if existing.is_empty() {
            self.phase = Phase::Provisioning;
            return Ok(ProvisionGate::Ready);
        }

        info!(existing = existing.len(), "overwrite confirmation required");
        self.phase = Phase::Confirming;
        self.emit(WorkflowEvent::ConfirmationRequired {
            existing: existing.clone(),
        });
        Ok(ProvisionGate::NeedsConfirmation { existing })
    }

    pub fn confirm(&mut self) -> Result<(), CoreError> {
        self.expect_phase(Phase::Confirming)?;
        info!("overwrite confirmed");
        self.log(LogLevel::Info, "overwrite confirmed", json!({ "session": self.session }));
        self.phase = Phase::Provisioning;
        Ok(())
    }

    /// Back out of the overwrite prompt to the status view.
    pub fn cancel_confirmation(&mut self) -> Result<(), CoreError> {
        self.expect_phase(Phase::Confirming)?;
        self.phase = Phase::Status;
        Ok(())
    }

    // ── Provisioning ─────────────────────────────────────────────────

    /// Provision every pending address in order, one at a time. A failure is
    /// recorded on its address and the run continues.
    pub async fn provision(&mut self) -> Result<ProvisionSummary, CoreError> {
        self.expect_phase(Phase::Provisioning)?;
        let targets = self.indices_where(|state| state.provision_state == ProvisionState::Pending);
        Ok(self.run_provisioning(targets).await)
    }

    /// Re-provision addresses that failed with a retryable error.
    pub async fn retry_failed(&mut self) -> Result<ProvisionSummary, CoreError> {
        self.expect_phase(Phase::Provisioning)?;
        let targets = self.indices_where(AddressState::is_retryable_failure);
        Ok(self.run_provisioning(targets).await)
    }

    fn indices_where(&self, predicate: impl Fn(&AddressState) -> bool) -> Vec<usize> {
        self.addresses
            .iter()
            .enumerate()
            .filter(|(_, state)| predicate(state))
            .map(|(index, _)| index)
            .collect()
    }

    async fn run_provisioning(&mut self, targets: Vec<usize>) -> ProvisionSummary {
        for index in targets {
            let Some(state) = self.addresses.get_mut(index) else {
                continue;
            };
            state.provision_state = ProvisionState::Provisioning;
            state.error = None;
            let address = state.address;
            let request = state.request();
            self.emit(WorkflowEvent::ProvisionStarted { address });

            let outcome = self.client.add_hsd(&request).await;

            let Some(state) = self.addresses.get_mut(index) else {
                continue;
            };
            match outcome.into_result() {
                Ok(()) => {
                    state.provision_state = ProvisionState::Complete;
                    info!(%address, configfile = %request.configfile, "address provisioned");
                }
                Err(err) => {
                    warn!(%address, category = %err.category, "provisioning failed");
                    state.provision_state = ProvisionState::Error;
                    state.error = Some(err);
                }
            }
            let settled = state.provision_state;
            self.emit(WorkflowEvent::ProvisionSettled {
                address,
                state: settled,
            });
        }

        let summary = ProvisionSummary {
            succeeded: self
                .addresses
                .iter()
                .filter(|state| state.provision_state == ProvisionState::Complete)
                .count(),
            total: self.addresses.len(),
        };

        info!(succeeded = summary.succeeded, total = summary.total, "provisioning pass finished");
        let level = if summary.is_complete() {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        self.log(
            level,
            "provisioning pass finished",
            json!({ "session": self.session, "succeeded": summary.succeeded, "total": summary.total }),
        );
        self.emit(WorkflowEvent::Summary {
            succeeded: summary.succeeded,
            total: summary.total,
        });
        summary
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Back to `Input` from any phase. Tracked addresses are dropped.
    pub fn reset(&mut self) {
        debug!(phase = %self.phase, "workflow reset");
        self.addresses.clear();
        self.session = None;
        self.phase = Phase::Input;
        self.emit(WorkflowEvent::Reset);
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn expect_phase(&self, expected: Phase) -> Result<(), CoreError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(CoreError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn reject(&self, err: CoreError) -> CoreError {
        debug!(error = %err, "input rejected");
        self.log(
            LogLevel::Warn,
            "input rejected",
            json!({ "reason": err.to_string(), "category": err.to_classified().category }),
        );
        err
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn log(&self, level: LogLevel, message: &str, data: serde_json::Value) {
        if let Some(sink) = &self.log_sink {
            sink.emit(LogEntry::new(level, message).with_data(data));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use macprov_api::{ClientConfig, ErrorCategory};

    use super::*;

    fn stub_controller(count: usize) -> WorkflowController {
        let client = ProvisioningClient::with_client(
            reqwest::Client::new(),
            ClientConfig {
                stub_mode: true,
                stub_delay: Duration::ZERO,
                ..ClientConfig::default()
            },
        );
        let allow_list = OuiAllowList::new(["000000", "A1B2C3"]).unwrap();
        let defaults = ProvisioningDefaults::Sequential {
            account: "100234".into(),
            isp: "metro".into(),
            configfiles: vec!["a.cfg".into(), "b.cfg".into()],
        };
        WorkflowController::new(client, allow_list, defaults, count).unwrap()
    }

    #[test]
    fn address_count_is_bounded() {
        let client = ProvisioningClient::with_client(reqwest::Client::new(), ClientConfig::default());
        let err = WorkflowController::new(
            client,
            OuiAllowList::default(),
            ProvisioningDefaults::default(),
            0,
        )
        .err()
        .unwrap();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn validate_rejections_stay_in_input() {
        let mut wf = stub_controller(1);

        let err = wf.validate("A1:B2:C3").unwrap_err();
        assert!(matches!(err, CoreError::Address(_)));
        assert_eq!(wf.phase(), Phase::Input);

        let err = wf.validate("11:22:33:44:55:66").unwrap_err();
        assert!(matches!(err, CoreError::OuiNotApproved { .. }));
        assert_eq!(wf.phase(), Phase::Input);
        assert!(wf.addresses().is_empty());
    }

    #[test]
    fn run_crossing_vendor_block_is_rejected() {
        let mut wf = stub_controller(4);
        let err = wf.validate("A1:B2:C3:FF:FF:FE").unwrap_err();
        match err {
            CoreError::OuiNotApproved { prefix } => assert_eq!(prefix.to_string(), "A1B2C4"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overflow_is_rejected_atomically() {
        let client = ProvisioningClient::with_client(reqwest::Client::new(), ClientConfig::default());
        let mut wf = WorkflowController::new(
            client,
            OuiAllowList::new(["FFFFFF"]).unwrap(),
            ProvisioningDefaults::default(),
            4,
        )
        .unwrap();
        let err = wf.validate("FF:FF:FF:FF:FF:FF").unwrap_err();
        assert!(matches!(err, CoreError::Overflow(_)));
        assert!(wf.addresses().is_empty());
    }

    #[test]
    fn validate_assigns_config_by_index() {
        let mut wf = stub_controller(4);
        let states = wf.validate("a1b2c3000001").unwrap();
        let files: Vec<&str> = states.iter().map(|s| s.assignment.configfile.as_str()).collect();
        assert_eq!(files, ["a.cfg", "b.cfg", "b.cfg", "b.cfg"]);
        assert!(states.iter().all(|s| s.lookup_status == LookupStatus::Pending));
        assert_eq!(wf.phase(), Phase::Status);
    }

    #[tokio::test]
    async fn wrong_phase_does_not_mutate() {
        let mut wf = stub_controller(1);
        let err = wf.provision().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPhase {
                expected: Phase::Provisioning,
                actual: Phase::Input
            }
        ));
        assert!(wf.confirm().is_err());
        assert_eq!(wf.phase(), Phase::Input);

        wf.validate("A1:B2:C3:00:00:02").unwrap();
        assert!(wf.validate("A1:B2:C3:00:00:02").is_err());
        assert_eq!(wf.addresses().len(), 1);
    }

    #[tokio::test]
    async fn stub_single_address_happy_path() {
        // 0xA1B2C3000002: not divisible by 3, 5, 7 or 11.
        let mut wf = stub_controller(1);
        let states = wf.submit("A1B2C3000002").await.unwrap();
        assert_eq!(states[0].lookup_status, LookupStatus::NotFound);

        assert_eq!(wf.request_provision().unwrap(), ProvisionGate::Ready);
        let summary = wf.provision().await.unwrap();
        assert_eq!(summary, ProvisionSummary { succeeded: 1, total: 1 });
        assert_eq!(wf.addresses()[0].provision_state, ProvisionState::Complete);
    }

    #[tokio::test]
    async fn stub_lookup_failures_are_contained() {
        // 00:00:00:00:00:07 fails, :08 is available, :09 exists, :0A is available.
        let mut wf = stub_controller(4);
        let states = wf.submit("00:00:00:00:00:07").await.unwrap();
        let statuses: Vec<LookupStatus> = states.iter().map(|s| s.lookup_status).collect();
        assert_eq!(
            statuses,
            [
                LookupStatus::Unknown,
                LookupStatus::NotFound,
                LookupStatus::Found,
                LookupStatus::NotFound
            ]
        );
        assert_eq!(states[0].error.as_ref().unwrap().category, ErrorCategory::Server);
        assert_eq!(states[2].device_record.as_ref().unwrap().mac, "00:00:00:00:00:09");
    }

    #[tokio::test]
    async fn stub_partial_provisioning_failure() {
        // :0A validation (divisible by 5), :0B server (11), :0C and :0D succeed.
        let mut wf = stub_controller(4);
        wf.submit("00:00:00:00:00:0A").await.unwrap();
        // :0C is divisible by 3, so the stub reports it as already registered.
        let gate = wf.request_provision().unwrap();
        assert!(matches!(gate, ProvisionGate::NeedsConfirmation { .. }));
        wf.confirm().unwrap();

        let summary = wf.provision().await.unwrap();
        assert_eq!(summary, ProvisionSummary { succeeded: 2, total: 4 });

        let states = wf.addresses();
        assert_eq!(states[0].provision_state, ProvisionState::Error);
        assert_eq!(states[0].error.as_ref().unwrap().category, ErrorCategory::Validation);
        assert_eq!(states[1].error.as_ref().unwrap().category, ErrorCategory::Server);

        // Only the retryable server failure is attempted again; it fails the same way.
        let mut events = wf.subscribe();
        let summary = wf.retry_failed().await.unwrap();
        assert_eq!(summary.succeeded, 2);
        let started: Vec<MacAddress> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                WorkflowEvent::ProvisionStarted { address } => Some(address),
                _ => None,
            })
            .collect();
        assert_eq!(started, ["00:00:00:00:00:0B".parse::<MacAddress>().unwrap()]);
    }

    #[tokio::test]
    async fn reset_reproduces_identical_run() {
        let mut wf = stub_controller(4);
        let first = wf.submit("A1:B2:C3:00:00:02").await.unwrap().to_vec();
        wf.reset();
        assert_eq!(wf.phase(), Phase::Input);
        assert!(wf.addresses().is_empty());

        let second = wf.submit("A1:B2:C3:00:00:02").await.unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cancel_confirmation_returns_to_status() {
        let mut wf = stub_controller(1);
        wf.submit("00:00:00:00:00:03").await.unwrap();
        let gate = wf.request_provision().unwrap();
        assert_eq!(
            gate,
            ProvisionGate::NeedsConfirmation {
                existing: vec!["00:00:00:00:00:03".parse().unwrap()]
            }
        );
        assert_eq!(wf.phase(), Phase::Confirming);
        assert!(wf.provision().await.is_err());

        wf.cancel_confirmation().unwrap();
        assert_eq!(wf.phase(), Phase::Status);
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = WorkflowEvent::LookupSettled {
            address: "A1:B2:C3:00:00:01".parse().unwrap(),
            status: LookupStatus::NotFound,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "event": "lookup_settled", "address": "A1:B2:C3:00:00:01", "status": "not-found" })
        );
    }
}
