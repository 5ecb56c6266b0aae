//! Parameterized decision processing.
//!
//! Every chain role's approve/reject endpoint funnels through one processor:
//! validate the payload, gate on role and resubmission state, route through
//! the static table, append to the ledger, then notify. The ledger write is
//! the commit point; notification failure afterwards only sets a warning
//! flag on the outcome.

use std::sync::Arc;

use reqflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use reqflow_core::domain::material::total_cost;
use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
use reqflow_core::domain::status::{DecisionStatus, NewDecision, StatusEntry};
use reqflow_core::errors::WorkflowError;
use reqflow_core::resubmission::{self, ResubmissionVerdict};
use reqflow_core::roles::{Actor, Role};
use reqflow_core::router::{self, RouteTarget, RoutingError};
use reqflow_db::{MaterialRepository, PurchaseRepository, RepositoryError, StatusLedger};
use reqflow_notify::{DecisionNotification, DecisionNotifier};

use crate::outcome::{DecisionCommand, DecisionOutcome};

pub struct DecisionProcessor {
    purchases: Arc<dyn PurchaseRepository>,
    materials: Arc<dyn MaterialRepository>,
    ledger: Arc<dyn StatusLedger>,
    notifier: Arc<dyn DecisionNotifier>,
    audit: Arc<dyn AuditSink>,
}

impl DecisionProcessor {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        materials: Arc<dyn MaterialRepository>,
        ledger: Arc<dyn StatusLedger>,
        notifier: Arc<dyn DecisionNotifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { purchases, materials, ledger, notifier, audit }
    }

    /// Record `actor`'s decision while acting as `expected_role`.
    ///
    /// `expected_role` comes from the route, not the caller's identity; the
    /// two must agree or the decision is refused before any read.
    pub async fn decide(
        &self,
        expected_role: Role,
        actor: &Actor,
        command: DecisionCommand,
        correlation_id: &str,
    ) -> Result<DecisionOutcome, WorkflowError> {
        validate_payload(expected_role, &command)?;

        if actor.role != expected_role {
            return Err(WorkflowError::Authorization {
                expected: expected_role,
                actual: actor.role,
            });
        }

        // Estimation's branch category is meaningful; anything a caller
        // sends for other roles is dropped rather than rejected.
        let category = (expected_role == Role::Estimation)
            .then_some(command.reject_category)
            .flatten();
        let target = router::route(expected_role, command.status, category)
            .map_err(routing_to_workflow)?;

        let purchase = self.load_purchase(&command.purchase_id).await?;

        let (verdict, prior) = self.resubmission_verdict(&purchase, expected_role).await?;
        if let (ResubmissionVerdict::Blocked, Some(prior)) = (verdict, prior.as_ref()) {
            return Err(WorkflowError::Conflict {
                role: expected_role,
                existing: prior.status,
            });
        }

        let receiver = match target {
            RouteTarget::Next(next) => next,
            RouteTarget::Requester => purchase.requester_role,
            // Terminal approval; the ledger still records who holds it.
            RouteTarget::Payment => Role::Accounts,
        };

        // The ledger re-checks this expectation inside its transaction; a
        // same-role racer that committed since the verdict was computed turns
        // this write into a conflict instead of a silent supersede.
        let expected_prior = prior.map(|entry| entry.id);
        let entry = self
            .ledger
            .record_decision(
                NewDecision {
                    purchase_id: purchase.id.clone(),
                    sender: expected_role,
                    receiver,
                    status: command.status,
                    decision_by_id: actor.user_id.clone(),
                    decision_by_name: actor.display_name.clone(),
                    rejection_reason: command.rejection_reason,
                    reject_category: category,
                    comments: command.comments,
                },
                expected_prior,
            )
            .await
            .map_err(|error| match error {
                RepositoryError::PurchaseMissing(id) => WorkflowError::NotFound(id),
                RepositoryError::DecisionSuperseded { status, .. } => {
                    WorkflowError::Conflict { role: expected_role, existing: status }
                }
                other => persistence(other),
            })?;

        let message = router::routing_message(command.status, target, purchase.requester_role);
        let email_warning = self
            .send_notification(&purchase, &entry, target, &message, correlation_id)
            .await;

        let resubmission = match verdict {
            ResubmissionVerdict::Resubmitted(evidence) => Some(evidence),
            _ => None,
        };

        tracing::info!(
            event_name = "workflow.decision_recorded",
            correlation_id,
            purchase_id = %entry.purchase_id.0,
            sender = expected_role.as_str(),
            receiver = receiver.as_str(),
            status = %entry.status,
            resubmission = resubmission.is_some(),
            email_warning,
            "decision recorded"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(entry.purchase_id.clone()),
                correlation_id,
                "workflow.decision_recorded",
                AuditCategory::Decision,
                &actor.user_id,
                AuditOutcome::Success,
            )
            .with_metadata("sender", expected_role.as_str())
            .with_metadata("receiver", receiver.as_str())
            .with_metadata("status", entry.status.as_str()),
        );

        Ok(DecisionOutcome { entry, message, resubmission, email_warning })
    }

    /// Full ledger trail for a purchase, oldest first.
    pub async fn history(
        &self,
        purchase_id: &str,
    ) -> Result<(PurchaseRequest, Vec<StatusEntry>), WorkflowError> {
        let purchase = self.load_purchase(purchase_id).await?;
        let entries = self.ledger.history(&purchase.id).await.map_err(persistence)?;
        Ok((purchase, entries))
    }

    async fn load_purchase(&self, purchase_id: &str) -> Result<PurchaseRequest, WorkflowError> {
        let id = PurchaseId(purchase_id.to_string());
        self.purchases
            .find_by_id(&id)
            .await
            .map_err(persistence)?
            .filter(|purchase| !purchase.is_deleted)
            .ok_or_else(|| WorkflowError::NotFound(purchase_id.to_string()))
    }

    async fn resubmission_verdict(
        &self,
        purchase: &PurchaseRequest,
        role: Role,
    ) -> Result<(ResubmissionVerdict, Option<StatusEntry>), WorkflowError> {
        let own_latest = self
            .ledger
            .latest_decision_ever(&purchase.id, role)
            .await
            .map_err(persistence)?;

        let mut source_latest = Vec::new();
        for source in router::resubmission_sources(role) {
            let latest = self
                .ledger
                .latest_decision_ever(&purchase.id, *source)
                .await
                .map_err(persistence)?;
            source_latest.push((*source, latest.map(|entry| entry.created_at)));
        }

        let verdict =
            resubmission::evaluate(own_latest.as_ref(), purchase.updated_at, &source_latest);
        Ok((verdict, own_latest))
    }

    async fn send_notification(
        &self,
        purchase: &PurchaseRequest,
        entry: &StatusEntry,
        target: RouteTarget,
        message: &str,
        correlation_id: &str,
    ) -> bool {
        let (recipient_role, recipient_name) = match target {
            RouteTarget::Requester => {
                (purchase.requester_role, purchase.requester_name.clone())
            }
            _ => (entry.receiver, entry.receiver.display_name().to_string()),
        };

        let lines = match self.materials.find_by_ids(&purchase.material_ids).await {
            Ok(lines) => lines,
            Err(error) => {
                tracing::warn!(
                    event_name = "workflow.material_lookup_failed",
                    correlation_id,
                    purchase_id = %purchase.id.0,
                    error = %error,
                    "could not load material lines for notification"
                );
                Vec::new()
            }
        };

        let notification = DecisionNotification {
            purchase_id: purchase.id.0.clone(),
            project_ref: purchase.project_ref.clone(),
            decided_by: entry.decision_by_name.clone(),
            sender_role: entry.sender,
            status: entry.status,
            recipient_role,
            recipient_name,
            message: message.to_string(),
            total_cost: total_cost(&lines),
        };

        match self.notifier.notify(&notification).await {
            Ok(()) => false,
            Err(error) => {
                tracing::warn!(
                    event_name = "workflow.notification_failed",
                    correlation_id,
                    purchase_id = %purchase.id.0,
                    recipient = recipient_role.as_str(),
                    error = %error,
                    "decision recorded but notification failed"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(purchase.id.clone()),
                        correlation_id,
                        "workflow.notification_failed",
                        AuditCategory::Notification,
                        &entry.decision_by_id,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("recipient", recipient_role.as_str())
                    .with_metadata("error", error.to_string()),
                );
                true
            }
        }
    }
}

fn validate_payload(role: Role, command: &DecisionCommand) -> Result<(), WorkflowError> {
    if command.purchase_id.trim().is_empty() {
        return Err(WorkflowError::validation("purchase id must not be empty"));
    }
    match command.status {
        DecisionStatus::Pending => {
            Err(WorkflowError::validation("a decision must approve or reject"))
        }
        DecisionStatus::Rejected => {
            let reason_present = command
                .rejection_reason
                .as_deref()
                .is_some_and(|reason| !reason.trim().is_empty());
            if !reason_present {
                return Err(WorkflowError::validation("a rejection requires a reason"));
            }
            if role == Role::Estimation && command.reject_category.is_none() {
                return Err(WorkflowError::validation(
                    "estimation rejections require a category (cost or pm_flag)",
                ));
            }
            Ok(())
        }
        DecisionStatus::Approved => Ok(()),
    }
}

fn routing_to_workflow(error: RoutingError) -> WorkflowError {
    WorkflowError::Validation(error.to_string())
}

fn persistence(error: RepositoryError) -> WorkflowError {
    WorkflowError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use reqflow_core::audit::InMemoryAuditSink;
    use reqflow_core::domain::purchase::{PurchaseId, PurchaseRequest};
    use reqflow_core::domain::status::{
        DecisionStatus, EntryId, NewDecision, RejectCategory, StatusEntry,
    };
    use reqflow_core::errors::WorkflowError;
    use reqflow_core::resubmission::ResubmissionEvidence;
    use reqflow_core::roles::{Actor, Role};
    use reqflow_db::{InMemoryWorkflowStore, PurchaseRepository, RepositoryError, StatusLedger};
    use reqflow_notify::{FailingNotifier, RecordingNotifier};

    use super::DecisionProcessor;
    use crate::outcome::DecisionCommand;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: format!("u-{}", role.as_str()),
            display_name: role.display_name().to_string(),
            role,
        }
    }

    fn purchase(id: &str) -> PurchaseRequest {
        let now = Utc::now() - Duration::hours(2);
        PurchaseRequest {
            id: PurchaseId(id.to_string()),
            requester_id: "u-site-1".to_string(),
            requester_name: "A. Mason".to_string(),
            requester_role: Role::SiteSupervisor,
            project_ref: "PRJ-OFFICE-7F".to_string(),
            material_ids: Vec::new(),
            purpose: "partition works".to_string(),
            location: "Level 7".to_string(),
            attachment_ref: None,
            is_deleted: false,
            created_at: now,
            created_by: "u-site-1".to_string(),
            updated_at: now,
            updated_by: "u-site-1".to_string(),
        }
    }

    fn approve(id: &str) -> DecisionCommand {
        DecisionCommand {
            purchase_id: id.to_string(),
            status: DecisionStatus::Approved,
            rejection_reason: None,
            reject_category: None,
            comments: None,
        }
    }

    fn reject(id: &str, category: Option<RejectCategory>) -> DecisionCommand {
        DecisionCommand {
            purchase_id: id.to_string(),
            status: DecisionStatus::Rejected,
            rejection_reason: Some("quote exceeds budget line".to_string()),
            reject_category: category,
            comments: None,
        }
    }

    struct Harness {
        store: Arc<InMemoryWorkflowStore>,
        notifier: Arc<RecordingNotifier>,
        audit: InMemoryAuditSink,
        processor: DecisionProcessor,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = InMemoryAuditSink::default();
        store.save(purchase("PR-7")).await.expect("seed purchase");
        let processor = DecisionProcessor::new(
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(audit.clone()),
        );
        Harness { store, notifier, audit, processor }
    }

    #[tokio::test]
    async fn full_approval_chain_reaches_payment() {
        let h = harness().await;

        for (role, expected_receiver) in [
            (Role::Procurement, Role::ProjectManager),
            (Role::ProjectManager, Role::Estimation),
            (Role::Estimation, Role::TechnicalDirector),
            (Role::TechnicalDirector, Role::Accounts),
            (Role::Accounts, Role::Accounts),
        ] {
            let outcome = h
                .processor
                .decide(role, &actor(role), approve("PR-7"), "req-1")
                .await
                .unwrap_or_else(|error| panic!("{role}: {error}"));
            assert_eq!(outcome.entry.receiver, expected_receiver);
            assert!(!outcome.email_warning);
        }

        let (_, history) = h.processor.history("PR-7").await.expect("history");
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().map(|e| e.sender), Some(Role::Accounts));
        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[4].message, "approved for payment");
    }

    #[tokio::test]
    async fn estimation_rejection_routes_by_category() {
        let h = harness().await;

        let cost = h
            .processor
            .decide(
                Role::Estimation,
                &actor(Role::Estimation),
                reject("PR-7", Some(RejectCategory::Cost)),
                "req-1",
            )
            .await
            .expect("cost rejection");
        assert_eq!(cost.entry.receiver, Role::Procurement);
        assert_eq!(cost.message, "rejected and sent back to Procurement");

        // Procurement re-sends (newer upstream entry) before Estimation's
        // second pass.
        h.processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-7"), "req-2")
            .await
            .expect("procurement resend");

        let pm_flag = h
            .processor
            .decide(
                Role::Estimation,
                &actor(Role::Estimation),
                reject("PR-7", Some(RejectCategory::PmFlag)),
                "req-3",
            )
            .await
            .expect("pm_flag rejection");
        assert_eq!(pm_flag.entry.receiver, Role::ProjectManager);
        assert!(pm_flag.resubmission.is_some());
    }

    #[tokio::test]
    async fn estimation_rejection_without_category_fails_validation() {
        let h = harness().await;
        let error = h
            .processor
            .decide(Role::Estimation, &actor(Role::Estimation), reject("PR-7", None), "req-1")
            .await
            .expect_err("category required");
        assert!(matches!(error, WorkflowError::Validation(_)));
        assert_eq!(h.store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn category_is_ignored_for_non_estimation_rejections() {
        let h = harness().await;
        let outcome = h
            .processor
            .decide(
                Role::TechnicalDirector,
                &actor(Role::TechnicalDirector),
                reject("PR-7", Some(RejectCategory::PmFlag)),
                "req-1",
            )
            .await
            .expect("td rejection");
        assert_eq!(outcome.entry.receiver, Role::Estimation);
        assert_eq!(outcome.entry.reject_category, None);
    }

    #[tokio::test]
    async fn procurement_rejection_returns_to_requester() {
        let h = harness().await;
        let outcome = h
            .processor
            .decide(Role::Procurement, &actor(Role::Procurement), reject("PR-7", None), "req-1")
            .await
            .expect("procurement rejection");
        assert_eq!(outcome.entry.receiver, Role::SiteSupervisor);
        assert_eq!(outcome.message, "rejected and sent back to Site Supervisor");
        let sent = h.notifier.sent().await;
        assert_eq!(sent[0].recipient_name, "A. Mason");
    }

    #[tokio::test]
    async fn mismatched_role_is_refused_before_any_write() {
        let h = harness().await;
        let error = h
            .processor
            .decide(Role::ProjectManager, &actor(Role::Design), approve("PR-7"), "req-1")
            .await
            .expect_err("authorization must fail");
        assert_eq!(
            error,
            WorkflowError::Authorization {
                expected: Role::ProjectManager,
                actual: Role::Design,
            }
        );
        assert_eq!(h.store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn rejection_without_reason_fails_validation() {
        let h = harness().await;
        let mut command = reject("PR-7", None);
        command.rejection_reason = Some("   ".to_string());
        let error = h
            .processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), command, "req-1")
            .await
            .expect_err("reason required");
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn pending_is_not_a_submittable_decision() {
        let h = harness().await;
        let mut command = approve("PR-7");
        command.status = DecisionStatus::Pending;
        let error = h
            .processor
            .decide(Role::Procurement, &actor(Role::Procurement), command, "req-1")
            .await
            .expect_err("pending refused");
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_purchase_is_not_found() {
        let h = harness().await;
        let error = h
            .processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-404"), "req-1")
            .await
            .expect_err("missing purchase");
        assert_eq!(error, WorkflowError::NotFound("PR-404".to_string()));
    }

    #[tokio::test]
    async fn soft_deleted_purchase_is_not_found() {
        let h = harness().await;
        let mut hidden = purchase("PR-9");
        hidden.is_deleted = true;
        h.store.save(hidden).await.expect("save");
        let error = h
            .processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-9"), "req-1")
            .await
            .expect_err("deleted purchase");
        assert_eq!(error, WorkflowError::NotFound("PR-9".to_string()));
    }

    #[tokio::test]
    async fn repeat_decision_without_change_conflicts() {
        let h = harness().await;
        h.processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), reject("PR-7", None), "req-1")
            .await
            .expect("first rejection");

        let error = h
            .processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), approve("PR-7"), "req-2")
            .await
            .expect_err("second decision blocked");
        assert_eq!(
            error,
            WorkflowError::Conflict {
                role: Role::ProjectManager,
                existing: DecisionStatus::Rejected,
            }
        );
        assert_eq!(h.store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn repeat_approval_without_change_also_conflicts() {
        let h = harness().await;
        for role in [Role::Procurement, Role::ProjectManager, Role::Estimation] {
            h.processor.decide(role, &actor(role), approve("PR-7"), "req-1").await.expect("chain");
        }
        let first = h
            .processor
            .decide(
                Role::TechnicalDirector,
                &actor(Role::TechnicalDirector),
                approve("PR-7"),
                "req-2",
            )
            .await
            .expect("td approval");
        assert_eq!(first.entry.receiver, Role::Accounts);

        let error = h
            .processor
            .decide(
                Role::TechnicalDirector,
                &actor(Role::TechnicalDirector),
                approve("PR-7"),
                "req-3",
            )
            .await
            .expect_err("second approval blocked");
        assert_eq!(
            error.to_string(),
            "Technical Director has already approved this purchase request"
        );
    }

    #[tokio::test]
    async fn purchase_modification_unblocks_repeat_decision() {
        let h = harness().await;
        h.processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), reject("PR-7", None), "req-1")
            .await
            .expect("rejection");

        // The requester edits the purchase after the rejection.
        let mut edited = h
            .store
            .find_by_id(&PurchaseId("PR-7".to_string()))
            .await
            .expect("find")
            .expect("exists");
        edited.touch("u-site-1", Utc::now() + Duration::seconds(1));
        h.store.save(edited).await.expect("save");

        let outcome = h
            .processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), approve("PR-7"), "req-2")
            .await
            .expect("resubmission");
        assert_eq!(outcome.resubmission, Some(ResubmissionEvidence::PurchaseModified));

        let (_, history) = h.processor.history("PR-7").await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|e| e.is_active).count(), 1);
    }

    #[tokio::test]
    async fn upstream_activity_unblocks_repeat_decision() {
        let h = harness().await;
        h.processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), reject("PR-7", None), "req-1")
            .await
            .expect("pm rejection");
        h.processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-7"), "req-2")
            .await
            .expect("procurement resend");

        let outcome = h
            .processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), approve("PR-7"), "req-3")
            .await
            .expect("pm second pass");
        assert_eq!(
            outcome.resubmission,
            Some(ResubmissionEvidence::UpstreamActivity { source: Role::Procurement })
        );
    }

    #[tokio::test]
    async fn notification_failure_flags_warning_but_keeps_decision() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        store.save(purchase("PR-7")).await.expect("seed");
        let audit = InMemoryAuditSink::default();
        let processor = DecisionProcessor::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FailingNotifier),
            Arc::new(audit.clone()),
        );

        let outcome = processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-7"), "req-1")
            .await
            .expect("decision survives notifier failure");
        assert!(outcome.email_warning);
        assert_eq!(store.entry_count().await, 1);
        assert!(audit
            .events()
            .iter()
            .any(|event| event.event_type == "workflow.notification_failed"));
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_as_persistence_error() {
        let h = harness().await;
        h.store.poison_recordings();
        let error = h
            .processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-7"), "req-1")
            .await
            .expect_err("ledger failure");
        assert!(matches!(error, WorkflowError::Persistence(_)));
        assert!(h.notifier.sent().await.is_empty());
    }

    /// Ledger wrapper whose reads lag behind the store, standing in for a
    /// same-role racer that commits between evaluation and the write.
    struct LaggingReadLedger {
        inner: Arc<InMemoryWorkflowStore>,
    }

    #[async_trait::async_trait]
    impl StatusLedger for LaggingReadLedger {
        async fn record_decision(
            &self,
            decision: NewDecision,
            expected_prior: Option<EntryId>,
        ) -> Result<StatusEntry, RepositoryError> {
            self.inner.record_decision(decision, expected_prior).await
        }

        async fn latest_active_decision(
            &self,
            purchase_id: &PurchaseId,
            role: Role,
        ) -> Result<Option<StatusEntry>, RepositoryError> {
            self.inner.latest_active_decision(purchase_id, role).await
        }

        async fn latest_decision_ever(
            &self,
            _purchase_id: &PurchaseId,
            _role: Role,
        ) -> Result<Option<StatusEntry>, RepositoryError> {
            Ok(None)
        }

        async fn history(
            &self,
            purchase_id: &PurchaseId,
        ) -> Result<Vec<StatusEntry>, RepositoryError> {
            self.inner.history(purchase_id).await
        }

        async fn latest_overall(
            &self,
            purchase_id: &PurchaseId,
        ) -> Result<Option<StatusEntry>, RepositoryError> {
            self.inner.latest_overall(purchase_id).await
        }
    }

    #[tokio::test]
    async fn racing_same_role_decision_surfaces_as_conflict() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        store.save(purchase("PR-7")).await.expect("seed");

        // A racer's rejection reaches the ledger after this call's state was
        // read; the lagging reads reproduce that interleaving.
        store
            .record_decision(
                NewDecision {
                    purchase_id: PurchaseId("PR-7".to_string()),
                    sender: Role::ProjectManager,
                    receiver: Role::Procurement,
                    status: DecisionStatus::Rejected,
                    decision_by_id: "u-pm-2".to_string(),
                    decision_by_name: "N. Rivera".to_string(),
                    rejection_reason: Some("quote exceeds budget line".to_string()),
                    reject_category: None,
                    comments: None,
                },
                None,
            )
            .await
            .expect("racer commit");

        let processor = DecisionProcessor::new(
            store.clone(),
            store.clone(),
            Arc::new(LaggingReadLedger { inner: store.clone() }),
            Arc::new(RecordingNotifier::new()),
            Arc::new(InMemoryAuditSink::default()),
        );

        let error = processor
            .decide(Role::ProjectManager, &actor(Role::ProjectManager), approve("PR-7"), "req-1")
            .await
            .expect_err("stale approval must not commit");
        assert_eq!(
            error.to_string(),
            "Project Manager has already rejected this purchase request"
        );

        let active = store
            .latest_active_decision(&PurchaseId("PR-7".to_string()), Role::ProjectManager)
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(active.status, DecisionStatus::Rejected);
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn audit_trail_records_successful_decisions() {
        let h = harness().await;
        h.processor
            .decide(Role::Procurement, &actor(Role::Procurement), approve("PR-7"), "req-42")
            .await
            .expect("decision");

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].metadata.get("receiver").map(String::as_str), Some("projectManager"));
    }
}
