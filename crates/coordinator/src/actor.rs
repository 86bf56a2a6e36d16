//! Per-transaction coordinator actor
//!
//! The actor is spawned on the first delivery to `(tenant, transaction
//! id)` and is re-entered once per message; the in-memory
//! [`TransactionState`] is the continuation between deliveries. Every
//! journal write completes before the handler returns, so the on-disk
//! status observed by other readers is always one of the legal ones.

use crate::state::TransactionState;
use ledger_common::{
    Account, Side, Status, Transaction, TransactionId, TransferId, PHASE_COMMIT, PHASE_PROMISE,
    PHASE_ROLLBACK,
};
use ledger_journal::Journal;
use ledger_lake::{Actor, ActorFactory, Context, Coordinates, Envelope, Flow};
use ledger_protocol::{
    AccountMessage, ClientReply, CoordinatorMessage, NegotiationReply, REASON_INTERNAL,
};
use std::sync::Arc;
use std::time::Duration;

/// Rollback reason when a journal write failed mid-negotiation
const REASON_STORAGE: &str = "storage";

/// Runtime knobs of the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Deadline for collecting all replies of one phase
    pub phase_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(5),
        }
    }
}

/// Spawns a coordinator for every first delivery in the tenant's region
pub struct CoordinatorFactory {
    journal: Arc<Journal>,
    settings: CoordinatorSettings,
}

impl CoordinatorFactory {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self::with_settings(journal, CoordinatorSettings::default())
    }

    pub fn with_settings(journal: Arc<Journal>, settings: CoordinatorSettings) -> Self {
        Self { journal, settings }
    }
}

impl ActorFactory for CoordinatorFactory {
    fn create(&self, coordinates: &Coordinates) -> Box<dyn Actor> {
        Box::new(TransactionActor {
            tenant: coordinates.region.clone(),
            id: TransactionId::from(coordinates.name.as_str()),
            journal: Arc::clone(&self.journal),
            phase_timeout: self.settings.phase_timeout,
            state: TransactionState::new(),
            behaviour: Behaviour::Initial,
        })
    }
}

/// What the actor is currently doing; the `context.Become` chain of the
/// negotiation expressed as data
enum Behaviour {
    Initial,
    Promising,
    Committing,
    RollingBack { reason: String },
    Forwarding(ForwardRequest),
}

/// A forward negotiation in flight with a remote ledger
struct ForwardRequest {
    id_transfer: TransferId,
    side: Side,
    target_tenant: String,
    target_transaction: TransactionId,
    requested_by: Coordinates,
}

struct TransactionActor {
    tenant: String,
    id: TransactionId,
    journal: Arc<Journal>,
    phase_timeout: Duration,
    state: TransactionState,
    behaviour: Behaviour,
}

impl Actor for TransactionActor {
    fn receive(&mut self, envelope: Envelope, context: &Context) -> Flow {
        match CoordinatorMessage::from_message(&envelope.message) {
            Ok(CoordinatorMessage::CreateTransaction { transaction }) => {
                self.on_create(envelope.from, transaction, context)
            }
            Ok(CoordinatorMessage::Reply(reply)) => self.on_reply(reply, context),
            Ok(CoordinatorMessage::ReplyTimeout { epoch }) => self.on_timeout(epoch, context),
            Ok(CoordinatorMessage::ResumeTransaction) => self.on_resume(context),
            Ok(CoordinatorMessage::ForwardTransfer {
                id_transfer,
                side,
                target_tenant,
            }) => self.on_forward(envelope.from, id_transfer, side, target_tenant, context),
            Err(_) => match ClientReply::from_message(&envelope.message) {
                // terminal reply of a remote ledger we are forwarding to
                Ok(reply) => self.on_remote_reply(reply, context),
                Err(e) => {
                    tracing::debug!("[{}/{}] ignoring unknown message: {}", self.tenant, self.id, e);
                    self.idle_flow()
                }
            },
        }
    }
}

impl TransactionActor {
    fn on_create(
        &mut self,
        requested_by: Coordinates,
        transaction: Transaction,
        context: &Context,
    ) -> Flow {
        if self.state.ready || !matches!(self.behaviour, Behaviour::Initial) {
            self.reply(context, &requested_by, self.race());
            return Flow::Continue;
        }

        if transaction.id != self.id {
            tracing::warn!(
                "[{}/{}] submission body carries id {}",
                self.tenant,
                self.id,
                transaction.id
            );
            self.reply(context, &requested_by, self.refused());
            return Flow::Stop;
        }

        if let Err(e) = transaction.validate() {
            tracing::warn!("[{}/{}] refusing submission: {}", self.tenant, self.id, e);
            self.reply(context, &requested_by, self.refused());
            return Flow::Stop;
        }

        if let Some((status, _)) = self.journal.get_transaction_state(&self.id) {
            let reply = match status {
                // an in-flight or crashed submission owns the entry
                Status::Dirty | Status::New => self.race(),
                _ => ClientReply::TransactionDuplicate {
                    id_transaction: self.id.clone(),
                },
            };
            self.reply(context, &requested_by, reply);
            return Flow::Stop;
        }

        if let Err(e) = self.journal.persist_transaction(&transaction) {
            tracing::error!("[{}/{}] persistence failed: {}", self.tenant, self.id, e);
            self.reply(context, &requested_by, self.refused());
            return Flow::Stop;
        }

        self.state.prepare(transaction, Some(requested_by));
        self.behaviour = Behaviour::Promising;
        self.begin_phase(PHASE_PROMISE, context);
        Flow::Continue
    }

    fn on_reply(&mut self, reply: NegotiationReply, context: &Context) -> Flow {
        if !self.state.ready {
            return self.idle_flow();
        }
        match self.behaviour {
            Behaviour::Promising | Behaviour::Committing | Behaviour::RollingBack { .. } => {}
            _ => return Flow::Continue,
        }

        self.state.mark(&reply);
        if !self.state.is_negotiation_finished() {
            return Flow::Continue;
        }

        match &self.behaviour {
            Behaviour::Promising => self.finish_promise(context),
            Behaviour::Committing => self.finish_commit(context),
            Behaviour::RollingBack { reason } => {
                let reason = reason.clone();
                self.finish_rollback(&reason, context)
            }
            _ => Flow::Continue,
        }
    }

    fn finish_promise(&mut self, context: &Context) -> Flow {
        if self.state.failed_responses > 0 {
            if let Err(e) = self.journal.reject_transaction(&self.id) {
                tracing::error!("[{}/{}] reject write failed: {}", self.tenant, self.id, e);
            }
            tracing::info!("[{}/{}] transaction rejected", self.tenant, self.id);
            self.reply_to_requester(context, self.rejected());
            return Flow::Stop;
        }

        match self.journal.accept_transaction(&self.id) {
            Ok(()) => {
                self.behaviour = Behaviour::Committing;
                self.begin_phase(PHASE_COMMIT, context);
                Flow::Continue
            }
            Err(e) => {
                tracing::error!("[{}/{}] accept write failed: {}", self.tenant, self.id, e);
                self.start_rollback(REASON_STORAGE, context)
            }
        }
    }

    fn finish_commit(&mut self, context: &Context) -> Flow {
        if self.state.failed_responses > 0 {
            let reason = self
                .state
                .failure_reason
                .clone()
                .unwrap_or_else(|| REASON_INTERNAL.to_string());
            return self.start_rollback(&reason, context);
        }

        match self.journal.commit_transaction(&self.id) {
            Ok(()) => {
                tracing::info!("[{}/{}] transaction committed", self.tenant, self.id);
                self.reply_to_requester(context, self.created());
                Flow::Stop
            }
            Err(e) => {
                tracing::error!("[{}/{}] commit write failed: {}", self.tenant, self.id, e);
                self.start_rollback(REASON_STORAGE, context)
            }
        }
    }

    fn start_rollback(&mut self, reason: &str, context: &Context) -> Flow {
        tracing::warn!(
            "[{}/{}] rolling back, reason {}",
            self.tenant,
            self.id,
            reason
        );
        self.behaviour = Behaviour::RollingBack {
            reason: reason.to_string(),
        };
        self.begin_phase(PHASE_ROLLBACK, context);
        Flow::Continue
    }

    fn finish_rollback(&mut self, reason: &str, context: &Context) -> Flow {
        if self.state.failed_responses > 0 {
            tracing::warn!(
                "[{}/{}] {} participants failed to roll back",
                self.tenant,
                self.id,
                self.state.failed_responses
            );
        }
        if let Err(e) = self.journal.rollback_transaction(&self.id, reason) {
            tracing::error!("[{}/{}] rollback write failed: {}", self.tenant, self.id, e);
        }
        tracing::info!(
            "[{}/{}] transaction rollbacked, reason {}",
            self.tenant,
            self.id,
            reason
        );
        self.reply_to_requester(context, self.rejected());
        Flow::Stop
    }

    fn on_timeout(&mut self, epoch: u64, context: &Context) -> Flow {
        if epoch != self.state.epoch {
            // a deadline armed for an earlier phase that has since
            // finished; the live phase has its own timer
            return self.idle_flow();
        }

        if matches!(self.behaviour, Behaviour::Forwarding(_)) {
            let behaviour = std::mem::replace(&mut self.behaviour, Behaviour::Initial);
            if let Behaviour::Forwarding(request) = behaviour {
                self.reply(context, &request.requested_by, self.timed_out());
            }
            return Flow::Stop;
        }

        if !self.state.ready {
            // a stray timer delivery spawned this actor
            return Flow::Stop;
        }
        if self.state.wait_for.is_empty() {
            return Flow::Continue;
        }

        // answer the requester and keep waiting; the journal holds whatever
        // state was reached and the integrity scan re-drives the phase
        tracing::warn!(
            "[{}/{}] phase deadline elapsed, {} replies pending",
            self.tenant,
            self.id,
            self.state.wait_for.len()
        );
        if let Some(requested_by) = self.state.reply_to.take() {
            self.reply(context, &requested_by, self.timed_out());
        }
        Flow::Continue
    }

    fn on_resume(&mut self, context: &Context) -> Flow {
        if self.state.ready {
            match self.behaviour {
                Behaviour::Promising | Behaviour::Committing | Behaviour::RollingBack { .. }
                    if !self.state.wait_for.is_empty() =>
                {
                    tracing::info!(
                        "[{}/{}] re-driving phase for {} pending accounts",
                        self.tenant,
                        self.id,
                        self.state.wait_for.len()
                    );
                    self.send_phase_envelopes(context, true);
                }
                _ => {}
            }
            return Flow::Continue;
        }

        let Some((status, _)) = self.journal.get_transaction_state(&self.id) else {
            return Flow::Stop;
        };
        match status {
            Status::New => self.resume_phase(PHASE_PROMISE, Behaviour::Promising, context),
            Status::Accepted => self.resume_phase(PHASE_COMMIT, Behaviour::Committing, context),
            _ => Flow::Stop,
        }
    }

    fn resume_phase(&mut self, phase: &str, behaviour: Behaviour, context: &Context) -> Flow {
        let Some(transaction) = self.journal.load_transaction(&self.id) else {
            tracing::warn!("[{}/{}] cannot resume, body unreadable", self.tenant, self.id);
            return Flow::Stop;
        };
        tracing::info!("[{}/{}] resuming negotiation at {}", self.tenant, self.id, phase);
        self.state.prepare(transaction, None);
        self.behaviour = behaviour;
        self.begin_phase(phase, context);
        Flow::Continue
    }

    fn on_forward(
        &mut self,
        requested_by: Coordinates,
        id_transfer: TransferId,
        side: Side,
        target_tenant: String,
        context: &Context,
    ) -> Flow {
        if self.state.ready || !matches!(self.behaviour, Behaviour::Initial) {
            self.reply(
                context,
                &requested_by,
                self.transfer_refused(id_transfer, side),
            );
            return Flow::Continue;
        }

        match self.journal.get_transaction_state(&self.id) {
            Some((Status::Committed, _)) => {}
            _ => {
                // only committed bookings may be forwarded
                self.reply(
                    context,
                    &requested_by,
                    self.transfer_refused(id_transfer, side),
                );
                return Flow::Stop;
            }
        }

        match self.journal.is_transfer_forwarded(&self.id, &id_transfer, side) {
            Ok(true) => {
                self.reply(
                    context,
                    &requested_by,
                    ClientReply::TransferForwarded {
                        id_transaction: self.id.clone(),
                        id_transfer,
                        side,
                    },
                );
                return Flow::Stop;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("[{}/{}] forward log unreadable: {}", self.tenant, self.id, e);
                self.reply(
                    context,
                    &requested_by,
                    self.transfer_refused(id_transfer, side),
                );
                return Flow::Stop;
            }
        }

        let Some(transfer) = self.journal.load_transfer(&self.id, &id_transfer) else {
            self.reply(
                context,
                &requested_by,
                self.transfer_refused(id_transfer, side),
            );
            return Flow::Stop;
        };

        // deterministic target id: a retried forward collides on the remote
        // ledger and the duplicate answer still acknowledges the booking
        let target_transaction =
            TransactionId::new(format!("{}_{}_{}", self.id, id_transfer, side));
        let derived = Transaction::new(target_transaction.clone(), vec![transfer]);

        tracing::info!(
            "[{}/{}] forwarding {} {} to tenant {}",
            self.tenant,
            self.id,
            id_transfer,
            side,
            target_tenant
        );
        context.send(
            Coordinates::new(target_tenant.clone(), target_transaction.as_str()),
            CoordinatorMessage::CreateTransaction {
                transaction: derived,
            }
            .into_message(),
        );
        self.state.epoch += 1;
        context.schedule(
            context.coordinates().clone(),
            CoordinatorMessage::ReplyTimeout {
                epoch: self.state.epoch,
            }
            .into_message(),
            self.phase_timeout,
        );
        self.behaviour = Behaviour::Forwarding(ForwardRequest {
            id_transfer,
            side,
            target_tenant,
            target_transaction,
            requested_by,
        });
        Flow::Continue
    }

    fn on_remote_reply(&mut self, reply: ClientReply, context: &Context) -> Flow {
        if !matches!(self.behaviour, Behaviour::Forwarding(_)) {
            return self.idle_flow();
        }
        let request = match std::mem::replace(&mut self.behaviour, Behaviour::Initial) {
            Behaviour::Forwarding(request) => request,
            _ => return Flow::Continue,
        };

        match reply {
            ClientReply::TransactionCreated { .. } | ClientReply::TransactionDuplicate { .. } => {
                let recorded = match request.side {
                    Side::Credit => self.journal.accept_forward_credit(
                        &self.id,
                        &request.id_transfer,
                        &request.target_tenant,
                        &request.target_transaction,
                        &request.id_transfer,
                    ),
                    Side::Debit => self.journal.accept_forward_debit(
                        &self.id,
                        &request.id_transfer,
                        &request.target_tenant,
                        &request.target_transaction,
                        &request.id_transfer,
                    ),
                };
                let answer = match recorded {
                    Ok(()) => {
                        tracing::info!(
                            "[{}/{}] forwarded {} {} to tenant {}",
                            self.tenant,
                            self.id,
                            request.id_transfer,
                            request.side,
                            request.target_tenant
                        );
                        ClientReply::TransferForwarded {
                            id_transaction: self.id.clone(),
                            id_transfer: request.id_transfer,
                            side: request.side,
                        }
                    }
                    Err(e) => {
                        // the booking stands remotely but was not recorded;
                        // a retry acknowledges again via the duplicate path
                        tracing::error!(
                            "[{}/{}] forward record failed: {}",
                            self.tenant,
                            self.id,
                            e
                        );
                        self.transfer_refused(request.id_transfer, request.side)
                    }
                };
                self.reply(context, &request.requested_by, answer);
                Flow::Stop
            }
            ClientReply::ReplyTimeout { .. } => {
                self.reply(context, &request.requested_by, self.timed_out());
                Flow::Stop
            }
            ClientReply::TransactionRejected { .. }
            | ClientReply::TransactionRefused { .. }
            | ClientReply::TransactionRace { .. } => {
                self.reply(
                    context,
                    &request.requested_by,
                    self.transfer_refused(request.id_transfer, request.side),
                );
                Flow::Stop
            }
            other => {
                tracing::debug!(
                    "[{}/{}] ignoring remote reply {:?}",
                    self.tenant,
                    self.id,
                    other
                );
                self.behaviour = Behaviour::Forwarding(request);
                Flow::Continue
            }
        }
    }

    /// Arm the phase and send its envelope to every participant
    fn begin_phase(&mut self, phase: &str, context: &Context) {
        self.state.advance_phase(phase);
        self.state.reset_marks();
        self.send_phase_envelopes(context, false);
        if self.state.reply_to.is_some() {
            context.schedule(
                context.coordinates().clone(),
                CoordinatorMessage::ReplyTimeout {
                    epoch: self.state.epoch,
                }
                .into_message(),
                self.phase_timeout,
            );
        }
    }

    fn send_phase_envelopes(&self, context: &Context, pending_only: bool) {
        for (account, phase) in &self.state.negotiation {
            if pending_only && !self.state.wait_for.contains(account) {
                continue;
            }
            let transfers = self.state.transaction.transfers_for(account);
            let Some(message) = AccountMessage::for_phase(phase, self.id.clone(), transfers)
            else {
                continue;
            };
            context.send(account_coordinates(account), message.into_message());
        }
    }

    /// Whether a message that carries no work keeps the actor alive: an
    /// actor with no state and no negotiation was spawned by a stray
    /// delivery and can go away
    fn idle_flow(&self) -> Flow {
        if !self.state.ready && matches!(self.behaviour, Behaviour::Initial) {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn reply(&self, context: &Context, to: &Coordinates, reply: ClientReply) {
        context.send(to.clone(), reply.into_message());
    }

    fn reply_to_requester(&mut self, context: &Context, reply: ClientReply) {
        if let Some(requested_by) = self.state.reply_to.take() {
            self.reply(context, &requested_by, reply);
        }
    }

    fn created(&self) -> ClientReply {
        ClientReply::TransactionCreated {
            id_transaction: self.id.clone(),
        }
    }

    fn rejected(&self) -> ClientReply {
        ClientReply::TransactionRejected {
            id_transaction: self.id.clone(),
        }
    }

    fn refused(&self) -> ClientReply {
        ClientReply::TransactionRefused {
            id_transaction: self.id.clone(),
        }
    }

    fn race(&self) -> ClientReply {
        ClientReply::TransactionRace {
            id_transaction: self.id.clone(),
        }
    }

    fn timed_out(&self) -> ClientReply {
        ClientReply::ReplyTimeout {
            id_transaction: self.id.clone(),
        }
    }

    fn transfer_refused(&self, id_transfer: TransferId, side: Side) -> ClientReply {
        ClientReply::TransferRefused {
            id_transaction: self.id.clone(),
            id_transfer,
            side,
        }
    }
}

/// Account actors are addressed by their `(tenant, name)` reference
fn account_coordinates(account: &Account) -> Coordinates {
    Coordinates::new(account.tenant.clone(), account.name.clone())
}
