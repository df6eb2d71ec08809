//! The gateway orchestrator.
//!
//! [`Gateway`] owns the mailbox. Events and registry responses are processed one at a time in
//! arrival order; the only state shared with other tasks is the [`CorrelationStore`].
//!
//! Per event:
//! 1. translate the payload into a [`ChangeEvent`] (unrecognized events are dropped)
//! 2. build the feed message under a fresh [`CorrelationId`]
//! 3. record the pending request, then hand the feed to the [`Transport`]
//!
//! Per response:
//! 1. take the pending request for the correlation id (unknown ids are discarded)
//! 2. classify the acknowledgement
//! 3. answer the original caller on success; rejections are only answered when configured

use crate::config::GatewayConfig;
use crate::constants::{FEED_LABEL, HL7_CONTENT_TYPE, MAILBOX_CAPACITY, REJECTION_CONTENT_TYPE};
use crate::correlation::{CorrelationId, CorrelationStore, PendingRequest};
use crate::event::{ChangeEvent, EventPayload, FeedKind};
use crate::transport::{SocketRequest, Transport};
use crate::{GatewayError, GatewayResult};
use hl7::{classify_response_with, FeedBuilder, ResponseOutcome};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

/// The answer sent back to whoever submitted an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl GatewayReply {
    /// 200 carrying the registry acknowledgement.
    pub fn success(raw_ack: &str) -> Self {
        Self {
            status: 200,
            content_type: HL7_CONTENT_TYPE.to_string(),
            body: raw_ack.to_string(),
        }
    }

    /// 502 carrying the rejection text.
    pub fn rejected(message: &str) -> Self {
        Self {
            status: 502,
            content_type: REJECTION_CONTENT_TYPE.to_string(),
            body: message.to_string(),
        }
    }
}

/// Where the reply for an event goes. Dropping it without sending means "no reply".
pub type ReplyTarget = oneshot::Sender<GatewayReply>;

/// Sending half of the gateway error channel.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    tx: mpsc::UnboundedSender<GatewayError>,
}

impl ErrorReporter {
    pub fn new(tx: mpsc::UnboundedSender<GatewayError>) -> Self {
        Self { tx }
    }

    /// Creates a reporter together with the receiver the errors arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GatewayError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, error: GatewayError) {
        if let Err(mpsc::error::SendError(error)) = self.tx.send(error) {
            tracing::error!("error channel closed, dropping report: {error}");
        }
    }
}

/// A message for the gateway mailbox.
#[derive(Debug)]
pub enum GatewayCommand {
    Event {
        payload: EventPayload,
        reply: ReplyTarget,
    },
    Response {
        correlation_id: CorrelationId,
        raw: String,
    },
}

/// Cloneable entry point into a running [`Gateway`].
#[derive(Clone, Debug)]
pub struct GatewayHandle {
    mailbox: mpsc::Sender<GatewayCommand>,
    errors: ErrorReporter,
}

impl GatewayHandle {
    /// Queues an inbound event. The reply (if any) is sent on `reply`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stopped`] if the gateway is no longer running.
    pub async fn submit_event(
        &self,
        payload: EventPayload,
        reply: ReplyTarget,
    ) -> GatewayResult<()> {
        self.mailbox
            .send(GatewayCommand::Event { payload, reply })
            .await
            .map_err(|_| GatewayError::Stopped)
    }

    /// Queues a registry response for the request registered under `correlation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stopped`] if the gateway is no longer running.
    pub async fn deliver_response(
        &self,
        correlation_id: CorrelationId,
        raw: String,
    ) -> GatewayResult<()> {
        self.mailbox
            .send(GatewayCommand::Response { correlation_id, raw })
            .await
            .map_err(|_| GatewayError::Stopped)
    }

    pub fn report_error(&self, error: GatewayError) {
        self.errors.report(error);
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// A handle wired to bare channels, for exercising transports without a gateway.
    #[cfg(test)]
    pub(crate) fn detached(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<GatewayCommand>,
        mpsc::UnboundedReceiver<GatewayError>,
    ) {
        let (mailbox, commands) = mpsc::channel(capacity);
        let (errors, reports) = ErrorReporter::channel();
        (Self { mailbox, errors }, commands, reports)
    }
}

/// The orchestrator. Create with [`Gateway::new`], then drive with [`Gateway::run`].
pub struct Gateway<T: Transport> {
    config: GatewayConfig,
    feeds: FeedBuilder,
    store: CorrelationStore,
    transport: T,
    errors: ErrorReporter,
    // Weak so the run loop ends once every external handle is gone.
    mailbox_tx: mpsc::WeakSender<GatewayCommand>,
    mailbox: mpsc::Receiver<GatewayCommand>,
}

impl<T: Transport> Gateway<T> {
    pub fn new(
        config: GatewayConfig,
        store: CorrelationStore,
        transport: T,
        errors: ErrorReporter,
    ) -> (Self, GatewayHandle) {
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let gateway = Self {
            feeds: FeedBuilder::new(config.feed_header().clone()),
            config,
            store,
            transport,
            errors: errors.clone(),
            mailbox_tx: tx.downgrade(),
            mailbox,
        };
        let handle = GatewayHandle {
            mailbox: tx,
            errors,
        };
        (gateway, handle)
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    /// Processes the mailbox until every [`GatewayHandle`] has been dropped.
    pub async fn run(mut self) {
        let mut sweep = self.config.pending_timeout().map(|timeout| {
            let mut interval = tokio::time::interval(timeout.min(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        tracing::info!(
            registry_host = %self.config.registry_host(),
            registry_port = self.config.registry_port(),
            pending_timeout = ?self.config.pending_timeout(),
            "PIX gateway started"
        );

        loop {
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = next_sweep(&mut sweep) => self.evict_expired(),
            }
        }

        tracing::info!(pending = self.store.len(), "PIX gateway stopped");
    }

    fn handle_command(&self, command: GatewayCommand) {
        match command {
            GatewayCommand::Event { payload, reply } => self.handle_event(&payload, reply),
            GatewayCommand::Response { correlation_id, raw } => {
                self.handle_response(correlation_id, &raw)
            }
        }
    }

    /// Translates and forwards one inbound event.
    ///
    /// Unrecognized events are dropped without a reply or an error. Translation, encoding and
    /// store failures go to the error channel and also leave the caller without a reply.
    pub fn handle_event(&self, payload: &EventPayload, reply: ReplyTarget) {
        let event = match ChangeEvent::from_payload(payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(
                    source = %payload.source,
                    transition = %payload.transition,
                    "ignoring unrecognized event"
                );
                return;
            }
            Err(e) => {
                self.errors.report(e.into());
                return;
            }
        };

        if let Err(e) = self.forward(event, reply) {
            self.errors.report(e);
        }
    }

    fn forward(&self, event: ChangeEvent, reply: ReplyTarget) -> GatewayResult<()> {
        let correlation_id = CorrelationId::new();
        let control_id = correlation_id.to_string();

        let body = match &event {
            ChangeEvent::Add { identifiers } => {
                tracing::info!(%correlation_id, "received feed to register new patient");
                self.feeds.build_add_feed(&control_id, identifiers)
            }
            ChangeEvent::Merge {
                identifiers,
                pre_update_identifiers,
            } => {
                tracing::info!(%correlation_id, "received feed to merge existing patients");
                self.feeds
                    .build_merge_feed(&control_id, identifiers, pre_update_identifiers)
            }
        }
        .map_err(GatewayError::Encoding)?;

        let handle = self.handle().ok_or(GatewayError::Stopped)?;
        let kind = event.kind();
        self.store
            .put(PendingRequest::new(correlation_id, event, reply))?;

        tracing::debug!(%correlation_id, %kind, "dispatching feed to registry");
        self.transport.dispatch(
            SocketRequest {
                correlation_id,
                label: FEED_LABEL.to_string(),
                host: self.config.registry_host().to_string(),
                port: self.config.registry_port(),
                body,
            },
            handle,
        );
        Ok(())
    }

    /// Completes the pending request registered under `correlation_id` with the registry's
    /// response.
    pub fn handle_response(&self, correlation_id: CorrelationId, raw: &str) {
        let Some(pending) = self.store.take_by_id(&correlation_id) else {
            tracing::info!(%correlation_id, "discarding response with no pending request");
            return;
        };
        let kind = pending.kind();

        let outcome = match classify_response_with(raw, self.config.rejection_detail()) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.errors.report(GatewayError::Parse(e));
                return;
            }
        };

        match outcome {
            ResponseOutcome::Success => {
                match kind {
                    FeedKind::Add => {
                        tracing::info!(%correlation_id, "patient registered in registry")
                    }
                    FeedKind::Merge => {
                        tracing::info!(%correlation_id, "patients merged in registry")
                    }
                }
                if pending.into_reply().send(GatewayReply::success(raw)).is_err() {
                    tracing::debug!(%correlation_id, "caller stopped waiting for the reply");
                }
            }
            ResponseOutcome::Error { message } => {
                tracing::warn!(%correlation_id, %kind, "registry did not accept feed: {message}");
                if self.config.report_rejections()
                    && pending
                        .into_reply()
                        .send(GatewayReply::rejected(&message))
                        .is_err()
                {
                    tracing::debug!(%correlation_id, "caller stopped waiting for the reply");
                }
            }
        }
    }

    fn evict_expired(&self) {
        let Some(max_age) = self.config.pending_timeout() else {
            return;
        };
        for expired in self.store.evict_expired(max_age) {
            tracing::warn!(
                correlation_id = %expired.correlation_id(),
                kind = %expired.kind(),
                "no registry response within {max_age:?}, dropping pending request"
            );
        }
    }

    fn handle(&self) -> Option<GatewayHandle> {
        self.mailbox_tx.upgrade().map(|mailbox| GatewayHandle {
            mailbox,
            errors: self.errors.clone(),
        })
    }
}

async fn next_sweep(sweep: &mut Option<Interval>) {
    match sweep {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{IdentifierDomain, PayloadIdentifier};
    use hl7::{FeedHeader, Message, Position, RejectionDetail};
    use parking_lot::Mutex;
    use std::sync::Arc;

    const ACCEPT: &str =
        "MSH|^~\\&|REG|FAC|PIX|FAC|20261019083005||ACK^A04|9|P|2.3.1\rMSA|AA|corr\r";
    const REJECT: &str =
        "MSH|^~\\&|REG|FAC|PIX|FAC|20261019083005||ACK^A04|9|P|2.3.1\rMSA|AE|corr|Unknown domain\r";

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<SocketRequest>>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<SocketRequest> {
            self.sent.lock().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn dispatch(&self, request: SocketRequest, _handle: GatewayHandle) {
            self.sent.lock().push(request);
        }
    }

    /// Answers every dispatch with a fixed acknowledgement.
    struct AutoAckTransport {
        ack: &'static str,
    }

    impl Transport for AutoAckTransport {
        fn dispatch(&self, request: SocketRequest, handle: GatewayHandle) {
            let ack = self.ack.to_string();
            tokio::spawn(async move {
                let _ = handle.deliver_response(request.correlation_id, ack).await;
            });
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig::new(
            FeedHeader {
                sending_application: "OpenHIM".into(),
                sending_facility: "Mediator".into(),
                receiving_application: "XDSRegistry".into(),
                receiving_facility: "Registry".into(),
            },
            "registry.local".into(),
            2100,
        )
        .expect("valid config")
    }

    struct Harness {
        gateway: Gateway<RecordingTransport>,
        _handle: GatewayHandle,
        transport: RecordingTransport,
        errors: mpsc::UnboundedReceiver<GatewayError>,
    }

    fn harness(config: GatewayConfig) -> Harness {
        let transport = RecordingTransport::default();
        let (reporter, errors) = ErrorReporter::channel();
        let (gateway, handle) =
            Gateway::new(config, CorrelationStore::new(), transport.clone(), reporter);
        Harness {
            gateway,
            _handle: handle,
            transport,
            errors,
        }
    }

    fn openempi(value: &str) -> PayloadIdentifier {
        PayloadIdentifier {
            identifier: value.into(),
            identifier_domain: IdentifierDomain {
                identifier_domain_name: Some("OpenEMPI".into()),
                namespace_identifier: Some("NIST2010".into()),
                universal_identifier: Some("2.16.840.1.113883.3.72.5.9.1".into()),
                universal_identifier_type_code: Some("ISO".into()),
            },
        }
    }

    fn add_payload(value: &str) -> EventPayload {
        EventPayload {
            source: "ADD".into(),
            transition: "JOIN".into(),
            post_update_identifiers: vec![openempi(value)],
            pre_update_identifiers: vec![],
        }
    }

    fn merge_payload(survivor: &str, retired: &str) -> EventPayload {
        EventPayload {
            source: "UPDATE".into(),
            transition: "JOIN".into(),
            post_update_identifiers: vec![openempi(survivor)],
            pre_update_identifiers: vec![openempi(retired)],
        }
    }

    #[tokio::test]
    async fn add_event_is_dispatched_and_accepted() {
        let mut h = harness(config());
        let (reply, rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("123"), reply);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.label, FEED_LABEL);
        assert_eq!(request.host, "registry.local");
        assert_eq!(request.port, 2100);
        assert!(h.gateway.store().contains(&request.correlation_id));

        let feed = Message::parse(&request.body).expect("feed parses");
        assert_eq!(
            feed.raw_field("MSH", 9),
            Some("ADT^A04^ADT_A01")
        );
        assert_eq!(
            feed.get("MSH", Position::field(10)),
            Some(request.correlation_id.to_string())
        );
        assert_eq!(
            feed.raw_field("PID", 3),
            Some("123^^^NIST2010&2.16.840.1.113883.3.72.5.9.1&ISO")
        );

        h.gateway.handle_response(request.correlation_id, ACCEPT);

        let reply = rx.await.expect("reply");
        assert_eq!(reply, GatewayReply::success(ACCEPT));
        assert_eq!(reply.content_type, HL7_CONTENT_TYPE);
        assert!(h.gateway.store().is_empty());
        assert!(h.errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn responses_in_reverse_order_reach_their_own_callers() {
        let mut h = harness(config());
        let (first_reply, first_rx) = oneshot::channel();
        let (second_reply, second_rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("111"), first_reply);
        h.gateway.handle_event(&merge_payload("222", "333"), second_reply);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].correlation_id, sent[1].correlation_id);

        let first_ack =
            "MSH|^~\\&|REG|FAC|PIX|FAC|20261019083005||ACK^A04|first|P|2.3.1\rMSA|AA|a\r";
        let second_ack =
            "MSH|^~\\&|REG|FAC|PIX|FAC|20261019083006||ACK^A40|second|P|2.3.1\rMSA|AA|b\r";

        h.gateway.handle_response(sent[1].correlation_id, second_ack);
        assert_eq!(h.gateway.store().len(), 1);
        h.gateway.handle_response(sent[0].correlation_id, first_ack);

        assert_eq!(
            second_rx.await.expect("second reply"),
            GatewayReply::success(second_ack)
        );
        assert_eq!(
            first_rx.await.expect("first reply"),
            GatewayReply::success(first_ack)
        );
        assert!(h.gateway.store().is_empty());
        assert!(h.errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn merge_event_carries_both_identities() {
        let h = harness(config());
        let (reply, rx) = oneshot::channel();

        h.gateway.handle_event(&merge_payload("456", "123"), reply);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        let feed = Message::parse(&sent[0].body).expect("feed parses");
        assert_eq!(feed.raw_field("MSH", 9), Some("ADT^A40^ADT_A39"));
        assert_eq!(
            feed.get("PID", Position::component(3, 1)).as_deref(),
            Some("456")
        );
        assert_eq!(
            feed.get("MRG", Position::component(1, 1)).as_deref(),
            Some("123")
        );

        h.gateway.handle_response(sent[0].correlation_id, ACCEPT);
        assert_eq!(rx.await.expect("reply").status, 200);
    }

    #[tokio::test]
    async fn rejection_sends_no_reply_by_default() {
        let mut h = harness(config());
        let (reply, rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("123"), reply);
        let id = h.transport.sent()[0].correlation_id;
        h.gateway.handle_response(id, REJECT);

        assert!(rx.await.is_err(), "reply target must be dropped unanswered");
        assert!(h.gateway.store().is_empty());
        assert!(h.errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejection_is_replied_when_reporting_is_enabled() {
        let h = harness(config().with_report_rejections(true));
        let (reply, rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("123"), reply);
        let id = h.transport.sent()[0].correlation_id;
        h.gateway.handle_response(id, REJECT);

        let reply = rx.await.expect("reply");
        assert_eq!(reply.status, 502);
        assert_eq!(reply.content_type, REJECTION_CONTENT_TYPE);
        assert_eq!(reply.body, "Failed to register new patient:\n");
    }

    #[tokio::test]
    async fn detailed_rejection_includes_registry_text() {
        let h = harness(
            config()
                .with_report_rejections(true)
                .with_rejection_detail(RejectionDetail::Detailed),
        );
        let (reply, rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("123"), reply);
        let id = h.transport.sent()[0].correlation_id;
        h.gateway.handle_response(id, REJECT);

        assert_eq!(
            rx.await.expect("reply").body,
            "Failed to register new patient:\nUnknown domain\n"
        );
    }

    #[tokio::test]
    async fn unrecognized_event_is_dropped_silently() {
        let mut h = harness(config());
        let (reply, rx) = oneshot::channel();
        let mut payload = add_payload("123");
        payload.transition = "SPLIT".into();

        h.gateway.handle_event(&payload, reply);

        assert!(h.transport.sent().is_empty());
        assert!(h.gateway.store().is_empty());
        assert!(h.errors.try_recv().is_err());
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn event_without_openempi_identifier_is_reported() {
        let mut h = harness(config());
        let (reply, _rx) = oneshot::channel();
        let mut payload = add_payload("123");
        payload.post_update_identifiers[0]
            .identifier_domain
            .identifier_domain_name = Some("Other".into());

        h.gateway.handle_event(&payload, reply);

        assert!(h.transport.sent().is_empty());
        assert!(matches!(
            h.errors.try_recv().expect("error reported"),
            GatewayError::Event(_)
        ));
    }

    #[tokio::test]
    async fn unencodable_header_is_reported_before_dispatch() {
        let mut header = config().feed_header().clone();
        header.sending_facility = "Caf\u{20ac}".into();
        let cfg = GatewayConfig::new(header, "registry.local".into(), 2100).expect("config");
        let mut h = harness(cfg);
        let (reply, _rx) = oneshot::channel();

        h.gateway.handle_event(&add_payload("123"), reply);

        assert!(h.transport.sent().is_empty());
        assert!(h.gateway.store().is_empty());
        assert!(matches!(
            h.errors.try_recv().expect("error reported"),
            GatewayError::Encoding(_)
        ));
    }

    #[tokio::test]
    async fn response_for_unknown_id_is_discarded() {
        let mut h = harness(config());
        let (reply, _rx) = oneshot::channel();
        h.gateway.handle_event(&add_payload("123"), reply);

        h.gateway.handle_response(CorrelationId::new(), ACCEPT);

        assert_eq!(h.gateway.store().len(), 1);
        assert!(h.errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_response_for_the_same_id_is_discarded() {
        let h = harness(config());
        let (reply, rx) = oneshot::channel();
        h.gateway.handle_event(&add_payload("123"), reply);
        let id = h.transport.sent()[0].correlation_id;

        h.gateway.handle_response(id, ACCEPT);
        h.gateway.handle_response(id, ACCEPT);

        assert_eq!(rx.await.expect("reply").status, 200);
    }

    #[tokio::test]
    async fn unparseable_response_is_reported() {
        let mut h = harness(config());
        let (reply, rx) = oneshot::channel();
        h.gateway.handle_event(&add_payload("123"), reply);
        let id = h.transport.sent()[0].correlation_id;

        h.gateway.handle_response(id, "<html>Bad Gateway</html>");

        assert!(matches!(
            h.errors.try_recv().expect("error reported"),
            GatewayError::Parse(_)
        ));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn run_loop_answers_events_submitted_through_the_handle() {
        let (reporter, _errors) = ErrorReporter::channel();
        let (gateway, handle) = Gateway::new(
            config(),
            CorrelationStore::new(),
            AutoAckTransport { ack: ACCEPT },
            reporter,
        );
        let task = tokio::spawn(gateway.run());

        let (reply, rx) = oneshot::channel();
        handle
            .submit_event(add_payload("123"), reply)
            .await
            .expect("submit");
        let reply = rx.await.expect("reply");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, ACCEPT);

        drop(handle);
        task.await.expect("gateway stops once handles are gone");
    }

    #[tokio::test]
    async fn submit_after_stop_fails() {
        let (reporter, _errors) = ErrorReporter::channel();
        let (gateway, handle) = Gateway::new(
            config(),
            CorrelationStore::new(),
            RecordingTransport::default(),
            reporter,
        );
        drop(gateway);

        let (reply, _rx) = oneshot::channel();
        let err = handle
            .submit_event(add_payload("123"), reply)
            .await
            .expect_err("stopped");
        assert!(matches!(err, GatewayError::Stopped));
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_requests_never_expire_by_default() {
        let (reporter, _errors) = ErrorReporter::channel();
        let store = CorrelationStore::new();
        let (gateway, handle) = Gateway::new(
            config(),
            store.clone(),
            RecordingTransport::default(),
            reporter,
        );
        tokio::spawn(gateway.run());

        let (reply, _rx) = oneshot::channel();
        handle
            .submit_event(add_payload("123"), reply)
            .await
            .expect("submit");
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_requests_expire_when_configured() {
        let (reporter, _errors) = ErrorReporter::channel();
        let store = CorrelationStore::new();
        let (gateway, handle) = Gateway::new(
            config().with_pending_timeout(Some(Duration::from_secs(5))),
            store.clone(),
            RecordingTransport::default(),
            reporter,
        );
        tokio::spawn(gateway.run());

        let (reply, rx) = oneshot::channel();
        handle
            .submit_event(add_payload("123"), reply)
            .await
            .expect("submit");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(store.is_empty());
        assert!(rx.await.is_err());
    }
}
