//! Bet delivery orchestration
//!
//! Ties the pieces together: batches go out in source order, each answered by
//! one ACK line, then `delivery-ended` is written once and the result poller
//! takes over on the same connection.

use shared::{
    BetRecord, ErrorCategory, ErrorCode, ACK_NUMBER_SEPARATOR, BETS_ACK_PREFIX, BET_ACK_PREFIX,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};

use crate::batching::{BatchAccumulator, BatchLimits};
use crate::codec::{Frame, Message};
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::poller::ResultPoller;
use crate::retry_strategy::RetryStrategy;
use crate::transport::{Connector, Session};

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub batches_sent: usize,
    pub bets_sent: usize,
    pub ack_mismatches: usize,
    /// Final poll answer; `None` in single-bet mode
    pub winners: Option<String>,
}

pub struct BetClient<C: Connector> {
    client_id: String,
    session: Session<C>,
    poller: ResultPoller,
    limits: BatchLimits,
    cancel: CancellationToken,
    span: Span,
}

impl<C: Connector> BetClient<C> {
    pub fn new(config: &ClientConfig, connector: C, cancel: CancellationToken) -> Self {
        let retry = RetryStrategy::fixed(config.poll_delay(), config.poll.max_attempts);

        Self {
            client_id: config.client_id.clone(),
            session: Session::new(connector, config.connect_timeout(), cancel.clone()),
            poller: ResultPoller::new(config.client_id.clone(), retry, cancel.clone()),
            limits: config.batch_limits(),
            span: tracing::info_span!("bet_client", client_id = %config.client_id),
            cancel,
        }
    }

    /// Deliver every record, announce the end of the delivery and wait for the
    /// raffle answer. The connection is closed on every exit path.
    pub async fn run<I>(&mut self, records: I) -> Result<RunOutcome>
    where
        I: IntoIterator<Item = Result<BetRecord>>,
    {
        let span = self.span.clone();
        let result = self.deliver(records).instrument(span).await;
        self.session.close().await;
        result
    }

    /// Send a single `bet` message and wait for its ACK
    pub async fn run_single(&mut self, record: BetRecord) -> Result<RunOutcome> {
        let span = self.span.clone();
        let result = self.deliver_single(record).instrument(span).await;
        self.session.close().await;
        result
    }

    async fn deliver<I>(&mut self, records: I) -> Result<RunOutcome>
    where
        I: IntoIterator<Item = Result<BetRecord>>,
    {
        self.session.connect().await?;

        let mut outcome = RunOutcome::default();
        let mut batches = BatchAccumulator::new(records.into_iter(), self.limits);

        loop {
            if self.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            let batch = match batches.next() {
                Some(batch) => batch?,
                None => break,
            };
            // closing a batch pulls records, which may outlast a shutdown request
            if self.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let batch_id = batch.batch_id();
            let bets = batch.len();
            let bytes = batch.serialized_size();
            let expected = ack_text(BETS_ACK_PREFIX, &batch.numbers());

            let frame = Frame::encode(&batch.into_message())?;
            let response = self.session.request(&frame).await?;

            outcome.batches_sent += 1;
            outcome.bets_sent += bets;
            metrics::counter!("batches_sent_total").increment(1);
            metrics::counter!("bets_sent_total").increment(bets as u64);

            if ack_matches(&expected, &response) {
                debug!(
                    action = "apuestas_enviadas",
                    result = "success",
                    batch_id = %batch_id,
                    bets,
                    bytes
                );
            } else {
                outcome.ack_mismatches += 1;
                report_mismatch(&expected, &response);
            }
        }

        let ended = Frame::encode(&Message::DeliveryEnded {
            client_id: self.client_id.clone(),
        })?;
        self.session.send(&ended).await?;
        info!(
            action = "delivery_ended",
            batches = outcome.batches_sent,
            bets = outcome.bets_sent
        );

        outcome.winners = Some(self.poller.run(&mut self.session).await?);
        Ok(outcome)
    }

    async fn deliver_single(&mut self, record: BetRecord) -> Result<RunOutcome> {
        self.session.connect().await?;

        let expected = ack_text(BET_ACK_PREFIX, &[record.number()]);
        let document = record.document_number().to_string();
        let number = record.number().to_string();

        let frame = Frame::encode(&Message::Bet(record))?;
        let response = self.session.request(&frame).await?;
        metrics::counter!("bets_sent_total").increment(1);

        let mut outcome = RunOutcome {
            batches_sent: 1,
            bets_sent: 1,
            ..RunOutcome::default()
        };

        if ack_matches(&expected, &response) {
            info!(
                action = "apuesta_enviada",
                result = "success",
                dni = %document,
                numero = %number
            );
        } else {
            outcome.ack_mismatches += 1;
            report_mismatch(&expected, &response);
        }

        Ok(outcome)
    }
}

/// Expected ACK line for the given bet numbers
pub fn ack_text(prefix: &str, numbers: &[&str]) -> String {
    format!("{} {}", prefix, numbers.join(ACK_NUMBER_SEPARATOR))
}

fn ack_matches(expected: &str, response: &str) -> bool {
    expected == response.trim()
}

fn report_mismatch(expected: &str, response: &str) {
    metrics::counter!("ack_mismatch_total").increment(1);
    warn!(
        error_category = %ErrorCategory::Protocol,
        error_code = %ErrorCode::PROTOCOL_ACK_MISMATCH,
        expected = %expected,
        received = %response,
        "ACK does not match the bets sent"
    );
}
