//! Result polling
//!
//! After every batch is delivered the aggregator is asked for the raffle
//! outcome until it stops answering `PENDING_RAFFLE`. Each retry closes the
//! connection, waits the fixed delay and dials again. Transport errors are
//! never retried here.

use shared::PENDING_RAFFLE;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::{Frame, Message};
use crate::errors::{ClientError, Result};
use crate::retry_strategy::RetryStrategy;
use crate::transport::{Connector, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    AwaitingAnswer,
    PendingRetry,
    Terminal(String),
}

impl PollState {
    /// State reached after receiving `response` while awaiting an answer
    pub fn on_response(response: &str) -> Self {
        let response = response.trim();
        if response == PENDING_RAFFLE {
            PollState::PendingRetry
        } else {
            PollState::Terminal(response.to_string())
        }
    }
}

pub struct ResultPoller {
    client_id: String,
    retry: RetryStrategy,
    cancel: CancellationToken,
}

impl ResultPoller {
    pub fn new(client_id: impl Into<String>, retry: RetryStrategy, cancel: CancellationToken) -> Self {
        Self {
            client_id: client_id.into(),
            retry,
            cancel,
        }
    }

    /// Drive the poll loop to a terminal answer and return it.
    ///
    /// The session is closed when the loop ends with an answer; on error it is
    /// left to the caller to close.
    pub async fn run<C: Connector>(&mut self, session: &mut Session<C>) -> Result<String> {
        let query = Frame::encode(&Message::AskWinners {
            client_id: self.client_id.clone(),
        })?;

        self.retry.reset();
        let mut attempts: u32 = 0;
        let mut state = PollState::AwaitingAnswer;

        loop {
            state = match state {
                PollState::AwaitingAnswer => {
                    if self.cancel.is_cancelled() {
                        return Err(ClientError::Cancelled);
                    }
                    if !session.is_connected() {
                        session.connect().await?;
                    }

                    attempts += 1;
                    metrics::counter!("poll_attempts_total").increment(1);

                    let response = session.request(&query).await?;
                    PollState::on_response(&response)
                }
                PollState::PendingRetry => {
                    debug!(action = "consulta_ganadores", result = "pending", attempts);
                    session.close().await;

                    if !self.retry.should_retry(attempts) {
                        return Err(ClientError::PollAttemptsExhausted { attempts });
                    }

                    let delay = self.retry.next_delay();
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }

                    session.connect().await?;
                    PollState::AwaitingAnswer
                }
                PollState::Terminal(answer) => {
                    session.close().await;
                    info!(
                        action = "consulta_ganadores",
                        result = "success",
                        cant_ganadores = %answer,
                        attempts
                    );
                    return Ok(answer);
                }
            };
        }
    }
}
