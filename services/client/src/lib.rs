pub mod batching;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod poller;
pub mod record_source;
pub mod retry_strategy;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use batching::{batches, Batch, BatchAccumulator, BatchLimits};
pub use client::{BetClient, RunOutcome};
pub use codec::{decode_payload, read_response, split_frame, CodecError, Frame, Message, MessageType};
pub use config::ClientConfig;
pub use errors::{ClientError, Result};
pub use poller::{PollState, ResultPoller};
pub use record_source::{CsvRecordSource, InvalidRecordPolicy};
pub use transport::{Connector, Session, TcpConnector};
