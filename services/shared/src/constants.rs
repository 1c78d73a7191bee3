/// Shared constants for the lottery bet client
///
/// This module centralizes the wire-level literals and default limits so the
/// codec, the batching policy and the configuration layer agree on them.

/// Separator between the fields of a bet record on the wire
pub const FIELD_SEPARATOR: char = '|';

/// Terminator for payload lines and for every response line
pub const LINE_TERMINATOR: char = '\n';

/// Calendar date format accepted for birth dates (YYYY-MM-DD)
pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of fields per CSV row (first name, last name, document, birth date, number)
pub const CSV_FIELD_COUNT: usize = 5;

/// Largest payload a frame can carry
///
/// Rationale: the length prefix is an unsigned 16-bit big-endian integer.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Size of the frame length prefix in bytes
pub const FRAME_HEADER_SIZE: usize = 2;

/// Response sentinel meaning "the raffle has not been decided yet"
pub const PENDING_RAFFLE: &str = "PENDING_RAFFLE";

/// Prefix of the acknowledgment sent back for a `bets` message
pub const BETS_ACK_PREFIX: &str = "ACK_BETS";

/// Prefix of the acknowledgment sent back for a single `bet` message
pub const BET_ACK_PREFIX: &str = "ACK_BET";

/// Separator between bet numbers inside an acknowledgment
pub const ACK_NUMBER_SEPARATOR: &str = "-";

/// Default maximum number of records per batch
pub const DEFAULT_BATCH_MAX_AMOUNT: usize = 100;

/// Default maximum serialized size of a batch (8 kB)
pub const DEFAULT_BATCH_MAX_BYTES: usize = 8 * 1024;

/// Fixed delay between two winner queries while the raffle is pending
pub const DEFAULT_POLL_DELAY_MS: u64 = 500;

/// Default bound on the initial dial
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
