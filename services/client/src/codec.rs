//! Wire codec
//!
//! Client frames are length-prefixed: a 2-byte big-endian payload length
//! followed by a textual payload. The first payload line is the message type;
//! record-carrying messages add one `|`-separated line per record, the others
//! add the client id. Replies from the aggregator are plain newline-terminated
//! text with no prefix.

use std::io;
use std::str::FromStr;

use shared::{
    BetRecord, ValidationError, FIELD_SEPARATOR, FRAME_HEADER_SIZE, LINE_TERMINATOR,
    MAX_FRAME_PAYLOAD,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),

    #[error("malformed record on payload line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("{message_type} message carries {actual} records, expected {expected}")]
    RecordCount {
        message_type: MessageType,
        expected: usize,
        actual: usize,
    },

    #[error("{0} message has no client id")]
    MissingClientId(MessageType),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Message type tag, always the first payload line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Bet,
    Bets,
    DeliveryEnded,
    AskWinners,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Bet => "bet",
            MessageType::Bets => "bets",
            MessageType::DeliveryEnded => "delivery-ended",
            MessageType::AskWinners => "ask-winners",
        }
    }
}

impl FromStr for MessageType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bet" => Ok(MessageType::Bet),
            "bets" => Ok(MessageType::Bets),
            "delivery-ended" => Ok(MessageType::DeliveryEnded),
            "ask-winners" => Ok(MessageType::AskWinners),
            other => Err(CodecError::UnknownMessageType(other.to_string())),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical message, before framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A single bet (single-bet mode)
    Bet(BetRecord),
    /// A batch of bets; `records` all carry `client_id`
    Bets {
        client_id: String,
        records: Vec<BetRecord>,
    },
    /// Every batch has been delivered
    DeliveryEnded { client_id: String },
    /// Query for the raffle outcome
    AskWinners { client_id: String },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Bet(_) => MessageType::Bet,
            Message::Bets { .. } => MessageType::Bets,
            Message::DeliveryEnded { .. } => MessageType::DeliveryEnded,
            Message::AskWinners { .. } => MessageType::AskWinners,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            Message::Bet(record) => record.client_id(),
            Message::Bets { client_id, .. }
            | Message::DeliveryEnded { client_id }
            | Message::AskWinners { client_id } => client_id.as_str(),
        }
    }

    pub fn records(&self) -> &[BetRecord] {
        match self {
            Message::Bet(record) => std::slice::from_ref(record),
            Message::Bets { records, .. } => records.as_slice(),
            Message::DeliveryEnded { .. } | Message::AskWinners { .. } => &[],
        }
    }

    /// Textual payload, without the length prefix
    pub fn encode_payload(&self) -> String {
        let records = self.records();
        let capacity = self.message_type().as_str().len()
            + 1
            + records.iter().map(BetRecord::serialized_size).sum::<usize>()
            + self.client_id().len();

        let mut payload = String::with_capacity(capacity);
        payload.push_str(self.message_type().as_str());
        payload.push(LINE_TERMINATOR);

        if records.is_empty() {
            payload.push_str(self.client_id());
        } else {
            for record in records {
                record.write_line(&mut payload);
            }
        }

        payload
    }
}

/// One length-prefixed unit on the wire (prefix included)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Encode a message into a frame
    pub fn encode(message: &Message) -> Result<Self, CodecError> {
        Self::from_payload(message.encode_payload().as_bytes())
    }

    /// Prefix an arbitrary payload with its length
    pub fn from_payload(payload: &[u8]) -> Result<Self, CodecError> {
        let len = u16::try_from(payload.len()).map_err(|_| CodecError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        })?;

        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(payload);
        Ok(Self { bytes })
    }

    /// Full frame, prefix included
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[FRAME_HEADER_SIZE..]
    }

    /// Value of the length prefix
    #[inline]
    pub fn declared_len(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    /// Total number of bytes that go on the wire
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == FRAME_HEADER_SIZE
    }
}

/// Split one complete frame off the front of `buf`.
///
/// Returns `(payload, rest)`, or `None` while the frame is still incomplete.
pub fn split_frame(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let end = FRAME_HEADER_SIZE + len;
    if buf.len() < end {
        return None;
    }
    Some((&buf[FRAME_HEADER_SIZE..end], &buf[end..]))
}

/// Decode a frame payload back into a message
pub fn decode_payload(payload: &[u8]) -> Result<Message, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
    let (tag, body) = text.split_once(LINE_TERMINATOR).unwrap_or((text, ""));
    let message_type: MessageType = tag.parse()?;

    match message_type {
        MessageType::Bet => {
            let mut records = decode_records(body)?;
            if records.len() != 1 {
                return Err(CodecError::RecordCount {
                    message_type,
                    expected: 1,
                    actual: records.len(),
                });
            }
            Ok(Message::Bet(records.remove(0)))
        }
        MessageType::Bets => {
            if !body.contains(FIELD_SEPARATOR) {
                let client_id = required_client_id(message_type, body)?;
                return Ok(Message::Bets {
                    client_id,
                    records: Vec::new(),
                });
            }
            let records = decode_records(body)?;
            let client_id = records
                .first()
                .map(|r| r.client_id().to_string())
                .unwrap_or_default();
            Ok(Message::Bets { client_id, records })
        }
        MessageType::DeliveryEnded => Ok(Message::DeliveryEnded {
            client_id: required_client_id(message_type, body)?,
        }),
        MessageType::AskWinners => Ok(Message::AskWinners {
            client_id: required_client_id(message_type, body)?,
        }),
    }
}

fn required_client_id(message_type: MessageType, body: &str) -> Result<String, CodecError> {
    let client_id = body.trim_end_matches(LINE_TERMINATOR);
    if client_id.is_empty() {
        return Err(CodecError::MissingClientId(message_type));
    }
    Ok(client_id.to_string())
}

fn decode_records(body: &str) -> Result<Vec<BetRecord>, CodecError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            let record = match fields.as_slice() {
                [client_id, first_name, last_name, document, birth_date, number] => {
                    BetRecord::new(
                        *client_id,
                        *first_name,
                        *last_name,
                        *document,
                        *birth_date,
                        *number,
                    )
                }
                _ => Err(ValidationError::FieldCount {
                    expected: 6,
                    actual: fields.len(),
                }),
            };
            // line 1 is the type tag
            record.map_err(|source| CodecError::MalformedRecord { line: i + 2, source })
        })
        .collect()
}

/// Read one response line and return it trimmed.
///
/// End-of-stream after some text (terminated or not) is accepted; end-of-stream
/// before any byte arrives is reported as `UnexpectedEof`.
pub async fn read_response<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a response line arrived",
        ));
    }
    Ok(line.trim().to_string())
}
