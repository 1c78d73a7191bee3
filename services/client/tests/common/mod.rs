/// Common test utilities for integration tests
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bet_client::{decode_payload, split_frame, ClientConfig, Message};
use shared::{ACK_NUMBER_SEPARATOR, BETS_ACK_PREFIX, BET_ACK_PREFIX, PENDING_RAFFLE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// In-process aggregator speaking the bet protocol over loopback TCP.
///
/// ACKs every batch, answers `PENDING_RAFFLE` to the first `pending` winner
/// queries and then `winners`.
pub struct FakeAggregator {
    pub address: String,
    received: Arc<Mutex<Vec<Message>>>,
    connections: Arc<AtomicUsize>,
}

struct Script {
    pending: AtomicUsize,
    winners: String,
}

impl FakeAggregator {
    pub async fn start(pending: usize, winners: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake aggregator");
        let address = listener.local_addr().unwrap().to_string();

        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Script {
            pending: AtomicUsize::new(pending),
            winners: winners.to_string(),
        });

        tokio::spawn({
            let received = received.clone();
            let connections = connections.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(socket, received.clone(), script.clone()));
                }
            }
        });

        Self {
            address,
            received,
            connections,
        }
    }

    /// Every message decoded so far, in arrival order
    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Client configuration pointing at this aggregator
    pub fn config(&self, extra: &[(&str, &str)]) -> ClientConfig {
        let mut vars: Vec<(String, String)> = vec![
            ("CLI_ID".to_string(), "1".to_string()),
            ("CLI_SERVER_ADDRESS".to_string(), self.address.clone()),
            ("CLI_LOOP_PERIOD_MS".to_string(), "10".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        ClientConfig::from_lookup(|key| {
            vars.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .expect("Invalid test configuration")
    }
}

async fn serve(mut socket: TcpStream, received: Arc<Mutex<Vec<Message>>>, script: Arc<Script>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        while let Some((payload, rest)) = split_frame(&buf) {
            let message = decode_payload(payload).expect("Client sent an undecodable frame");
            let consumed = buf.len() - rest.len();
            buf.drain(..consumed);

            let reply = reply_to(&message, &script);
            received.lock().unwrap().push(message);

            if let Some(reply) = reply {
                if socket.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn reply_to(message: &Message, script: &Script) -> Option<String> {
    let numbers = |message: &Message| {
        message
            .records()
            .iter()
            .map(|r| r.number())
            .collect::<Vec<_>>()
            .join(ACK_NUMBER_SEPARATOR)
    };

    match message {
        Message::Bets { .. } => Some(format!("{} {}\n", BETS_ACK_PREFIX, numbers(message))),
        Message::Bet(_) => Some(format!("{} {}\n", BET_ACK_PREFIX, numbers(message))),
        Message::DeliveryEnded { .. } => None,
        Message::AskWinners { .. } => {
            let still_pending = script
                .pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if still_pending {
                Some(format!("{}\n", PENDING_RAFFLE))
            } else {
                Some(format!("{}\n", script.winners))
            }
        }
    }
}

/// `count` valid CSV rows with bet numbers starting at 1000
pub fn csv_rows(count: usize) -> String {
    (0..count)
        .map(|i| format!("Agustin,Gomez,{},1990-05-{:02},{}\n", 30000000 + i, i % 28 + 1, 1000 + i))
        .collect()
}
