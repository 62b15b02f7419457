// Copyright 2025 IsoTailor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Single-connection request dispatcher.
//!
//! Listening -> one accepted connection -> serving until the peer closes
//! (empty read) or an interrupt arrives. Exactly one client is served per
//! process lifetime. Requests are ASCII, comma-separated
//! `phase,op,arg...`; there is no length framing, so a message must fit
//! in one bounded receive.
//!
//! Sockets are owned by the serve call, so every exit path (normal
//! close, error, interrupt) releases them on drop.

use crate::error::ServiceError;
use crate::offline::TrainingService;
use crate::online::PredictionService;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, warn};

/// Upper bound on a single receive; larger messages arrive split and are
/// the caller's problem.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024;

/// Fixed offline-phase reply, sent without a trailing newline and
/// regardless of the training outcome.
pub const TRAIN_FINISHED_REPLY: &str = "Train Finished!";

/// Which service a request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Online,
    Offline,
}

/// One parsed request.
#[derive(Debug, PartialEq, Eq)]
struct Request {
    phase: Phase,
    op: String,
    args: Vec<String>,
}

impl Request {
    /// Parse `phase,op,arg...`; the final argument is whitespace-trimmed
    /// (the peer terminates messages with a newline). Returns `None` for
    /// requests with an unknown phase or a missing op.
    fn parse(text: &str) -> Option<Request> {
        let mut parts = text.split(',');
        let phase = match parts.next()?.trim().to_ascii_lowercase().as_str() {
            "online" => Phase::Online,
            "offline" => Phase::Offline,
            _ => return None,
        };
        let op = parts.next()?.to_string();
        let mut args: Vec<String> = parts.map(str::to_string).collect();
        if let Some(last) = args.last_mut() {
            *last = last.trim().to_string();
        }
        Some(Request { phase, op, args })
    }
}

/// Bound listener waiting for its one client.
pub struct Dispatcher {
    listener: TcpListener,
}

impl Dispatcher {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!(addr = %listener.local_addr()?, "waiting for connection");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection and serve it until close or interrupt.
    pub async fn serve(
        self,
        mut training: TrainingService,
        mut prediction: PredictionService,
    ) -> Result<()> {
        let (mut socket, peer) = tokio::select! {
            accepted = self.listener.accept() => accepted.context("accepting connection")?,
            _ = signal::ctrl_c() => {
                info!("interrupt before any connection, shutting down");
                return Ok(());
            }
        };
        info!(%peer, "connection established");

        let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
        loop {
            let n = tokio::select! {
                read = socket.read(&mut buf) => read.context("reading request")?,
                _ = signal::ctrl_c() => {
                    info!("interrupt, closing connection");
                    return Ok(());
                }
            };
            if n == 0 {
                info!("peer closed the connection");
                return Ok(());
            }

            let text = String::from_utf8_lossy(&buf[..n]);
            debug!(request = %text.trim_end(), "received message");
            let Some(request) = Request::parse(&text) else {
                warn!(request = %text.trim_end(), "malformed request skipped");
                continue;
            };

            match request.phase {
                Phase::Online => {
                    // Online failures are fatal: the peer is waiting on a
                    // reply this service cannot produce, so the connection
                    // ends instead of leaving it hanging.
                    let result = prediction
                        .service(&request.op, &request.args)
                        .context("online request failed")?;
                    let reply = format!("{result}\n");
                    socket
                        .write_all(reply.as_bytes())
                        .await
                        .context("writing reply")?;
                    debug!(reply = %result, "reply sent");
                }
                Phase::Offline => {
                    match training.service(&request.op, &request.args) {
                        Ok(outcome) => info!(?outcome, "offline request complete"),
                        // The offline reply is fixed either way; failures
                        // surface in the log only.
                        Err(err) => error!(error = %err, "offline request failed"),
                    }
                    socket
                        .write_all(TRAIN_FINISHED_REPLY.as_bytes())
                        .await
                        .context("writing reply")?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_phase_op_args() {
        let request = Request::parse("online,predict,/tmp/trace \n").expect("parse");
        assert_eq!(request.phase, Phase::Online);
        assert_eq!(request.op, "predict");
        assert_eq!(request.args, vec!["/tmp/trace".to_string()]);
    }

    #[test]
    fn phase_is_case_insensitive() {
        assert_eq!(
            Request::parse("OFFLINE,train,dir").expect("parse").phase,
            Phase::Offline
        );
        assert_eq!(
            Request::parse("Online,ok,x").expect("parse").phase,
            Phase::Online
        );
    }

    #[test]
    fn only_the_last_argument_is_trimmed() {
        let request = Request::parse("offline,train, a ,b, c \n").expect("parse");
        assert_eq!(
            request.args,
            vec![" a ".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn unknown_phase_or_missing_op_is_rejected() {
        assert!(Request::parse("sideways,train,dir").is_none());
        assert!(Request::parse("online").is_none());
        assert!(Request::parse("").is_none());
    }
}
