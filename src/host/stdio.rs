//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages from stdin,
//! dispatches them through the `HostCommandServer` router, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages as newline-delimited
//! JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{PracticeError, Result};
use crate::host::channel::{HostCommandClient, command_channel};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::session::PracticeSession;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Default request channel capacity for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Default event broadcast channel capacity for the stdio bridge.
const EVENT_CAPACITY: usize = 256;

type SharedWriter<W> = Arc<Mutex<W>>;

/// Run the bridge over the process's stdin/stdout until stdin closes or a
/// `runtime.stop` command is received.
pub async fn run_stdio_bridge(session: PracticeSession) -> Result<()> {
    run_bridge(
        session,
        BufReader::new(tokio::io::stdin()),
        BufWriter::new(tokio::io::stdout()),
    )
    .await
}

/// Run the bridge over arbitrary line-oriented I/O.
///
/// Three concurrent activities:
///
/// 1. **Reader** -- reads newline-delimited JSON, spawns one task per
///    command so slow commands never hold up fast ones, and writes each
///    `ResponseEnvelope` when it completes.
/// 2. **Event forwarder** -- writes broadcast `EventEnvelope` messages.
/// 3. **Server** -- runs the `HostCommandServer` router loop.
///
/// On EOF or `runtime.stop` the reader waits for in-flight commands to
/// answer, then drops the client so the server exits.
pub async fn run_bridge<R, W>(session: PracticeSession, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (client, server) = command_channel(REQUEST_CAPACITY, EVENT_CAPACITY, session);
    let writer = Arc::new(Mutex::new(writer));

    let server_handle = tokio::spawn(server.run());

    let event_writer = Arc::clone(&writer);
    let mut event_rx = client.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event_envelope) => match serde_json::to_string(&event_envelope) {
                    Ok(json) => {
                        if let Err(e) = write_line(&event_writer, &json).await {
                            tracing::warn!(
                                error = %e,
                                "failed to write event envelope; stopping event forwarder"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event envelope; skipping");
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    tracing::info!("event broadcast channel closed; stopping event forwarder");
                    break;
                }
            }
        }
    });

    let reader_result = run_reader(client, reader, Arc::clone(&writer)).await;

    // The client was dropped by `run_reader`, which ends the server loop.
    let _ = server_handle.await;
    event_handle.abort();
    let _ = event_handle.await;

    reader_result
}

/// Read commands line-by-line and dispatch each one on its own task.
async fn run_reader<R, W>(client: HostCommandClient, mut reader: R, writer: SharedWriter<W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut in_flight = JoinSet::new();
    let mut line = String::new();

    let result = loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => break Err(PracticeError::Channel(format!("failed to read command: {e}"))),
        };

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                // Raw lines may contain learner text; log only the length.
                tracing::warn!(error = %e, len = trimmed.len(), "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                if let Err(e) = write_response(&writer, &response).await {
                    break Err(e);
                }
                continue;
            }
        };

        if envelope.command == CommandName::RuntimeStop {
            let response = dispatch(&client, envelope).await;
            if let Err(e) = write_response(&writer, &response).await {
                break Err(e);
            }
            tracing::info!("runtime.stop received; shutting down bridge");
            break Ok(());
        }

        let client = client.clone();
        let writer = Arc::clone(&writer);
        in_flight.spawn(async move {
            let response = dispatch(&client, envelope).await;
            if let Err(e) = write_response(&writer, &response).await {
                tracing::warn!(error = %e, "failed to write response envelope");
            }
        });

        // Reap finished tasks so the set does not grow without bound.
        while in_flight.try_join_next().is_some() {}
    };

    while in_flight.join_next().await.is_some() {}
    drop(client);
    result
}

async fn dispatch(client: &HostCommandClient, envelope: CommandEnvelope) -> ResponseEnvelope {
    let request_id = envelope.request_id.clone();
    match client.send(envelope).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "host command dispatch failed");
            let request_id = if request_id.trim().is_empty() {
                "dispatch-error".to_owned()
            } else {
                request_id
            };
            ResponseEnvelope::error(request_id, format!("dispatch failed: {e}"))
        }
    }
}

async fn write_response<W>(writer: &SharedWriter<W>, response: &ResponseEnvelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response).map_err(|e| {
        PracticeError::Channel(format!("failed to serialize response envelope: {e}"))
    })?;
    write_line(writer, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W>(writer: &SharedWriter<W>, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .map_err(|e| PracticeError::Channel(format!("failed to write output: {e}")))?;
    w.write_all(b"\n")
        .await
        .map_err(|e| PracticeError::Channel(format!("failed to write newline: {e}")))?;
    w.flush()
        .await
        .map_err(|e| PracticeError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
