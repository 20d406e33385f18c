// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Each connection gets its own session id, reader loop, and writer
//! task. Responses and server pushes share the writer channel, so a
//! `pair_update` can land between tool replies.

use crate::dispatch::{dispatch_tool, error_kind, HandlerCtx};
use crate::env::PROTOCOL_VERSION;
use std::sync::Arc;
use sw_core::SystemClock;
use sw_engine::{Notifier, PushFn};
use sw_wire::{encode, read_message, Notification, ProtocolError, Request, Response};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

pub struct Listener {
    unix: UnixListener,
    ctx: Arc<HandlerCtx<SystemClock>>,
    notifier: Arc<Notifier<SystemClock>>,
    shutdown: Arc<Notify>,
}

impl Listener {
    pub fn new(
        unix: UnixListener,
        ctx: Arc<HandlerCtx<SystemClock>>,
        notifier: Arc<Notifier<SystemClock>>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self { unix, ctx, notifier, shutdown }
    }

    /// Accept connections until shutdown is requested.
    pub async fn run(self) {
        loop {
            tokio::select! {
                () = self.shutdown.notified() => break,
                accepted = self.unix.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        let notifier = Arc::clone(&self.notifier);
                        let shutdown = Arc::clone(&self.shutdown);
                        tokio::spawn(async move {
                            handle_connection(stream, ctx, notifier, shutdown).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    ctx: Arc<HandlerCtx<SystemClock>>,
    notifier: Arc<Notifier<SystemClock>>,
    shutdown: Arc<Notify>,
) {
    let session_id = format!("sess-{}", uuid::Uuid::new_v4().simple());
    let (mut reader, mut writer) = stream.into_split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if writer.write_all(&frame).await.is_err() {
                break;
            }
            let _ = writer.flush().await;
        }
    });

    let driver = ctx.service.config().driver.name.clone();
    let mut push_installed = false;
    debug!(session_id = %session_id, "connection opened");

    loop {
        let request: Request = match read_message(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::Closed) => break,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "protocol error, closing connection");
                break;
            }
        };

        let response = match request {
            Request::Hello { agent } => {
                if let Some(agent) = agent {
                    ctx.registry.set_agent(&session_id, &agent);
                }
                Response::Hello { protocol_version: PROTOCOL_VERSION.to_string() }
            }
            Request::Tool { name, args } => {
                match dispatch_tool(&ctx, &session_id, &name, args).await {
                    Ok(content) => Response::Tool { content },
                    Err(e) => {
                        Response::Error { kind: error_kind(&e).to_string(), message: e.to_string() }
                    }
                }
            }
            Request::Shutdown => {
                info!(session_id = %session_id, "shutdown requested");
                send(&out_tx, &Response::Ok);
                shutdown.notify_waiters();
                break;
            }
        };
        send(&out_tx, &response);

        // The driver's connection carries the pair_update pushes.
        if !push_installed
            && ctx.registry.agent_for_session(&session_id).as_deref() == Some(driver.as_str())
        {
            let push_tx = out_tx.clone();
            let push: PushFn = Arc::new(move |method, params| {
                let frame = encode(&Notification { method: method.to_string(), params })
                    .map_err(|e| e.to_string())?;
                push_tx.send(frame).map_err(|e| e.to_string())
            });
            notifier.set_push(push);
            push_installed = true;
            debug!(session_id = %session_id, "pair_update push attached to driver session");
        }
    }

    ctx.registry.remove_session(&session_id);
    drop(out_tx);
    let _ = writer_task.await;
    debug!(session_id = %session_id, "connection closed");
}

fn send(out_tx: &mpsc::UnboundedSender<Vec<u8>>, response: &Response) {
    match encode(response) {
        Ok(frame) => {
            let _ = out_tx.send(frame);
        }
        Err(e) => warn!(error = %e, "failed to encode response"),
    }
}
