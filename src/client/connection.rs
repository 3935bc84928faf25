/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use crate::client::correlator::ResponseCorrelator;
use crate::config::ClientConfig;
use crate::errors::{EasyLockError, EasyLockResult};
use crate::protocol::{self, LockRequest, LockResponse};

/// A request on its way out, carrying the admission permit that is given
/// back once the write hits the wire (not once the response returns).
struct Outbound {
    request: LockRequest,
    permit: OwnedSemaphorePermit,
}

/// Identities written on a connection but not yet answered, with the data
/// needed to fabricate a failure for them if the connection dies first.
type InflightMap = Arc<Mutex<HashMap<i64, (String, bool)>>>;

struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// Fixed-size pool of long-lived multiplexed connections. Requests pick a
/// slot round-robin; writes and reads on a connection are independent tasks
/// and responses are routed by identity through the correlator, so they may
/// return on any schedule. A dead slot is re-established on next use; a
/// request that cannot reach the server is answered locally with the
/// transport-failure cause.
pub struct ConnectionPool {
    config: ClientConfig,
    correlator: Arc<ResponseCorrelator>,
    slots: Vec<tokio::sync::Mutex<Option<Connection>>>,
    cursor: AtomicUsize,
    admission: Arc<Semaphore>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig, correlator: Arc<ResponseCorrelator>) -> Self {
        let slots = (0..config.pool_size)
            .map(|_| tokio::sync::Mutex::new(None))
            .collect();
        let admission = Arc::new(Semaphore::new(config.io_threads as usize));
        Self {
            config,
            correlator,
            slots,
            cursor: AtomicUsize::new(0),
            admission,
        }
    }

    /// Sends a request and waits for its response. Exactly one response is
    /// produced per call: from the server, or fabricated here when the
    /// transport fails.
    pub async fn send(&self, request: LockRequest) -> LockResponse {
        let identity = request.identity;
        let key = request.key.clone();
        let is_lock = request.is_lock;
        let receiver = self.correlator.register(identity);

        // Admission bounds the number of writes in flight so senders cannot
        // starve the tasks that must read the responses back.
        match self.admission.clone().acquire_owned().await {
            Ok(permit) => match self.checkout().await {
                Ok(outbound) => {
                    if outbound.send(Outbound { request, permit }).is_err() {
                        self.correlator
                            .complete(LockResponse::cancelled(&key, identity, is_lock));
                    }
                }
                Err(err) => {
                    warn!("acquiring a connection failed: {err}");
                    self.correlator
                        .complete(LockResponse::cancelled(&key, identity, is_lock));
                }
            },
            Err(_) => {
                self.correlator
                    .complete(LockResponse::cancelled(&key, identity, is_lock));
            }
        }

        match receiver.await {
            Ok(response) => response,
            Err(_) => LockResponse::cancelled(&key, identity, is_lock),
        }
    }

    /// Picks the next slot and returns its outbound channel, reconnecting a
    /// slot whose connection has died.
    async fn checkout(&self) -> EasyLockResult<mpsc::UnboundedSender<Outbound>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let mut slot = self.slots[index].lock().await;
        if let Some(connection) = slot.as_ref() {
            if !connection.outbound.is_closed() {
                return Ok(connection.outbound.clone());
            }
        }
        let connection = self.connect().await?;
        let outbound = connection.outbound.clone();
        *slot = Some(connection);
        Ok(outbound)
    }

    async fn connect(&self) -> EasyLockResult<Connection> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| EasyLockError::PoolError(format!("connecting to {address} timed out")))??;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        let (outbound, requests) = mpsc::unbounded_channel();
        let inflight: InflightMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(write_requests(
            writer,
            requests,
            inflight.clone(),
            self.correlator.clone(),
        ));
        tokio::spawn(read_responses(reader, inflight, self.correlator.clone()));
        info!("connection to {address} established");
        Ok(Connection { outbound })
    }
}

async fn write_requests(
    mut writer: OwnedWriteHalf,
    mut requests: mpsc::UnboundedReceiver<Outbound>,
    inflight: InflightMap,
    correlator: Arc<ResponseCorrelator>,
) {
    while let Some(Outbound { request, permit }) = requests.recv().await {
        inflight
            .lock()
            .insert(request.identity, (request.key.clone(), request.is_lock));
        let result = protocol::write_message(&mut writer, &request).await;
        drop(permit);
        if let Err(err) = result {
            warn!("writing request failed: {err}");
            inflight.lock().remove(&request.identity);
            correlator.complete(LockResponse::cancelled(
                &request.key,
                request.identity,
                request.is_lock,
            ));
            break;
        }
    }
    // Anything still queued will never be written; answer it locally.
    requests.close();
    while let Ok(Outbound { request, .. }) = requests.try_recv() {
        correlator.complete(LockResponse::cancelled(
            &request.key,
            request.identity,
            request.is_lock,
        ));
    }
}

async fn read_responses(
    mut reader: OwnedReadHalf,
    inflight: InflightMap,
    correlator: Arc<ResponseCorrelator>,
) {
    loop {
        match protocol::read_message::<_, LockResponse>(&mut reader).await {
            Ok(Some(response)) => {
                inflight.lock().remove(&response.identity);
                correlator.complete(response);
            }
            Ok(None) => {
                info!("server closed the connection");
                break;
            }
            Err(err) => {
                warn!("reading response failed: {err}");
                break;
            }
        }
    }
    // Written-but-unanswered requests on this connection get a bounded-time
    // outcome instead of waiting on a response that cannot come.
    let orphans: Vec<(i64, (String, bool))> = inflight.lock().drain().collect();
    for (identity, (key, is_lock)) in orphans {
        correlator.complete(LockResponse::cancelled(&key, identity, is_lock));
    }
}
