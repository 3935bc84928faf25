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
mod dispatcher;
mod handoff;
mod pipeline;
mod reaper;
mod resolver;

pub(crate) use dispatcher::Dispatcher;
pub use resolver::{
    LockResolver, ReadWriteLockResolver, ReentrantLockResolver, SimpleLockResolver,
    TimeoutLockResolver,
};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::errors::EasyLockResult;
use crate::protocol::{self, LockRequest, LockResponse};

/// The arbitration server: accepts connections, decodes requests and feeds
/// them to the dispatcher. All lock state lives in this process and dies
/// with it.
pub struct LockServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl LockServer {
    /// Binds the configured port. Must run inside a Tokio runtime.
    pub async fn bind(config: ServerConfig) -> EasyLockResult<Self> {
        config.validate()?;
        let address: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(address)?;
        let listener = socket.listen(config.backlog)?;
        info!("easylock server listens on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new()),
        })
    }

    /// The address actually bound, useful when the port was 0.
    pub fn local_addr(&self) -> EasyLockResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; runs until the listener fails.
    pub async fn run(self) -> EasyLockResult<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("server has activated a channel, client address: {peer}");
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(serve_connection(stream, peer, dispatcher));
        }
    }
}

/// One task per connection reads requests; a sibling task owns the write
/// half and drains the outbound channel, so responses resolved on any worker
/// are serialized back onto the wire. The writer lingers after the reader
/// stops until every pending grant for this connection has been flushed or
/// failed.
async fn serve_connection(stream: TcpStream, peer: SocketAddr, dispatcher: Arc<Dispatcher>) {
    if let Err(err) = stream.set_nodelay(true) {
        debug!("setting TCP_NODELAY for {peer} failed: {err}");
    }
    let (mut reader, mut writer) = stream.into_split();
    let (outbound, mut responses) = mpsc::unbounded_channel::<LockResponse>();

    let write_task = tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            if let Err(err) = protocol::write_message(&mut writer, &response).await {
                // Locks stay held for a vanished client; late grants land here.
                warn!("writing response to client failed: {err}");
                break;
            }
        }
    });

    loop {
        match protocol::read_message::<_, LockRequest>(&mut reader).await {
            Ok(Some(request)) => {
                debug!(
                    "server received request from {} with identity {}",
                    request.owner_label(),
                    request.identity
                );
                dispatcher.dispatch(request, outbound.clone());
            }
            Ok(None) => {
                info!("channel from client [{peer}] has inactivated, channel disconnects");
                break;
            }
            Err(err) => {
                error!("reading request from [{peer}] failed: {err}");
                break;
            }
        }
    }
    drop(outbound);
    let _ = write_task.await;
}
