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

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::protocol::LockResponse;

/// Routes responses arriving on any pooled connection back to the caller
/// that issued the request, by identity. Each pending request owns a
/// one-shot slot; the connection's read task completes it, or the send path
/// completes it with a fabricated failure when the request never made it
/// out. Either way the caller sees exactly one response per identity.
pub struct ResponseCorrelator {
    pending: Mutex<HashMap<i64, oneshot::Sender<LockResponse>>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Installs the rendezvous slot for `identity`. Call before the request
    /// is handed to any connection so the response cannot win the race.
    pub fn register(&self, identity: i64) -> oneshot::Receiver<LockResponse> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(identity, sender);
        receiver
    }

    /// Completes the pending slot matching `response.identity`.
    pub fn complete(&self, response: LockResponse) {
        let slot = self.pending.lock().remove(&response.identity);
        match slot {
            Some(sender) => {
                if sender.send(response).is_err() {
                    warn!("caller abandoned its pending request before the response arrived");
                }
            }
            None => warn!(
                "orphan response with identity {} has no pending request",
                response.identity
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for ResponseCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
