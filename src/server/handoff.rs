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
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

/// Fair handoff state for one contended key: an arrival queue recording
/// waiters in order, and a permission semaphore through which releases hand
/// ownership to them. A waiter enqueues an arrival token under the resolver's
/// table lock, then awaits a permit outside of it; a release pops one token
/// and adds one permit.
pub(crate) struct WaitQueue {
    arrivals: VecDeque<i64>,
    permits: Arc<Semaphore>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: VecDeque::new(),
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Records an arrival and returns the semaphore to await a permission on.
    pub(crate) fn arrive(&mut self, identity: i64) -> Arc<Semaphore> {
        self.arrivals.push_back(identity);
        self.permits.clone()
    }

    /// Hands a permission to the earliest waiter. Returns false when nobody
    /// is waiting.
    pub(crate) fn grant_one(&mut self) -> bool {
        match self.arrivals.pop_front() {
            Some(_) => {
                self.permits.add_permits(1);
                true
            }
            None => false,
        }
    }

    /// Hands a permission to every recorded waiter at once. Returns how many
    /// were admitted.
    pub(crate) fn grant_all(&mut self) -> usize {
        let admitted = self.arrivals.len();
        if admitted > 0 {
            self.arrivals.clear();
            self.permits.add_permits(admitted);
        }
        admitted
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.arrivals.is_empty()
    }
}

/// Awaits one permission on a semaphore handed out by [`WaitQueue::arrive`].
/// The permit is consumed, not returned.
pub(crate) async fn await_permission(permits: &Semaphore) {
    match permits.acquire().await {
        Ok(permit) => permit.forget(),
        // The semaphore is never closed; log and fall through rather than
        // wedging the pipeline worker.
        Err(err) => error!("permission wait aborted: {err}"),
    }
}

/// Grants one permission for `key` and drops the entry once its queue is
/// empty. Returns whether a waiter was admitted.
pub(crate) fn grant_one_waiter(waiters: &mut HashMap<String, WaitQueue>, key: &str) -> bool {
    match waiters.get_mut(key) {
        Some(queue) => {
            let granted = queue.grant_one();
            if queue.is_idle() {
                waiters.remove(key);
            }
            granted
        }
        None => false,
    }
}

/// Grants a permission to every waiter recorded for `key` and drops the
/// entry. Returns how many were admitted.
pub(crate) fn grant_all_waiters(waiters: &mut HashMap<String, WaitQueue>, key: &str) -> usize {
    match waiters.get_mut(key) {
        Some(queue) => {
            let admitted = queue.grant_all();
            waiters.remove(key);
            admitted
        }
        None => 0,
    }
}
