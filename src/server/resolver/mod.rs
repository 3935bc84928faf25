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
mod read_write;
mod reentrant;
mod simple;
mod timeout;

pub use read_write::ReadWriteLockResolver;
pub use reentrant::ReentrantLockResolver;
pub use simple::SimpleLockResolver;
pub use timeout::TimeoutLockResolver;

use async_trait::async_trait;

use crate::protocol::{LockRequest, LockResponse};

/// One lock flavor's state machine. Each resolver owns the authoritative
/// tables for its flavor; contending blocking acquisitions reach
/// `resolve_lock` one at a time through the per-key pipeline.
#[async_trait]
pub trait LockResolver: Send + Sync {
    /// Routes a request to the matching operation. `resolve_lock` may
    /// suspend until the key is handed over; the other paths return after a
    /// short critical section.
    async fn resolve(&self, request: &LockRequest) -> LockResponse {
        if request.is_lock {
            if request.try_lock {
                self.resolve_try_lock(request)
            } else {
                self.resolve_lock(request).await
            }
        } else {
            self.resolve_unlock(request)
        }
    }

    fn resolve_try_lock(&self, request: &LockRequest) -> LockResponse;

    async fn resolve_lock(&self, request: &LockRequest) -> LockResponse;

    fn resolve_unlock(&self, request: &LockRequest) -> LockResponse;

    /// Pipeline fast-path probe: whether the requester already holds the
    /// lock, in which case its blocking acquisition must not queue behind
    /// other waiters. Only the reentrant flavor can answer true.
    fn is_held_by(&self, request: &LockRequest) -> bool {
        let _ = request;
        false
    }
}
