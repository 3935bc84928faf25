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
pub(crate) mod connection;
pub(crate) mod correlator;
pub(crate) mod identity;

pub use connection::ConnectionPool;
pub use correlator::ResponseCorrelator;
pub use identity::IdentityGenerator;

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::errors::EasyLockResult;
use crate::lock::{LockContext, ReadWriteLock, ReentrantLock, SimpleLock, TimeoutLock};
use crate::util::thread_label;

/// Client of one lock server: the connection pool, the response correlator
/// and the identity source, wired together once and shared by every lock
/// handle it creates.
pub struct EasyLockClient {
    config: ClientConfig,
    pool: Arc<ConnectionPool>,
    identities: Arc<IdentityGenerator>,
}

impl EasyLockClient {
    pub fn new(config: ClientConfig) -> EasyLockResult<Self> {
        config.validate()?;
        let correlator = Arc::new(ResponseCorrelator::new());
        let pool = Arc::new(ConnectionPool::new(config.clone(), correlator));
        Ok(Self {
            config,
            pool,
            identities: Arc::new(IdentityGenerator::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Lock handle acquisition. Handles are labelled with the creating
    // thread; the server identifies owners by the (application, thread)
    // pair, so a handle stays one caller's even if polled elsewhere.

    pub fn get_simple_lock(&self, key: &str) -> SimpleLock {
        SimpleLock::new(self.context(), key.to_string())
    }

    pub fn get_timeout_lock(&self, key: &str) -> TimeoutLock {
        TimeoutLock::new(self.context(), key.to_string())
    }

    pub fn get_reentrant_lock(&self, key: &str) -> ReentrantLock {
        ReentrantLock::new(self.context(), key.to_string())
    }

    pub fn get_read_write_lock(&self, key: &str) -> ReadWriteLock {
        ReadWriteLock::new(self.context(), key.to_string())
    }

    fn context(&self) -> LockContext {
        LockContext {
            pool: self.pool.clone(),
            identities: self.identities.clone(),
            application: self.config.application.clone(),
            thread: thread_label(),
        }
    }
}

impl Clone for EasyLockClient {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            pool: self.pool.clone(),
            identities: self.identities.clone(),
        }
    }
}
