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
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{EasyLockError, EasyLockResult};

/// Default port the lock server listens on.
pub const DEFAULT_PORT: u16 = 40417;

/// Default TCP accept backlog of the lock server.
pub const DEFAULT_BACKLOG: u32 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Lock server host
    pub host: String,
    /// Lock server port
    pub port: u16,
    /// Number of pooled connections
    pub pool_size: u32,
    /// I/O worker count; bounds the number of in-flight writes
    pub io_threads: u32,
    /// Application label carried by every request
    pub application: String,
    /// Connect timeout time
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            pool_size: 4,
            io_threads: 16,
            application: format!("easylock-{}", Uuid::new_v4()),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_io_threads(mut self, count: u32) -> Self {
        self.io_threads = count;
        self
    }

    pub fn with_application(mut self, application: &str) -> Self {
        self.application = application.to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn validate(&self) -> EasyLockResult<()> {
        if self.host.is_empty() {
            return Err(EasyLockError::ConfigError(
                "Client requires a server host".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(EasyLockError::ConfigError(
                "Pool size cannot be zero".to_string(),
            ));
        }
        if self.io_threads == 0 {
            return Err(EasyLockError::ConfigError(
                "I/O worker count cannot be zero".to_string(),
            ));
        }
        if self.application.is_empty() {
            return Err(EasyLockError::ConfigError(
                "Application label cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to bind
    pub port: u16,
    /// TCP accept backlog
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn validate(&self) -> EasyLockResult<()> {
        if self.backlog == 0 {
            return Err(EasyLockError::ConfigError(
                "Backlog cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}
