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

use thiserror::Error;

pub type EasyLockResult<T> = std::result::Result<T, EasyLockError>;

#[derive(Error, Debug)]
pub enum EasyLockError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    CodecError(#[from] bincode::Error),

    #[error("Frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("Unknown lock type: {0}")]
    UnknownLockType(u8),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Async runtime error: {0}")]
    AsyncError(String),
}

impl From<tokio::task::JoinError> for EasyLockError {
    fn from(err: tokio::task::JoinError) -> Self {
        EasyLockError::AsyncError(err.to_string())
    }
}
