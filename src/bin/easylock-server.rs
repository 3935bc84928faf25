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
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use easylock::{EasyLockResult, LockServer, ServerConfig, DEFAULT_BACKLOG, DEFAULT_PORT};

/// Centralized lock arbitration server.
#[derive(Parser, Debug)]
#[command(name = "easylock-server", version, about)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// TCP accept backlog
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    backlog: u32,
}

#[tokio::main]
async fn main() -> EasyLockResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::new()
        .with_port(args.port)
        .with_backlog(args.backlog);
    let server = LockServer::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("easylock server shuts down");
        }
    }
    Ok(())
}
