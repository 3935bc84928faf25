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

//! End-to-end scenarios against a real server on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use easylock::{ClientConfig, EasyLockClient, LockServer, ServerConfig};
use tokio::time::{sleep, timeout};

async fn start_server() -> SocketAddr {
    let server = LockServer::bind(ServerConfig::new().with_port(0))
        .await
        .expect("bind server");
    let address = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    address
}

fn connect(address: SocketAddr, application: &str) -> EasyLockClient {
    let config = ClientConfig::new("127.0.0.1", address.port())
        .with_application(application)
        .with_connect_timeout(Duration::from_secs(1));
    EasyLockClient::new(config).expect("client")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simple_lock_contention() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");

    let held = x.get_simple_lock("k");
    assert!(held.lock().await);

    // Contending try-lock fails immediately instead of queueing.
    let contender = y.get_simple_lock("k");
    assert!(!contender.try_lock().await);

    assert!(held.unlock().await);
    assert!(contender.try_lock().await);
    assert!(contender.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_lock_expires_server_side() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");

    let held = x.get_timeout_lock("t");
    assert!(held.lock_with(Duration::from_millis(200)).await);

    sleep(Duration::from_millis(300)).await;

    // The reaper freed the key; another caller takes it right away.
    let next = y.get_timeout_lock("t");
    assert!(next.try_lock_with(Duration::from_secs(1)).await);

    // The late unlock stays benign.
    assert!(held.unlock().await);
    assert!(next.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reentrant_depth_balances() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");

    let held = x.get_reentrant_lock("r");
    assert!(held.try_lock().await);
    assert!(held.lock().await);
    assert!(held.lock().await);
    assert_eq!(held.hold_count(), 3);

    let contender = y.get_reentrant_lock("r");
    assert!(!contender.try_lock().await);

    assert!(held.unlock().await);
    assert!(held.unlock().await);
    assert!(!contender.try_lock().await);
    assert!(held.unlock().await);
    assert_eq!(held.hold_count(), 0);

    assert!(contender.try_lock().await);
    assert!(contender.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_lock_downgrades_to_read() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");
    let z = connect(address, "app-z");

    let x_lock = x.get_read_write_lock("rw");
    let x_write = x_lock.write_lock();
    let x_read = x_lock.read_lock();

    assert!(x_write.lock().await);
    // Same owner takes the read side while holding the write side.
    assert!(x_read.lock().await);
    assert!(x_write.unlock().await);

    // The downgraded read keeps writers out.
    let y_write = y.get_read_write_lock("rw").write_lock();
    let y_task = tokio::spawn(async move {
        assert!(y_write.lock().await);
        y_write
    });
    sleep(Duration::from_millis(200)).await;
    assert!(!y_task.is_finished());

    // Readers still enter.
    let z_read = z.get_read_write_lock("rw").read_lock();
    assert!(z_read.try_lock().await);

    assert!(x_read.unlock().await);
    sleep(Duration::from_millis(100)).await;
    assert!(!y_task.is_finished());

    // The last read release admits the waiting writer.
    assert!(z_read.unlock().await);
    let y_write = timeout(Duration::from_secs(2), y_task)
        .await
        .expect("writer admitted")
        .expect("task");
    assert!(y_write.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_waiters_admit_one_at_a_time() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");
    let z = connect(address, "app-z");

    let x_write = x.get_read_write_lock("f").write_lock();
    assert!(x_write.lock().await);

    let y_write = y.get_read_write_lock("f").write_lock();
    let y_task = tokio::spawn(async move {
        assert!(y_write.lock().await);
        y_write
    });
    sleep(Duration::from_millis(100)).await;
    let z_write = z.get_read_write_lock("f").write_lock();
    let z_task = tokio::spawn(async move {
        assert!(z_write.lock().await);
        z_write
    });
    sleep(Duration::from_millis(200)).await;
    assert!(!y_task.is_finished());
    assert!(!z_task.is_finished());

    assert!(x_write.unlock().await);
    // Exactly one of the two waiters is admitted.
    let mut deadline = 200;
    while !y_task.is_finished() && !z_task.is_finished() {
        assert!(deadline > 0, "no waiter admitted after the release");
        deadline -= 1;
        sleep(Duration::from_millis(10)).await;
    }
    let (admitted, waiting) = if y_task.is_finished() {
        (y_task.await.expect("task"), z_task)
    } else {
        (z_task.await.expect("task"), y_task)
    };
    sleep(Duration::from_millis(200)).await;
    assert!(!waiting.is_finished());

    assert!(admitted.unlock().await);
    let other = timeout(Duration::from_secs(2), waiting)
        .await
        .expect("second writer admitted")
        .expect("task");
    assert!(other.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_locks_grant_in_submission_order() {
    let address = start_server().await;
    // One pooled connection, so submission order is wire order.
    let config = ClientConfig::new("127.0.0.1", address.port())
        .with_application("app-x")
        .with_pool_size(1);
    let client = EasyLockClient::new(config).expect("client");

    let holder = client.get_simple_lock("k");
    assert!(holder.lock().await);

    let (order_out, mut order_in) = tokio::sync::mpsc::unbounded_channel::<u32>();
    let mut waiters = Vec::new();
    for rank in 1..=3u32 {
        let handle = client.get_simple_lock("k");
        let order_out = order_out.clone();
        waiters.push(tokio::spawn(async move {
            assert!(handle.lock().await);
            order_out.send(rank).unwrap();
            assert!(handle.unlock().await);
        }));
        // Stagger the submissions so their wire order is the rank order.
        sleep(Duration::from_millis(100)).await;
    }

    assert!(holder.unlock().await);
    let mut granted = Vec::new();
    for _ in 0..3 {
        granted.push(
            timeout(Duration::from_secs(2), order_in.recv())
                .await
                .expect("grant")
                .expect("order"),
        );
    }
    assert_eq!(granted, vec![1, 2, 3]);
    for waiter in waiters {
        waiter.await.expect("waiter");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_server_fails_in_bounded_time() {
    // Nothing listens here; the pool fabricates the response locally.
    let config = ClientConfig::new("127.0.0.1", 1)
        .with_application("app-x")
        .with_connect_timeout(Duration::from_millis(300));
    let client = EasyLockClient::new(config).expect("client");

    let lock = client.get_simple_lock("k");
    let outcome = timeout(Duration::from_secs(2), lock.lock()).await;
    assert_eq!(outcome.expect("bounded time"), false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_key_is_refused_without_a_round_trip() {
    // No server at all; the refusal must be local.
    let config = ClientConfig::new("127.0.0.1", 1).with_application("app-x");
    let client = EasyLockClient::new(config).expect("client");

    let lock = client.get_simple_lock("");
    assert!(!lock.lock().await);
    assert!(!lock.unlock().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locks_of_different_flavors_share_a_key_independently() {
    let address = start_server().await;
    let x = connect(address, "app-x");
    let y = connect(address, "app-y");

    assert!(x.get_simple_lock("shared").lock().await);
    assert!(y.get_reentrant_lock("shared").try_lock().await);
    assert!(y
        .get_timeout_lock("shared")
        .try_lock_with(Duration::from_secs(5))
        .await);
    assert!(y.get_read_write_lock("shared").write_lock().try_lock().await);
}
