// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::message::{SupervisorCommand, WorkerCommand};
use serde_json::json;
use std::time::Duration;

fn echo_handler() -> ControlHandler {
    Arc::new(|body| Box::pin(async move { Ok(json!({ "echo": body })) }))
}

fn failing_handler(fault: Fault) -> ControlHandler {
    Arc::new(move |_| {
        let fault = fault.clone();
        Box::pin(async move { Err(fault) })
    })
}

/// Two linked channel ends over an in-memory pipe.
fn linked(
    parent_handler: ControlHandler,
    child_handler: ControlHandler,
) -> (ControlChannel, ControlChannel) {
    let (parent_io, child_io) = tokio::io::duplex(64 * 1024);
    let (parent_read, parent_write) = tokio::io::split(parent_io);
    let (child_read, child_write) = tokio::io::split(child_io);
    let parent = ControlChannel::spawn(parent_read, parent_write, parent_handler);
    let child = ControlChannel::spawn(child_read, child_write, child_handler);
    (parent, child)
}

#[tokio::test]
async fn call_resolves_with_handler_result() {
    let (parent, _child) = linked(echo_handler(), echo_handler());
    let result = parent.call(&WorkerCommand::Ping).await.unwrap();
    assert_eq!(result, json!({ "echo": { "type": "ping" } }));
}

#[tokio::test]
async fn handler_fault_propagates_to_caller() {
    let fault = Fault::conflict("already stopping");
    let (parent, _child) = linked(echo_handler(), failing_handler(fault.clone()));
    let err = parent.call(&WorkerCommand::Stop).await.unwrap_err();
    assert_eq!(err.code, fault.code);
    assert_eq!(err.message, fault.message);
}

#[tokio::test]
async fn both_directions_run_concurrently() {
    let (parent, child) = linked(echo_handler(), echo_handler());

    let from_parent = parent.call(&WorkerCommand::Ping);
    let from_child = child.call(&SupervisorCommand::Ready);
    let (a, b) = tokio::join!(from_parent, from_child);
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn concurrent_calls_correlate_by_id() {
    // A handler that answers slow pings after fast stats requests.
    let handler: ControlHandler = Arc::new(|body| {
        Box::pin(async move {
            if body["type"] == "ping" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(body)
        })
    });
    let (parent, _child) = linked(echo_handler(), handler);

    let slow = parent.call(&WorkerCommand::Ping);
    let fast = parent.call(&WorkerCommand::GetProcessStats);
    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(slow.unwrap()["type"], "ping");
    assert_eq!(fast.unwrap()["type"], "get_process_stats");
}

#[tokio::test]
async fn peer_hangup_fails_in_flight_calls() {
    let stalled: ControlHandler = Arc::new(|_| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!(null))
        })
    });
    let (parent, child) = linked(echo_handler(), stalled);

    let call = tokio::spawn(async move { parent.call(&WorkerCommand::Ping).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    child.close();

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.code, life_core::ErrorCode::Unknown);
}

#[tokio::test]
async fn calls_after_close_fail_fast() {
    let (parent, _child) = linked(echo_handler(), echo_handler());
    parent.close();
    let err = parent.call(&WorkerCommand::Ping).await.unwrap_err();
    assert_eq!(err.code, life_core::ErrorCode::Unknown);
}

#[tokio::test]
async fn closed_resolves_when_peer_drops() {
    let (parent, child) = linked(echo_handler(), echo_handler());
    drop(child);
    tokio::time::timeout(Duration::from_secs(1), parent.closed())
        .await
        .expect("closed() did not resolve");
    assert!(parent.is_closed());
}

#[tokio::test]
async fn no_internal_timeout_call_sites_own_deadlines() {
    let stalled: ControlHandler = Arc::new(|_| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!("late"))
        })
    });
    let (parent, _child) = linked(echo_handler(), stalled);

    // The channel happily waits past any "reasonable" deadline...
    let err =
        tokio::time::timeout(Duration::from_millis(50), parent.call(&WorkerCommand::Ping)).await;
    assert!(err.is_err(), "call resolved before the handler finished");

    // ...and the late response is dropped without breaking the channel.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!parent.is_closed());
}
