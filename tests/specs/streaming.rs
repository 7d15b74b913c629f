// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The voice path end to end: user audio → STT → LLM → streamed reply.

use super::helpers::*;
use life_transport::{TransportEvent, TransportSession, SAMPLES_PER_FRAME};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::test]
async fn user_audio_comes_back_as_a_streamed_reply() {
    let rig = rig_with(&["echo"], scripted_providers("hi agent", "Hello World"));

    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();
    let user = rig.join_as_user(&created.id, &started.transport_room).await;

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    user.register_text_handler(
        "responses",
        Arc::new(move |incoming| {
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let _ = reply_tx.send(incoming.reader.read_to_end().await);
            });
        }),
    );

    user.stream_audio_chunk(&[0i16; 160]).await.unwrap();

    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), reply_rx.recv())
        .await
        .expect("no reply within deadline")
        .unwrap();
    assert_eq!(reply, "Hello World");

    rig.server.stop(&created.id, &started.session_token).await.unwrap();
}

#[tokio::test]
async fn worker_audio_reaches_the_user_in_10ms_frames() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();
    let user = rig.join_as_user(&created.id, &started.transport_room).await;
    let mut events = user.subscribe_events();

    let worker = rig.launcher.latest().unwrap();
    let host = worker.runtime.active_host().await.unwrap();
    host.push_audio((0..400).map(|i| i as i16).collect());

    // Two whole frames arrive immediately; the 80-sample residue follows
    // after the trailing flush.
    let mut received: Vec<i16> = Vec::new();
    while received.len() < 400 {
        match tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .expect("audio stalled")
            .unwrap()
        {
            TransportEvent::Audio(frame) => {
                assert!(frame.samples.len() <= SAMPLES_PER_FRAME);
                received.extend(frame.samples);
            }
            _ => {}
        }
    }
    assert_eq!(received, (0..400).map(|i| i as i16).collect::<Vec<i16>>());

    rig.server.stop(&created.id, &started.session_token).await.unwrap();
}

#[tokio::test]
async fn rpc_describe_is_reachable_from_the_user_side() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();
    let user = rig.join_as_user(&created.id, &started.transport_room).await;

    let peer = life_rpc::RpcPeer::new(
        user as Arc<dyn TransportSession>,
        life_rpc::RpcConfig::default(),
    );
    let out = peer
        .call(life_rpc::CallOptions::new("agent.describe"))
        .await
        .unwrap()
        .unwrap();
    match out {
        life_core::CanonicalValue::Map(map) => {
            assert_eq!(map.get("name"), Some(&life_core::CanonicalValue::text("echo")));
        }
        other => panic!("expected a map, got {:?}", other),
    }

    rig.server.stop(&created.id, &started.session_token).await.unwrap();
}
