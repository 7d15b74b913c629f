// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::chunk::{LlmChunk, ToolCall};
use crate::job::Job;
use serde_json::json;

async fn run_script(script: Vec<UpstreamDelta>) -> Vec<LlmChunk> {
    let (sender, job) = Job::channel();
    let (tx, rx) = mpsc::channel(16);
    let cancel = sender.cancelled();
    tokio::spawn(async move {
        for delta in script {
            if tx.send(delta).await.is_err() {
                return;
            }
        }
    });
    pump(rx, &sender, cancel).await;
    drop(sender);
    job.collect().await
}

#[tokio::test]
async fn text_deltas_become_content_then_end() {
    // Upstream: [text:"Hello"], [text:" World"], [finish:"stop"].
    let chunks = run_script(vec![
        UpstreamDelta::Text("Hello".into()),
        UpstreamDelta::Text(" World".into()),
        UpstreamDelta::Finish(FinishSignal::Stop),
    ])
    .await;

    assert_eq!(
        chunks,
        vec![
            LlmChunk::Content { text: "Hello".into() },
            LlmChunk::Content { text: " World".into() },
            LlmChunk::End,
        ]
    );
}

#[tokio::test]
async fn reasoning_deltas_are_distinguished() {
    let chunks = run_script(vec![
        UpstreamDelta::Reasoning("thinking".into()),
        UpstreamDelta::Text("answer".into()),
    ])
    .await;

    assert_eq!(
        chunks,
        vec![
            LlmChunk::Reasoning { text: "thinking".into() },
            LlmChunk::Content { text: "answer".into() },
            LlmChunk::End,
        ]
    );
}

#[tokio::test]
async fn tool_calls_accumulate_until_the_finish_signal() {
    // One call arriving in fragments, then finish:"tool_calls", then stop.
    let chunks = run_script(vec![
        UpstreamDelta::ToolCall {
            index: 0,
            id: Some("call1".into()),
            name: Some("t".into()),
            arguments: "{\"k\":".into(),
        },
        UpstreamDelta::ToolCall { index: 0, id: None, name: None, arguments: "\"v\"}".into() },
        UpstreamDelta::Finish(FinishSignal::ToolCalls),
        UpstreamDelta::Finish(FinishSignal::Stop),
    ])
    .await;

    assert_eq!(
        chunks,
        vec![
            LlmChunk::Tools {
                tools: vec![ToolCall {
                    id: "call1".into(),
                    name: "t".into(),
                    input: json!({ "k": "v" }),
                }],
            },
            LlmChunk::End,
        ]
    );
}

#[tokio::test]
async fn empty_arguments_become_an_empty_object() {
    let chunks = run_script(vec![
        UpstreamDelta::ToolCall {
            index: 0,
            id: Some("call1".into()),
            name: Some("noargs".into()),
            arguments: String::new(),
        },
        UpstreamDelta::Finish(FinishSignal::ToolCalls),
    ])
    .await;

    assert_eq!(
        chunks,
        vec![
            LlmChunk::Tools {
                tools: vec![ToolCall { id: "call1".into(), name: "noargs".into(), input: json!({}) }],
            },
            LlmChunk::End,
        ]
    );
}

#[tokio::test]
async fn multiple_tool_calls_emit_as_one_chunk_in_index_order() {
    let chunks = run_script(vec![
        UpstreamDelta::ToolCall {
            index: 0,
            id: Some("a".into()),
            name: Some("first".into()),
            arguments: "{}".into(),
        },
        UpstreamDelta::ToolCall {
            index: 1,
            id: Some("b".into()),
            name: Some("second".into()),
            arguments: "{}".into(),
        },
        UpstreamDelta::Finish(FinishSignal::ToolCalls),
    ])
    .await;

    match &chunks[0] {
        LlmChunk::Tools { tools } => {
            assert_eq!(tools.len(), 2);
            assert_eq!(tools[0].name, "first");
            assert_eq!(tools[1].name, "second");
        }
        other => panic!("expected tools chunk, got {:?}", other),
    }
}

#[tokio::test]
async fn unparseable_arguments_drop_the_call_with_an_error() {
    let chunks = run_script(vec![
        UpstreamDelta::ToolCall {
            index: 0,
            id: Some("bad".into()),
            name: Some("broken".into()),
            arguments: "{not json".into(),
        },
        UpstreamDelta::ToolCall {
            index: 1,
            id: Some("ok".into()),
            name: Some("fine".into()),
            arguments: "{}".into(),
        },
        UpstreamDelta::Finish(FinishSignal::ToolCalls),
    ])
    .await;

    assert!(matches!(&chunks[0], LlmChunk::Error { .. }));
    match &chunks[1] {
        LlmChunk::Tools { tools } => {
            assert_eq!(tools.len(), 1);
            assert_eq!(tools[0].name, "fine");
        }
        other => panic!("expected tools chunk, got {:?}", other),
    }
}

#[tokio::test]
async fn upstream_errors_are_non_terminal() {
    let chunks = run_script(vec![
        UpstreamDelta::Error("hiccup".into()),
        UpstreamDelta::Text("recovered".into()),
    ])
    .await;

    assert_eq!(
        chunks,
        vec![
            LlmChunk::Error { message: "hiccup".into() },
            LlmChunk::Content { text: "recovered".into() },
            LlmChunk::End,
        ]
    );
}

#[tokio::test]
async fn cancel_stops_the_pump_and_ends_the_job() {
    let (sender, mut job) = Job::channel();
    let (tx, rx) = mpsc::channel(16);
    let cancel = sender.cancelled();

    let pump_task = tokio::spawn(async move {
        pump(rx, &sender, sender.cancelled()).await;
    });

    tx.send(UpstreamDelta::Text("before".into())).await.unwrap();
    assert_eq!(job.next_chunk().await, Some(LlmChunk::Content { text: "before".into() }));

    job.cancel();
    pump_task.await.unwrap();
    assert!(cancel.is_cancelled());

    // The pump dropped its receiver: the upstream feed is dead.
    assert!(tx.send(UpstreamDelta::Text("after".into())).await.is_err());

    assert_eq!(job.next_chunk().await, Some(LlmChunk::End));
    assert_eq!(job.next_chunk().await, None);
}
