// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[tokio::test]
async fn request_roundtrips_through_a_duplex_pipe() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let request = Request::Tool {
        name: "send_message".into(),
        args: json!({"from": "cursor", "to": "codex", "content": "ping"}),
    };
    write_message(&mut client, &request).await.unwrap();

    let received: Request = read_message(&mut server).await.unwrap();
    assert_eq!(received, request);
}

#[tokio::test]
async fn closed_connection_is_distinguishable() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    let result: Result<Request, _> = read_message(&mut server).await;
    assert!(matches!(result, Err(ProtocolError::Closed)));
}

#[tokio::test]
async fn oversized_frames_are_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let mut bogus = Vec::new();
    bogus.extend_from_slice(&u32::MAX.to_be_bytes());
    tokio::io::AsyncWriteExt::write_all(&mut client, &bogus).await.unwrap();

    let result: Result<Request, _> = read_message(&mut server).await;
    assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
}

#[test]
fn unknown_request_type_fails_to_decode() {
    let payload = br#"{"type":"exploit"}"#;
    let result: Result<Request, _> = decode(payload);
    assert!(result.is_err());
}

#[test]
fn hello_defaults_agent_to_none() {
    let payload = br#"{"type":"hello"}"#;
    let request: Request = decode(payload).unwrap();
    assert_eq!(request, Request::Hello { agent: None });
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn encode_decode_is_identity(name in "[a-z_]{1,24}", text in ".{0,128}") {
            let request = Request::Tool { name, args: serde_json::Value::String(text) };
            let frame = encode(&request).unwrap();
            let decoded: Request = decode(&frame[4..]).unwrap();
            prop_assert_eq!(decoded, request);
        }
    }
}
