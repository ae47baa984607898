//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    setup: &'a TestSetup,
    clients: Vec<&'a str>,
}

impl<'a> MessageAssertion<'a> {
    /// Create an assertion for specific clients
    pub fn for_clients(setup: &'a TestSetup, clients: Vec<&'a str>) -> Self {
        Self { setup, clients }
    }

    pub fn for_client(setup: &'a TestSetup, client: &'a str) -> Self {
        Self::for_clients(setup, vec![client])
    }

    /// Assert that each client got a feedback frame with `code` next (consumes it)
    pub async fn received_feedback(self, code: &str) -> MessageContent {
        let frames = self.next_frames().await;
        for (client, frame) in self.clients.iter().zip(&frames) {
            assert_eq!(frame["code"], code, "{} received wrong feedback", client);
        }
        MessageContent {
            frame: frames[0].clone(),
        }
    }

    /// Assert that each client got the same relayed message next (consumes it)
    pub async fn received_relay(self) -> MessageContent {
        let frames = self.next_frames().await;
        for (client, frame) in self.clients.iter().zip(&frames) {
            assert!(
                frame.get("code").is_none(),
                "{} expected a relayed message, got feedback {}",
                client,
                frame
            );
            assert_eq!(
                frame, &frames[0],
                "{} relay differs from {}",
                client, self.clients[0]
            );
        }
        MessageContent {
            frame: frames[0].clone(),
        }
    }

    /// Assert that clients have nothing queued
    pub async fn received_nothing(self) {
        for client in &self.clients {
            let frames = self.setup.frames_for(client).await;
            assert!(
                frames.is_empty(),
                "{} should not have received anything, got {:?}",
                client,
                frames
            );
        }
    }

    async fn next_frames(&self) -> Vec<Value> {
        let mut frames = Vec::new();
        for client in &self.clients {
            let frame = self.setup.consume_frame_for(client).await;
            let Some(frame) = frame else {
                panic!("{} should have received a frame", client);
            };
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }
}

// ============================================================================
// Message Content Assertions
// ============================================================================

pub struct MessageContent {
    pub frame: Value,
}

impl MessageContent {
    pub fn with_broadcast_type(self, expected: &str) -> Self {
        assert_eq!(self.frame["broadcast"]["type"], expected);
        self
    }

    pub fn with_sender(self, expected: uuid::Uuid) -> Self {
        assert_eq!(self.frame["clientID"], expected.to_string());
        self
    }

    pub fn with_app_id(self, expected: i64) -> Self {
        assert_eq!(self.frame["appID"], expected);
        self
    }

    pub fn with_error_code(self, expected: i64) -> Self {
        assert_eq!(self.frame["errorCode"], expected);
        self
    }

    pub fn with_error_containing(self, fragment: &str) -> Self {
        let message = self.frame["errorMessage"].as_str().unwrap_or_default();
        assert!(
            message.contains(fragment),
            "error message {:?} should mention {:?}",
            message,
            fragment
        );
        self
    }

    pub fn with_payload_len(self, expected: usize) -> Self {
        assert_eq!(self.frame["payload"].as_array().map(Vec::len), Some(expected));
        self
    }
}
