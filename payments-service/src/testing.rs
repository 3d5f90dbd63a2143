//! In-memory fakes for the bus and payment processor ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::checkout::{CreateSession, ProviderSession, SessionParams};
use crate::error::ProviderError;
use crate::queue::Publish;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub message_id: String,
    pub body: Vec<u8>,
}

/// Records every publish and always succeeds.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publish for RecordingPublisher {
    async fn publish(&self, topic: &str, message_id: &str, body: &[u8]) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            message_id: message_id.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

/// Fails every publish.
#[derive(Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publish for FailingPublisher {
    async fn publish(&self, _topic: &str, _message_id: &str, _body: &[u8]) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }
}

/// Sleeps before succeeding, to exercise publish timeouts.
pub struct SlowPublisher {
    delay: Duration,
    attempts: AtomicUsize,
}

impl SlowPublisher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publish for SlowPublisher {
    async fn publish(&self, _topic: &str, _message_id: &str, _body: &[u8]) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Payment processor fake that echoes the redirect URLs it was given.
#[derive(Default)]
pub struct FakeSessions {
    calls: Mutex<Vec<SessionParams>>,
    fail_with: Option<ProviderError>,
}

impl FakeSessions {
    pub fn failing(error: ProviderError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn calls(&self) -> Vec<SessionParams> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreateSession for FakeSessions {
    async fn create_session(&self, params: &SessionParams) -> Result<ProviderSession, ProviderError> {
        self.calls.lock().unwrap().push(params.clone());
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(ProviderSession {
            id: "cs_test_1".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_test_1".to_string()),
            success_url: Some(params.success_url.clone()),
            cancel_url: Some(params.cancel_url.clone()),
        })
    }
}
