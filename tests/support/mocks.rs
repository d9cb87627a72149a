use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wellknown_ready::readiness::ReplicaAddress;
use wellknown_ready::transport::{ProbeResponse, TransportError, WellKnownTransport};

/// Canned answer of one replica.
#[derive(Clone, Debug)]
pub enum FakeReply {
    Json(JsonValue),
    Raw(Vec<u8>),
    Status(u16),
    Fail(String),
}

#[derive(Default)]
struct FakeTransportState {
    replies: HashMap<IpAddr, FakeReply>,
    delays: HashMap<IpAddr, Duration>,
    calls: Vec<ReplicaAddress>,
}

/// In-memory transport answering per replica IP; unknown replicas are unreachable.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeTransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every listed replica serves `document`.
    pub fn serving(ips: &[&str], document: &JsonValue) -> Self {
        let transport = Self::new();
        for ip in ips {
            transport.reply(ip, FakeReply::Json(document.clone()));
        }
        transport
    }

    pub fn reply(&self, ip: &str, reply: FakeReply) {
        let ip = ip.parse().expect("fake replica ip");
        self.inner
            .lock()
            .expect("fake transport state")
            .replies
            .insert(ip, reply);
    }

    pub fn delay(&self, ip: &str, delay: Duration) {
        let ip = ip.parse().expect("fake replica ip");
        self.inner
            .lock()
            .expect("fake transport state")
            .delays
            .insert(ip, delay);
    }

    pub fn calls(&self) -> Vec<ReplicaAddress> {
        self.inner.lock().expect("fake transport state").calls.clone()
    }
}

#[async_trait]
impl WellKnownTransport for FakeTransport {
    fn url_for(&self, replica: &ReplicaAddress, path: &str) -> String {
        format!("https://kubernetes.default.svc:{}{}", replica.port(), path)
    }

    async fn get(
        &self,
        replica: &ReplicaAddress,
        _path: &str,
    ) -> Result<ProbeResponse, TransportError> {
        let (reply, delay) = {
            let mut state = self.inner.lock().expect("fake transport state");
            state.calls.push(*replica);
            (
                state.replies.get(&replica.ip()).cloned(),
                state.delays.get(&replica.ip()).copied(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(FakeReply::Json(document)) => Ok(ProbeResponse {
                status: StatusCode::OK,
                body: serde_json::to_vec(&document).expect("serialize fake document"),
            }),
            Some(FakeReply::Raw(body)) => Ok(ProbeResponse {
                status: StatusCode::OK,
                body,
            }),
            Some(FakeReply::Status(code)) => Ok(ProbeResponse {
                status: StatusCode::from_u16(code).expect("fake status code"),
                body: Vec::new(),
            }),
            Some(FakeReply::Fail(reason)) => Err(TransportError::new(reason)),
            None => Err(TransportError::new("connection refused")),
        }
    }
}
