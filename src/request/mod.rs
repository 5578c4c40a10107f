// Copyright (C) 2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! Per-call request lifecycle. A request is acknowledged synchronously with a
//! handle (an object path), stays live on the bus as an
//! `org.freedesktop.portal.Request` object the caller may `Close`, and emits
//! at most one `Response` signal on that path, ever. The `exported` flag
//! under the request's own lock is what a late completion checks before
//! emitting; the lock is held across emission.

use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;
use zbus::{
    interface,
    zvariant::{ObjectPath, Value},
    Connection, ObjectServer, SignalContext,
};

/// Response code for a successfully completed request.
pub const RESPONSE_SUCCESS: u32 = 0;

/// Response code for a request that failed in the backend or in transport.
/// No finer distinction crosses the caller boundary.
pub const RESPONSE_FAILED: u32 = 2;

const REQUEST_PATH_PREFIX: &str = "/org/freedesktop/portal/desktop/request";

static NEXT_TOKEN: AtomicU32 = AtomicU32::new(0);

/// Emission side of a completed request. The production implementation emits
/// the `Response` signal and retires the served object; tests record calls.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send_response(
        &self,
        handle: &ObjectPath<'_>,
        response: u32,
        results: HashMap<String, Value<'static>>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// One in-flight portal operation, shared between the served request object,
/// the portal's registry and the worker task completing it.
#[derive(Clone)]
pub struct Request {
    handle: ObjectPath<'static>,
    app_id: String,
    exported: Arc<Mutex<bool>>,
}

impl Request {
    /// Allocates a live request for the bus peer `sender`. The handle token
    /// is the caller-supplied one (sanitized) or a fresh one from a
    /// process-wide counter.
    pub fn new(sender: &str, token: Option<&str>, app_id: String) -> zbus::Result<Self> {
        let token = match token {
            Some(token) if !token.is_empty() => sanitize_token(token),
            _ => format!("t{}", NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)),
        };
        let sender = sender.trim_start_matches(':').replace('.', "_");
        let handle = ObjectPath::try_from(format!("{REQUEST_PATH_PREFIX}/{sender}/{token}"))?;

        Ok(Self {
            handle,
            app_id,
            exported: Arc::new(Mutex::new(true)),
        })
    }

    pub fn handle(&self) -> &ObjectPath<'static> {
        &self.handle
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Takes the request out of the live state. A completion racing with this
    /// call either wins the lock first and responds, or finds the flag
    /// cleared and drops its result. Idempotent.
    pub async fn cancel(&self) {
        *self.exported.lock().await = false;
    }

    pub async fn is_exported(&self) -> bool {
        *self.exported.lock().await
    }

    /// Terminal transition, called from the worker context. Drops the result
    /// silently when the request is no longer exported; otherwise emits
    /// exactly one response through `sink` and marks the request done.
    pub async fn complete(
        &self,
        sink: &dyn ResponseSink,
        response: u32,
        results: HashMap<String, Value<'static>>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut exported = self.exported.lock().await;
        if !*exported {
            debug!(target: "request", "Dropping late completion for stale request {}", self.handle);
            return Ok(());
        }

        let result = sink.send_response(&self.handle, response, results).await;
        *exported = false;
        result
    }
}

/// D-Bus face of an in-flight request. `Close` cancels it: any completion
/// arriving afterwards is dropped without a response.
#[interface(name = "org.freedesktop.portal.Request")]
impl Request {
    async fn close(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> zbus::fdo::Result<()> {
        debug!(target: "request", "Closing request {}", self.handle);
        self.cancel().await;
        server.remove::<Self, _>(self.handle.clone()).await?;
        Ok(())
    }

    #[zbus(signal)]
    async fn response(
        ctxt: &SignalContext<'_>,
        response: u32,
        results: HashMap<String, Value<'static>>,
    ) -> zbus::Result<()>;
}

/// [ResponseSink] emitting on the bus: sends the `Response` signal scoped to
/// the request handle and removes the request object from the object server.
pub struct BusResponseSink {
    connection: Connection,
}

impl BusResponseSink {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ResponseSink for BusResponseSink {
    async fn send_response(
        &self,
        handle: &ObjectPath<'_>,
        response: u32,
        results: HashMap<String, Value<'static>>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let ctxt = SignalContext::new(&self.connection, handle.clone())?;
        Request::response(&ctxt, response, results).await?;
        self.connection
            .object_server()
            .remove::<Request, _>(handle.clone())
            .await?;
        Ok(())
    }
}

/// Handle tokens come from the caller; anything that is not a valid object
/// path element is mapped to '_'.
fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        responses: StdMutex<Vec<(String, u32, HashMap<String, Value<'static>>)>>,
    }

    #[async_trait]
    impl ResponseSink for RecordingSink {
        async fn send_response(
            &self,
            handle: &ObjectPath<'_>,
            response: u32,
            results: HashMap<String, Value<'static>>,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.responses
                .lock()
                .unwrap()
                .push((handle.to_string(), response, results));
            Ok(())
        }
    }

    #[tokio::test]
    async fn handle_is_derived_from_sender_and_token() {
        let request = Request::new(":1.42", Some("t1"), String::new()).unwrap();

        assert_eq!(
            request.handle().as_str(),
            "/org/freedesktop/portal/desktop/request/1_42/t1"
        );
    }

    #[tokio::test]
    async fn caller_tokens_are_sanitized() {
        let request = Request::new(":1.42", Some("my-token!"), String::new()).unwrap();

        assert_eq!(
            request.handle().as_str(),
            "/org/freedesktop/portal/desktop/request/1_42/my_token_"
        );
    }

    #[tokio::test]
    async fn generated_tokens_are_unique() {
        let a = Request::new(":1.1", None, String::new()).unwrap();
        let b = Request::new(":1.1", None, String::new()).unwrap();

        assert_ne!(a.handle(), b.handle());
    }

    #[tokio::test]
    async fn completing_a_live_request_emits_one_response() {
        let sink = RecordingSink::default();
        let request = Request::new(":1.1", Some("t"), String::new()).unwrap();

        request
            .complete(&sink, RESPONSE_SUCCESS, HashMap::new())
            .await
            .unwrap();

        let responses = sink.responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].1, RESPONSE_SUCCESS);
        assert!(!request.is_exported().await);
    }

    #[tokio::test]
    async fn cancelled_request_drops_its_completion() {
        let sink = RecordingSink::default();
        let request = Request::new(":1.1", Some("t"), String::new()).unwrap();

        request.cancel().await;
        request
            .complete(&sink, RESPONSE_SUCCESS, HashMap::new())
            .await
            .unwrap();

        assert!(sink.responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_completion_is_dropped() {
        let sink = RecordingSink::default();
        let request = Request::new(":1.1", Some("t"), String::new()).unwrap();

        request
            .complete(&sink, RESPONSE_SUCCESS, HashMap::new())
            .await
            .unwrap();
        request
            .complete(&sink, RESPONSE_FAILED, HashMap::new())
            .await
            .unwrap();

        assert_eq!(sink.responses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_cancel_and_completion_emit_at_most_once() {
        for _ in 0..64 {
            let sink = Arc::new(RecordingSink::default());
            let request = Request::new(":1.1", Some("t"), String::new()).unwrap();

            let completer = tokio::spawn({
                let sink = sink.clone();
                let request = request.clone();
                async move {
                    request
                        .complete(sink.as_ref(), RESPONSE_SUCCESS, HashMap::new())
                        .await
                        .unwrap();
                }
            });
            let canceller = tokio::spawn({
                let request = request.clone();
                async move { request.cancel().await }
            });

            completer.await.unwrap();
            canceller.await.unwrap();

            assert!(sink.responses.lock().unwrap().len() <= 1);
        }
    }
}
