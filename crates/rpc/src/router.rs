//! Peer-side dispatch of incoming RPC methods to registered handlers.

use crate::error::{RpcError, RpcResult};
use crate::protocol::{RpcErrorBody, RpcReply, RpcResultCode, MAX_PAYLOAD_BYTES};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;
use voicectl_core::ParticipantIdentity;

/// One incoming method call as seen by the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcInvocation {
    pub request_id: Uuid,
    pub method: String,
    pub caller: ParticipantIdentity,
    pub payload: String,
}

/// Answers requests addressed to a participant.
#[async_trait::async_trait]
pub trait RpcResponder: Send + Sync {
    async fn handle(&self, invocation: RpcInvocation) -> RpcReply;
}

type MethodHandler =
    Arc<dyn Fn(RpcInvocation) -> BoxFuture<'static, Result<String, RpcErrorBody>> + Send + Sync>;

/// Routes invocations to handlers by method name
pub struct RpcMethodRouter {
    handlers: HashMap<String, MethodHandler>,
    max_payload_bytes: usize,
}

impl RpcMethodRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Register a handler for `method`
    pub fn register<F, Fut>(&mut self, method: impl Into<String>, handler: F) -> RpcResult<()>
    where
        F: Fn(RpcInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, RpcErrorBody>> + Send + 'static,
    {
        let method = method.into();
        if self.handlers.contains_key(&method) {
            return Err(RpcError::MethodAlreadyRegistered(method));
        }
        let handler: MethodHandler =
            Arc::new(move |invocation: RpcInvocation| handler(invocation).boxed());
        self.handlers.insert(method, handler);
        Ok(())
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl Default for RpcMethodRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RpcResponder for RpcMethodRouter {
    async fn handle(&self, invocation: RpcInvocation) -> RpcReply {
        let Some(handler) = self.handlers.get(&invocation.method).cloned() else {
            tracing::debug!(method = %invocation.method, "Unsupported RPC method");
            return RpcReply::error(
                RpcResultCode::UnsupportedMethod,
                format!("method `{}` is not supported", invocation.method),
            );
        };

        match handler(invocation).await {
            Ok(payload) if payload.len() > self.max_payload_bytes => {
                RpcReply::Error(RpcErrorBody::from_code(RpcResultCode::ResponsePayloadTooLarge))
            }
            Ok(payload) => RpcReply::Payload(payload),
            Err(body) => RpcReply::Error(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(method: &str, payload: &str) -> RpcInvocation {
        RpcInvocation {
            request_id: Uuid::new_v4(),
            method: method.to_string(),
            caller: "voicectl-agent".into(),
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn test_registered_method_answers() {
        let mut router = RpcMethodRouter::new();
        router
            .register("echo", |inv: RpcInvocation| async move { Ok(inv.payload) })
            .unwrap();

        let reply = router.handle(invocation("echo", "hello")).await;
        assert_eq!(reply, RpcReply::ok("hello"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_unsupported() {
        let router = RpcMethodRouter::new();
        match router.handle(invocation("reboot", "")).await {
            RpcReply::Error(body) => assert_eq!(body.code, RpcResultCode::UnsupportedMethod),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_error_is_passed_through() {
        let mut router = RpcMethodRouter::new();
        router
            .register("fail", |_inv: RpcInvocation| async move {
                Err(RpcErrorBody::application("sensor offline"))
            })
            .unwrap();

        assert_eq!(
            router.handle(invocation("fail", "")).await,
            RpcReply::application("sensor offline")
        );
    }

    #[tokio::test]
    async fn test_oversized_reply_is_refused() {
        let mut router = RpcMethodRouter::new().with_max_payload_bytes(4);
        router
            .register("big", |_inv: RpcInvocation| async move { Ok("0123456789".to_string()) })
            .unwrap();

        match router.handle(invocation("big", "")).await {
            RpcReply::Error(body) => {
                assert_eq!(body.code, RpcResultCode::ResponsePayloadTooLarge)
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_method_is_rejected() {
        let mut router = RpcMethodRouter::new();
        router
            .register("ping", |_inv: RpcInvocation| async move { Ok(String::new()) })
            .unwrap();
        let err = router
            .register("ping", |_inv: RpcInvocation| async move { Ok(String::new()) })
            .unwrap_err();

        assert!(matches!(err, RpcError::MethodAlreadyRegistered(m) if m == "ping"));
        assert_eq!(router.methods(), vec!["ping"]);
    }
}
