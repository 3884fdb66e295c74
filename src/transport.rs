//! Tower middleware placing a [`KeyedBreaker`] in front of an outbound service.
//!
//! The layer derives a breaker key from each request (e.g. the upstream host) and may
//! classify some successful responses as failures (e.g. HTTP 5xx). Short-circuits surface
//! verbatim as [`BreakerError::BrokenCircuit`] / [`BreakerError::IsolatedCircuit`].

use crate::breaker::KeyedBreaker;
use crate::error::BreakerError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Failure seen by the breaker when guarding a service.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError<Resp, Err> {
    /// The inner service returned an error.
    Service(Err),
    /// The inner service responded, but the response was classified as a failure.
    Rejected(Resp),
}

impl<Resp, Err: fmt::Display> fmt::Display for TransportError<Resp, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Service(e) => write!(f, "{}", e),
            TransportError::Rejected(_) => write!(f, "response classified as failure"),
        }
    }
}

impl<Resp, Err> std::error::Error for TransportError<Resp, Err>
where
    Resp: fmt::Debug,
    Err: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Service(e) => Some(e),
            TransportError::Rejected(_) => None,
        }
    }
}

type KeyFn<Req> = Arc<dyn Fn(&Req) -> String + Send + Sync>;
type ResponseClassifier<Resp> = Arc<dyn Fn(&Resp) -> bool + Send + Sync>;

/// Layer that guards a service with a shared [`KeyedBreaker`].
pub struct BreakerLayer<Req, Resp, Err> {
    breaker: KeyedBreaker<TransportError<Resp, Err>>,
    key_fn: KeyFn<Req>,
    is_failure_response: ResponseClassifier<Resp>,
}

impl<Req, Resp, Err> Clone for BreakerLayer<Req, Resp, Err> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            key_fn: self.key_fn.clone(),
            is_failure_response: self.is_failure_response.clone(),
        }
    }
}

impl<Req, Resp, Err> fmt::Debug for BreakerLayer<Req, Resp, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerLayer")
            .field("breaker", &self.breaker)
            .field("key_fn", &"<key extractor>")
            .field("is_failure_response", &"<classifier>")
            .finish()
    }
}

impl<Req, Resp, Err> BreakerLayer<Req, Resp, Err> {
    /// Create a layer keyed by `key_fn`. Every response counts as a success until
    /// [`classify_response`](Self::classify_response) says otherwise.
    pub fn new<K>(breaker: KeyedBreaker<TransportError<Resp, Err>>, key_fn: K) -> Self
    where
        K: Fn(&Req) -> String + Send + Sync + 'static,
    {
        Self { breaker, key_fn: Arc::new(key_fn), is_failure_response: Arc::new(|_| false) }
    }

    /// Treat responses for which `f` returns true as failures.
    pub fn classify_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resp) -> bool + Send + Sync + 'static,
    {
        self.is_failure_response = Arc::new(f);
        self
    }

    pub fn breaker(&self) -> &KeyedBreaker<TransportError<Resp, Err>> {
        &self.breaker
    }
}

impl<S, Req, Resp, Err> Layer<S> for BreakerLayer<Req, Resp, Err> {
    type Service = BreakerService<S, Req, Resp, Err>;

    fn layer(&self, service: S) -> Self::Service {
        BreakerService {
            inner: service,
            breaker: self.breaker.clone(),
            key_fn: self.key_fn.clone(),
            is_failure_response: self.is_failure_response.clone(),
        }
    }
}

/// Middleware service produced by [`BreakerLayer`].
pub struct BreakerService<S, Req, Resp, Err> {
    inner: S,
    breaker: KeyedBreaker<TransportError<Resp, Err>>,
    key_fn: KeyFn<Req>,
    is_failure_response: ResponseClassifier<Resp>,
}

impl<S: Clone, Req, Resp, Err> Clone for BreakerService<S, Req, Resp, Err> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
            key_fn: self.key_fn.clone(),
            is_failure_response: self.is_failure_response.clone(),
        }
    }
}

impl<S: fmt::Debug, Req, Resp, Err> fmt::Debug for BreakerService<S, Req, Resp, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerService")
            .field("inner", &self.inner)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl<S, Req> Service<Req> for BreakerService<S, Req, S::Response, S::Error>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = BreakerError<TransportError<S::Response, S::Error>>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| BreakerError::Inner(TransportError::Service(e)))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = (self.key_fn)(&req);
        let breaker = self.breaker.clone();
        let is_failure_response = self.is_failure_response.clone();
        // Keep the service that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            breaker
                .call(&key, move || async move {
                    let response = inner.call(req).await.map_err(TransportError::Service)?;
                    if is_failure_response(&response) {
                        Err(TransportError::Rejected(response))
                    } else {
                        Ok(response)
                    }
                })
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BreakerConfig;
    use crate::state::Status;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Request {
        host: &'static str,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Reply {
        status: u16,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Refused;

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection refused")
        }
    }

    impl std::error::Error for Refused {}

    fn layer(clock: &ManualClock) -> BreakerLayer<Request, Reply, Refused> {
        let config = BreakerConfig::builder()
            .failure_threshold(2)
            .break_duration(Duration::from_secs(1))
            .clock(clock.clone())
            .build()
            .unwrap();
        BreakerLayer::new(KeyedBreaker::new(config), |req: &Request| req.host.to_string())
            .classify_response(|reply: &Reply| reply.status >= 500)
    }

    #[tokio::test]
    async fn failing_responses_trip_per_host() {
        let clock = ManualClock::new();
        let layer = layer(&clock);
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let svc = ServiceBuilder::new().layer(layer.clone()).service(service_fn(
            move |req: Request| {
                let hits = counted.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let status = if req.host == "bad" { 503 } else { 200 };
                    Ok::<_, Refused>(Reply { status })
                }
            },
        ));

        for _ in 0..2 {
            let err = svc.clone().oneshot(Request { host: "bad" }).await.unwrap_err();
            assert_eq!(err.as_inner(), Some(&TransportError::Rejected(Reply { status: 503 })));
        }
        assert_eq!(layer.breaker().status("bad").await.unwrap(), Status::Open);

        let err = svc.clone().oneshot(Request { host: "bad" }).await.unwrap_err();
        assert!(err.is_broken());
        assert_eq!(hits.load(Ordering::SeqCst), 2, "open breaker must not reach the service");

        let ok = svc.clone().oneshot(Request { host: "good" }).await.unwrap();
        assert_eq!(ok, Reply { status: 200 });
    }

    #[tokio::test]
    async fn service_errors_pass_through_and_count() {
        let clock = ManualClock::new();
        let layer = layer(&clock);
        let svc = layer.layer(service_fn(|_req: Request| async { Err::<Reply, _>(Refused) }));

        let err = svc.clone().oneshot(Request { host: "db" }).await.unwrap_err();
        assert_eq!(err.as_inner(), Some(&TransportError::Service(Refused)));
        assert_eq!(err.to_string(), "connection refused");
        let _ = svc.clone().oneshot(Request { host: "db" }).await;
        assert_eq!(layer.breaker().status("db").await.unwrap(), Status::Open);
    }

    #[tokio::test]
    async fn isolation_surfaces_verbatim() {
        let clock = ManualClock::new();
        let layer = layer(&clock);
        layer.breaker().isolate("db").await.unwrap();
        let svc = layer.layer(service_fn(|_req: Request| async { Ok::<_, Refused>(Reply { status: 200 }) }));

        let err = svc.oneshot(Request { host: "db" }).await.unwrap_err();
        assert!(matches!(err, BreakerError::IsolatedCircuit));
    }
}
