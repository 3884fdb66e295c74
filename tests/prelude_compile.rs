//! Compile-time prelude coverage test.
use std::time::Duration;
use tower::service_fn;
use tower_layer::Layer;
use tower_service::Service;
use tripwire::prelude::*;

#[tokio::test]
async fn prelude_reexports_core_types() {
    let config: BreakerConfig<TransportError<(), std::io::Error>> = BreakerConfig::builder()
        .break_duration(Duration::from_millis(100))
        .write_mode(WriteMode::LastWriteWins)
        .clock(ManualClock::new())
        .build()
        .expect("valid config");
    let breaker = KeyedBreaker::new(config);
    let layer = BreakerLayer::new(breaker.clone(), |_req: &()| "svc".to_string());

    let mut svc = layer.layer(service_fn(|_req: ()| async { Ok::<_, std::io::Error>(()) }));
    svc.call(()).await.expect("service call failed");
    assert_eq!(breaker.status("svc").await.unwrap(), Status::Closed);
}
