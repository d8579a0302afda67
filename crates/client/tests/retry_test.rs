//! Retry and fault classification through the full client.
//!
//! A scripted transport fails every request with a chosen fault and counts
//! how often it was called, so attempt counts can be asserted exactly.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use client::{
    Client, ClientConfig, CounterOp, ErrorKind, Item, MemoryCluster, NodeTransport, RawCodec,
    StoreMode, TransportError,
};

#[derive(Clone, Copy)]
enum Fault {
    Timeout,
    NestedTimeout,
    Interrupt,
    Reset,
}

impl Fault {
    fn error(self) -> TransportError {
        match self {
            Fault::Timeout => TransportError::TimedOut("no reply within 50ms".into()),
            Fault::NestedTimeout => TransportError::wrap(
                "batch read failed",
                io::Error::new(io::ErrorKind::TimedOut, "socket read"),
            ),
            Fault::Interrupt => TransportError::Interrupted("wait aborted".into()),
            Fault::Reset => io::Error::from(io::ErrorKind::ConnectionReset).into(),
        }
    }
}

struct ScriptedTransport {
    calls: Arc<AtomicUsize>,
    fault: Fault,
}

impl ScriptedTransport {
    fn fail(&self) -> TransportError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fault.error()
    }
}

impl NodeTransport for ScriptedTransport {
    fn store(&self, _: StoreMode, _: &str, _: Item, _: u32) -> Result<bool, TransportError> {
        Err(self.fail())
    }

    fn get(&self, _: &str) -> Result<Option<Item>, TransportError> {
        Err(self.fail())
    }

    fn delete(&self, _: &str) -> Result<bool, TransportError> {
        Err(self.fail())
    }

    fn mutate(&self, _: CounterOp, _: &str, _: u64, _: u64, _: u32) -> Result<u64, TransportError> {
        Err(self.fail())
    }

    fn flush(&self) -> Result<(), TransportError> {
        Err(self.fail())
    }

    fn stats(&self) -> Result<HashMap<String, String>, TransportError> {
        Err(self.fail())
    }
}

fn scripted_client(
    fault: Fault,
    options: &[(&str, &str)],
) -> (Client<ScriptedTransport, RawCodec>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let options: HashMap<String, String> = options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let shared = Arc::clone(&calls);
    let client = Client::from_options("10.0.0.1:11211", &options, RawCodec, move |_, _| {
        Ok(ScriptedTransport {
            calls: Arc::clone(&shared),
            fault,
        })
    })
    .unwrap();
    (client, calls)
}

#[test]
fn test_permanent_timeout_makes_limit_plus_one_attempts() {
    let (client, calls) = scripted_client(Fault::Timeout, &[("exception_retry_limit", "3")]);
    let err = client.get("user:1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_default_retry_limit_is_five() {
    let (client, calls) = scripted_client(Fault::Timeout, &[]);
    let err = client.get("user:1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[test]
fn test_zero_retry_limit_makes_one_attempt() {
    let (client, calls) = scripted_client(Fault::Timeout, &[("exception_retry_limit", "0")]);
    assert!(client.set("k", &Bytes::from_static(b"v"), None).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_nested_timeout_is_retried() {
    let (client, calls) = scripted_client(Fault::NestedTimeout, &[("exception_retry_limit", "2")]);
    let err = client.incr("hits", 1, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_interrupt_is_not_retried() {
    let (client, calls) = scripted_client(Fault::Interrupt, &[]);
    let err = client.delete("k").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Interrupted);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_other_faults_are_not_retried() {
    let (client, calls) = scripted_client(Fault::Reset, &[]);
    let err = client.add("k", &Bytes::from_static(b"v"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_flush_is_not_retried() {
    let (client, calls) = scripted_client(Fault::Timeout, &[]);
    let err = client.flush().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_timeouts_recover() {
    let cluster = MemoryCluster::new();
    let client = Client::new(
        ClientConfig::new("10.0.0.1:11211"),
        RawCodec,
        |node, opts| cluster.connect(node, opts),
    )
    .unwrap();
    let server = cluster.server("10.0.0.1:11211");
    client.set("k", &Bytes::from_static(b"v"), None).unwrap();

    server.fail_next(TransportError::TimedOut("slow".into()));
    server.fail_next(TransportError::TimedOut("slow".into()));
    let before = server.requests();
    assert_eq!(client.get("k").unwrap(), Bytes::from_static(b"v"));
    assert_eq!(server.requests() - before, 3);
}

#[test]
fn test_retries_rotate_through_pool_slots() {
    let cluster = MemoryCluster::new();
    let mut config = ClientConfig::new("10.0.0.1:11211");
    config.pool_size = 3;
    config.exception_retry_limit = 2;
    let client = Client::new(config, RawCodec, |node, opts| cluster.connect(node, opts)).unwrap();

    let server = cluster.server("10.0.0.1:11211");
    for _ in 0..3 {
        server.fail_next(TransportError::TimedOut("slow".into()));
    }
    assert_eq!(client.get("k").unwrap_err().kind(), ErrorKind::TimedOut);
    // one acquire per attempt
    assert_eq!(client.pool().acquire().unwrap().index(), 0);
}
