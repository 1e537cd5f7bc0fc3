//! Records logged while a notice is being delivered stay out of Airbrake.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use airbrake_notifier::{
    AirbrakeLogAdapter, NotifierBuilder, test_utils::CollectingSink,
};

/// Answer every POST with 200 and count them.
fn spawn_counting_server(listener: TcpListener, posts: Arc<AtomicUsize>) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let Ok(clone) = stream.try_clone() else { continue };
            let mut reader = BufReader::new(clone);
            let mut content_length = 0usize;
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok_and(|n| n > 0) {
                if line.trim().is_empty() {
                    break;
                }
                if let Some((key, value)) = line.split_once(':') {
                    if key.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
                line.clear();
            }
            let mut body = vec![0u8; content_length];
            let _ = reader.read_exact(&mut body);
            posts.fetch_add(1, Ordering::SeqCst);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    });
}

// Installing a global logger can only happen once per process, so this
// binary holds a single test.
#[test]
fn worker_logging_is_not_reported_back() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener has address");
    let posts = Arc::new(AtomicUsize::new(0));
    spawn_counting_server(listener, Arc::clone(&posts));

    let handler = NotifierBuilder::new()
        .with_api_key("abc123")
        .with_url(format!("http://{addr}/notices"))
        .with_diagnostics(Arc::new(CollectingSink::new()))
        .build()
        .expect("handler starts");
    let handler = Arc::new(handler);
    AirbrakeLogAdapter::new(Arc::clone(&handler))
        .with_level(log::LevelFilter::Trace)
        .install()
        .expect("no other logger installed");

    log::error!("one");
    assert!(handler.flush(Duration::from_secs(5)));
    // Give any notices spawned by the delivery time to arrive.
    thread::sleep(Duration::from_millis(500));
    assert!(handler.flush(Duration::from_secs(5)));

    assert_eq!(posts.load(Ordering::SeqCst), 1);
    assert_eq!(handler.stats().delivered, 1);
}
