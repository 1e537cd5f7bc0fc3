//! Test doubles shared by unit and integration tests.

mod collecting_sink;
mod fake_transport;

pub use collecting_sink::CollectingSink;
pub use fake_transport::FakeTransport;
