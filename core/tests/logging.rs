//! Diagnostics emitted through `tracing`.
//!
//! Each test installs a thread-local fmt subscriber writing into a shared
//! buffer. `#[tokio::test]` runs on a current-thread runtime, so everything
//! the client logs while the guard is held lands in that buffer.

use std::io;
use std::sync::{Arc, Mutex};

use mailchimp_core::{ClientConfig, MailchimpClient, NO_DATA};
use mock_server::MockState;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing::Level;

const KEY: &str = "test-key-us12";

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture() -> (Captured, DefaultGuard) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .finish();
    (captured, tracing::subscriber::set_default(subscriber))
}

async fn start(state: MockState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with_state(listener, state));
    format!("http://{addr}")
}

#[test]
fn missing_key_warns() {
    let (captured, _guard) = capture();

    MailchimpClient::new(ClientConfig::default()).unwrap();
    let output = captured.output();
    assert!(output.contains("WARN"), "{output}");
    assert!(output.contains("API key is not set"), "{output}");
}

#[test]
fn key_present_does_not_warn() {
    let (captured, _guard) = capture();

    MailchimpClient::new(ClientConfig::new(KEY)).unwrap();
    assert!(captured.output().is_empty());
}

#[tokio::test]
async fn debug_logs_response_and_missing_data() {
    let base_url = start(MockState::new()).await;
    let (captured, _guard) = capture();

    let c = MailchimpClient::new(ClientConfig::new(KEY).base_url(&base_url).debug(true)).unwrap();
    c.get("/ping", NO_DATA).await.unwrap();

    let output = captured.output();
    assert!(output.contains("no data is set"), "{output}");
    assert!(output.contains("mailchimp response status"), "{output}");
    assert!(output.contains("status=200"), "{output}");
    assert!(output.contains("mailchimp response headers"), "{output}");
}

#[tokio::test]
async fn debug_notes_dropped_payload() {
    let base_url = start(MockState::new()).await;
    let (captured, _guard) = capture();

    let c = MailchimpClient::new(ClientConfig::new(KEY).base_url(&base_url).debug(true)).unwrap();
    c.put("/lists/abc/members/x", Some(&json!({"name": "x"}))).await.unwrap();

    let output = captured.output();
    assert!(output.contains("payload is not sent with this method"), "{output}");
    assert!(!output.contains("no data is set"), "{output}");
}

#[tokio::test]
async fn quiet_without_debug() {
    let base_url = start(MockState::new()).await;
    let (captured, _guard) = capture();

    let c = MailchimpClient::new(ClientConfig::new(KEY).base_url(&base_url)).unwrap();
    c.get("/ping", NO_DATA).await.unwrap();
    c.put("/lists/abc/members/x", Some(&json!({"name": "x"}))).await.unwrap();

    let output = captured.output();
    assert!(!output.contains("mailchimp"), "{output}");
    assert!(!output.contains("no data is set"), "{output}");
    assert!(!output.contains("payload is not sent"), "{output}");
}

#[tokio::test]
async fn transport_failure_logged_only_with_debug() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let base_url = format!("http://{addr}");
    let (captured, _guard) = capture();

    let quiet = MailchimpClient::new(ClientConfig::new(KEY).base_url(&base_url)).unwrap();
    assert!(quiet.get("/ping", NO_DATA).await.unwrap_err().is_transport());
    assert!(!captured.output().contains("ERROR"));

    let loud = MailchimpClient::new(ClientConfig::new(KEY).base_url(&base_url).debug(true)).unwrap();
    assert!(loud.get("/ping", NO_DATA).await.unwrap_err().is_transport());
    let output = captured.output();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("mailchimp request failed"), "{output}");
}
