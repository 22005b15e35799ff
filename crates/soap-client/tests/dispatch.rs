//! Dispatcher behavior against a scripted in-memory transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use soap_client::{
    AuthChallenge, Authenticator, BasicAuthentication, CallError, ClientConfig, Credentials,
    HttpReply, HttpTransport, Message, Payload, SoapClient, SoapRequest, TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const ENDPOINT: &str = "http://soap.test/service";
const NAMESPACE: &str = "urn:calc";

fn response(method: &str, seq: usize) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/1999/XMLSchema-instance" xmlns:xsd="http://www.w3.org/1999/XMLSchema"><soap:Body><n1:{method}Response xmlns:n1="{NAMESPACE}"><n1:method>{method}</n1:method><n1:seq xsi:type="xsd:int">{seq}</n1:seq></n1:{method}Response></soap:Body></soap:Envelope>"#
    )
}

const FAULT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>soap:Client</faultcode><faultstring>Division by zero</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;

/// Records every request. Replies come from the script when one is queued,
/// otherwise a typed response echoing the method and receipt order.
#[derive(Default)]
struct MockTransport {
    requests: Mutex<Vec<SoapRequest>>,
    script: Mutex<VecDeque<HttpReply>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    fn script(self: &Arc<Self>, reply: HttpReply) -> Arc<Self> {
        self.script.lock().push_back(reply);
        Arc::clone(self)
    }

    fn requests(&self) -> Vec<SoapRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post(&self, request: SoapRequest) -> Result<HttpReply, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let method = request
            .soap_action
            .strip_prefix(NAMESPACE)
            .unwrap_or(&request.soap_action)
            .to_string();
        let seq = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| HttpReply::new(200, response(&method, seq))))
    }
}

fn client(transport: Arc<MockTransport>) -> SoapClient {
    SoapClient::new(ClientConfig::new(ENDPOINT, NAMESPACE), transport).unwrap()
}

fn add_message() -> Message {
    Message::encoded().with_argument("a", 2).with_argument("b", 3)
}

fn seq_of(message: &Message) -> i64 {
    message.argument("seq").unwrap().payload().as_i64().unwrap()
}

#[tokio::test]
async fn test_async_call_wire_format() {
    let transport = MockTransport::new();
    let client = client(Arc::clone(&transport));

    let reply = client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(
        reply.argument("method").unwrap().payload(),
        &Payload::String("Add".into())
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.endpoint, ENDPOINT);
    assert_eq!(request.soap_action, "urn:calcAdd");
    assert!(request.credentials.is_none());

    let body = std::str::from_utf8(&request.body).unwrap();
    assert!(body.contains(
        r#"<n1:Add xmlns:n1="urn:calc"><n1:a xsi:type="xsd:int">2</n1:a><n1:b xsi:type="xsd:int">3</n1:b></n1:Add>"#
    ));
}

#[tokio::test]
async fn test_explicit_soap_action() {
    let transport = MockTransport::new();
    let client = client(Arc::clone(&transport));

    client
        .async_call("Add", &add_message(), Some("http://calc/Add"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(transport.requests()[0].soap_action, "http://calc/Add");
}

#[tokio::test]
async fn test_fault_reply_with_server_error() {
    let transport = MockTransport::new().script(HttpReply::new(500, FAULT));
    let client = client(transport);

    let err = client
        .async_call("Divide", &Message::encoded().with_argument("a", 1), None)
        .unwrap()
        .await
        .unwrap_err();
    let fault = err.as_fault().expect("fault");
    assert_eq!(fault.code, "soap:Client");
    assert_eq!(fault.message, "Division by zero");
}

#[tokio::test]
async fn test_error_status_without_envelope() {
    let transport = MockTransport::new().script(HttpReply::new(502, "Bad Gateway"));
    let client = client(transport);

    let err = client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::HttpStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_cancel_pending_call() {
    let transport = MockTransport::with_delay(Duration::from_secs(30));
    let client = client(transport);

    let pending = client.async_call("Add", &add_message(), None).unwrap();
    pending.cancel();
    assert!(matches!(pending.await, Err(CallError::Cancelled)));
}

#[tokio::test]
async fn test_fire_and_forget_sends_request() {
    let transport = MockTransport::new().script(HttpReply::new(500, FAULT));
    let client = client(Arc::clone(&transport));

    client.call_no_reply("Log", &Message::literal().with_argument("line", "hello"), None);

    for _ in 0..100 {
        if !transport.requests().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].soap_action, "urn:calcLog");
}

#[tokio::test]
async fn test_challenge_without_authenticator_is_declined() {
    let transport = MockTransport::new().script(
        HttpReply::new(401, "").with_header("WWW-Authenticate", "Basic realm=\"calc\""),
    );
    let client = client(Arc::clone(&transport));

    let err = client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::AuthenticationDeclined { .. }));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_challenge_retried_with_credentials() {
    let transport = MockTransport::new().script(HttpReply::new(401, ""));
    let client = client(Arc::clone(&transport));
    client.set_authenticator(Arc::new(BasicAuthentication::new("alice", "secret")));

    let reply = client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(seq_of(&reply), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].credentials.is_none());
    assert_eq!(
        requests[1].credentials,
        Some(Credentials::new("alice", "secret"))
    );
}

#[tokio::test]
async fn test_rejected_credentials_stop_after_one_retry() {
    let transport = MockTransport::new()
        .script(HttpReply::new(401, ""))
        .script(HttpReply::new(401, ""));
    let client = client(Arc::clone(&transport));
    client.set_authenticator(Arc::new(BasicAuthentication::new("alice", "wrong")));

    let err = client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::AuthenticationDeclined { .. }));
    assert_eq!(transport.requests().len(), 2);
}

struct RealmAware {
    seen: Mutex<Vec<(u32, Option<String>)>>,
}

impl Authenticator for RealmAware {
    fn credentials(&self, challenge: &AuthChallenge) -> Option<Credentials> {
        self.seen
            .lock()
            .push((challenge.attempt, challenge.realm().map(str::to_string)));
        (challenge.attempt < 3).then(|| Credentials::new("u", format!("p{}", challenge.attempt)))
    }
}

#[tokio::test]
async fn test_authenticator_sees_every_challenge() {
    let transport = MockTransport::new()
        .script(HttpReply::new(401, "").with_header("WWW-Authenticate", "Basic realm=\"r\""))
        .script(HttpReply::new(401, "").with_header("WWW-Authenticate", "Basic realm=\"r\""));
    let client = client(Arc::clone(&transport));
    let auth = Arc::new(RealmAware {
        seen: Mutex::new(Vec::new()),
    });
    client.set_authenticator(auth.clone());

    client
        .async_call("Add", &add_message(), None)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(
        *auth.seen.lock(),
        vec![(1, Some("r".to_string())), (2, Some("r".to_string()))]
    );
    assert_eq!(
        transport.requests()[2].credentials,
        Some(Credentials::new("u", "p2"))
    );
}

#[test]
fn test_blocking_call_returns_reply() {
    let transport = MockTransport::new();
    let client = client(transport);

    let reply = client.call("Add", &add_message(), None).unwrap();
    assert_eq!(seq_of(&reply), 0);
    assert_eq!(
        reply.argument("method").unwrap().payload(),
        &Payload::String("Add".into())
    );
}

#[test]
fn test_blocking_call_propagates_fault() {
    let transport = MockTransport::new().script(HttpReply::new(500, FAULT));
    let client = client(transport);

    let err = client.call("Divide", &add_message(), None).unwrap_err();
    assert_eq!(err.as_fault().unwrap().message, "Division by zero");
}

#[test]
fn test_concurrent_blocking_calls_are_serialized() {
    const CALLERS: usize = 4;
    let transport = MockTransport::with_delay(Duration::from_millis(100));
    let client = Arc::new(client(Arc::clone(&transport)));
    let barrier = Arc::new(Barrier::new(CALLERS));
    let completions = Arc::new(Mutex::new(Vec::new()));

    let threads: Vec<_> = (0..CALLERS)
        .map(|i| {
            let client = Arc::clone(&client);
            let barrier = Arc::clone(&barrier);
            let completions = Arc::clone(&completions);
            std::thread::spawn(move || {
                let method = format!("Op{i}");
                barrier.wait();
                // Stagger submissions so the queue order is Op0, Op1, ...
                std::thread::sleep(Duration::from_millis(15 * i as u64));
                let reply = client.call(&method, &Message::encoded(), None).unwrap();
                completions.lock().push(method.clone());
                (method, reply)
            })
        })
        .collect();

    let mut seqs = Vec::new();
    for thread in threads {
        let (method, reply) = thread.join().unwrap();
        // Each caller gets the reply to its own request.
        assert_eq!(
            reply.argument("method").unwrap().payload(),
            &Payload::String(method.clone())
        );
        let seq = seq_of(&reply) as usize;
        assert_eq!(
            transport.requests()[seq].soap_action,
            format!("{NAMESPACE}{method}")
        );
        seqs.push(seq);
    }

    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    seqs.sort_unstable();
    assert_eq!(seqs, (0..CALLERS).collect::<Vec<_>>());

    let submitted: Vec<String> = (0..CALLERS).map(|i| format!("Op{i}")).collect();
    let sent: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.soap_action.trim_start_matches(NAMESPACE).to_string())
        .collect();
    assert_eq!(sent, submitted);
    assert_eq!(*completions.lock(), submitted);
}

#[test]
fn test_blocking_calls_complete_in_submission_order() {
    let transport = MockTransport::with_delay(Duration::from_millis(20));
    let client = client(Arc::clone(&transport));

    for i in 0..3 {
        let reply = client
            .call(&format!("Step{i}"), &Message::literal(), None)
            .unwrap();
        assert_eq!(seq_of(&reply), i);
    }
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
}
