//! Session against an in-process WebSocket feed on 127.0.0.1.
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use stream_client::delivery;
use stream_client::{Connector, Credentials, Session, SessionConfig, Termination, WsConnector};
use stream_common::net::{HEADER_API_KEY, HEADER_FEED_TOKEN, local_feed_url};
use stream_common::{
    ExchangeType, Quote, StreamError, SubscriptionMode, SubscriptionRequest, decoder,
};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::{HeaderValue, StatusCode};
use tungstenite::{Message, WebSocket};

const WAIT: Duration = Duration::from_secs(5);

fn credentials() -> Credentials {
    Credentials::new("A123", "key-1", "jwt", "feed-1")
}

fn config(max_reconnect_attempts: u32) -> SessionConfig {
    SessionConfig {
        backoff_unit: Duration::from_millis(50),
        max_reconnect_attempts,
        ..SessionConfig::default()
    }
}

fn subscription() -> SubscriptionRequest {
    SubscriptionRequest::subscribe(SubscriptionMode::Quote)
        .with_tokens(ExchangeType::Nse, ["2885", "1594"])
}

fn quote_frame(token: &str, sequence_number: i64) -> Message {
    let quote = Quote {
        subscription_mode: SubscriptionMode::Quote.code(),
        exchange_type: 1,
        token: token.to_string(),
        sequence_number,
        last_traded_price: 2500.5,
        volume_traded: 1_000,
        ..Quote::default()
    };
    Message::binary(decoder::encode(&quote).unwrap())
}

fn header<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn accept_authorized(stream: TcpStream) -> WebSocket<TcpStream> {
    tungstenite::accept_hdr(
        stream,
        |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            assert_eq!(header(req, "authorization"), Some("jwt"));
            assert_eq!(header(req, HEADER_API_KEY), Some("key-1"));
            assert_eq!(header(req, "x-client-code"), Some("A123"));
            assert_eq!(header(req, HEADER_FEED_TOKEN), Some("feed-1"));
            Ok(response)
        },
    )
    .unwrap()
}

fn read_text(ws: &mut WebSocket<TcpStream>) -> String {
    loop {
        match ws.read().unwrap() {
            Message::Text(text) => return text.as_str().to_owned(),
            _ => continue,
        }
    }
}

fn reject_unauthorized(stream: TcpStream) -> bool {
    tungstenite::accept_hdr(
        stream,
        |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
            let mut denied = ErrorResponse::new(Some("invalid feed token".to_string()));
            *denied.status_mut() = StatusCode::UNAUTHORIZED;
            denied
                .headers_mut()
                .insert("x-error-message", HeaderValue::from_static("Invalid feed token"));
            Err(denied)
        },
    )
    .is_err()
}

fn close(mut ws: WebSocket<TcpStream>) {
    let _ = ws.close(None);
    while ws.read().is_ok() {}
}

#[test]
fn streams_quotes_and_resubscribes_after_the_feed_drops() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = local_feed_url(&listener.local_addr().unwrap().to_string());

    let feed = thread::spawn(move || {
        let mut subscriptions = Vec::new();

        let (stream, _) = listener.accept().unwrap();
        let mut ws = accept_authorized(stream);
        subscriptions.push(read_text(&mut ws));
        ws.send(Message::text("subscribed".to_string())).unwrap();
        ws.send(quote_frame("2885", 1)).unwrap();
        ws.send(Message::binary(vec![2u8, 1, 0, 0])).unwrap();
        ws.send(quote_frame("1594", 2)).unwrap();
        close(ws);

        let (stream, _) = listener.accept().unwrap();
        drop(listener);
        let mut ws = accept_authorized(stream);
        subscriptions.push(read_text(&mut ws));
        ws.send(quote_frame("2885", 3)).unwrap();
        close(ws);

        subscriptions
    });

    let (quote_tx, quote_rx) = delivery::channel(8);
    let session = Session::new(WsConnector::new(url), credentials(), subscription(), quote_tx)
        .with_config(config(3));
    let handle = session.spawn();

    let sequence: Vec<i64> = (0..3)
        .map(|_| quote_rx.recv_timeout(WAIT).unwrap().sequence_number)
        .collect();
    assert_eq!(sequence, vec![1, 2, 3]);

    let subscriptions = feed.join().unwrap();
    let expected = subscription().to_json().unwrap();
    assert_eq!(subscriptions, vec![expected.clone(), expected]);

    // Feed is gone: one reconnect already happened, the rest are refused.
    assert_eq!(
        handle.join().unwrap(),
        Termination::RetriesExhausted { attempts: 3 }
    );
}

#[test]
fn unauthorized_handshakes_exhaust_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = local_feed_url(&listener.local_addr().unwrap().to_string());

    let feed = thread::spawn(move || {
        let mut rejected = 0;
        for stream in listener.incoming().take(3) {
            if reject_unauthorized(stream.unwrap()) {
                rejected += 1;
            }
        }
        rejected
    });

    let (quote_tx, quote_rx) = delivery::channel(1);
    let session = Session::new(WsConnector::new(url), credentials(), subscription(), quote_tx)
        .with_config(config(2));

    assert_eq!(
        session.spawn().join().unwrap(),
        Termination::RetriesExhausted { attempts: 2 }
    );
    assert_eq!(feed.join().unwrap(), 3);
    assert!(quote_rx.try_recv().is_err());
}

#[test]
fn unauthorized_handshake_reports_the_feed_error_message() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = local_feed_url(&listener.local_addr().unwrap().to_string());
    let feed = thread::spawn(move || reject_unauthorized(listener.accept().unwrap().0));

    let mut connector = WsConnector::new(url);
    match connector.connect(&credentials()) {
        Err(StreamError::Unauthorized(reason)) => assert_eq!(reason, "Invalid feed token"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("handshake should have been rejected"),
    }
    assert!(feed.join().unwrap());
}
