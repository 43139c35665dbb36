use webhook_fanout::{verify_webhook_request, EVENT_HEADER, SIGNATURE_HEADER};

fn main() {
    let body = br#"{"event":"order.created","payload":{"id":123},"timestamp":1700000000}"#;
    let signature = webhook_fanout::sign_bytes(body, b"supersecret");

    let headers = vec![
        (SIGNATURE_HEADER, signature.as_str()),
        (EVENT_HEADER, "order.created"),
    ];

    match verify_webhook_request(headers, body, b"supersecret") {
        Ok(document) => println!("verified {} at {}", document.event, document.timestamp),
        Err(err) => eprintln!("rejected: {err}"),
    }
}
