mod common;

use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use common::{Behavior, MockTransport};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use nimbus::affinity::MemoryAffinityStore;
use nimbus::request::{PartSource, PreparedBody};
use nimbus::{urlsafe_encode, BatchEntry, Client};

fn json_client(transport: Arc<MockTransport>) -> Client {
    Client::with_parts(
        common::test_config(),
        transport,
        Arc::new(MemoryAffinityStore::new()),
    )
}

fn ok_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(Behavior::Respond(
        200,
        "application/json".to_string(),
        br#"{"ok":true}"#.to_vec(),
    )))
}

#[tokio::test]
async fn stat_builds_encoded_entry_uri() {
    let transport = ok_transport();
    let client = json_client(transport.clone());

    let result = client.storage().stat("key").await.unwrap();
    assert_eq!(result.status, 200);
    assert!(result.error.is_none());
    assert!(result.value.is_some());

    let requests = transport.requests.lock();
    let expected = format!("/stat/{}", urlsafe_encode("photos:key"));
    assert_eq!(requests[0].url.path(), expected);
    assert!(requests[0].headers.iter().any(|(k, v)| {
        k == "Authorization" && v.starts_with("QBox ak:")
    }));
}

#[tokio::test]
async fn batch_get_sends_raw_op_body() {
    let transport = ok_transport();
    let client = json_client(transport.clone());

    let entries = vec![
        BatchEntry {
            key: "a".to_string(),
            ..Default::default()
        },
        BatchEntry {
            key: "b".to_string(),
            att_name: Some("b.jpg".to_string()),
            expires: Some(600),
        },
    ];
    client.storage().batch_get(&entries).await.unwrap();

    let requests = transport.requests.lock();
    assert_eq!(requests[0].url.path(), "/batch");

    let expected = format!(
        "op=/get/{}&op=/get/{}/attName/{}/expires/600",
        urlsafe_encode("photos:a"),
        urlsafe_encode("photos:b"),
        urlsafe_encode("b.jpg"),
    );
    // op strings ride in a form-encoded body so the transport tags them
    // application/x-www-form-urlencoded
    match &requests[0].body {
        PreparedBody::UrlEncoded(body) => assert_eq!(body, expected.as_bytes()),
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn put_sends_octet_stream_body_excluded_from_signature() {
    let transport = ok_transport();
    let client = json_client(transport.clone());

    let payload = vec![0xde, 0xad, 0xbe, 0xef];
    client
        .storage()
        .put("key", "image/png", payload.clone())
        .await
        .unwrap();

    let requests = transport.requests.lock();
    let expected_path = format!(
        "/rs-put/{}/mimeType/{}",
        urlsafe_encode("photos:key"),
        urlsafe_encode("image/png"),
    );
    assert_eq!(requests[0].url.path(), expected_path);

    match &requests[0].body {
        PreparedBody::Raw(body) => assert_eq!(body, &payload),
        other => panic!("unexpected body: {other:?}"),
    }
    assert!(requests[0]
        .headers
        .iter()
        .any(|(k, v)| k == "Content-Type" && v == "application/octet-stream"));

    // the signature covers the path alone, never the payload bytes
    let mut mac = Hmac::<Sha1>::new_from_slice(b"sk").unwrap();
    mac.update(format!("{expected_path}\n").as_bytes());
    let expected_auth = format!("QBox ak:{}", URL_SAFE.encode(mac.finalize().into_bytes()));
    assert!(requests[0]
        .headers
        .iter()
        .any(|(k, v)| k == "Authorization" && v == &expected_auth));
}

#[tokio::test]
async fn put_from_file_uploads_file_contents() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(b"raw image bytes")?;

    let transport = ok_transport();
    let client = json_client(transport.clone());

    client.storage().put_from_file("key", "", file.path()).await?;

    let requests = transport.requests.lock();
    let expected_path = format!(
        "/rs-put/{}/mimeType/{}",
        urlsafe_encode("photos:key"),
        urlsafe_encode("application/octet-stream"),
    );
    assert_eq!(requests[0].url.path(), expected_path);

    match &requests[0].body {
        PreparedBody::Raw(body) => assert_eq!(body, b"raw image bytes"),
        other => panic!("unexpected body: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn upload_file_sends_multipart_with_file_part() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(b"image bytes")?;

    let transport = ok_transport();
    let client = json_client(transport.clone());

    client
        .storage()
        .upload_file("token123", "key", "", file.path(), Some("meta"), None)
        .await?;

    let requests = transport.requests.lock();
    assert_eq!(requests[0].url.path(), "/upload");

    let parts = match &requests[0].body {
        PreparedBody::Multipart(parts) => parts,
        other => panic!("unexpected body: {other:?}"),
    };

    let expected_action = format!(
        "/rs-put/{}/mimeType/{}/meta/{}",
        urlsafe_encode("photos:key"),
        urlsafe_encode("application/octet-stream"),
        urlsafe_encode("meta"),
    );
    assert_eq!(parts[0], ("action".to_string(), PartSource::Text(expected_action)));
    assert_eq!(
        parts[1],
        (
            "file".to_string(),
            PartSource::File(file.path().to_path_buf())
        )
    );
    assert_eq!(
        parts[2],
        ("auth".to_string(), PartSource::Text("token123".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn remote_error_surfaces_status_and_message() {
    let transport = Arc::new(MockTransport::new(Behavior::Respond(
        612,
        "application/json".to_string(),
        br#"{"error":"no such entry"}"#.to_vec(),
    )));
    let client = json_client(transport);

    let result = client.storage().delete("missing").await.unwrap();
    assert_eq!(result.status, 612);
    assert_eq!(result.error.as_deref(), Some("no such entry"));
    assert!(result.value.is_none());
}

#[tokio::test]
async fn publish_uses_encoded_domain_and_bucket() {
    let transport = ok_transport();
    let client = json_client(transport.clone());

    client.storage().publish("cdn.example.com").await.unwrap();

    let requests = transport.requests.lock();
    let expected = format!("/publish/{}/from/photos", urlsafe_encode("cdn.example.com"));
    assert_eq!(requests[0].url.path(), expected);
}
