//! Full sessions against a mock service: credential resolution, listing,
//! downloads and the interactive menu

mod common;

use common::{Script, test_config, write_plaintext_token, zip_bytes};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zenodo_dl::download::Selection;
use zenodo_dl::{CredentialError, CredentialSource, Error, RecordId, RecordSurface, Session, menu};

const RECORD: u64 = 4242;

async fn mount_public_record(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/deposit/depositions/{RECORD}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": 404,
            "message": "PID does not exist."
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/records/{RECORD}")))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": {
                "entries": {
                    "notes.txt": {"key": "notes.txt", "size": 5},
                    "data.zip": {"key": "data.zip", "size": 200}
                }
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn stored_token_lists_and_downloads_the_bundle() {
    let server = MockServer::start().await;
    mount_public_record(&server, "from-file").await;
    let bundle = zip_bytes(&[("notes.txt", b"hello"), ("inner/data.csv", b"1,2")]);
    Mock::given(method("GET"))
        .and(path(format!("/records/{RECORD}/files-archive")))
        .and(header("authorization", "Bearer from-file"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    format!("attachment; filename=\"record-{RECORD}.zip\"").as_str(),
                )
                .set_body_bytes(bundle),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir);
    config.extraction.enabled = true;
    write_plaintext_token(&config.credentials.plaintext_path, "from-file\n");

    let mut prompter = Script::new([]);
    let session = Session::open(&config, RecordId::new(RECORD), &mut prompter)
        .await
        .unwrap();
    assert!(prompter.prompts.is_empty(), "stored token needs no prompt");
    assert!(matches!(
        session.source(),
        CredentialSource::PlaintextFile { .. }
    ));

    let listing = session.list().await.unwrap();
    assert_eq!(listing.surface, RecordSurface::Public);
    let names: Vec<_> = listing.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["data.zip", "notes.txt"]);

    let outcome = session.download_all().await.unwrap();
    let downloads = dir.path().join("downloads");
    assert_eq!(outcome.bundle.path, downloads.join(format!("record-{RECORD}.zip")));

    let extraction = outcome.extraction.unwrap();
    assert!(extraction.failed.is_empty(), "{:?}", extraction.failed);
    let extracted_dir = downloads.join(format!("record-{RECORD}"));
    assert_eq!(
        std::fs::read_to_string(extracted_dir.join("inner").join("data.csv")).unwrap(),
        "1,2"
    );
}

#[tokio::test]
async fn selected_files_fall_back_to_the_public_surface() {
    let server = MockServer::start().await;
    mount_public_record(&server, "from-file").await;
    Mock::given(method("GET"))
        .and(path(format!("/records/{RECORD}/draft/files/notes.txt/content")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/records/{RECORD}/files/notes.txt/content")))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);
    write_plaintext_token(&config.credentials.plaintext_path, "from-file");

    let mut prompter = Script::new([]);
    let session = Session::open(&config, RecordId::new(RECORD), &mut prompter)
        .await
        .unwrap();
    let listing = session.list().await.unwrap();

    let outcome = session
        .download_selected(&listing, &Selection::parse("notes"))
        .await
        .unwrap();
    outcome.report.ensure_complete().unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("downloads").join("notes.txt")).unwrap(),
        "hello"
    );

    let err = session
        .download_selected(&listing, &Selection::parse("missing"))
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.to_string(), "selection \"missing\" matched no files");
}

#[tokio::test]
async fn typed_token_is_validated_saved_and_used_by_the_menu() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/deposit/depositions/{RECORD}")))
        .and(header("authorization", "Bearer typed-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"filename": "draft.txt", "filesize": 1024}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    // token, save as plaintext, then menu: list, quit
    let mut prompter = Script::new(["typed-token", "2", "1", "7"]);
    let mut session = Session::open(&config, RecordId::new(RECORD), &mut prompter)
        .await
        .unwrap();
    assert_eq!(session.source(), &CredentialSource::Interactive);
    assert_eq!(
        std::fs::read_to_string(&config.credentials.plaintext_path).unwrap(),
        "typed-token"
    );
    assert!(!config.credentials.encrypted_path.exists());

    let mut out = Vec::new();
    menu::run(&mut session, &mut prompter, &mut out)
        .await
        .unwrap();
    assert_eq!(prompter.remaining(), 0);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Record 4242 (owner surface), 1 files:"), "{text}");
    assert!(text.contains("1) draft.txt (0.00 MB)"), "{text}");
}

#[tokio::test]
async fn rejected_token_is_fatal_and_never_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/deposit/depositions/{RECORD}")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": 401,
            "message": "The server could not verify that you are authorized."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    let mut prompter = Script::new(["bad-token"]);
    let err = Session::open(&config, RecordId::new(RECORD), &mut prompter)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Credential(CredentialError::Invalid { status: 401, .. })
    ));
    assert!(err.is_fatal());
    assert_eq!(err.exit_code(), 2);
    assert!(!config.credentials.plaintext_path.exists());
    assert!(!config.credentials.encrypted_path.exists());
}

#[tokio::test]
async fn encrypted_token_round_trips_through_the_passphrase_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/deposit/depositions/{RECORD}")))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    // first run: token, encrypted (default), passphrase twice
    let mut first = Script::new(["secret-token", "", "pass phrase", "pass phrase"]);
    drop(
        Session::open(&config, RecordId::new(RECORD), &mut first)
            .await
            .unwrap(),
    );
    assert!(config.credentials.encrypted_path.exists());

    // second run: wrong passphrase once, then the right one
    let mut second = Script::new(["nope", "pass phrase"]);
    let session = Session::open(&config, RecordId::new(RECORD), &mut second)
        .await
        .unwrap();
    assert!(matches!(
        session.source(),
        CredentialSource::EncryptedFile { .. }
    ));
    assert_eq!(second.prompts.len(), 2);
    assert!(session.list().await.unwrap().is_empty());
}
