use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use sleephq_sync::sync::upload_descriptor::content_hash;
use sleephq_sync::utils::unix_now;
use sleephq_sync::{
    ClientConfig, CredentialRecord, CredentialStore, LoginCredentials, NoCredentials, RunStatus,
    SleepHqClient, SyncRequest, UploadHistory, UploadOptions, Uploader,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mirror = dir.path().join("sd");
        fs::create_dir_all(mirror.join("DATALOG").join("20230102")).unwrap();
        fs::write(mirror.join("STR.edf"), b"summary").unwrap();
        fs::write(
            mirror.join("DATALOG").join("20230102").join("BRP.edf"),
            b"breathing",
        )
        .unwrap();
        Self { dir }
    }

    fn mirror(&self) -> PathBuf {
        self.dir.path().join("sd")
    }

    fn token_path(&self) -> PathBuf {
        self.dir.path().join("state").join("sleephq_token.json")
    }

    fn history_path(&self) -> PathBuf {
        self.dir.path().join("state").join("upload_tracker.json")
    }

    fn store(&self) -> CredentialStore {
        CredentialStore::new(self.token_path())
    }

    fn client(&self, server: &ServerGuard) -> SleepHqClient {
        SleepHqClient::new(
            ClientConfig::new("client-id", "client-secret").with_base_url(server.url()),
            self.store(),
        )
    }

    fn store_valid_token(&self) {
        self.store()
            .save(&CredentialRecord::new("stored-token", unix_now() + 3600.0, "42"))
            .unwrap();
    }

    fn changed(&self) -> Vec<PathBuf> {
        vec![self.mirror().join("DATALOG").join("20230102").join("BRP.edf")]
    }
}

#[tokio::test]
async fn login_posts_password_grant_and_persists_team() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let token = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "password".into()),
            Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
            Matcher::UrlEncoded("username".into(), "user@example.com".into()),
            Matcher::UrlEncoded("password".into(), "hunter2".into()),
            Matcher::UrlEncoded("scope".into(), "read write delete".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh-token","expires_in":3600}"#)
        .create_async()
        .await;
    let teams = server
        .mock("GET", "/api/v1/teams")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_body(r#"{"data":[{"id":42,"name":"Home"}]}"#)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let record = client
        .authenticate("user@example.com", &LoginCredentials::new("u", "hunter2").password)
        .await
        .unwrap();

    token.assert_async().await;
    teams.assert_async().await;
    assert_eq!(record.team_id, "42");
    assert!(client.is_authenticated());

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fixture.token_path()).unwrap()).unwrap();
    assert_eq!(stored["access_token"], "fresh-token");
    assert_eq!(stored["team_id"], "42");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(fixture.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn bare_team_list_is_accepted() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let _token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"t"}"#)
        .create_async()
        .await;
    let _teams = server
        .mock("GET", "/api/v1/teams")
        .with_status(200)
        .with_body(r#"[{"team_id":"abc"}]"#)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let record = client
        .authenticate("u", &LoginCredentials::new("u", "p").password)
        .await
        .unwrap();
    assert_eq!(record.team_id, "abc");
    // default lifetime applies when expires_in is absent
    assert!(record.expires_at > unix_now() + 7000.0);
}

#[tokio::test]
async fn empty_team_list_fails_authentication() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let _token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"t","expires_in":60}"#)
        .create_async()
        .await;
    let _teams = server
        .mock("GET", "/api/v1/teams")
        .with_status(200)
        .with_body(r#"{"teams":[]}"#)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let result = client
        .authenticate("u", &LoginCredentials::new("u", "p").password)
        .await;

    assert!(result.is_err());
    assert!(!client.is_authenticated());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn rejected_password_leaves_client_unauthenticated() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let _token = server
        .mock("POST", "/oauth/token")
        .with_status(401)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let err = client
        .authenticate("u", &LoginCredentials::new("u", "wrong").password)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Authentication failed"));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn full_run_uploads_selection_and_triggers_processing() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", "/api/v1/teams/42/imports")
        .match_header("authorization", "Bearer stored-token")
        .with_status(201)
        .with_body(r#"{"data":{"id":7}}"#)
        .create_async()
        .await;
    let str_file = server
        .mock("POST", "/api/v1/imports/7/files")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file"; filename="STR.edf""#.into()),
            Matcher::Regex(r#"name="path"\r\n\r\n\./\r\n"#.into()),
            Matcher::Regex(content_hash(b"summary", "STR.edf")),
        ]))
        .with_status(200)
        .create_async()
        .await;
    let datalog_file = server
        .mock("POST", "/api/v1/imports/7/files")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"filename="BRP.edf""#.into()),
            Matcher::Regex(r#"name="path"\r\n\r\n\./DATALOG/20230102/\r\n"#.into()),
            Matcher::Regex(content_hash(b"breathing", "BRP.edf")),
        ]))
        .with_status(200)
        .create_async()
        .await;
    let process = server
        .mock("POST", "/api/v1/imports/7/process_files")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let history = UploadHistory::open(fixture.history_path());
    let mut uploader = Uploader::new(
        fixture.client(&server),
        Some(history),
        UploadOptions::default(),
    );
    let request = SyncRequest {
        mirror_root: fixture.mirror(),
        changed_files: fixture.changed(),
        force: false,
    };
    let report = uploader.run(&request, &NoCredentials).await;

    create.assert_async().await;
    str_file.assert_async().await;
    datalog_file.assert_async().await;
    process.assert_async().await;

    assert_eq!(
        report.status,
        RunStatus::Uploaded {
            processing_triggered: true
        }
    );
    assert_eq!(report.counts(), (2, 0));
    assert_eq!(report.import_id.as_deref(), Some("7"));
    assert!(!report.has_failures());
    assert_eq!(UploadHistory::open(fixture.history_path()).count(), 2);
    assert!(uploader.client().is_authenticated());
    assert_eq!(uploader.history().map(UploadHistory::count), Some(2));
}

#[tokio::test]
async fn one_rejected_file_does_not_abort_siblings() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/api/v1/teams/42/imports")
        .with_status(200)
        .with_body(r#"{"id":"imp-1"}"#)
        .create_async()
        .await;
    let _rejected = server
        .mock("POST", "/api/v1/imports/imp-1/files")
        .match_body(Matcher::Regex(r#"filename="STR.edf""#.into()))
        .with_status(500)
        .create_async()
        .await;
    let _accepted = server
        .mock("POST", "/api/v1/imports/imp-1/files")
        .match_body(Matcher::Regex(r#"filename="BRP.edf""#.into()))
        .with_status(200)
        .create_async()
        .await;
    let process = server
        .mock("POST", "/api/v1/imports/imp-1/process_files")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let files = vec![
        fixture.mirror().join("STR.edf"),
        fixture.mirror().join("missing.edf"),
        fixture.changed().remove(0),
    ];
    let summary = client.upload_files(&files, Some(&fixture.mirror()), true).await;

    process.assert_async().await;
    assert_eq!(summary.counts(), (1, 2));
    assert_eq!(summary.uploaded, vec![fixture.changed().remove(0)]);
    assert!(summary.processing_triggered);
}

#[tokio::test]
async fn no_processing_when_every_file_fails() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/api/v1/teams/42/imports")
        .with_status(200)
        .with_body(r#"{"data":{"import_id":9}}"#)
        .create_async()
        .await;
    let _files = server
        .mock("POST", "/api/v1/imports/9/files")
        .with_status(422)
        .create_async()
        .await;
    let process = server
        .mock("POST", "/api/v1/imports/9/process_files")
        .expect(0)
        .create_async()
        .await;

    let mut uploader = Uploader::new(fixture.client(&server), None, UploadOptions::default());
    let request = SyncRequest {
        mirror_root: fixture.mirror(),
        changed_files: fixture.changed(),
        force: false,
    };
    let report = uploader.run(&request, &NoCredentials).await;

    process.assert_async().await;
    assert_eq!(
        report.status,
        RunStatus::Uploaded {
            processing_triggered: false
        }
    );
    assert_eq!(report.counts(), (0, 2));
    assert!(report.has_failures());
}

#[tokio::test]
async fn unauthorized_create_import_drops_stored_token() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/api/v1/teams/42/imports")
        .with_status(401)
        .create_async()
        .await;
    let files = server
        .mock("POST", Matcher::Regex("^/api/v1/imports/.*".into()))
        .expect(0)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    assert!(client.is_authenticated());

    let summary = client
        .upload_files(&[fixture.mirror().join("STR.edf")], Some(&fixture.mirror()), true)
        .await;

    files.assert_async().await;
    assert_eq!(summary.import_id, None);
    assert_eq!(summary.counts(), (0, 1));
    assert!(!client.is_authenticated());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn empty_change_set_contacts_nothing() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let any_post = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let any_get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut uploader = Uploader::new(fixture.client(&server), None, UploadOptions::default());
    let request = SyncRequest {
        mirror_root: fixture.mirror(),
        changed_files: Vec::new(),
        force: false,
    };
    let report = uploader
        .run(&request, &LoginCredentials::new("u", "p"))
        .await;

    any_post.assert_async().await;
    any_get.assert_async().await;
    assert_eq!(report.status, RunStatus::NothingChanged);
    assert_eq!(report.counts(), (0, 0));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn missing_credentials_fail_the_run_before_any_upload() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let any_post = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let any_get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut uploader = Uploader::new(fixture.client(&server), None, UploadOptions::default());
    let request = SyncRequest {
        mirror_root: fixture.mirror(),
        changed_files: fixture.changed(),
        force: false,
    };
    let report = uploader.run(&request, &NoCredentials).await;

    any_post.assert_async().await;
    any_get.assert_async().await;
    assert_eq!(report.status, RunStatus::AuthenticationFailed);
    assert!(report.has_failures());
}

#[tokio::test]
async fn float_token_lifetime_is_accepted() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let _token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"t","expires_in":7200.0}"#)
        .create_async()
        .await;
    let _teams = server
        .mock("GET", "/api/v1/teams")
        .with_status(200)
        .with_body(r#"[{"id":1}]"#)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let record = client
        .authenticate("u", &LoginCredentials::new("u", "p").password)
        .await
        .unwrap();

    assert!(client.is_authenticated());
    assert!(record.expires_at > unix_now() + 7000.0);
}

#[tokio::test]
async fn unauthorized_add_file_drops_stored_token() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _files = server
        .mock("POST", "/api/v1/imports/7/files")
        .with_status(401)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let err = client
        .add_file("7", &fixture.mirror().join("STR.edf"), Some(&fixture.mirror()))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!client.is_authenticated());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn unauthorized_process_import_drops_stored_token() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _process = server
        .mock("POST", "/api/v1/imports/7/process_files")
        .with_status(401)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let err = client.process_import("7").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!client.is_authenticated());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn unauthorized_team_listing_fails_authentication() {
    let fixture = Fixture::new();
    let mut server = Server::new_async().await;

    let _token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"t","expires_in":3600}"#)
        .create_async()
        .await;
    let _teams = server
        .mock("GET", "/api/v1/teams")
        .with_status(401)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let result = client
        .authenticate("u", &LoginCredentials::new("u", "p").password)
        .await;

    assert!(result.is_err());
    assert!(!client.is_authenticated());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn unauthorized_add_file_stops_the_batch() {
    let fixture = Fixture::new();
    fixture.store_valid_token();
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/api/v1/teams/42/imports")
        .with_status(200)
        .with_body(r#"{"id":5}"#)
        .create_async()
        .await;
    let files = server
        .mock("POST", "/api/v1/imports/5/files")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let process = server
        .mock("POST", "/api/v1/imports/5/process_files")
        .expect(0)
        .create_async()
        .await;

    let mut client = fixture.client(&server);
    let paths = vec![fixture.mirror().join("STR.edf"), fixture.changed().remove(0)];
    let summary = client.upload_files(&paths, Some(&fixture.mirror()), true).await;

    files.assert_async().await;
    process.assert_async().await;
    assert_eq!(summary.import_id.as_deref(), Some("5"));
    assert_eq!(summary.counts(), (0, 2));
    assert!(!summary.processing_triggered);
    assert!(!fixture.token_path().exists());
}
