use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use refresh_core::{
    CycleOutcome, DownloadOutcome, ErrorCode, Notification, NotificationChannel,
    NotificationReceiver, Transport, TransportError, TransportResponse, UpdateSession, Updater,
    UpdaterOptions, VersionDescriptor,
};

const METADATA_URL: &str = "https://json.test/o/r/v1/package.json";
const ARCHIVE_URL: &str = "https://content.test/o/r/zip/v1";

#[derive(Default)]
struct FakeTransport {
    routes: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn route(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(url.to_string(), body.into());
        self
    }

    fn requests_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .iter()
            .filter(|requested| *requested == url)
            .count()
    }

    fn total_requests(&self) -> usize {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .push(url.to_string());
        let Some(body) = self.routes.get(url) else {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            });
        };
        let chunks: Vec<Result<Vec<u8>, TransportError>> =
            body.chunks(64).map(|chunk| Ok(chunk.to_vec())).collect();
        Ok(TransportResponse {
            content_length: Some(body.len() as u64),
            body: futures_util::stream::iter(chunks).boxed(),
        })
    }
}

fn repo_archive() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer
        .add_directory("r-v1/", options)
        .expect("root directory entry should be written");
    writer
        .start_file("r-v1/updatedfile.js", options)
        .expect("file entry should be started");
    writer
        .write_all(&b"// updated\n".repeat(40))
        .expect("file entry should be written");
    writer
        .start_file("r-v1/package.json", options)
        .expect("descriptor entry should be started");
    writer
        .write_all(br#"{"version": "0.1.0", "auto-updater": {"repo": "o/r", "branch": "v1"}}"#)
        .expect("descriptor entry should be written");
    writer
        .finish()
        .expect("zip archive should be finalized")
        .into_inner()
}

fn write_local_descriptor(root: &Path, body: &str) {
    std::fs::write(root.join("package.json"), body).expect("local descriptor should be written");
}

fn local_descriptor(root: &Path) {
    write_local_descriptor(
        root,
        r#"{
            "version": "0.0.4",
            "auto-updater": {"repo": "o/r", "branch": "v1"},
            "dependencies": {"adm-zip": "*", "underscore": "^0.8.3"}
        }"#,
    );
}

const REMOTE_DESCRIPTOR: &str = r#"{
    "version": "0.1.0",
    "auto-updater": {"repo": "o/r", "branch": "v1"},
    "dependencies": {"adm-zip": "*", "node-promise": "^0.5.12", "underscore": "^1.8.3"}
}"#;

fn options(root: &Path, autoupdate: bool) -> UpdaterOptions {
    UpdaterOptions {
        root: root.to_path_buf(),
        autoupdate,
        jsonhost: "json.test".to_string(),
        contenthost: "content.test".to_string(),
        ..UpdaterOptions::default()
    }
}

fn updater(
    options: UpdaterOptions,
    transport: &Arc<FakeTransport>,
) -> (Updater<Arc<FakeTransport>>, NotificationReceiver) {
    let (channel, receiver) = NotificationChannel::new();
    let updater =
        Updater::new(options, Arc::clone(transport), channel).expect("options should be valid");
    (updater, receiver)
}

fn drain(receiver: &mut NotificationReceiver) -> Vec<Notification> {
    std::iter::from_fn(|| receiver.try_recv().ok()).collect()
}

/// Notification names with consecutive progress notifications collapsed.
fn names(notifications: &[Notification]) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = notifications.iter().map(Notification::name).collect();
    names.dedup_by(|a, b| *a == "download.progress" && *b == "download.progress");
    names
}

fn full_transport() -> Arc<FakeTransport> {
    Arc::new(
        FakeTransport::default()
            .route(METADATA_URL, REMOTE_DESCRIPTOR)
            .route(ARCHIVE_URL, repo_archive()),
    )
}

#[tokio::test]
async fn autoupdate_runs_the_whole_cycle() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), true), &transport);

    let outcome = updater.check().await.expect("cycle should succeed");

    assert!(matches!(outcome, CycleOutcome::Installed(report) if report.files_written == 2));
    let notifications = drain(&mut receiver);
    assert_eq!(
        notifications.first(),
        Some(&Notification::OutOfDate {
            local: "0.0.4".to_string(),
            remote: "0.1.0".to_string(),
        })
    );
    assert_eq!(
        names(&notifications),
        vec![
            "check.out-dated",
            "download.start",
            "download.progress",
            "download.end",
            "update.downloaded",
            "update.extracted",
            "cycle-complete",
        ]
    );

    let last_progress = notifications
        .iter()
        .rev()
        .find_map(|notification| match notification {
            Notification::DownloadProgress(progress) => Some(progress.clone()),
            _ => None,
        })
        .expect("progress should be reported");
    assert_eq!(last_progress.name, "update-0.1.0.zip");
    assert_eq!(last_progress.percent, Some(100.0));

    assert!(temp.path().join("updatedfile.js").is_file());
    assert!(!temp.path().join("update-0.1.0.zip").exists());
    assert!(!temp.path().join("_update-0.1.0.zip").exists());
    let installed = refresh_core::load_local(&temp.path().join("package.json"))
        .await
        .expect("installed descriptor should load");
    assert_eq!(installed.version, "0.1.0");
}

#[tokio::test]
async fn manual_stages_wait_for_the_caller() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), false), &transport);

    let outcome = updater.check().await.expect("check should succeed");
    assert_eq!(
        outcome,
        CycleOutcome::OutOfDate {
            local: "0.0.4".to_string(),
            remote: "0.1.0".to_string(),
        }
    );
    assert_eq!(names(&drain(&mut receiver)), vec!["check.out-dated"]);
    assert_eq!(transport.requests_to(ARCHIVE_URL), 0);

    let outcome = updater.download().await.expect("download should succeed");
    assert_eq!(outcome, CycleOutcome::Downloaded(DownloadOutcome::Downloaded));
    assert!(temp.path().join("update-0.1.0.zip").is_file());
    assert_eq!(
        names(&drain(&mut receiver)),
        vec![
            "download.start",
            "download.progress",
            "download.end",
            "update.downloaded",
        ]
    );

    let report = updater.install().await.expect("install should succeed");
    assert_eq!(report.files_written, 2);
    assert_eq!(
        names(&drain(&mut receiver)),
        vec!["update.extracted", "cycle-complete"]
    );
}

#[tokio::test]
async fn repeated_download_does_not_refetch() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), false), &transport);

    updater.check().await.expect("check should succeed");
    updater.download().await.expect("first download should succeed");
    drain(&mut receiver);

    let outcome = updater.download().await.expect("second download should succeed");

    assert_eq!(
        outcome,
        CycleOutcome::Downloaded(DownloadOutcome::AlreadyPresent)
    );
    assert_eq!(transport.requests_to(ARCHIVE_URL), 1);
    assert_eq!(names(&drain(&mut receiver)), vec!["update.not-installed"]);
}

#[tokio::test]
async fn matching_versions_complete_without_download() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = Arc::new(FakeTransport::default().route(
        METADATA_URL,
        r#"{"version": "0.0.4", "auto-updater": {"repo": "o/r", "branch": "v1"}}"#,
    ));
    let (mut updater, mut receiver) = updater(options(temp.path(), true), &transport);

    let outcome = updater.check().await.expect("check should succeed");

    assert_eq!(
        outcome,
        CycleOutcome::UpToDate {
            version: "0.0.4".to_string(),
        }
    );
    assert_eq!(
        names(&drain(&mut receiver)),
        vec!["check.up-to-date", "cycle-complete"]
    );
    assert_eq!(transport.requests_to(ARCHIVE_URL), 0);
}

#[tokio::test]
async fn dev_checkout_short_circuits_before_any_request() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    std::fs::create_dir(temp.path().join(".git")).expect("git marker should be created");
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), true), &transport);

    let outcome = updater.check().await.expect("check should succeed");

    assert_eq!(outcome, CycleOutcome::DevCheckout);
    assert_eq!(
        drain(&mut receiver),
        vec![Notification::DevCheckoutDetected]
    );
    assert_eq!(transport.total_requests(), 0);
    assert_eq!(updater.session().has_git_checkout(), Some(true));
}

#[tokio::test]
async fn dev_checkout_is_ignored_when_check_git_is_off() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    std::fs::create_dir(temp.path().join(".git")).expect("git marker should be created");
    let transport = full_transport();
    let options = UpdaterOptions {
        check_git: false,
        ..options(temp.path(), false)
    };
    let (mut updater, _receiver) = updater(options, &transport);

    let outcome = updater.check().await.expect("check should succeed");

    assert!(matches!(outcome, CycleOutcome::OutOfDate { .. }));
    assert_eq!(transport.requests_to(METADATA_URL), 1);
}

#[tokio::test]
async fn unreadable_local_descriptor_ends_the_cycle() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), true), &transport);

    let error = updater.check().await.expect_err("missing descriptor should fail");

    assert_eq!(error.code(), ErrorCode::DescriptorRead);
    let notifications = drain(&mut receiver);
    assert_eq!(names(&notifications), vec!["error"]);
    assert!(matches!(
        notifications.last(),
        Some(Notification::Error { code: ErrorCode::DescriptorRead, .. })
    ));
    assert_eq!(transport.total_requests(), 0);
}

#[tokio::test]
async fn missing_update_source_is_a_format_error() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    write_local_descriptor(temp.path(), r#"{"version": "0.0.4"}"#);
    let transport = full_transport();
    let (mut updater, _receiver) = updater(options(temp.path(), true), &transport);

    let error = updater.check().await.expect_err("source is required");

    assert_eq!(error.code(), ErrorCode::DescriptorFormat);
    assert_eq!(transport.total_requests(), 0);
}

#[tokio::test]
async fn unreachable_and_garbled_remotes_are_distinguished() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());

    let unreachable = Arc::new(FakeTransport::default());
    let (mut updater_a, _rx_a) = updater(options(temp.path(), true), &unreachable);
    let error = updater_a.check().await.expect_err("remote is unreachable");
    assert_eq!(error.code(), ErrorCode::Download);

    let garbled = Arc::new(FakeTransport::default().route(METADATA_URL, "404: Not Found"));
    let (mut updater_b, _rx_b) = updater(options(temp.path(), true), &garbled);
    let error = updater_b.check().await.expect_err("remote is garbage");
    assert_eq!(error.code(), ErrorCode::DescriptorFormat);
}

#[tokio::test]
async fn corrupt_archive_keeps_the_download() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = Arc::new(
        FakeTransport::default()
            .route(METADATA_URL, REMOTE_DESCRIPTOR)
            .route(ARCHIVE_URL, b"definitely not a zip".to_vec()),
    );
    let (mut updater, mut receiver) = updater(options(temp.path(), true), &transport);

    let error = updater.check().await.expect_err("corrupt archive should fail");

    assert_eq!(error.code(), ErrorCode::ArchiveFormat);
    assert!(temp.path().join("update-0.1.0.zip").is_file());
    let notifications = drain(&mut receiver);
    assert_eq!(notifications.last().map(Notification::name), Some("error"));
    assert!(
        !notifications
            .iter()
            .any(|notification| *notification == Notification::CycleComplete)
    );
}

#[tokio::test]
async fn stages_require_a_checked_session() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), false), &transport);

    let download = updater.download().await.expect_err("nothing to download yet");
    assert_eq!(download.code(), ErrorCode::Precondition);
    let install = updater.install().await.expect_err("nothing to install yet");
    assert_eq!(install.code(), ErrorCode::Precondition);
    let diff = updater
        .diff_dependencies()
        .expect_err("descriptors are not loaded");
    assert_eq!(diff.code(), ErrorCode::Precondition);

    assert_eq!(names(&drain(&mut receiver)), vec!["error", "error", "error"]);
    assert_eq!(transport.total_requests(), 0);
}

#[tokio::test]
async fn dependency_diff_after_check() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let (mut updater, _receiver) = updater(options(temp.path(), false), &transport);

    updater.check().await.expect("check should succeed");
    let diff: Vec<String> = updater
        .diff_dependencies()
        .expect("diff should compute")
        .into_iter()
        .collect();

    assert_eq!(diff, vec!["node-promise".to_string(), "underscore".to_string()]);
}

#[tokio::test]
async fn silent_updater_still_does_the_work() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let options = UpdaterOptions {
        silent: true,
        ..options(temp.path(), true)
    };
    let (mut updater, mut receiver) = updater(options, &transport);

    updater.check().await.expect("cycle should succeed");

    assert!(drain(&mut receiver).is_empty());
    assert!(temp.path().join("updatedfile.js").is_file());
}

#[tokio::test]
async fn resumed_session_installs_an_existing_archive() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    std::fs::write(temp.path().join("update-0.1.1.zip"), repo_archive())
        .expect("archive should be written");
    let local = VersionDescriptor::parse(
        br#"{"version": "0.0.4", "auto-updater": {"repo": "o/r", "branch": "v1"}}"#,
    )
    .expect("local descriptor should parse");
    let remote = VersionDescriptor::parse(br#"{"version": "0.1.1"}"#)
        .expect("remote descriptor should parse");
    let session =
        UpdateSession::with_descriptors(local, remote).expect("session should be created");

    let transport = Arc::new(FakeTransport::default());
    let (updater, mut receiver) = updater(options(temp.path(), false), &transport);
    let mut updater = updater.with_session(session);

    updater.install().await.expect("install should succeed");

    assert!(temp.path().join("updatedfile.js").is_file());
    assert!(!temp.path().join("update-0.1.1.zip").exists());
    assert_eq!(
        names(&drain(&mut receiver)),
        vec!["update.extracted", "cycle-complete"]
    );
    assert_eq!(transport.total_requests(), 0);
}

#[tokio::test]
async fn install_waits_for_the_archive() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    local_descriptor(temp.path());
    let transport = full_transport();
    let (mut updater, mut receiver) = updater(options(temp.path(), false), &transport);

    updater.check().await.expect("check should succeed");
    drain(&mut receiver);

    let error = updater.install().await.expect_err("archive is not downloaded yet");

    assert_eq!(error.code(), ErrorCode::Precondition);
    assert_eq!(names(&drain(&mut receiver)), vec!["error"]);
    assert_eq!(transport.requests_to(ARCHIVE_URL), 0);
    assert!(!temp.path().join("updatedfile.js").exists());
}

#[tokio::test]
async fn devmode_does_not_change_a_failing_cycle() {
    let mut runs = Vec::new();
    for devmode in [false, true] {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        local_descriptor(temp.path());
        let transport = Arc::new(
            FakeTransport::default()
                .route(METADATA_URL, REMOTE_DESCRIPTOR)
                .route(ARCHIVE_URL, b"definitely not a zip".to_vec()),
        );
        let options = UpdaterOptions {
            devmode,
            ..options(temp.path(), true)
        };
        let (mut updater, mut receiver) = updater(options, &transport);

        let error = updater.check().await.expect_err("corrupt archive should fail");

        let notifications = drain(&mut receiver);
        assert_eq!(notifications.last().map(Notification::name), Some("error"));
        runs.push((
            error.code(),
            names(&notifications),
            transport.total_requests(),
            temp.path().join("update-0.1.0.zip").is_file(),
        ));
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].0, ErrorCode::ArchiveFormat);
}
