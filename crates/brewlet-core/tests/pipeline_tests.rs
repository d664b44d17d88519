//! End-to-end pipeline runs against a local HTTP server.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use brewlet_core::io::download::{FetchPolicy, Fetcher};
use brewlet_core::verify::digest_hex;
use brewlet_core::{FailureKind, NullReporter, Pipeline, Stage};
use brewlet_schema::{Arch, ArtifactVariant, Checksum, DigestAlgorithm, HostArch, PackageDescriptor};
use mockito::{Server, ServerGuard};
use tempfile::TempDir;

const PUP_BINARY: &[u8] = b"\xcf\xfa\xed\xfe pup 0.3.2 mach-o stand-in";

struct TestContext {
    _root: TempDir,
    tmp_dir: PathBuf,
    lock_dir: PathBuf,
    target_dir: PathBuf,
    pipeline: Pipeline,
}

impl TestContext {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let tmp_dir = root.path().join("tmp");
        let lock_dir = root.path().join("locks");
        let target_dir = root.path().join("bin");

        let policy = FetchPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            backoff_factor: 2,
            attempt_timeout: Duration::from_secs(10),
        };
        let pipeline = Pipeline::with_fetcher(
            Fetcher::new(policy).unwrap(),
            tmp_dir.clone(),
            lock_dir.clone(),
            Arc::new(NullReporter),
        );

        Self {
            _root: root,
            tmp_dir,
            lock_dir,
            target_dir,
            pipeline,
        }
    }

    fn leftover_workdirs(&self) -> usize {
        match std::fs::read_dir(&self.tmp_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn sha1_of(bytes: &[u8]) -> Checksum {
    Checksum::sha1(&digest_hex(bytes, DigestAlgorithm::Sha1)).unwrap()
}

fn descriptor(server: &ServerGuard, path: &str, checksum: Checksum) -> PackageDescriptor {
    let url = format!("{}{path}", server.url());
    PackageDescriptor::new("pup", "0.3.2", vec![ArtifactVariant::new(Arch::Amd64, url, checksum)])
        .unwrap()
        .with_homepage("https://github.com/EricChiang/pup")
}

async fn serve(server: &mut ServerGuard, path: &str, body: Vec<u8>) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

fn amd64() -> HostArch {
    HostArch::Known(Arch::Amd64)
}

#[tokio::test]
async fn installs_binary_from_zip() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let mock = serve(&mut server, "/pup_darwin_amd64.zip", archive.clone()).await;
    let formula = descriptor(&server, "/pup_darwin_amd64.zip", sha1_of(&archive));

    let installed = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap();

    let target = ctx.target_dir.join("pup");
    assert_eq!(installed.path, target);
    assert_eq!(std::fs::read(&target).unwrap(), PUP_BINARY);
    assert_eq!(installed.sha256, digest_hex(PUP_BINARY, DigestAlgorithm::Sha256));
    assert_eq!(installed.size, PUP_BINARY.len() as u64);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    assert_eq!(ctx.leftover_workdirs(), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn binary_inside_top_level_directory_is_found() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup_0.3.2/README.md", b"docs"), ("pup_0.3.2/pup", PUP_BINARY)]);
    let _m = serve(&mut server, "/pup.zip", archive.clone()).await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(&archive));

    ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap();

    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), PUP_BINARY);
    assert!(!ctx.target_dir.join("README.md").exists());
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let _m = serve(&mut server, "/pup.zip", archive.clone()).await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(&archive));

    let first = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap();
    let second = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), PUP_BINARY);
}

#[tokio::test]
async fn checksum_mismatch_leaves_target_untouched() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let _m = serve(&mut server, "/pup.zip", archive).await;
    // Upstream recipe checksum, which the stand-in archive cannot match.
    let formula = descriptor(
        &server,
        "/pup.zip",
        Checksum::sha1("9d5ad4c0b78701b1868094bf630adbbd26ae1698").unwrap(),
    );

    std::fs::create_dir_all(&ctx.target_dir).unwrap();
    std::fs::write(ctx.target_dir.join("pup"), b"previous pup").unwrap();

    let err = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::IntegrityMismatch);
    assert_eq!(err.stage(), Stage::Verified);
    assert!(err.to_string().contains("9d5ad4c0b78701b1868094bf630adbbd26ae1698"));
    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), b"previous pup");
    assert_eq!(ctx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn traversal_archive_is_rejected() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY), ("../escaped", b"owned")]);
    let _m = serve(&mut server, "/evil.zip", archive.clone()).await;
    let formula = descriptor(&server, "/evil.zip", sha1_of(&archive));

    let err = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnsafeArchiveEntry);
    assert!(!ctx.target_dir.join("pup").exists());
    assert!(!ctx.target_dir.parent().unwrap().join("escaped").exists());
    assert_eq!(ctx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn archive_without_binary_fails_extraction() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("jq", b"not pup")]);
    let _m = serve(&mut server, "/pup.zip", archive.clone()).await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(&archive));

    let err = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnsafeArchiveEntry);
    assert_eq!(err.stage(), Stage::Extracted);
}

#[tokio::test]
async fn unsupported_architecture_makes_no_request() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/pup.zip")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(b"unused"));

    let err = ctx
        .pipeline
        .run(&formula, &HostArch::from_raw("armv7"), &ctx.target_dir)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnsupportedArchitecture);
    assert_eq!(err.stage(), Stage::Resolved);
    assert!(!ctx.tmp_dir.exists());
    mock.assert_async().await;
}

#[tokio::test]
async fn fallback_variant_serves_hosts_without_their_own_build() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let x86_mock = serve(&mut server, "/pup_darwin_386.zip", archive.clone()).await;

    let formula = PackageDescriptor::new(
        "pup",
        "0.3.2",
        vec![ArtifactVariant::new(
            Arch::X86,
            format!("{}/pup_darwin_386.zip", server.url()),
            sha1_of(&archive),
        )],
    )
    .unwrap()
    .with_fallback(Arch::X86)
    .unwrap();

    ctx.pipeline
        .run(&formula, &amd64(), &ctx.target_dir)
        .await
        .unwrap();

    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), PUP_BINARY);
    x86_mock.assert_async().await;
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_target_keeps_previous_binary() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let _m = serve(&mut server, "/pup.zip", archive.clone()).await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(&archive));

    std::fs::create_dir_all(&ctx.target_dir).unwrap();
    std::fs::write(ctx.target_dir.join("pup"), b"previous pup").unwrap();
    std::fs::set_permissions(&ctx.target_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore directory permissions.
    if std::fs::write(ctx.target_dir.join(".writable"), b"").is_ok() {
        std::fs::set_permissions(&ctx.target_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await;
    std::fs::set_permissions(&ctx.target_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    let err = result.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Install);
    assert_eq!(err.stage(), Stage::Installed);
    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), b"previous pup");
    let names: Vec<_> = std::fs::read_dir(&ctx.target_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("pup")]);
    assert_eq!(ctx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn missing_artifact_is_a_fetch_error() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/pup.zip")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let formula = descriptor(&server, "/pup.zip", sha1_of(b"unused"));

    let err = ctx.pipeline.run(&formula, &amd64(), &ctx.target_dir).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Fetch);
    assert_eq!(err.stage(), Stage::Fetched);
    assert!(!ctx.target_dir.join("pup").exists());
    assert_eq!(ctx.leftover_workdirs(), 0);
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_installs_to_same_target_end_complete() {
    let ctx = Arc::new(TestContext::new());
    let mut server = Server::new_async().await;
    let archive = zip_of(&[("pup", PUP_BINARY)]);
    let _m = serve(&mut server, "/pup.zip", archive.clone()).await;
    let formula = Arc::new(descriptor(&server, "/pup.zip", sha1_of(&archive)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (ctx, formula) = (ctx.clone(), formula.clone());
            tokio::spawn(async move {
                ctx.pipeline
                    .run(&formula, &amd64(), &ctx.target_dir)
                    .await
                    .map(|installed| installed.sha256)
            })
        })
        .collect();

    for handle in handles {
        let sha = handle.await.unwrap().unwrap();
        assert_eq!(sha, digest_hex(PUP_BINARY, DigestAlgorithm::Sha256));
    }

    assert_eq!(std::fs::read(ctx.target_dir.join("pup")).unwrap(), PUP_BINARY);
    let stray: Vec<_> = std::fs::read_dir(&ctx.target_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != "pup")
        .collect();
    assert!(stray.is_empty());
    assert!(ctx.lock_dir.exists());
    assert_eq!(ctx.leftover_workdirs(), 0);
}

#[test]
fn plan_only_resolves() {
    let ctx = TestContext::new();
    let formula = PackageDescriptor::new(
        "pup",
        "0.3.2",
        vec![ArtifactVariant::new(
            Arch::X86,
            "https://github.com/EricChiang/pup/releases/download/v0.3.2/pup_darwin_386.zip",
            Checksum::sha1("21487bc5abdac34021f25444ab481e267bccbd72").unwrap(),
        )],
    )
    .unwrap();

    let plan = ctx
        .pipeline
        .plan(&formula, &HostArch::Known(Arch::X86), Path::new("/usr/local/bin"))
        .unwrap();

    assert!(plan.variant().url().ends_with("pup_darwin_386.zip"));
    assert_eq!(plan.target(), Path::new("/usr/local/bin/pup"));
    assert!(!ctx.tmp_dir.exists());
}
