//! 部署流程模块
//!
//! 按顺序执行：确保存储桶存在、配置静态网站托管、上传构建目录中的所有文件，
//! 最后输出汇总信息。除配置错误外，任何一步失败都只会被报告，流程继续执行。

use crate::config::{DeployTarget, UploadOptions};
use crate::error::StorageError;
use crate::s3::{ObjectStore, WebsiteConfig};
use crate::utils::path::object_key;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// 对象键（相对根目录、以 `/` 分隔的路径）
    pub key: String,
    /// 本地路径
    pub path: PathBuf,
}

/// 存储桶创建结果
#[derive(Debug)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
    Failed(StorageError),
}

/// 单个文件的上传结果
#[derive(Debug)]
pub struct UploadResult {
    pub key: String,
    pub error: Option<StorageError>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 一次部署的汇总
#[derive(Debug)]
pub struct DeployReport {
    pub bucket: BucketStatus,
    /// 配置静态网站托管失败时的错误
    pub website_error: Option<StorageError>,
    pub uploads: Vec<UploadResult>,
}

impl DeployReport {
    /// 成功上传的文件数
    pub fn uploaded(&self) -> usize {
        self.uploads.iter().filter(|r| r.is_success()).count()
    }

    /// 上传失败的文件
    pub fn failures(&self) -> impl Iterator<Item = &UploadResult> {
        self.uploads.iter().filter(|r| !r.is_success())
    }
}

/// 递归收集目录下的所有常规文件。
///
/// 同一目录下按文件名排序；不会进入符号链接指向的目录，无法读取的目录项会被跳过。
/// 目录不存在时返回空列表。
///
/// # 参数
///
/// * `root` - 构建目录
pub fn collect_files(root: &Path) -> Vec<LocalFile> {
    if !root.is_dir() {
        warn!(root = %root.display(), "构建目录不存在或不是目录");
        return Vec::new();
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "跳过无法读取的目录项");
                None
            }
        })
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let key = object_key(root, entry.path())?;
            Some(LocalFile {
                key,
                path: entry.into_path(),
            })
        })
        .collect()
}

/// 部署器
///
/// `S` 是对象存储实现，`W` 是进度输出（通常为标准输出）。
pub struct Deployer<S, W> {
    store: S,
    target: DeployTarget,
    upload: UploadOptions,
    out: W,
}

impl<S, W> Deployer<S, W>
where
    S: ObjectStore,
    W: Write,
{
    pub fn new(store: S, target: DeployTarget, upload: UploadOptions, out: W) -> Self {
        Self {
            store,
            target,
            upload,
            out,
        }
    }

    /// 执行完整的部署流程。
    ///
    /// # Errors
    ///
    /// 只有写入进度输出失败时才返回错误；存储服务的错误都记录在
    /// `DeployReport` 中。
    pub async fn run(mut self) -> io::Result<DeployReport> {
        info!(bucket = %self.target.bucket, region = %self.target.region, "开始部署");

        let bucket = self.ensure_bucket().await?;
        let website_error = self.configure_website().await?;
        let uploads = self.upload_tree().await?;

        let report = DeployReport {
            bucket,
            website_error,
            uploads,
        };

        writeln!(self.out)?;
        writeln!(self.out, "✓ 部署完成！共上传 {} 个文件", report.uploaded())?;
        writeln!(self.out, "访问地址: {}", self.target.website_url())?;

        info!(
            uploaded = report.uploaded(),
            failed = report.failures().count(),
            "部署结束"
        );
        Ok(report)
    }

    /// 创建存储桶；已存在视为成功。
    pub async fn ensure_bucket(&mut self) -> io::Result<BucketStatus> {
        let bucket = &self.target.bucket;
        let status = match self.store.create_bucket(bucket).await {
            Ok(()) => {
                writeln!(self.out, "✓ 创建 Bucket: {bucket}")?;
                BucketStatus::Created
            }
            Err(err) if err.is_bucket_already_exists() => {
                writeln!(self.out, "✓ Bucket 已存在: {bucket}")?;
                BucketStatus::AlreadyExists
            }
            Err(err) => {
                warn!(bucket = %bucket, error = %err, "创建 Bucket 失败");
                writeln!(self.out, "创建 Bucket 失败: {err}")?;
                BucketStatus::Failed(err)
            }
        };
        Ok(status)
    }

    /// 配置单页应用的静态网站托管，返回失败时的错误。
    pub async fn configure_website(&mut self) -> io::Result<Option<StorageError>> {
        let website = WebsiteConfig::single_page_app();
        match self
            .store
            .put_bucket_website(&self.target.bucket, &website)
            .await
        {
            Ok(()) => {
                writeln!(self.out, "✓ 配置静态网站托管")?;
                Ok(None)
            }
            Err(err) => {
                warn!(bucket = %self.target.bucket, error = %err, "配置静态网站失败");
                writeln!(self.out, "配置静态网站失败: {err}")?;
                Ok(Some(err))
            }
        }
    }

    /// 逐个上传构建目录中的文件，单个文件失败不影响后续文件。
    pub async fn upload_tree(&mut self) -> io::Result<Vec<UploadResult>> {
        let files = collect_files(&self.target.source_dir);
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            let result = self
                .store
                .upload_file(&self.target.bucket, &file.key, &file.path, &self.upload)
                .await;

            let error = match result {
                Ok(()) => {
                    writeln!(self.out, "✓ 上传: {}", file.key)?;
                    None
                }
                Err(err) => {
                    warn!(key = %file.key, error = %err, "上传失败");
                    writeln!(self.out, "✗ 上传失败 {}: {err}", file.key)?;
                    Some(err)
                }
            };
            results.push(UploadResult {
                key: file.key,
                error,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::store::MockObjectStore;
    use std::fs;
    use tempfile::TempDir;

    /// 创建包含给定文件的临时构建目录
    fn dist(files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn target(dir: &Path) -> DeployTarget {
        DeployTarget {
            source_dir: dir.to_path_buf(),
            ..DeployTarget::default()
        }
    }

    fn service_error(code: &str) -> StorageError {
        StorageError::Service {
            code: code.to_string(),
            message: "mock".to_string(),
        }
    }

    /// 桶和网站配置都成功的 mock
    fn healthy_store() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_create_bucket().times(1).returning(|_| Ok(()));
        store
            .expect_put_bucket_website()
            .times(1)
            .returning(|_, _| Ok(()));
        store
    }

    async fn run(store: MockObjectStore, target: DeployTarget) -> (DeployReport, String) {
        let mut out = Vec::new();
        let report = Deployer::new(store, target, UploadOptions::default(), &mut out)
            .run()
            .await
            .unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_collect_files_nested() {
        let dir = dist(&["index.html", "assets/app.js", "assets/img/logo.png"]);
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let keys: Vec<_> = collect_files(dir.path())
            .into_iter()
            .map(|file| file.key)
            .collect();

        assert_eq!(keys, ["assets/app.js", "assets/img/logo.png", "index.html"]);
    }

    #[test]
    fn test_collect_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_files(&dir.path().join("dist")).is_empty());
    }

    #[tokio::test]
    async fn test_deploy_example_dist() {
        let dir = dist(&["index.html", "assets/app.js"]);
        let mut store = healthy_store();
        store
            .expect_upload_file()
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let (report, output) = run(store, target(dir.path())).await;

        let keys: Vec<_> = report.uploads.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["assets/app.js", "index.html"]);
        assert_eq!(report.uploaded(), 2);
        assert!(matches!(report.bucket, BucketStatus::Created));
        assert!(report.website_error.is_none());

        assert!(output.contains("✓ 创建 Bucket: soulmirror-web-20250225"));
        assert!(output.contains("✓ 配置静态网站托管"));
        assert!(output.contains("✓ 上传: index.html"));
        assert!(output.contains("✓ 上传: assets/app.js"));
        assert!(output.contains("\n✓ 部署完成！共上传 2 个文件\n"));
        assert!(output.ends_with(
            "访问地址: http://soulmirror-web-20250225.cos-website.ap-guangzhou.myqcloud.com\n"
        ));
    }

    #[tokio::test]
    async fn test_bucket_already_exists_is_benign() {
        for code in ["BucketAlreadyExists", "BucketAlreadyOwnedByYou"] {
            let dir = dist(&["index.html"]);
            let mut store = MockObjectStore::new();
            store
                .expect_create_bucket()
                .times(1)
                .returning(move |_| Err(service_error(code)));
            store
                .expect_put_bucket_website()
                .times(1)
                .returning(|_, _| Ok(()));
            store
                .expect_upload_file()
                .times(1)
                .returning(|_, _, _, _| Ok(()));

            let (report, output) = run(store, target(dir.path())).await;

            assert!(matches!(report.bucket, BucketStatus::AlreadyExists));
            assert!(output.contains("✓ Bucket 已存在: soulmirror-web-20250225"));
            assert!(!output.contains("创建 Bucket 失败"));
            assert_eq!(report.uploaded(), 1);
        }
    }

    #[tokio::test]
    async fn test_bucket_failure_continues() {
        let dir = dist(&["index.html"]);
        let mut store = MockObjectStore::new();
        store
            .expect_create_bucket()
            .times(1)
            .returning(|_| Err(service_error("AccessDenied")));
        store
            .expect_put_bucket_website()
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_upload_file()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let (report, output) = run(store, target(dir.path())).await;

        assert!(matches!(report.bucket, BucketStatus::Failed(_)));
        assert!(output.contains("创建 Bucket 失败: AccessDenied: mock"));
        assert_eq!(report.uploaded(), 1);
    }

    #[tokio::test]
    async fn test_website_config_uses_index_for_both_documents() {
        let dir = dist(&[]);
        let mut store = MockObjectStore::new();
        store.expect_create_bucket().returning(|_| Ok(()));
        store
            .expect_put_bucket_website()
            .withf(|bucket, website| {
                bucket == "soulmirror-web-20250225"
                    && website.index_document == "index.html"
                    && website.error_document == "index.html"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_upload_file().never();

        let (report, output) = run(store, target(dir.path())).await;

        assert!(report.uploads.is_empty());
        assert!(output.contains("共上传 0 个文件"));
    }

    #[tokio::test]
    async fn test_website_failure_continues() {
        let dir = dist(&["index.html"]);
        let mut store = MockObjectStore::new();
        store.expect_create_bucket().returning(|_| Ok(()));
        store
            .expect_put_bucket_website()
            .times(1)
            .returning(|_, _| Err(StorageError::Request("timeout".into())));
        store
            .expect_upload_file()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let (report, output) = run(store, target(dir.path())).await;

        assert!(report.website_error.is_some());
        assert!(output.contains("配置静态网站失败: timeout"));
        assert!(output.contains("✓ 上传: index.html"));
    }

    #[tokio::test]
    async fn test_partial_upload_failures() {
        let dir = dist(&[
            "index.html",
            "assets/app.js",
            "assets/app.js.map",
            "assets/vendor.js",
            "assets/vendor.js.map",
        ]);
        let mut store = healthy_store();
        store
            .expect_upload_file()
            .times(5)
            .returning(|_, key, _, _| {
                if key.ends_with(".map") {
                    Err(service_error("EntityTooLarge"))
                } else {
                    Ok(())
                }
            });

        let (report, output) = run(store, target(dir.path())).await;

        assert_eq!(report.uploads.len(), 5);
        assert_eq!(report.uploaded(), 3);
        let failed: Vec<_> = report.failures().map(|r| r.key.as_str()).collect();
        assert_eq!(failed, ["assets/app.js.map", "assets/vendor.js.map"]);

        assert!(output.contains("✗ 上传失败 assets/app.js.map: EntityTooLarge: mock"));
        assert!(output.contains("✗ 上传失败 assets/vendor.js.map: EntityTooLarge: mock"));
        assert!(output.contains("✓ 部署完成！共上传 3 个文件"));
    }

    #[tokio::test]
    async fn test_upload_passes_local_path_and_options() {
        let dir = dist(&["nested/deep/page.html"]);
        let expected = dir.path().join("nested").join("deep").join("page.html");
        let mut store = healthy_store();
        store
            .expect_upload_file()
            .withf(move |bucket, key, path, options| {
                bucket == "soulmirror-web-20250225"
                    && key == "nested/deep/page.html"
                    && path == expected
                    && *options == UploadOptions::default()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let (report, _) = run(store, target(dir.path())).await;
        assert_eq!(report.uploaded(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_dir_still_configures_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = healthy_store();
        store.expect_upload_file().never();

        let (report, output) = run(store, target(&dir.path().join("dist"))).await;

        assert_eq!(report.uploaded(), 0);
        assert!(output.contains("✓ 配置静态网站托管"));
        assert!(output.contains("共上传 0 个文件"));
    }
}
