//! 对象存储操作模块
//!
//! 部署流程只通过 `ObjectStore` 与存储服务交互，`S3ObjectStore` 是基于
//! `aws_sdk_s3` 的实现。

use crate::config::UploadOptions;
use crate::error::StorageError;
use crate::s3::multipart;
use crate::utils::path::guess_content_type;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketCannedAcl, ErrorDocument, IndexDocument, WebsiteConfiguration};
use std::path::Path;
use tracing::debug;

/// 默认的索引文件名
pub const INDEX_FILE: &str = "index.html";

/// 静态网站托管配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    /// 目录请求使用的索引文档后缀
    pub index_document: String,
    /// 找不到对象时返回的错误文档
    pub error_document: String,
}

impl WebsiteConfig {
    /// 单页应用配置：索引文档和错误文档都是 `index.html`，
    /// 所有路由都回退到应用入口。
    pub fn single_page_app() -> Self {
        Self {
            index_document: INDEX_FILE.to_string(),
            error_document: INDEX_FILE.to_string(),
        }
    }
}

/// 部署所需的对象存储操作
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 创建公共读的存储桶
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// 设置存储桶的静态网站托管配置
    async fn put_bucket_website(
        &self,
        bucket: &str,
        website: &WebsiteConfig,
    ) -> Result<(), StorageError>;

    /// 上传本地文件到指定键，已存在的对象会被覆盖
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<(), StorageError>;
}

/// 基于 S3 兼容接口的对象存储
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .send()
            .await?;
        Ok(())
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        website: &WebsiteConfig,
    ) -> Result<(), StorageError> {
        let index_document = IndexDocument::builder()
            .suffix(&website.index_document)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let error_document = ErrorDocument::builder()
            .key(&website.error_document)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let configuration = WebsiteConfiguration::builder()
            .index_document(index_document)
            .error_document(error_document)
            .build();

        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(configuration)
            .send()
            .await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let content_type = guess_content_type(key);

        if size > options.part_size {
            return multipart::upload_multipart(
                &self.client,
                bucket,
                key,
                path,
                size,
                &content_type,
                options,
            )
            .await;
        }

        debug!(key, size, content_type = %content_type, "简单上传");
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await?;
        Ok(())
    }
}
