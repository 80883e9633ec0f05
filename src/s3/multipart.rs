//! S3分块上传模块
//!
//! 单个大文件按固定分块大小切分，同时最多有 `max_threads` 个分块在上传。

use crate::config::{MAX_THREADS_LIMIT, UploadOptions};
use crate::error::StorageError;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// 单次分块上传允许的最大分块数
const MAX_PARTS: u64 = 10_000;

/// 文件中的一个分块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 分块编号，从 1 开始
    pub number: i32,
    pub offset: u64,
    pub length: u64,
}

/// 将文件切分为分块。
///
/// 分块数超过服务端上限时会放大分块大小。
///
/// # 参数
///
/// * `size` - 文件大小（字节）
/// * `part_size` - 期望的分块大小（字节）
pub fn plan_parts(size: u64, part_size: u64) -> Vec<PartRange> {
    let part_size = part_size.max(size.div_ceil(MAX_PARTS)).max(1);

    (0..size.div_ceil(part_size))
        .map(|index| {
            let offset = index * part_size;
            PartRange {
                number: index as i32 + 1,
                offset,
                length: part_size.min(size - offset),
            }
        })
        .collect()
}

/// 同时进行的分块数，限制在 `[1, MAX_THREADS_LIMIT]` 内
pub fn part_concurrency(max_threads: usize) -> usize {
    max_threads.clamp(1, MAX_THREADS_LIMIT as usize)
}

/// 以分块方式上传文件。
///
/// 任一分块失败或合并失败时会中止本次分块上传，并返回第一个错误。
pub async fn upload_multipart(
    client: &Client,
    bucket: &str,
    key: &str,
    path: &Path,
    size: u64,
    content_type: &str,
    options: &UploadOptions,
) -> Result<(), StorageError> {
    let created = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .content_type(content_type)
        .send()
        .await?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| StorageError::Request("CreateMultipartUpload 未返回 UploadId".into()))?
        .to_string();

    debug!(key, size, upload_id = %upload_id, "开始分块上传");

    let result = upload_and_complete(client, bucket, key, &upload_id, path, size, options).await;
    if result.is_err() {
        if let Err(err) = client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .send()
            .await
        {
            warn!(key, upload_id = %upload_id, error = %StorageError::from(err), "中止分块上传失败");
        }
    }
    result
}

async fn upload_and_complete(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    path: &Path,
    size: u64,
    options: &UploadOptions,
) -> Result<(), StorageError> {
    let semaphore = Arc::new(Semaphore::new(part_concurrency(options.max_threads)));
    let mut tasks = JoinSet::new();
    let mut completed = Vec::new();

    for part in plan_parts(size, options.part_size) {
        // 已经失败的分块让后续分块不再发出
        while let Some(joined) = tasks.try_join_next() {
            completed.push(flatten(joined)?);
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let client = client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        let path = path.to_path_buf();
        tasks.spawn(async move {
            let _permit = permit;
            upload_part(&client, &bucket, &key, &upload_id, &path, part).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        completed.push(flatten(joined)?);
    }

    completed.sort_by_key(|part| part.part_number());
    debug!(key, parts = completed.len(), "合并分块");

    client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(completed))
                .build(),
        )
        .send()
        .await?;
    Ok(())
}

async fn upload_part(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    path: &Path,
    part: PartRange,
) -> Result<CompletedPart, StorageError> {
    let body = ByteStream::read_from()
        .path(path)
        .offset(part.offset)
        .length(Length::Exact(part.length))
        .build()
        .await
        .map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

    let output = client
        .upload_part()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .part_number(part.number)
        .content_length(part.length as i64)
        .body(body)
        .send()
        .await?;

    Ok(CompletedPart::builder()
        .set_e_tag(output.e_tag().map(ToString::to_string))
        .part_number(part.number)
        .build())
}

fn flatten(
    joined: Result<Result<CompletedPart, StorageError>, JoinError>,
) -> Result<CompletedPart, StorageError> {
    joined.map_err(|e| StorageError::Request(format!("分块上传任务异常: {e}")))?
}
