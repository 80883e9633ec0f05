//! 错误类型模块
//!
//! - `ConfigError`：启动阶段的配置错误，属于致命错误，进程以状态码 1 退出。
//! - `StorageError`：每次对象存储调用的错误，由部署流程记录后继续执行。

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::path::PathBuf;
use thiserror::Error;

/// 表示存储桶已经存在的服务端错误码
const BUCKET_EXISTS_CODES: &[&str] = &["BucketAlreadyExists", "BucketAlreadyOwnedByYou"];

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未设置密钥环境变量（或为空）
    #[error("请设置 {id_var} 和 {key_var} 环境变量")]
    MissingCredentials {
        id_var: &'static str,
        key_var: &'static str,
    },

    /// 环境变量的值无法解析
    #[error("环境变量 {name} 的值无效: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// 对象存储调用错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 服务端返回了结构化的错误码
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// 请求未能得到结构化响应（构造、网络、超时等）
    #[error("{0}")]
    Request(String),

    /// 读取本地文件失败
    #[error("读取本地文件 {} 失败: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// 返回服务端错误码（如果有）
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 判断错误是否表示存储桶已存在。
    ///
    /// 优先检查结构化错误码；没有错误码时退回到对错误文本的子串匹配。
    pub fn is_bucket_already_exists(&self) -> bool {
        match self.code() {
            Some(code) => BUCKET_EXISTS_CODES.contains(&code),
            None => {
                let text = self.to_string();
                BUCKET_EXISTS_CODES.iter().any(|code| text.contains(code))
            }
        }
    }
}

impl<E, R> From<SdkError<E, R>> for StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        if let Some(service) = err.as_service_error() {
            if let Some(code) = service.code() {
                return StorageError::Service {
                    code: code.to_string(),
                    message: service.message().unwrap_or_default().to_string(),
                };
            }
        }
        StorageError::Request(DisplayErrorContext(&err).to_string())
    }
}
