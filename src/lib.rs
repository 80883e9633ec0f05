//! 静态网站部署工具库
//!
//! 将本地构建目录部署到腾讯云 COS 存储桶，主要功能包括：
//! - 从环境变量读取凭据和部署目标
//! - 创建公共读存储桶（已存在时跳过）
//! - 配置单页应用的静态网站托管
//! - 递归上传构建目录，逐个报告上传结果

pub mod config;
pub mod deploy;
pub mod error;
pub mod s3;
pub mod utils;

use crate::config::DeployConfig;
use crate::deploy::{DeployReport, Deployer};
use crate::s3::{S3ObjectStore, create_s3_client};
use std::io::Write;

/// 使用给定配置执行一次部署，进度写入 `out`。
///
/// 此函数会：
/// - 创建指向配置端点的 S3 客户端
/// - 依次执行存储桶创建、网站配置和文件上传
/// - 输出汇总信息和访问地址
///
/// # Errors
///
/// 只有写入 `out` 失败时返回错误。
pub async fn deploy<W: Write>(config: &DeployConfig, out: W) -> std::io::Result<DeployReport> {
    let client = create_s3_client(config).await;
    let store = S3ObjectStore::new(client);

    Deployer::new(store, config.target.clone(), config.upload, out)
        .run()
        .await
}
