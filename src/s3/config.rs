//! S3配置模块
//!
//! 该模块负责根据部署配置创建指向 COS 的 S3 客户端。

use crate::config::DeployConfig;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation};
use tracing::debug;

/// 凭据来源名称
const CREDENTIALS_PROVIDER: &str = "cos-deploy-env";

/// 使用部署配置创建 S3 客户端。
///
/// - 静态凭据来自环境变量
/// - 关闭自动重试，失败的调用直接交给调用方处理
/// - 只在操作要求时计算请求校验和（`enable_md5` 为 `true` 时总是计算）
///
/// # 参数
///
/// * `config` - 部署配置
///
/// # 返回值
///
/// 配置好的 `aws_sdk_s3::Client`。
pub async fn create_s3_client(config: &DeployConfig) -> Client {
    let credentials = Credentials::new(
        config.credentials.secret_id.clone(),
        config.credentials.secret_key.clone(),
        None,
        None,
        CREDENTIALS_PROVIDER,
    );

    let region_provider =
        RegionProviderChain::first_try(Some(Region::new(config.target.region.clone())));
    let endpoint = config.endpoint_url();

    let checksum = if config.upload.enable_md5 {
        RequestChecksumCalculation::WhenSupported
    } else {
        RequestChecksumCalculation::WhenRequired
    };

    debug!(
        region = %config.target.region,
        endpoint = %endpoint,
        force_path_style = config.force_path_style,
        "创建 S3 客户端"
    );

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .credentials_provider(credentials)
        .region(region_provider)
        .endpoint_url(endpoint)
        .retry_config(RetryConfig::disabled())
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .request_checksum_calculation(checksum)
        .build();

    Client::from_conf(s3_config)
}
