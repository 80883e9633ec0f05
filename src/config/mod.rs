//! 部署工具的配置模块。
//!
//! 该模块负责在启动时从环境变量构建一次性的部署配置，之后以参数形式传给部署流程。

use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// 密钥 ID 环境变量
pub const SECRET_ID_VAR: &str = "TENCENTCLOUD_SECRET_ID";
/// 密钥 Key 环境变量
pub const SECRET_KEY_VAR: &str = "TENCENTCLOUD_SECRET_KEY";

/// 默认地域
pub const DEFAULT_REGION: &str = "ap-guangzhou";
/// 默认存储桶名称
pub const DEFAULT_BUCKET: &str = "soulmirror-web-20250225";
/// 默认本地构建目录
pub const DEFAULT_SOURCE_DIR: &str = "./dist";

/// 默认分块大小（1 MiB）
pub const DEFAULT_PART_SIZE: u64 = 1024 * 1024;
/// 默认分块上传并发数
pub const DEFAULT_MAX_THREADS: usize = 10;
/// 分块上传并发数上限，与单次分块上传的最大分块数一致
pub const MAX_THREADS_LIMIT: u64 = 10_000;

/// COS 服务域名
const PROVIDER_DOMAIN: &str = "myqcloud.com";

/// 访问凭据
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .finish()
    }
}

/// 部署目标：地域、存储桶和本地目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub region: String,
    pub bucket: String,
    pub source_dir: PathBuf,
}

impl DeployTarget {
    /// 静态网站访问地址
    pub fn website_url(&self) -> String {
        format!(
            "http://{}.cos-website.{}.{}",
            self.bucket, self.region, PROVIDER_DOMAIN
        )
    }

    /// 地域的默认服务端点
    pub fn default_endpoint(&self) -> String {
        format!("https://cos.{}.{}", self.region, PROVIDER_DOMAIN)
    }
}

impl Default for DeployTarget {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
        }
    }
}

/// 上传参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// 分块大小（字节），超过该大小的文件走分块上传
    pub part_size: u64,
    /// 单个文件分块上传时同时进行的分块数
    pub max_threads: usize,
    /// 是否计算请求体校验和
    pub enable_md5: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            max_threads: DEFAULT_MAX_THREADS,
            enable_md5: false,
        }
    }
}

/// 完整的部署配置
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub credentials: Credentials,
    pub target: DeployTarget,
    pub upload: UploadOptions,
    /// 服务端点，未设置时使用地域默认端点
    pub endpoint: Option<String>,
    /// 使用路径风格寻址（`endpoint/bucket/key`）
    pub force_path_style: bool,
}

impl DeployConfig {
    /// 从进程环境变量读取配置。
    ///
    /// # 环境变量
    ///
    /// * `TENCENTCLOUD_SECRET_ID` / `TENCENTCLOUD_SECRET_KEY` - 必须设置
    /// * `COS_REGION` - 地域（默认：ap-guangzhou）
    /// * `COS_BUCKET` - 存储桶名称
    /// * `COS_SOURCE_DIR` - 本地构建目录（默认：./dist）
    /// * `COS_ENDPOINT` - 自定义服务端点
    /// * `COS_FORCE_PATH_STYLE` - 是否使用路径风格寻址
    /// * `COS_PART_SIZE_MB` - 分块大小（MB）
    /// * `COS_MAX_THREADS` - 分块上传并发数
    ///
    /// # Errors
    ///
    /// 密钥缺失时返回 `ConfigError::MissingCredentials`，数值无法解析时返回
    /// `ConfigError::InvalidValue`。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 使用给定的查找函数读取配置，便于在测试中替换环境变量。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空字符串与未设置同等对待
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        // 密钥只拒绝空字符串，原样保留其余内容
        let secret = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let credentials = match (secret(SECRET_ID_VAR), secret(SECRET_KEY_VAR)) {
            (Some(secret_id), Some(secret_key)) => Credentials {
                secret_id,
                secret_key,
            },
            _ => {
                return Err(ConfigError::MissingCredentials {
                    id_var: SECRET_ID_VAR,
                    key_var: SECRET_KEY_VAR,
                });
            }
        };

        let defaults = DeployTarget::default();
        let target = DeployTarget {
            region: get("COS_REGION").unwrap_or(defaults.region),
            bucket: get("COS_BUCKET").unwrap_or(defaults.bucket),
            source_dir: get("COS_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_dir),
        };

        let mut upload = UploadOptions::default();
        if let Some(value) = get("COS_PART_SIZE_MB") {
            let mb = parse_positive("COS_PART_SIZE_MB", &value)?;
            upload.part_size = mb
                .checked_mul(1024 * 1024)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "COS_PART_SIZE_MB",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = get("COS_MAX_THREADS") {
            let threads = parse_positive("COS_MAX_THREADS", &value)?;
            if threads > MAX_THREADS_LIMIT {
                return Err(ConfigError::InvalidValue {
                    name: "COS_MAX_THREADS",
                    value,
                });
            }
            upload.max_threads = threads as usize;
        }

        let force_path_style = match get("COS_FORCE_PATH_STYLE") {
            Some(value) => parse_bool("COS_FORCE_PATH_STYLE", &value)?,
            None => false,
        };

        Ok(Self {
            credentials,
            target,
            upload,
            endpoint: get("COS_ENDPOINT"),
            force_path_style,
        })
    }

    /// 实际使用的服务端点
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.target.default_endpoint())
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}
