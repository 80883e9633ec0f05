//! S3模块
//!
//! 该模块负责与 COS（S3 兼容接口）的交互，包括客户端配置、存储桶操作和文件上传。

// 声明子模块
pub mod config;
pub mod multipart;
pub mod store;

// 重新导出常用的类型和函数
pub use config::create_s3_client;
pub use store::{ObjectStore, S3ObjectStore, WebsiteConfig};
