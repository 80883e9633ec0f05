//! 工具函数模块
//!
//! - 路径处理工具（对象键计算、内容类型猜测）

pub mod path;
