use std::path::{Component, Path};

/// 无法识别扩展名时使用的内容类型
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 计算本地文件相对于根目录的对象键
///
/// 各级路径组件统一使用正斜杠(/)连接，与本地系统的分隔符无关。
///
/// # 参数
///
/// * `root` - 上传的根目录
/// * `path` - 根目录下的文件路径
///
/// # 返回值
///
/// 对象键；如果 `path` 不在 `root` 之下或者就是 `root` 本身，返回 `None`
///
/// # 示例
///
/// ```
/// use cos_deploy::utils::path::object_key;
/// use std::path::Path;
///
/// let root = Path::new("./dist");
/// assert_eq!(object_key(root, &root.join("assets").join("app.js")).as_deref(), Some("assets/app.js"));
/// assert_eq!(object_key(root, &root.join("index.html")).as_deref(), Some("index.html"));
/// assert_eq!(object_key(root, root), None);
/// ```
pub fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let segments: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// 根据对象键的扩展名猜测内容类型
///
/// # 示例
///
/// ```
/// use cos_deploy::utils::path::guess_content_type;
///
/// assert_eq!(guess_content_type("index.html"), "text/html");
/// assert_eq!(guess_content_type("assets/MAIN.CSS"), "text/css");
/// assert_eq!(guess_content_type("LICENSE"), "application/octet-stream");
/// ```
pub fn guess_content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}
