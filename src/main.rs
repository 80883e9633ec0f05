use cos_deploy::config::DeployConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件
    dotenvy::dotenv().ok();

    // 诊断日志写到 stderr，stdout 只输出部署进度
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_timer(LocalTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    println!("=== SoulMirror COS 部署 ===");

    let config = match DeployConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("错误: {err}");
            std::process::exit(1);
        }
    };

    cos_deploy::deploy(&config, std::io::stdout()).await?;
    Ok(())
}
