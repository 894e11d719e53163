use anyhow::Result;
use clap::Parser;
use document_quiz::orchestrator::{App, CliArgs};
use document_quiz::utils::logging;
use document_quiz::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 加载配置
    let mut config = Config::load_with_file(args.config.as_deref())?;
    if let Some(input) = args.input {
        config.input_path = input;
    }

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let stats = App::initialize(config)?.run().await?;
    if stats.failed > 0 {
        anyhow::bail!("{} 个文档处理失败", stats.failed);
    }

    Ok(())
}
