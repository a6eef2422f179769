use clap::Parser;
use mirrorsync_lib::cli::Cli;
use mirrorsync_lib::commands::{check_connection, run_sync};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // 初始化日志系统，guard 保证文件日志在退出前刷新
    let _guard = cli.log_config(&settings).init();

    if cli.check {
        let result = check_connection(&settings).await;
        println!("{}", result.message);
        if let Some(details) = &result.details {
            println!("{}", details);
        }
        return if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    match run_sync(&settings, &cli.sources).await {
        Ok(report) => {
            if !settings.quiet {
                println!(
                    "完成: 上传 {} 个文件 ({} 字节), 删除 {} 个条目, 新建 {} 个目录, {} 个文件未变化",
                    report.files_uploaded,
                    report.bytes_uploaded,
                    report.entries_deleted,
                    report.dirs_created,
                    report.files_unchanged
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("同步失败: {:#}", anyhow::Error::from(e));
            ExitCode::FAILURE
        }
    }
}
