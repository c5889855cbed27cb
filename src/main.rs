use cai::config::Config;
use cai::credentials::CredentialStore;
use cai::error_handling::{
    display_info, display_success, display_tip, display_warning, enhance_error, UserFriendlyError,
};
use cai::execution::ShellExecutor;
use cai::local::{CommandCategory, LocalMatch, LocalResolver, PathAppendPlan};
use cai::logging::{get_logger, init_logger, LogCategory};
use cai::orchestrator::{CommandSource, Notice, Orchestrator};
use cai::remote::{RemoteBackend, RemoteResolver, RemoteSettings};
use clap::{CommandFactory, Parser};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cai")]
#[command(version)]
#[command(about = "自然语言转PowerShell工具", long_about = "用中文描述想要执行的系统操作，cai 生成对应的PowerShell命令并执行。")]
struct Cli {
    /// 自然语言指令，需用引号包裹
    instruction: Option<String>,

    /// 只显示生成的命令，不执行
    #[arg(long)]
    dry_run: bool,

    /// 设置DeepSeek API key
    #[arg(long, value_name = "API_KEY")]
    set: Option<String>,

    /// 显示当前配置
    #[arg(long)]
    show_config: bool,

    /// 本次运行写入调试日志
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            enhance_error(&e).display();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Err(e) = init_logger() {
        eprintln!("警告: 无法初始化日志: {}", e);
    }

    if let Ok(logger) = get_logger() {
        if let Ok(mut logger_guard) = logger.lock() {
            if cli.debug || cfg!(feature = "debug-mode") {
                let _ = logger_guard.enable_debug_mode();
            }
            if logger_guard.is_debug_mode() {
                display_warning(&format!(
                    "调试模式已开启，指令和生成的命令会写入日志: {}",
                    logger_guard.get_current_log_path().display()
                ));
            }
            let os_info = format!("{} {}", std::env::consts::OS, std::env::consts::ARCH);
            let _ = logger_guard.log_startup(env!("CARGO_PKG_VERSION"), &os_info);
        }
    }

    let config = Config::load();
    let store = CredentialStore::from_environment(&config.credential_key);

    if let Some(secret) = cli.set.as_deref() {
        return save_credential(&store, secret);
    }

    if cli.show_config {
        config.display(store.load().is_some());
        println!("API key 文件: {}", store.primary_path().display());
        if let Ok(logger) = get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                println!("日志文件: {}", logger_guard.get_current_log_path().display());
            }
        }
        return Ok(());
    }

    let Some(instruction) = cli
        .instruction
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let local = Arc::new(LocalResolver::new(config.default_path.clone()));
    let orchestrator = Orchestrator::new(Box::new(store.clone()), build_remote(&config), local.clone());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈")
            .template("{spinner:.cyan} {msg}")?,
    );
    pb.set_message(if orchestrator.remote_available() {
        "正在生成命令..."
    } else {
        "正在匹配本地命令..."
    });
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = orchestrator.resolve(instruction).await;
    pb.finish_and_clear();

    for notice in &report.notices {
        print_notice(notice);
    }

    println!("输入指令: {}", instruction);

    let Some(resolved) = report.command() else {
        UserFriendlyError::unresolved(&store.primary_path(), &example_phrases(&local)).display();
        display_tip(&format!("或者将现有的.env文件复制到: {}", store.primary_path().display()));
        return Ok(());
    };

    println!("生成的PowerShell命令: {}", resolved.command.green());
    println!("{}", "-".repeat(50));

    if cli.dry_run {
        if resolved.source == CommandSource::Local {
            if let Some(LocalMatch::PathAppend(plan)) = local.match_instruction(instruction) {
                preview_path_change(&plan);
            }
        }
        display_tip("使用 --dry-run 参数只显示命令而不执行");
        println!("示例: cai \"查看当前目录的文件\" --dry-run");
        return Ok(());
    }

    execute(&config, &resolved.command)
}

/// `None` when TLS support is missing; remote resolution is then off for the process
fn build_remote(config: &Config) -> Option<Arc<dyn RemoteBackend>> {
    match RemoteResolver::new(RemoteSettings::from(config)) {
        Ok(resolver) => Some(Arc::new(resolver)),
        Err(e) => {
            display_warning("SSL模块不可用，将使用本地命令映射");
            cai::log_warning!(
                LogCategory::Remote,
                format!("Remote resolution disabled: {}", e)
            );
            None
        }
    }
}

fn save_credential(store: &CredentialStore, secret: &str) -> anyhow::Result<()> {
    let location = store.save(secret)?;

    if location.used_fallback {
        display_warning(&format!(
            "无法写入程序目录 {}",
            store.primary_path().display()
        ));
        display_success(&format!("API key已保存到当前目录: {}", location.path.display()));
    } else {
        display_success(&format!("API key已保存到: {}", location.path.display()));
        println!("   现在你可以在任何目录使用cai，无需重新设置API key");
    }

    Ok(())
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::CredentialMissing => display_info("未找到API key，使用本地命令映射..."),
        Notice::CapabilityUnavailable => display_info("SSL模块不可用，使用本地命令映射..."),
        Notice::RemoteFailed(reason) => {
            display_warning(&format!("API调用失败: {}", reason));
            display_info("API调用失败，回退到本地命令映射...");
        }
    }
}

/// Shows what the generated script would do to this process's PATH
fn preview_path_change(plan: &PathAppendPlan) {
    let current = std::env::var("PATH").unwrap_or_default();
    let updated = plan.apply(&current);

    if updated == current {
        display_info(&format!("{} 已存在于环境变量中，执行后PATH不会改变", plan.path()));
    } else {
        display_info(&format!("执行后PATH末尾将追加: ;{}", plan.path()));
    }
}

fn example_phrases(local: &LocalResolver) -> Vec<&'static str> {
    [
        CommandCategory::FileListing,
        CommandCategory::SystemInfo,
        CommandCategory::Processes,
    ]
    .iter()
    .filter_map(|category| local.table().phrases_in(*category).into_iter().next())
    .collect()
}

fn execute(config: &Config, command: &str) -> anyhow::Result<()> {
    let executor = ShellExecutor::from_config(config)?;

    println!("正在执行命令...");
    println!("{}", "=".repeat(50));

    // Execution failures are reported but never fail the process
    match executor.run(command) {
        Ok(output) => {
            println!("执行结果:");
            println!("{}", output.stdout);
            if !output.stderr.is_empty() {
                println!("{}", "错误信息:".red());
                println!("{}", output.stderr);
            }
            if !output.success() {
                let code = output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "无".to_string());
                display_warning(&format!("命令退出码: {}", code));
            }
        }
        Err(e) => {
            eprintln!("{} {}", "执行出错:".red(), e);
            enhance_error(&anyhow::Error::new(e)).display();
        }
    }

    Ok(())
}
