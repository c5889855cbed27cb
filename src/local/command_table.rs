use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Categories for organizing mapped commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCategory {
    FileListing,
    SystemInfo,
    NetworkConfig,
    Environment,
    Processes,
    Services,
    NetworkTesting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedCommand {
    pub command: &'static str,
    pub category: CommandCategory,
}

/// Exact phrase to PowerShell command table
pub struct CommandTable {
    commands: HashMap<&'static str, MappedCommand>,
}

const ENTRIES: &[(&str, &str, CommandCategory)] = &[
    ("查看当前目录的文件", "dir", CommandCategory::FileListing),
    ("列出子目录", "dir /ad", CommandCategory::FileListing),
    ("列出当前目录", "dir", CommandCategory::FileListing),
    ("显示目录内容", "dir", CommandCategory::FileListing),
    ("查看列表", "dir", CommandCategory::FileListing),
    ("显示列表", "dir", CommandCategory::FileListing),
    ("列出文件", "dir", CommandCategory::FileListing),
    ("查看文件", "dir", CommandCategory::FileListing),
    ("查看系统信息", "systeminfo", CommandCategory::SystemInfo),
    ("显示系统信息", "systeminfo", CommandCategory::SystemInfo),
    ("查看网络配置", "ipconfig", CommandCategory::NetworkConfig),
    ("显示网络配置", "ipconfig", CommandCategory::NetworkConfig),
    ("查看IP地址", "ipconfig", CommandCategory::NetworkConfig),
    ("查看环境变量", "Get-ChildItem Env:", CommandCategory::Environment),
    ("显示环境变量", "Get-ChildItem Env:", CommandCategory::Environment),
    ("查看PATH环境变量", "$env:Path -split ';'", CommandCategory::Environment),
    ("显示PATH环境变量", "$env:Path -split ';'", CommandCategory::Environment),
    ("查看运行进程", "Get-Process", CommandCategory::Processes),
    ("显示运行进程", "Get-Process", CommandCategory::Processes),
    ("查看进程列表", "Get-Process", CommandCategory::Processes),
    ("查看服务", "Get-Service", CommandCategory::Services),
    ("显示服务", "Get-Service", CommandCategory::Services),
    ("查看服务列表", "Get-Service", CommandCategory::Services),
    ("测试网络连接", "Test-NetConnection google.com", CommandCategory::NetworkTesting),
    ("ping测试", "Test-NetConnection google.com", CommandCategory::NetworkTesting),
    ("查看端口", "netstat -an", CommandCategory::NetworkTesting),
    ("显示端口", "netstat -an", CommandCategory::NetworkTesting),
];

impl CommandTable {
    /// Shared table, built on first use
    pub fn builtin() -> &'static CommandTable {
        static TABLE: OnceLock<CommandTable> = OnceLock::new();
        TABLE.get_or_init(|| Self::from_entries(ENTRIES))
    }

    fn from_entries(entries: &[(&'static str, &'static str, CommandCategory)]) -> Self {
        let commands = entries
            .iter()
            .map(|&(phrase, command, category)| (phrase, MappedCommand { command, category }))
            .collect();
        Self { commands }
    }

    /// Exact match on the trimmed instruction; no fuzzy matching
    pub fn lookup(&self, instruction: &str) -> Option<&MappedCommand> {
        self.commands.get(instruction.trim())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Phrases in one category, sorted for stable display
    pub fn phrases_in(&self, category: CommandCategory) -> Vec<&'static str> {
        let mut phrases: Vec<&'static str> = self
            .commands
            .iter()
            .filter(|(_, mapped)| mapped.category == category)
            .map(|(phrase, _)| *phrase)
            .collect();
        phrases.sort_unstable();
        phrases
    }
}
