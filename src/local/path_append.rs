use regex::Regex;
use std::sync::OnceLock;

/// Phrase that marks a "put this directory on PATH" request
pub const ENV_VAR_MARKER: &str = "添加到环境变量";
/// Same, matched against the lowercased instruction
pub const PATH_MARKER: &str = "添加到path";

/// Executable whose presence in an instruction implies its build directory
pub const KNOWN_EXECUTABLE: &str = "cai.exe";

/// One way of pulling a directory out of an instruction
pub trait PathStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, instruction: &str) -> Option<String>;
}

/// The well-known path, when it is quoted verbatim
pub struct LiteralPath {
    path: String,
}

impl LiteralPath {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string() }
    }
}

impl PathStrategy for LiteralPath {
    fn name(&self) -> &'static str {
        "literal_path"
    }

    fn extract(&self, instruction: &str) -> Option<String> {
        instruction.contains(&self.path).then(|| self.path.clone())
    }
}

/// The well-known path, when the executable that lives there is named
pub struct KnownExecutable {
    executable: String,
    path: String,
}

impl KnownExecutable {
    pub fn new(executable: &str, path: &str) -> Self {
        Self {
            executable: executable.to_string(),
            path: path.to_string(),
        }
    }
}

impl PathStrategy for KnownExecutable {
    fn name(&self) -> &'static str {
        "known_executable"
    }

    fn extract(&self, instruction: &str) -> Option<String> {
        instruction.contains(&self.executable).then(|| self.path.clone())
    }
}

fn drive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[A-Za-z]:\\[^"]*"#).expect("drive path pattern is a valid regex")
    })
}

/// Any `X:\...` path, running to the next double quote or the end
#[derive(Debug, Default, Clone, Copy)]
pub struct DrivePath;

impl DrivePath {
    pub fn new() -> Self {
        Self
    }
}

impl PathStrategy for DrivePath {
    fn name(&self) -> &'static str {
        "drive_path"
    }

    fn extract(&self, instruction: &str) -> Option<String> {
        drive_pattern()
            .find(instruction)
            .map(|m| m.as_str().to_string())
    }
}

/// Decides whether an instruction is a PATH-append request and which
/// directory it targets.
pub struct PathAppendDetector {
    strategies: Vec<Box<dyn PathStrategy>>,
    default_path: Option<String>,
}

impl PathAppendDetector {
    /// Literal path, then known executable, then drive-letter scan, then the
    /// configured default. Without a configured default the literal and
    /// executable checks have nothing to point at and are skipped.
    pub fn new(default_path: Option<String>) -> Self {
        let mut strategies: Vec<Box<dyn PathStrategy>> = Vec::new();
        if let Some(path) = &default_path {
            strategies.push(Box::new(LiteralPath::new(path)));
            strategies.push(Box::new(KnownExecutable::new(KNOWN_EXECUTABLE, path)));
        }
        strategies.push(Box::new(DrivePath::new()));

        Self {
            strategies,
            default_path,
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn PathStrategy>>, default_path: Option<String>) -> Self {
        Self {
            strategies,
            default_path,
        }
    }

    pub fn is_path_append(instruction: &str) -> bool {
        instruction.contains(ENV_VAR_MARKER) || instruction.to_lowercase().contains(PATH_MARKER)
    }

    /// `None` when the instruction is not a PATH-append request or no
    /// directory could be determined
    pub fn detect(&self, instruction: &str) -> Option<PathAppendPlan> {
        if !Self::is_path_append(instruction) {
            return None;
        }

        self.strategies
            .iter()
            .find_map(|strategy| {
                strategy.extract(instruction).map(|path| {
                    crate::log_debug!(
                        crate::logging::LogCategory::Resolution,
                        format!("PATH target found by {}", strategy.name())
                    );
                    path
                })
            })
            .or_else(|| self.default_path.clone())
            .map(PathAppendPlan::new)
    }
}

/// Idempotent "append this directory to the user PATH" operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAppendPlan {
    path: String,
}

impl PathAppendPlan {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// PowerShell that appends the directory to the user-scope PATH only if
    /// it is not already there, then refreshes the current session.
    pub fn script(&self) -> String {
        let quoted = self.path.replace('\'', "''");
        format!(
            r#"
$newPath = '{quoted}'
$currentPath = [Environment]::GetEnvironmentVariable('Path', 'User')
$pattern = '*' + [WildcardPattern]::Escape($newPath) + '*'
if ($currentPath -notlike $pattern) {{
    [Environment]::SetEnvironmentVariable('Path', $currentPath + ';' + $newPath, 'User')
    $env:Path = [Environment]::GetEnvironmentVariable('Path', 'User')
    Write-Host "✅ 已成功将 $newPath 添加到永久环境变量中"
    Write-Host "当前会话已立即生效，新开终端也会生效"
}} else {{
    Write-Host "⚠️  $newPath 已存在于环境变量中"
}}
"#
        )
    }

    /// What the script leaves in the user PATH, given its current value.
    /// The script escapes wildcard characters before its `-notlike` test, so
    /// containment here is a plain case-insensitive substring check.
    pub fn apply(&self, current_path: &str) -> String {
        if current_path.to_lowercase().contains(&self.path.to_lowercase()) {
            current_path.to_string()
        } else {
            format!("{};{}", current_path, self.path)
        }
    }
}
