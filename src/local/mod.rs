pub mod command_table;
pub mod path_append;

pub use command_table::{CommandCategory, CommandTable, MappedCommand};
pub use path_append::{PathAppendDetector, PathAppendPlan, PathStrategy};

/// What the local resolver matched
#[derive(Debug, Clone, PartialEq)]
pub enum LocalMatch {
    PathAppend(PathAppendPlan),
    Mapped(MappedCommand),
}

impl LocalMatch {
    pub fn command(&self) -> String {
        match self {
            LocalMatch::PathAppend(plan) => plan.script(),
            LocalMatch::Mapped(mapped) => mapped.command.to_string(),
        }
    }
}

/// Offline resolver: PATH-append detection first, then the phrase table
pub struct LocalResolver {
    detector: PathAppendDetector,
    table: &'static CommandTable,
}

impl LocalResolver {
    pub fn new(default_path: Option<String>) -> Self {
        Self {
            detector: PathAppendDetector::new(default_path),
            table: CommandTable::builtin(),
        }
    }

    pub fn table(&self) -> &'static CommandTable {
        self.table
    }

    pub fn match_instruction(&self, instruction: &str) -> Option<LocalMatch> {
        if let Some(plan) = self.detector.detect(instruction) {
            return Some(LocalMatch::PathAppend(plan));
        }

        self.table
            .lookup(instruction)
            .cloned()
            .map(LocalMatch::Mapped)
    }

    pub fn resolve(&self, instruction: &str) -> Option<String> {
        self.match_instruction(instruction).map(|m| m.command())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_APPEND_PATH;

    fn resolver() -> LocalResolver {
        LocalResolver::new(Some(DEFAULT_APPEND_PATH.to_string()))
    }

    #[test]
    fn test_mapped_phrase() {
        assert_eq!(resolver().resolve("查看当前目录的文件"), Some("dir".to_string()));
        assert_eq!(
            resolver().resolve("查看PATH环境变量"),
            Some("$env:Path -split ';'".to_string())
        );
    }

    #[test]
    fn test_unknown_phrase_is_unresolved() {
        assert_eq!(resolver().resolve("帮我订披萨"), None);
    }

    #[test]
    fn test_path_append_takes_priority() {
        let resolver = resolver();
        let matched = resolver
            .match_instruction("添加到环境变量 D:\\projects\\代码\\cai\\dist")
            .unwrap();

        match &matched {
            LocalMatch::PathAppend(plan) => assert_eq!(plan.path(), DEFAULT_APPEND_PATH),
            other => panic!("expected PATH append, got {:?}", other),
        }
        assert!(matched
            .command()
            .contains("$newPath = 'D:\\projects\\代码\\cai\\dist'"));
    }

    #[test]
    fn test_marker_without_path_or_default_falls_through_to_table() {
        let resolver = LocalResolver::new(None);
        assert_eq!(resolver.resolve("添加到path"), None);
    }

    #[test]
    fn test_table_is_shared() {
        assert!(std::ptr::eq(resolver().table(), CommandTable::builtin()));
    }
}
