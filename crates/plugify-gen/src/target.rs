//! Target language registry

use crate::error::{GenError, GenResult};
use std::fmt;
use std::str::FromStr;

/// A language the generator can emit bindings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    C,
    Cpp,
    DLang,
    DotNet,
    Golang,
    Lua,
    Python,
    Rust,
}

impl Target {
    /// Every registered target, in identifier order.
    pub const ALL: [Target; 8] = [
        Target::C,
        Target::Cpp,
        Target::DLang,
        Target::DotNet,
        Target::Golang,
        Target::Lua,
        Target::Python,
        Target::Rust,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Target::C => "c",
            Target::Cpp => "cpp",
            Target::DLang => "dlang",
            Target::DotNet => "dotnet",
            Target::Golang => "golang",
            Target::Lua => "lua",
            Target::Python => "python",
            Target::Rust => "rust",
        }
    }

    /// Look a target up by identifier or common alias, case-insensitively.
    pub fn from_id(id: &str) -> Option<Self> {
        let target = match id.trim().to_ascii_lowercase().as_str() {
            "c" => Target::C,
            "cpp" | "c++" | "cxx" => Target::Cpp,
            "dlang" | "d" => Target::DLang,
            "dotnet" | "csharp" | "cs" | "c#" => Target::DotNet,
            "golang" | "go" => Target::Golang,
            "lua" | "luajit" => Target::Lua,
            "python" | "py" => Target::Python,
            "rust" | "rs" => Target::Rust,
            _ => return None,
        };
        Some(target)
    }

    /// Targets whose wrappers can hand out raw pointers into plugin memory.
    pub fn has_native_pointers(self) -> bool {
        matches!(self, Target::C | Target::Cpp | Target::DLang | Target::Rust)
    }

    /// Targets whose bindings can express classes.
    pub fn supports_classes(self) -> bool {
        !matches!(self, Target::C)
    }

    /// Files this target writes for `module` only when the package needs them.
    pub fn optional_files(self, module: &str) -> Vec<String> {
        match self {
            Target::Golang => vec![format!("{module}_export.go")],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Target {
    type Err = GenError;

    fn from_str(s: &str) -> GenResult<Self> {
        Target::from_id(s).ok_or_else(|| GenError::UnsupportedTarget {
            target: s.to_string(),
            supported: supported_targets().join(", "),
        })
    }
}

/// Identifiers of every registered target.
pub fn supported_targets() -> Vec<&'static str> {
    Target::ALL.iter().map(|t| t.id()).collect()
}
