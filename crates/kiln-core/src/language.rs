//! Language registry.
//!
//! Supported languages form a closed set. Each one resolves to a static
//! [`LanguageProfile`]; adding a language means adding a variant and a table
//! entry here.

use crate::error::CoreError;
use kiln_container::{CPU_SHARES, MEMORY_LIMIT_BYTES};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Execution profile of one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Canonical lowercase id.
    pub id: &'static str,
    /// Runtime image reference.
    pub image: &'static str,
    /// Entry command as argv.
    pub command: &'static [&'static str],
    /// Name of the source file inside the working directory.
    pub filename: &'static str,
    /// Maximum wall-clock duration of a run.
    pub timeout: Duration,
    /// Memory ceiling in bytes.
    pub memory_bytes: i64,
    /// CPU share weight.
    pub cpu_shares: i64,
}

static PYTHON: LanguageProfile = LanguageProfile {
    id: "python",
    image: "python:3.11-alpine",
    command: &["python", "/app/main.py"],
    filename: "main.py",
    timeout: Duration::from_millis(10_000),
    memory_bytes: MEMORY_LIMIT_BYTES,
    cpu_shares: CPU_SHARES,
};

static JAVA: LanguageProfile = LanguageProfile {
    id: "java",
    image: "openjdk:17-alpine",
    command: &["sh", "-c", "cd /app && javac Main.java && java Main"],
    filename: "Main.java",
    timeout: Duration::from_millis(15_000),
    memory_bytes: MEMORY_LIMIT_BYTES,
    cpu_shares: CPU_SHARES,
};

static CPP: LanguageProfile = LanguageProfile {
    id: "cpp",
    image: "gcc:alpine",
    command: &["sh", "-c", "cd /app && g++ -o main main.cpp && ./main"],
    filename: "main.cpp",
    timeout: Duration::from_millis(15_000),
    memory_bytes: MEMORY_LIMIT_BYTES,
    cpu_shares: CPU_SHARES,
};

static C: LanguageProfile = LanguageProfile {
    id: "c",
    image: "gcc:alpine",
    command: &["sh", "-c", "cd /app && gcc -o main main.c && ./main"],
    filename: "main.c",
    timeout: Duration::from_millis(15_000),
    memory_bytes: MEMORY_LIMIT_BYTES,
    cpu_shares: CPU_SHARES,
};

static JAVASCRIPT: LanguageProfile = LanguageProfile {
    id: "javascript",
    image: "node:18-alpine",
    command: &["node", "/app/main.js"],
    filename: "main.js",
    timeout: Duration::from_millis(10_000),
    memory_bytes: MEMORY_LIMIT_BYTES,
    cpu_shares: CPU_SHARES,
};

/// A supported language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// CPython 3.11
    Python,
    /// OpenJDK 17
    Java,
    /// g++
    Cpp,
    /// gcc
    C,
    /// Node.js 18
    JavaScript,
}

impl Language {
    /// Every supported language, in listing order.
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::JavaScript,
    ];

    /// The language's execution profile.
    pub fn profile(self) -> &'static LanguageProfile {
        match self {
            Language::Python => &PYTHON,
            Language::Java => &JAVA,
            Language::Cpp => &CPP,
            Language::C => &C,
            Language::JavaScript => &JAVASCRIPT,
        }
    }

    /// Canonical id.
    pub fn id(self) -> &'static str {
        self.profile().id
    }

    /// Look up the profile for a language id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedLanguage`] for any id outside the
    /// registry.
    pub fn resolve(id: &str) -> Result<&'static LanguageProfile, CoreError> {
        id.parse::<Language>().map(Language::profile)
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "python" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "javascript" => Ok(Language::JavaScript),
            other => Err(CoreError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
