//! Script kind classification

use std::fmt;

/// Marker that identifies a script with an explicit program entry point
const ENTRY_POINT_MARKER: &str = "fun main";

/// The two kinds of script the cache distinguishes by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Top-level statements, run as-is (`.kts`)
    Script,
    /// Source file with a `main` entry point (`.kt`)
    Program,
}

impl ScriptKind {
    /// All kinds, in lookup order
    pub const ALL: [ScriptKind; 2] = [ScriptKind::Script, ScriptKind::Program];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Script => "kts",
            Self::Program => "kt",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.extension() == ext)
    }

    /// Kind implied by the suffix of the URL's path, ignoring the host,
    /// query and fragment
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        let path = &rest[rest.find('/')?..];
        let file_name = path.rsplit('/').next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Kind inferred from the script text: a `fun main` at the start of a
    /// line makes it a program
    pub fn from_content(text: &str) -> Self {
        let has_entry_point = text
            .lines()
            .any(|line| line.trim_start().starts_with(ENTRY_POINT_MARKER));
        if has_entry_point {
            Self::Program
        } else {
            Self::Script
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}
