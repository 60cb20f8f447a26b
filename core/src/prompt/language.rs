//! Best-effort guess of the snippet language

use crate::registry::CodeLanguage;
use regex::Regex;
use std::sync::OnceLock;

/// Constructs that only appear in TypeScript sources
const TYPESCRIPT_MARKERS: &[&str] = &[
    // interface Foo { / type Foo = ...
    r"(?m)^\s*(export\s+)?(interface\s+[A-Za-z_$][\w$]*|type\s+[A-Za-z_$][\w$]*(<[^>]*>)?\s*=)",
    // (a: number, b?: string)
    r"\(\s*[A-Za-z_$][\w$]*\??\s*:\s*[A-Za-z_$][\w$<>\[\]|, ]*[,)]",
    // const x: Foo =  /  let y: string;
    r"\b(const|let|var)\s+[A-Za-z_$][\w$]*\s*:\s*[A-Za-z_$][\w$<>\[\]| ]*\s*[=;]",
    // ): Promise<number> {
    r"\)\s*:\s*[A-Za-z_$][\w$<>\[\]|, ]*\s*(\{|=>)",
    // private readonly repo
    r"\b(public|private|protected|readonly)\s+[A-Za-z_$][\w$]*",
    // value as string
    r"\bas\s+(string|number|boolean|any|unknown|const)\b",
    // function f<T>(  /  new Map<string, number>(
    r"\b(function\s+[A-Za-z_$][\w$]*|new\s+[A-Za-z_$][\w$]*)\s*<[^>]+>\s*\(",
    r"\b(enum|namespace|declare|implements)\s+[A-Za-z_$]",
];

fn markers() -> &'static [Regex] {
    static MARKERS: OnceLock<Vec<Regex>> = OnceLock::new();
    MARKERS.get_or_init(|| {
        TYPESCRIPT_MARKERS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Guess whether `code` is TypeScript or JavaScript
pub fn detect_language(code: &str) -> CodeLanguage {
    if markers().iter().any(|re| re.is_match(code)) {
        CodeLanguage::TypeScript
    } else {
        CodeLanguage::JavaScript
    }
}
