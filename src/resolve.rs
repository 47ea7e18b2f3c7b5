//! Declaration-site resolution
//!
//! Given a locator string, find the source line that declares it inside the
//! project's page-object directories. Source files are treated as
//! line-oriented text; a line only counts as a declaration when it has both
//! an assignment to a locator-style identifier and the literal framed in
//! matching quotes. The dual check keeps the same string inside a comment,
//! a log call, or an assertion from being mistaken for the declaration.

use crate::record::{Confidence, DeclarationSite};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Identifier suffixes that mark a locator declaration in page objects.
const LOCATOR_SUFFIXES: &[&str] = &[
    "_input",
    "_button",
    "_field",
    "_element",
    "_selector",
    "_link",
    "_checkbox",
    "_dropdown",
];

/// Extensions of files worth scanning for declarations.
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "rs", "java", "kt", "cs", "rb", "go",
];

/// A line that passed declaration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationMatch {
    /// Identifier on the left-hand side of the assignment
    pub identifier: String,
    /// Quote character framing the literal (`"` or `'`)
    pub quote: char,
}

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // identifier [: type] = rest-of-line, with optional visibility and
        // binding keywords so Python, JS/TS and Rust shapes all match
        Regex::new(
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+|static\s+|let\s+(?:mut\s+)?|var\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*(?::[^=]*)?=\s*(.*)$",
        )
        .unwrap()
    })
}

/// The declaration-validation predicate: pure and independently testable.
///
/// Returns the captured identifier and quote style when `line` declares
/// `literal`, `None` otherwise.
pub fn match_declaration(line: &str, literal: &str) -> Option<DeclarationMatch> {
    if literal.is_empty() {
        return None;
    }

    let captures = assignment_pattern().captures(line)?;
    let identifier = captures.get(1)?.as_str();
    let rhs = captures.get(2)?.as_str();

    if !is_locator_identifier(identifier) {
        return None;
    }

    let quote = quoted_with(rhs, literal)?;
    Some(DeclarationMatch {
        identifier: identifier.to_string(),
        quote,
    })
}

/// Naming convention check: the identifier must look like a locator binding.
fn is_locator_identifier(identifier: &str) -> bool {
    let name = identifier.trim_start_matches('_').to_lowercase();
    if name.is_empty() {
        return false;
    }
    // Suffixes match with or without the underscore so camelCase names
    // (searchField, loginButton) qualify alongside snake_case ones.
    name.contains("loc")
        || LOCATOR_SUFFIXES
            .iter()
            .any(|s| name.ends_with(s) || name.ends_with(s.trim_start_matches('_')))
}

/// Does `rhs` start with `literal` framed in matching quotes?
fn quoted_with(rhs: &str, literal: &str) -> Option<char> {
    for quote in ['"', '\''] {
        let framed = format!("{}{}{}", quote, literal, quote);
        if rhs.starts_with(&framed) {
            return Some(quote);
        }
    }
    None
}

/// Stateless resolver over the project's locator-declaration directories.
pub struct SourceResolver {
    project_root: PathBuf,
    search_roots: Vec<PathBuf>,
}

impl SourceResolver {
    pub fn new(project_root: impl Into<PathBuf>, search_roots: Vec<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            search_roots,
        }
    }

    /// Find the declaration site of `locator`, strict match only.
    pub fn resolve(&self, locator: &str) -> Option<DeclarationSite> {
        self.resolve_inner(locator, false)
    }

    /// Find the declaration site of `locator`, falling back to the first
    /// line containing the literal anywhere when no strict match exists.
    pub fn resolve_any(&self, locator: &str) -> Option<DeclarationSite> {
        self.resolve_inner(locator, true)
    }

    fn resolve_inner(&self, locator: &str, allow_heuristic: bool) -> Option<DeclarationSite> {
        if locator.is_empty() {
            return None;
        }

        let mut heuristic: Option<DeclarationSite> = None;
        for file in self.candidate_files() {
            let Ok(content) = fs::read_to_string(&file) else {
                continue;
            };
            // Cheap containment check before scanning line by line
            if !content.contains(locator) {
                continue;
            }
            for (idx, line) in content.lines().enumerate() {
                if match_declaration(line, locator).is_some() {
                    return Some(DeclarationSite {
                        file_path: file.clone(),
                        line_number: idx + 1,
                        line_text: line.to_string(),
                        confidence: Confidence::Exact,
                    });
                }
                if allow_heuristic && heuristic.is_none() && line.contains(locator) {
                    heuristic = Some(DeclarationSite {
                        file_path: file.clone(),
                        line_number: idx + 1,
                        line_text: line.to_string(),
                        confidence: Confidence::Heuristic,
                    });
                }
            }
        }
        heuristic
    }

    /// Candidate source files in a fixed, path-sorted order so ties resolve
    /// the same way on every run.
    fn candidate_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.search_roots {
            let dir = if root.is_absolute() {
                root.clone()
            } else {
                self.project_root.join(root)
            };
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&dir)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let is_source = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false);
                if is_source {
                    files.push(path.to_path_buf());
                }
            }
        }
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_match_declaration_python_class_attr() {
        let m = match_declaration("    __loc_username_input = \"#user-name\"", "#user-name");
        let m = m.expect("should match");
        assert_eq!(m.identifier, "__loc_username_input");
        assert_eq!(m.quote, '"');
    }

    #[test]
    fn test_match_declaration_single_quotes() {
        let m = match_declaration(
            "    loc_logout_button = '//button[contains(text(), \"Logout\")]'",
            "//button[contains(text(), \"Logout\")]",
        );
        assert_eq!(m.unwrap().quote, '\'');
    }

    #[test]
    fn test_match_declaration_trailing_comment() {
        let m = match_declaration("login_button = \"#old-btn\"  # submit", "#old-btn");
        assert_eq!(m.unwrap().identifier, "login_button");
    }

    #[test]
    fn test_match_declaration_rust_const() {
        let m = match_declaration(
            "pub const SUBMIT_LOCATOR: &str = \"#submit\";",
            "#submit",
        );
        assert_eq!(m.unwrap().identifier, "SUBMIT_LOCATOR");
    }

    #[test]
    fn test_match_declaration_js_const() {
        let m = match_declaration("const searchField = '#search';", "#search");
        assert_eq!(m.unwrap().identifier, "searchField");
    }

    #[test]
    fn test_rejects_non_locator_identifier() {
        assert!(match_declaration("username = \"#user-name\"", "#user-name").is_none());
        assert!(match_declaration("message = \"#old-btn\"", "#old-btn").is_none());
    }

    #[test]
    fn test_rejects_literal_in_call_or_comment() {
        // Method call argument, not an assignment
        assert!(match_declaration("self.click(\"#old-btn\")", "#old-btn").is_none());
        // Comment
        assert!(match_declaration("# uses \"#old-btn\" internally", "#old-btn").is_none());
        // Log message on the RHS but not framed at the start
        assert!(
            match_declaration("msg_loc = \"failed to find #old-btn\"", "#old-btn").is_none()
        );
    }

    #[test]
    fn test_rejects_mismatched_quotes() {
        assert!(match_declaration("login_button = \"#old-btn'", "#old-btn").is_none());
    }

    fn write_tree(dir: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn test_resolve_finds_exact_declaration() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "pages/login_page.py",
                "class LoginPage:\n    __loc_login_button = \"#login-button\"\n",
            )],
        );
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        let site = resolver.resolve("#login-button").unwrap();
        assert_eq!(site.line_number, 2);
        assert_eq!(site.confidence, Confidence::Exact);
        assert!(site.line_text.contains("\"#login-button\""));
    }

    #[test]
    fn test_resolve_unknown_locator_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("pages/p.py", "loc_a = \"#a\"\n")]);
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        assert!(resolver.resolve("#nowhere").is_none());
        assert!(resolver.resolve_any("#nowhere").is_none());
    }

    #[test]
    fn test_resolve_is_deterministic_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("pages/b_page.py", "loc_btn = \"#dup\"\n"),
                ("pages/a_page.py", "loc_btn = \"#dup\"\n"),
            ],
        );
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        let site = resolver.resolve("#dup").unwrap();
        // Path-sorted order: a_page.py wins every run.
        assert!(site.file_path.ends_with("a_page.py"));
    }

    #[test]
    fn test_resolve_any_falls_back_to_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("pages/p.py", "helper.click(\"#only-in-call\")\n")],
        );
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        assert!(resolver.resolve("#only-in-call").is_none());

        let site = resolver.resolve_any("#only-in-call").unwrap();
        assert_eq!(site.confidence, Confidence::Heuristic);
        assert_eq!(site.line_number, 1);
    }

    #[test]
    fn test_exact_match_preferred_over_earlier_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "pages/p.py",
                "# mentions \"#btn\" in a comment\nloc_submit_button = \"#btn\"\n",
            )],
        );
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        let site = resolver.resolve_any("#btn").unwrap();
        assert_eq!(site.confidence, Confidence::Exact);
        assert_eq!(site.line_number, 2);
    }

    #[test]
    fn test_non_source_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("pages/notes.txt", "loc_btn = \"#txt\"\n")]);
        let resolver = SourceResolver::new(dir.path(), vec![PathBuf::from("pages")]);
        assert!(resolver.resolve("#txt").is_none());
    }
}
