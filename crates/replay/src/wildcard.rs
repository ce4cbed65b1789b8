//! Expansion of `*`/`?` patterns in replay names.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lists files in a directory whose names match a wildcard.
pub trait FileEnumerator {
    /// File names (not paths) in `dir` matching `wildcard`. Not recursive.
    fn list_matching(&self, dir: &Path, wildcard: &str) -> io::Result<Vec<String>>;
}

/// The local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileEnumerator for LocalFileSystem {
    fn list_matching(&self, dir: &Path, wildcard: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && wildcard_match(wildcard, name)
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

pub fn has_wildcard(name: &str) -> bool {
    name.contains(['*', '?'])
}

/// Match `name` against `pattern`, where `*` matches any run of characters
/// and `?` exactly one. ASCII letters compare case-insensitively.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    // Position after the last `*` seen, and the name position it matched up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                p += 1;
                backtrack = Some((p, n));
            }
            Some(&c) if c == '?' || c.eq_ignore_ascii_case(&name[n]) => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star_p, star_n)) => {
                    p = star_p;
                    n = star_n + 1;
                    backtrack = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Split a name at its last `/` or `\` into directory prefix (separator
/// included) and final component.
fn split_dir(name: &str) -> (&str, &str) {
    match name.rfind(['/', '\\']) {
        Some(at) => name.split_at(at + 1),
        None => ("", name),
    }
}

/// Expand wildcard names against `replay_dir`.
///
/// Names without `*` or `?` pass through unchanged. A wildcard name is
/// replaced by the sorted matching files of its directory, each named
/// relative to `replay_dir` with the original directory prefix. A pattern
/// that matches nothing, or whose directory cannot be listed, expands to
/// nothing and is logged.
pub fn resolve_wildcards(
    names: &[String],
    replay_dir: &Path,
    files: &dyn FileEnumerator,
) -> Vec<String> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if !has_wildcard(name) {
            resolved.push(name.clone());
            continue;
        }

        let (prefix, wildcard) = split_dir(name);
        let dir: PathBuf = replay_dir.join(prefix);
        let mut matches = match files.list_matching(&dir, wildcard) {
            Ok(matches) => matches,
            Err(err) => {
                log::warn!("cannot list {} for {name}: {err}", dir.display());
                continue;
            }
        };
        if matches.is_empty() {
            log::warn!("no replays match {name}");
        }
        matches.sort();
        log::debug!("{name} expands to {} replays", matches.len());
        resolved.extend(matches.into_iter().map(|file| format!("{prefix}{file}")));
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.rep", "game.rep"));
        assert!(wildcard_match("*.rep", ".rep"));
        assert!(wildcard_match("g?me.REP", "game.rep"));
        assert!(wildcard_match("a*b*c", "aXXbYYbc"));
        assert!(wildcard_match("*", ""));
        assert!(!wildcard_match("*.rep", "game.rep.bak"));
        assert!(!wildcard_match("?", ""));
        assert!(!wildcard_match("a*b", "acb1"));
    }

    #[test]
    fn test_split_dir_uses_last_separator() {
        assert_eq!(split_dir("a/b\\c*.rep"), ("a/b\\", "c*.rep"));
        assert_eq!(split_dir("*.rep"), ("", "*.rep"));
    }

    struct Listing(Vec<&'static str>);

    impl FileEnumerator for Listing {
        fn list_matching(&self, _dir: &Path, wildcard: &str) -> io::Result<Vec<String>> {
            Ok(self
                .0
                .iter()
                .filter(|n| wildcard_match(wildcard, n))
                .map(|n| n.to_string())
                .collect())
        }
    }

    #[test]
    fn test_plain_names_pass_through_in_order() {
        let names = vec!["z.rep".to_string(), "a.rep".to_string()];
        let out = resolve_wildcards(&names, Path::new("Replays"), &Listing(vec![]));
        assert_eq!(out, names);
    }

    #[test]
    fn test_expansion_sorted_with_prefix() {
        let names = vec!["ladder/*.rep".to_string(), "x.rep".to_string()];
        let files = Listing(vec!["b.rep", "a.rep", "notes.txt"]);
        let out = resolve_wildcards(&names, Path::new("Replays"), &files);
        assert_eq!(out, vec!["ladder/a.rep", "ladder/b.rep", "x.rep"]);
    }

    #[test]
    fn test_no_match_expands_to_nothing() {
        let names = vec!["*.none".to_string()];
        assert!(resolve_wildcards(&names, Path::new("Replays"), &Listing(vec!["a.rep"])).is_empty());
    }

    #[test]
    fn test_local_file_system_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.rep"), b"").unwrap();
        fs::write(dir.path().join("two.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("three.rep")).unwrap();
        let mut names = LocalFileSystem.list_matching(dir.path(), "*.rep").unwrap();
        names.sort();
        assert_eq!(names, vec!["one.rep"]);
    }
}
