//! Path validation
//!
//! Maps client-visible virtual paths onto the real filesystem under the
//! shared root. Every resolution is checked after canonicalization, so `..`
//! segments, absolute paths and symlinks cannot reach outside the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// A virtual path together with the real path it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub virtual_path: String,
    pub real_path: PathBuf,
}

/// Stateless after construction; shared by all sessions.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// `root` must already be canonical (see [`crate::config::ServerConfig::validate`]).
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a path that must exist, following symlinks.
    ///
    /// Used for CWD, LIST, NLST, RETR and SIZE.
    pub fn resolve(&self, input: &str, current_virtual_dir: &str) -> Result<ResolvedPath, PathError> {
        let segments = normalize_segments(current_virtual_dir, input)?;
        let virtual_path = join_virtual(&segments);
        let joined = self.join_real(&segments);

        let real_path = match joined.canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PathError::NotFound(virtual_path));
            }
            Err(source) => {
                return Err(PathError::Io {
                    path: virtual_path,
                    source,
                });
            }
        };

        if !real_path.starts_with(&self.root) {
            return Err(PathError::Escape(virtual_path));
        }

        Ok(ResolvedPath {
            virtual_path,
            real_path,
        })
    }

    /// Resolves a directory entry that may not exist yet, without following
    /// the final component.
    ///
    /// The parent directory must exist inside the root. If the entry is a
    /// symlink, its target must also stay inside the root; dangling links are
    /// rejected since creating through them would write to an unchecked place.
    /// Used for STOR, DELE, RNFR, RNTO, MKD and RMD.
    pub fn resolve_entry(
        &self,
        input: &str,
        current_virtual_dir: &str,
    ) -> Result<ResolvedPath, PathError> {
        let mut segments = normalize_segments(current_virtual_dir, input)?;
        let virtual_path = join_virtual(&segments);
        let name = segments.pop().ok_or(PathError::RootEntry)?;

        let parent_virtual = join_virtual(&segments);
        let parent = match self.join_real(&segments).canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PathError::NotFound(parent_virtual));
            }
            Err(source) => {
                return Err(PathError::Io {
                    path: parent_virtual,
                    source,
                });
            }
        };
        if !parent.starts_with(&self.root) {
            return Err(PathError::Escape(virtual_path));
        }
        if !parent.is_dir() {
            return Err(PathError::NotADirectory(parent_virtual));
        }

        let real_path = parent.join(name);
        if let Ok(meta) = real_path.symlink_metadata() {
            if meta.file_type().is_symlink() {
                match real_path.canonicalize() {
                    Ok(target) if target.starts_with(&self.root) => {}
                    _ => return Err(PathError::Escape(virtual_path)),
                }
            }
        }

        Ok(ResolvedPath {
            virtual_path,
            real_path,
        })
    }

    fn join_real(&self, segments: &[&str]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

/// Normalizes `input` against `current_virtual_dir` into a canonical virtual path.
///
/// Relative inputs apply to the current directory, absolute inputs are rooted
/// at "/". A `..` that would climb above "/" fails with [`PathError::Escape`].
pub fn normalize_virtual(current_virtual_dir: &str, input: &str) -> Result<String, PathError> {
    normalize_segments(current_virtual_dir, input).map(|segments| join_virtual(&segments))
}

fn normalize_segments<'a>(current: &'a str, input: &'a str) -> Result<Vec<&'a str>, PathError> {
    let mut segments: Vec<&str> = Vec::new();
    if !input.starts_with('/') {
        push_segments(&mut segments, current, current)?;
    }
    push_segments(&mut segments, input, input)?;
    Ok(segments)
}

fn push_segments<'a>(segments: &mut Vec<&'a str>, path: &'a str, original: &str) -> Result<(), PathError> {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::Escape(original.to_string()));
                }
            }
            name => {
                // Reject anything the host OS would not treat as a plain file name
                // (NUL bytes, drive prefixes, embedded separators on Windows).
                let mut components = Path::new(name).components();
                let plain = matches!(components.next(), Some(Component::Normal(_)))
                    && components.next().is_none()
                    && !name.contains('\0');
                if !plain {
                    return Err(PathError::Escape(original.to_string()));
                }
                segments.push(name);
            }
        }
    }
    Ok(())
}

fn join_virtual(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

/// Last segment of a virtual path, "/" for the root.
pub fn file_name(virtual_path: &str) -> &str {
    virtual_path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/sub")).unwrap();
        fs::write(dir.path().join("docs/readme.txt"), b"hi").unwrap();
        let resolver = PathResolver::new(dir.path().canonicalize().unwrap());
        (dir, resolver)
    }

    #[test]
    fn normalizes_relative_and_absolute_inputs() {
        assert_eq!(normalize_virtual("/", "docs").unwrap(), "/docs");
        assert_eq!(normalize_virtual("/docs", "sub/../sub/.").unwrap(), "/docs/sub");
        assert_eq!(normalize_virtual("/docs/sub", "/other").unwrap(), "/other");
        assert_eq!(normalize_virtual("/docs", "..").unwrap(), "/");
        assert_eq!(normalize_virtual("/", "//a///b/").unwrap(), "/a/b");
    }

    #[test]
    fn climbing_above_root_is_an_escape() {
        for input in ["..", "../etc", "/..", "docs/../../x", "/docs/../../../../etc/passwd"] {
            assert!(
                matches!(normalize_virtual("/", input), Err(PathError::Escape(_))),
                "{input}"
            );
        }
        assert!(matches!(
            normalize_virtual("/docs", "../.."),
            Err(PathError::Escape(_))
        ));
    }

    #[test]
    fn resolve_maps_inside_root() {
        let (_dir, resolver) = setup();
        let resolved = resolver.resolve("docs/readme.txt", "/").unwrap();
        assert_eq!(resolved.virtual_path, "/docs/readme.txt");
        assert!(resolved.real_path.starts_with(resolver.root()));

        let root = resolver.resolve("/", "/docs").unwrap();
        assert_eq!(root.real_path, resolver.root());
    }

    #[test]
    fn resolve_reports_missing_paths() {
        let (_dir, resolver) = setup();
        assert!(matches!(
            resolver.resolve("nope", "/docs"),
            Err(PathError::NotFound(p)) if p == "/docs/nope"
        ));
    }

    #[test]
    fn resolve_entry_allows_new_names_but_not_root() {
        let (_dir, resolver) = setup();
        let entry = resolver.resolve_entry("new.bin", "/docs").unwrap();
        assert_eq!(entry.virtual_path, "/docs/new.bin");
        assert!(!entry.real_path.exists());

        assert!(matches!(resolver.resolve_entry("/", "/"), Err(PathError::RootEntry)));
        assert!(matches!(
            resolver.resolve_entry("missing/new.bin", "/"),
            Err(PathError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve_entry("docs/readme.txt/x", "/"),
            Err(PathError::NotADirectory(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_pointing_outside_are_rejected() {
        let (dir, resolver) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret"),
            dir.path().join("docs/link"),
        )
        .unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("dangling")).unwrap();

        assert!(matches!(resolver.resolve("escape", "/"), Err(PathError::Escape(_))));
        assert!(matches!(
            resolver.resolve("escape/secret", "/"),
            Err(PathError::Escape(_))
        ));
        assert!(matches!(
            resolver.resolve_entry("escape/new", "/"),
            Err(PathError::Escape(_))
        ));
        assert!(matches!(
            resolver.resolve_entry("docs/link", "/"),
            Err(PathError::Escape(_))
        ));
        assert!(matches!(
            resolver.resolve_entry("dangling", "/"),
            Err(PathError::Escape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_inside_root_are_followed() {
        let (dir, resolver) = setup();
        std::os::unix::fs::symlink(dir.path().join("docs"), dir.path().join("alias")).unwrap();
        let resolved = resolver.resolve("alias/readme.txt", "/").unwrap();
        assert!(resolved.real_path.ends_with("docs/readme.txt"));
    }

    #[test]
    fn file_name_of_virtual_paths() {
        assert_eq!(file_name("/docs/readme.txt"), "readme.txt");
        assert_eq!(file_name("/"), "/");
    }
}
