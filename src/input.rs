use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// True for arguments that should be expanded as a file-name pattern.
pub fn is_pattern(arg: &str) -> bool {
    arg.contains(['*', '?'])
}

/// Matches `name` against a `*` / `?` wildcard pattern, ignoring ASCII case.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    // Position of the last `*` and the name index it was tried at.
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi].eq_ignore_ascii_case(&n[ni])) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn expand_pattern(arg: &str, cwd: &Path) -> Vec<PathBuf> {
    let path = Path::new(arg);
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => cwd.join(d),
        _ => cwd.to_path_buf(),
    };
    let Some(pattern) = path.file_name().and_then(|f| f.to_str()) else {
        return Vec::new();
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Cannot list {}: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| wildcard_match(pattern, f))
        })
        .collect();
    found.sort();
    found
}

/// Expands command-line arguments into the list of asset files to process.
///
/// Arguments containing `*` or `?` are matched against the files of their
/// directory (the current directory when none is given). Other arguments are
/// taken literally when they carry `extension`, and ignored otherwise.
pub fn resolve_inputs<S: AsRef<str>>(args: &[S], extension: &str) -> io::Result<Vec<PathBuf>> {
    let cwd = env::current_dir()?;
    let mut files = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        if is_pattern(arg) {
            let matched = expand_pattern(arg, &cwd);
            log::debug!("Pattern {} matched {} file(s)", arg, matched.len());
            files.extend(matched);
        } else if has_extension(Path::new(arg), extension) {
            files.push(cwd.join(arg));
        } else {
            log::debug!("Ignoring argument {}: not a .{} file or pattern", arg, extension);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock went backwards")
            .as_nanos();
        let dir = env::temp_dir().join(format!("xnb_recover_input_{nanos}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn wildcards() {
        assert!(wildcard_match("*.xnb", "level1.xnb"));
        assert!(wildcard_match("*.xnb", "LEVEL1.XNB"));
        assert!(wildcard_match("level?.xnb", "level7.xnb"));
        assert!(!wildcard_match("level?.xnb", "level10.xnb"));
        assert!(wildcard_match("l*l*.x*", "level10.xnb"));
        assert!(wildcard_match("*", ""));
        assert!(!wildcard_match("*.xnb", "level1.xnb.bak"));
        assert!(!wildcard_match("a", ""));
    }

    #[test]
    fn patterns_expand_against_their_directory() {
        let dir = temp_dir();
        for name in ["b.xnb", "a.xnb", "notes.txt"] {
            fs::write(dir.join(name), b"").expect("write");
        }
        fs::create_dir_all(dir.join("sub.xnb")).expect("mkdir");

        let pattern = format!("{}/*.xnb", dir.display());
        let files = resolve_inputs(&[pattern], "xnb").expect("resolve");
        assert_eq!(files, vec![dir.join("a.xnb"), dir.join("b.xnb")]);
    }

    #[test]
    fn literal_paths_need_the_extension() {
        let files = resolve_inputs(&["maps/Level.XNB", "readme.md", "tiles"], "xnb")
            .expect("resolve");
        assert_eq!(files.len(), 1);
        assert!(files[0].is_absolute());
        assert!(files[0].ends_with("maps/Level.XNB"));
    }

    #[test]
    fn unreadable_pattern_directory_yields_nothing() {
        let files = resolve_inputs(&["/definitely/not/here/*.xnb"], "xnb").expect("resolve");
        assert!(files.is_empty());
    }
}
