//! Laying out a package's filesystem tree in scratch space.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::TargetSpec;

/// A file placed in a staged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Path relative to the tree root, e.g. `usr/local/bin/tool`.
    pub path: PathBuf,
    pub mode: u32,
}

/// A directory laid out exactly as the package should install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTree {
    pub root: PathBuf,
    pub files: Vec<StagedFile>,
}

/// Directory the binary is installed into.
pub fn install_dir(root_only: bool) -> &'static str {
    if root_only { "usr/local/sbin" } else { "usr/local/bin" }
}

/// Stage `binary` (and any bash completion) under `root`.
///
/// # Errors
///
/// Returns any I/O error from creating directories or copying files.
pub fn stage(root: &Path, binary: &Path, binary_name: &str, spec: &TargetSpec) -> io::Result<StagedTree> {
    make_dir(root)?;
    let mut files = Vec::new();

    let bin_rel = Path::new(install_dir(spec.root_only)).join(binary_name);
    place_dirs(root, &bin_rel)?;
    fs::copy(binary, root.join(&bin_rel))?;
    set_mode(&root.join(&bin_rel), 0o755)?;
    files.push(StagedFile {
        path: bin_rel,
        mode: 0o755,
    });

    if let Some(script) = spec.bash_completion() {
        let rel = Path::new("etc/bash_completion.d").join(binary_name);
        place_dirs(root, &rel)?;
        let mut content = script.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        fs::write(root.join(&rel), content)?;
        set_mode(&root.join(&rel), 0o644)?;
        files.push(StagedFile {
            path: rel,
            mode: 0o644,
        });
    }

    Ok(StagedTree {
        root: root.to_path_buf(),
        files,
    })
}

/// Create every directory between `root` and the parent of `rel`, 0755.
pub(crate) fn place_dirs(root: &Path, rel: &Path) -> io::Result<()> {
    let mut dir = root.to_path_buf();
    if let Some(parent) = rel.parent() {
        for component in parent.components() {
            dir.push(component);
            make_dir(&dir)?;
        }
    }
    Ok(())
}

pub(crate) fn make_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    set_mode(dir, 0o755)
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn spec(extra: &str) -> TargetSpec {
        let text = format!(
            r#"{{"path": "/x", "repos": [{{"owner": "o", "repo": "tool", "target_binary": "tool"{extra}}}]}}"#
        );
        Config::parse(&text).unwrap().targets.remove(0)
    }

    #[test]
    fn test_stage_binary_and_completion() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("download");
        fs::write(&bin, b"\x7fELF").unwrap();

        let spec = spec(r#", "autocomplete": {"bash": "complete -F _tool tool"}"#);
        let tree = stage(&tmp.path().join("root"), &bin, "tool", &spec).unwrap();

        assert_eq!(tree.files.len(), 2);
        assert_eq!(tree.files[0].path, PathBuf::from("usr/local/bin/tool"));
        assert_eq!(
            fs::read_to_string(tree.root.join("etc/bash_completion.d/tool")).unwrap(),
            "complete -F _tool tool\n"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(tree.root.join("usr/local/bin/tool"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
            let root_mode = fs::metadata(&tree.root).unwrap().permissions().mode();
            assert_eq!(root_mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_root_only_uses_sbin() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("download");
        fs::write(&bin, b"bin").unwrap();

        let tree = stage(&tmp.path().join("root"), &bin, "tool", &spec(r#", "root_only": true"#)).unwrap();
        assert_eq!(tree.files.len(), 1);
        assert!(tree.root.join("usr/local/sbin/tool").is_file());
    }
}
