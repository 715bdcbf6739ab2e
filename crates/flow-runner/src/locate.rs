//! Project root resolution.

use crate::runner::FlowError;
use camino::{Utf8Path, Utf8PathBuf};

/// Marker file whose directory is a Flow project root.
pub const FLOWCONFIG: &str = ".flowconfig";

/// Maximum number of directories inspected while walking up.
pub const MAX_ROOT_ASCENT: usize = 100;

/// Finds the nearest ancestor of `file` that contains a `.flowconfig`.
///
/// The search starts at the file's parent directory. Relative paths are
/// resolved against the current directory first. The returned directory
/// is used as the working directory of the checker, which sets the scope of
/// its analysis.
pub fn locate_project_root(file: &Utf8Path) -> Result<Utf8PathBuf, FlowError> {
    locate_project_root_within(file, MAX_ROOT_ASCENT)
}

/// Like [`locate_project_root`], but inspects at most `max_steps`
/// directories.
pub fn locate_project_root_within(
    file: &Utf8Path,
    max_steps: usize,
) -> Result<Utf8PathBuf, FlowError> {
    let absolute = if file.is_absolute() {
        file.to_owned()
    } else {
        let cwd = std::env::current_dir()
            .ok()
            .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
            .ok_or_else(|| FlowError::RootNotFound(file.to_owned()))?;
        cwd.join(file)
    };
    let mut current = absolute.parent();

    for _ in 0..max_steps {
        let Some(dir) = current else {
            break;
        };

        if dir.join(FLOWCONFIG).is_file() {
            return Ok(dir.to_owned());
        }

        current = dir.parent();
    }

    Err(FlowError::RootNotFound(file.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_finds_marker_three_levels_up() {
        let (_guard, root) = utf8_tempdir();
        fs::write(root.join(FLOWCONFIG), "[options]\n").unwrap();
        let nested = root.join("src/components");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("button.js");

        // src/components -> src -> root
        assert_eq!(locate_project_root_within(&file, 3).unwrap(), root);
        assert_eq!(locate_project_root(&file).unwrap(), root);
    }

    #[test]
    fn test_nearest_marker_wins() {
        let (_guard, root) = utf8_tempdir();
        fs::write(root.join(FLOWCONFIG), "").unwrap();
        let package = root.join("packages/ui");
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join(FLOWCONFIG), "").unwrap();

        let file = package.join("index.js");
        assert_eq!(locate_project_root(&file).unwrap(), package);
    }

    #[test]
    fn test_step_bound_reports_not_found() {
        let (_guard, root) = utf8_tempdir();
        fs::write(root.join(FLOWCONFIG), "").unwrap();
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("c.js");

        let err = locate_project_root_within(&file, 2).unwrap_err();
        assert!(matches!(err, FlowError::RootNotFound(path) if path == file));
    }

    #[test]
    fn test_directory_named_like_marker_is_ignored() {
        let (_guard, root) = utf8_tempdir();
        fs::create_dir_all(root.join("app").join(FLOWCONFIG)).unwrap();
        fs::write(root.join(FLOWCONFIG), "").unwrap();

        let file = root.join("app/main.js");
        assert_eq!(locate_project_root(&file).unwrap(), root);
    }

    #[test]
    fn test_relative_path_walks_above_current_dir() {
        let (_guard, root) = utf8_tempdir();
        fs::write(root.join(FLOWCONFIG), "").unwrap();
        let sub = root.join("sub");
        fs::create_dir_all(sub.join("src")).unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(&sub).unwrap();
        let found = locate_project_root(Utf8Path::new("src/a.js"));
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(
            found.unwrap().canonicalize_utf8().unwrap(),
            root.canonicalize_utf8().unwrap()
        );
    }

    #[test]
    fn test_zero_steps_never_matches() {
        let (_guard, root) = utf8_tempdir();
        fs::write(root.join(FLOWCONFIG), "").unwrap();

        let file = root.join("main.js");
        assert!(locate_project_root_within(&file, 0).is_err());
    }
}
