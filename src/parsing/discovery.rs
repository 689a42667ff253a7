//! Locating benchmark artifacts below the base directory
//!
//! Expected layout (every level is optional apart from the base directory):
//!
//! ```text
//! <base>/<experiment>/.../stage_<N>_lifecycle_metrics.json
//! <base>/<experiment>/.../per_request_lifecycle_metrics.json
//! <base>/<experiment>/.../epp.log
//! <base>/<experiment>/epp_config.yaml
//! <base>/<experiment>/workload/profiles/<profile>/*.yaml
//! ```

use std::fs::read_dir;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const STAGE_PREFIX: &str = "stage_";
const STAGE_SUFFIX: &str = "_lifecycle_metrics.json";
const EPP_LOG_NAME: &str = "epp.log";
const EPP_CONFIG_NAME: &str = "epp_config.yaml";

/// Recursively visits every regular file below `directory_path`, passing
/// each path to `callback`.
///
/// Entries are visited in name order. Hidden entries (leading `.`) are
/// skipped. Sub-directories that cannot be read are skipped; only a failure
/// to read `directory_path` itself is reported.
pub fn find_files<P, F>(directory_path: P, mut callback: F) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&Path),
{
    walk_directory(directory_path.as_ref(), &mut callback)
}

fn walk_directory<F>(current_path: &Path, callback: &mut F) -> io::Result<()>
where
    F: FnMut(&Path),
{
    for path in sorted_entries(current_path)? {
        if path.is_dir() {
            if let Err(e) = walk_directory(&path, callback) {
                debug!(path = %path.display(), error = %e, "skipping unreadable directory");
            }
        } else if path.is_file() {
            callback(&path);
        }
    }

    Ok(())
}

/// Non-hidden entries of a directory, sorted by path
fn sorted_entries(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in read_dir(directory)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Whether `name` looks like `stage_<anything>_lifecycle_metrics.json`
pub fn is_stage_file_name(name: &str) -> bool {
    name.len() >= STAGE_PREFIX.len() + STAGE_SUFFIX.len()
        && name.starts_with(STAGE_PREFIX)
        && name.ends_with(STAGE_SUFFIX)
}

/// Extracts `<N>` from `stage_<N>_lifecycle_metrics.json`
pub fn stage_index(path: &Path) -> Option<u32> {
    let name = file_name(path)?;
    if !is_stage_file_name(name) {
        return None;
    }

    let digits = &name[STAGE_PREFIX.len()..name.len() - STAGE_SUFFIX.len()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// All stage metric files below `root`, sorted and de-duplicated
pub fn find_stage_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    find_files(root, |path| {
        if file_name(path).is_some_and(is_stage_file_name) {
            files.push(path.to_path_buf());
        }
    })?;
    files.sort();
    files.dedup();
    Ok(files)
}

/// All `epp.log` files below `root`, sorted
pub fn find_epp_log_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    find_files(root, |path| {
        if file_name(path) == Some(EPP_LOG_NAME) {
            files.push(path.to_path_buf());
        }
    })?;
    files.sort();
    Ok(files)
}

/// The experiment a file belongs to: the first directory below `base_dir`
/// on the way to `path`.
///
/// Files sitting directly in `base_dir` use the name of that directory, or
/// `"root"` when it has none.
pub fn experiment_label(base_dir: &Path, path: &Path) -> String {
    let parent = path.parent().unwrap_or(Path::new(""));

    if let Ok(relative) = parent.strip_prefix(base_dir) {
        let first = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .find(|c| !c.is_empty() && c != ".");
        if let Some(first) = first {
            return first.into_owned();
        }
    }

    parent
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "root".to_string())
}

/// Finds the workload profile YAML to embed in the report.
///
/// Looks for `<base>/*/workload/profiles/<profile_name>/*.yaml`, or under
/// any profile folder when `profile_name` is [`None`], and returns the first
/// match in path order.
pub fn discover_profile_yaml(base_dir: &Path, profile_name: Option<&str>) -> Option<PathBuf> {
    let mut matches = Vec::new();

    for experiment_dir in sorted_dirs(base_dir) {
        let profiles_dir = experiment_dir.join("workload").join("profiles");
        let profile_dirs = match profile_name {
            Some(name) => vec![profiles_dir.join(name)],
            None => sorted_dirs(&profiles_dir),
        };

        for profile_dir in profile_dirs {
            let Ok(entries) = sorted_entries(&profile_dir) else {
                continue;
            };
            matches.extend(
                entries
                    .into_iter()
                    .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml")),
            );
        }
    }

    matches.sort();
    matches.into_iter().next()
}

/// `(experiment, path)` for every `<base>/<experiment>/epp_config.yaml`,
/// sorted by experiment.
pub fn discover_epp_configs(base_dir: &Path) -> Vec<(String, PathBuf)> {
    sorted_dirs(base_dir)
        .into_iter()
        .filter_map(|dir| {
            let config = dir.join(EPP_CONFIG_NAME);
            let label = file_name(&dir)?.to_string();
            config.is_file().then_some((label, config))
        })
        .collect()
}

fn sorted_dirs(directory: &Path) -> Vec<PathBuf> {
    sorted_entries(directory)
        .map(|entries| entries.into_iter().filter(|p| p.is_dir()).collect())
        .unwrap_or_default()
}
