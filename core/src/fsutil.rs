//! Small filesystem helpers shared by the file-backed stores.

use std::path::{Path, PathBuf};
use tokio::fs;

/// Write `bytes` to `path` through a sibling temp file and a rename, so readers
/// only ever observe the old or the new contents.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
