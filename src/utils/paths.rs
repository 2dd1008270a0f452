use std::path::Path;

/// Create the parent directory of `path` if it does not exist yet.
/// Bare file names need nothing.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if !parent.exists() {
        std::fs::create_dir_all(parent)?;
        tracing::info!("Created output directory: '{}'", parent.display());
    }
    Ok(())
}
