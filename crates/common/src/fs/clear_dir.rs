use std::{
    fs::{create_dir_all, read_dir, remove_dir_all, remove_file},
    path::Path,
};

use anyhow::{Context, Result};

/// This method clears the passed directory of all of the files and directories contained within
/// without deleting the directory. A directory that does not exist yet is created empty.
pub fn clear_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()));
    }

    for entry in
        read_dir(path).with_context(|| format!("Failed to read directory: {}", path.display()))?
    {
        let entry = entry
            .with_context(|| format!("Failed to read an entry in directory: {}", path.display()))?;
        let entry_path = entry.path();

        if entry_path.is_file() {
            remove_file(&entry_path)
                .with_context(|| format!("Failed to remove file: {}", entry_path.display()))?
        } else {
            remove_dir_all(&entry_path)
                .with_context(|| format!("Failed to remove directory: {}", entry_path.display()))?
        }
    }
    Ok(())
}

/// Removes the directory and everything in it. Missing directories are not an error since there is
/// nothing left to clean up.
pub fn remove_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    remove_dir_all(path).with_context(|| format!("Failed to remove directory: {}", path.display()))
}
