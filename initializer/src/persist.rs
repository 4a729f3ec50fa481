/*++

Licensed under the Apache-2.0 license.

File Name:

   persist.rs

Abstract:

    Append-only line-oriented persistence with backup-before-write. Each
    provisioned device contributes one line; the previous file contents
    are copied to a `.bak` sibling before every append.

--*/

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const BACKUP_FILE_SUFFIX: &str = ".bak";

pub struct PersistenceManager {
    path: PathBuf,
}

impl PersistenceManager {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, refreshing the backup file first.
    pub fn persist(&self, line: &str) -> std::io::Result<()> {
        if !self.path.exists() {
            File::create(&self.path)?;
        }
        self.create_backup()?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()
    }

    fn create_backup(&self) -> std::io::Result<()> {
        let mut backup = self.path.clone().into_os_string();
        backup.push(BACKUP_FILE_SUFFIX);
        std::fs::copy(&self.path, PathBuf::from(backup))?;
        Ok(())
    }
}
