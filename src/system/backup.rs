//! Pre-upgrade database backup.

use crate::error::Result;
use crate::system::ExternalCommand;
use std::future::Future;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Creates database backups and reports free space for them
pub trait BackupTool {
    /// Free bytes on the filesystem holding `dir`
    fn available_space(&self, dir: &Path) -> impl Future<Output = Result<u64>>;

    /// Dump the database into `dir`, returning the dump path
    fn create_backup(&self, dir: &Path) -> impl Future<Output = Result<PathBuf>>;
}

/// `pg_dump -Fc` of the instance database
#[derive(Debug, Clone)]
pub struct PgDump {
    database: String,
}

impl PgDump {
    /// Dump `database`
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

/// Mount point with the longest prefix match for `path`.
pub(crate) fn mount_for<'a>(path: &Path, mounts: impl IntoIterator<Item = &'a Path>) -> Option<&'a Path> {
    mounts
        .into_iter()
        .filter(|m| path.starts_with(m))
        .max_by_key(|m| m.components().count())
}

impl BackupTool for PgDump {
    async fn available_space(&self, dir: &Path) -> Result<u64> {
        let target = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let disks = Disks::new_with_refreshed_list();
        let mount = mount_for(&target, disks.list().iter().map(|d| d.mount_point()));
        disks
            .list()
            .iter()
            .find(|d| Some(d.mount_point()) == mount)
            .map(|d| d.available_space())
            .ok_or_else(|| {
                anyhow::anyhow!("no mounted filesystem found for {}", target.display()).into()
            })
    }

    async fn create_backup(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let file = dir.join(format!(
            "{}-{}.dump",
            self.database,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ));
        log::info!("Dumping {} to {}", self.database, file.display());
        ExternalCommand::new("pg_dump")
            .args(["-Fc".to_string(), "-f".to_string(), file.display().to_string()])
            .arg(&self.database)
            .run()
            .await?;
        Ok(file)
    }
}
