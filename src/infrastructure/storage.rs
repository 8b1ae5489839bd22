use std::path::{Path, PathBuf};

use tokio::fs::File;
use tracing::{debug, info};

use crate::domain::error::{DeviceError, DeviceResult};

/// Copy a firmware image into a mounted mass-storage directory.
///
/// The destination file keeps the source file name and is overwritten if it
/// already exists. Returns the number of bytes copied.
pub async fn copy_into_dir(source: &Path, dest_dir: &Path) -> DeviceResult<u64> {
    let file_name = source.file_name().ok_or_else(|| DeviceError::Storage {
        message: format!("source path {} has no file name", source.display()),
    })?;
    let dest: PathBuf = dest_dir.join(file_name);

    let mut reader = File::open(source).await.map_err(|e| DeviceError::Storage {
        message: format!("failed to open {}: {}", source.display(), e),
    })?;
    let mut writer = File::create(&dest).await.map_err(|e| DeviceError::Storage {
        message: format!("failed to create {}: {}", dest.display(), e),
    })?;

    debug!("copying {} to {}", source.display(), dest.display());
    let bytes = tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| DeviceError::Storage {
            message: format!("failed to copy to {}: {}", dest.display(), e),
        })?;

    writer
        .sync_all()
        .await
        .map_err(|e| DeviceError::Storage {
            message: format!("failed to flush {}: {}", dest.display(), e),
        })?;
    info!("copied {} bytes to {}", bytes, dest.display());
    Ok(bytes)
}
