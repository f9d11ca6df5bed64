// crates/worker/src/update.rs
//! Asset bundle updates: version probe, download, extraction.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_zip::base::read::mem::ZipFileReader;
use tracing::info;

use crate::config::WorkerConfig;

/// Version tag recorded next to the assets, if any.
pub async fn installed_version(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path).await.ok()
}

/// Record the installed tag. Temp-write + rename, so a torn write can never
/// leave a bogus tag that suppresses the next update.
pub async fn record_version(path: &Path, version: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, version)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Ask the server which bundle it currently serves.
pub async fn remote_version(http: &reqwest::Client, base_url: &str) -> anyhow::Result<String> {
    let response = http
        .get(format!("{base_url}/version"))
        .send()
        .await
        .context("requesting version")?
        .error_for_status()
        .context("version request rejected")?;
    response.text().await.context("reading version body")
}

/// Wipe the assets directory and install the bundle for `version`.
pub async fn perform_update(
    http: &reqwest::Client,
    config: &WorkerConfig,
    version: &str,
) -> anyhow::Result<()> {
    let dir = &config.task_assets_dir;
    if tokio::fs::metadata(dir).await.is_ok() {
        info!("removing stale task assets");
        tokio::fs::remove_dir_all(dir)
            .await
            .with_context(|| format!("removing {}", dir.display()))?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    info!(version, "downloading asset bundle");
    let response = http
        .get(format!("{}/assets.zip", config.http_base()))
        .send()
        .await
        .context("requesting asset bundle")?
        .error_for_status()
        .context("asset bundle request rejected")?;
    let bytes = response.bytes().await.context("downloading asset bundle")?;

    extract_bundle(bytes.to_vec(), dir).await?;
    record_version(&config.version_file, version).await?;
    info!(version, "assets updated");
    Ok(())
}

/// Unzip an in-memory bundle into `dest`. Entry names are confined to the
/// destination: absolute paths and `..` components are rejected.
pub async fn extract_bundle(data: Vec<u8>, dest: &Path) -> anyhow::Result<()> {
    let reader = ZipFileReader::new(data).await.context("reading asset bundle")?;
    for index in 0..reader.file().entries().len() {
        let (name, is_dir) = {
            let entry = &reader.file().entries()[index];
            let name = entry
                .filename()
                .as_str()
                .context("non-UTF-8 bundle entry name")?
                .to_owned();
            (name, entry.dir().context("reading bundle entry metadata")?)
        };
        let target = confined_path(dest, &name)?;
        if is_dir {
            tokio::fs::create_dir_all(&target)
                .await
                .with_context(|| format!("creating {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut entry_reader = reader
            .reader_with_entry(index)
            .await
            .with_context(|| format!("opening bundle entry {name}"))?;
        let mut contents = Vec::new();
        entry_reader
            .read_to_end_checked(&mut contents)
            .await
            .with_context(|| format!("decompressing bundle entry {name}"))?;
        tokio::fs::write(&target, contents)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
    }
    Ok(())
}

fn confined_path(dest: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let mut path = dest.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            std::path::Component::Normal(part) => path.push(part),
            std::path::Component::CurDir => {}
            _ => bail!("bundle entry {name:?} escapes the assets directory"),
        }
    }
    Ok(path)
}
