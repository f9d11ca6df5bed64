// crates/server/src/bundle.rs
//! Asset bundle construction.
//!
//! Embedders build the zip their workers download and point
//! `asset_zip_path` at the output. Files at the top of the source directory
//! land in the root of the archive, subdirectories keep their layout.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Context;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use tokio::fs::File;

/// Zip every file under `dir` into `zip_path`, entry names relative to
/// `dir`.
pub async fn bundle_dir(dir: &Path, zip_path: &Path) -> anyhow::Result<()> {
    let file = File::create(zip_path)
        .await
        .with_context(|| format!("creating {}", zip_path.display()))?;
    let mut writer = ZipFileWriter::with_tokio(file);

    let mut pending = VecDeque::from([dir.to_path_buf()]);
    while let Some(current) = pending.pop_front() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("reading {}", current.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let kind = entry.file_type().await?;
            if kind.is_dir() {
                pending.push_back(path);
                continue;
            }
            if !kind.is_file() {
                continue;
            }
            let name = path
                .strip_prefix(dir)
                .with_context(|| format!("resolving archive name for {}", path.display()))?
                .to_string_lossy()
                .into_owned();
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let builder = ZipEntryBuilder::new(name.clone().into(), Compression::Deflate);
            writer
                .write_entry_whole(builder, &data)
                .await
                .with_context(|| format!("writing archive entry {name}"))?;
        }
    }
    writer.close().await.context("closing asset bundle")?;
    Ok(())
}

/// Zip a single in-memory file into `zip_path`.
pub async fn bundle_file(name: &str, data: &[u8], zip_path: &Path) -> anyhow::Result<()> {
    let file = File::create(zip_path)
        .await
        .with_context(|| format!("creating {}", zip_path.display()))?;
    let mut writer = ZipFileWriter::with_tokio(file);
    let builder = ZipEntryBuilder::new(name.to_string().into(), Compression::Deflate);
    writer
        .write_entry_whole(builder, data)
        .await
        .with_context(|| format!("writing archive entry {name}"))?;
    writer.close().await.context("closing asset bundle")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_zip::base::read::mem::ZipFileReader;

    async fn entry_names(zip_path: &Path) -> Vec<String> {
        let data = tokio::fs::read(zip_path).await.unwrap();
        let reader = ZipFileReader::new(data).await.unwrap();
        reader
            .file()
            .entries()
            .iter()
            .map(|entry| entry.filename().as_str().unwrap().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_bundle_file_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("assets.zip");

        bundle_file("task.sh", b"echo hi", &zip_path).await.unwrap();
        assert_eq!(entry_names(&zip_path).await, vec!["task.sh"]);
    }

    #[tokio::test]
    async fn test_bundle_dir_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("lib")).unwrap();
        std::fs::write(src.join("task.sh"), "echo hi").unwrap();
        std::fs::write(src.join("lib").join("helper.txt"), "data").unwrap();

        let zip_path = dir.path().join("assets.zip");
        bundle_dir(&src, &zip_path).await.unwrap();

        let mut names = entry_names(&zip_path).await;
        names.sort();
        assert_eq!(names, vec!["lib/helper.txt", "task.sh"]);
    }
}
