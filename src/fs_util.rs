use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::VizError;

/// Extracts a downloaded output bundle into `target_dir`. A corrupt archive
/// or an entry escaping the target directory fails the whole extraction.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), VizError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| VizError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| VizError::Filesystem(format!("read zip {}: {err}", zip_path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(VizError::Filesystem(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| VizError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| VizError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| VizError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| VizError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::{SimpleFileOptions, ZipWriter};

    use super::*;

    #[test]
    fn extract_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("bundle.zip");

        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = ZipWriter::new(file);
        writer
            .start_file("eui.json", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(br#"{"eui": 42.5}"#).unwrap();
        writer.finish().unwrap();

        let out_dir = temp.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        extract_zip(&zip_path, &out_dir).unwrap();
        let content = fs::read_to_string(out_dir.join("eui.json")).unwrap();
        assert_eq!(content, r#"{"eui": 42.5}"#);
    }

    #[test]
    fn extract_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("bad.zip");
        fs::write(&zip_path, b"not a zip archive").unwrap();
        let err = extract_zip(&zip_path, temp.path()).unwrap_err();
        assert!(matches!(err, VizError::Filesystem(_)));
    }
}
