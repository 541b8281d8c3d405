use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

fn extractor(delete_after: bool) -> Extractor {
    Extractor::new(&ExtractionConfig {
        enabled: true,
        delete_after,
        tar_path: None,
    })
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zip_is_extracted_into_stem_directory() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("900.zip");
    create_zip_archive(&archive, &[("a.txt", b"alpha"), ("sub/b.txt", b"beta")]);

    let extracted = extractor(false).extract(&archive).await.unwrap();

    assert_eq!(extracted.dir, dir.path().join("900"));
    assert_eq!(extracted.files.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("900").join("sub").join("b.txt")).unwrap(),
        "beta"
    );
    assert!(archive.exists(), "archive kept unless delete_after");
}

#[tokio::test]
async fn delete_after_removes_the_archive() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("bundle.zip");
    create_zip_archive(&archive, &[("a.txt", b"alpha")]);

    extractor(true).extract(&archive).await.unwrap();
    assert!(!archive.exists());
    assert!(dir.path().join("bundle").join("a.txt").is_file());
}

#[test]
fn zip_entries_escaping_destination_are_skipped() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("evil.zip");
    create_zip_archive(&archive, &[("../escape.txt", b"x"), ("ok.txt", b"y")]);

    let dest = dir.path().join("out");
    let files = ZipExtractor::extract(&archive, &dest).unwrap();

    assert_eq!(files, [dest.join("ok.txt")]);
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn corrupt_zip_is_an_extraction_failure() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("broken.zip");
    std::fs::write(&archive, b"PK\x03\x04 truncated").unwrap();

    let err = ZipExtractor::extract(&archive, &dir.path().join("out")).unwrap_err();
    assert!(
        matches!(err, Error::Extraction(ExtractionError::Failed { .. })),
        "got {err}"
    );
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unrecognised_signature_is_unknown_format() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("data.csv");
    std::fs::write(&file, "a,b\n1,2\n").unwrap();

    let err = extractor(false).extract(&file).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::UnknownFormat { .. })
    ));
}

#[tokio::test]
async fn rar_has_no_extractor() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("x.rar");
    std::fs::write(&file, b"Rar!\x1A\x07\x01\x00rest").unwrap();

    let err = extractor(false).extract(&file).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::UnknownFormat { .. })
    ));
}

#[tokio::test]
async fn missing_tar_binary_is_an_external_tool_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("x.tar.gz");
    std::fs::write(&file, b"\x1F\x8B\x08\x00rest").unwrap();

    let extractor = Extractor::new(&ExtractionConfig {
        enabled: true,
        delete_after: false,
        tar_path: Some(dir.path().join("no-such-tar")),
    });
    let err = extractor.extract(&file).await.unwrap_err();
    assert!(matches!(err, Error::ExternalTool(_)), "got {err}");
}

#[test]
fn configured_tar_is_reported_only_if_it_exists() {
    let dir = TempDir::new().unwrap();
    let config = |tar_path| ExtractionConfig {
        enabled: true,
        delete_after: false,
        tar_path: Some(tar_path),
    };

    let missing = Extractor::new(&config(dir.path().join("no-such-tar")));
    assert_eq!(missing.check_tools().tar, None);

    let present = dir.path().join("tar");
    std::fs::write(&present, b"").unwrap();
    let found = Extractor::new(&config(present.clone()));
    assert_eq!(found.check_tools().tar, Some(present));
}

#[tokio::test]
async fn tarball_is_extracted_with_system_tar() {
    let Some(tar) = TarExtractor::from_path() else {
        return;
    };

    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("inner.txt"), "inside").unwrap();
    let archive = dir.path().join("pack.tar.gz");
    let status = std::process::Command::new(tar.binary_path())
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(&src)
        .arg("inner.txt")
        .status()
        .unwrap();
    if !status.success() {
        return;
    }

    let extracted = extractor(false).extract(&archive).await.unwrap();
    assert_eq!(extracted.dir, dir.path().join("pack"));
    assert_eq!(extracted.files, [dir.path().join("pack").join("inner.txt")]);
}

#[test]
fn tool_report_lists_tar_formats_only_with_tar() {
    let without = ToolReport { tar: None };
    assert_eq!(
        without.supported(),
        [crate::types::ArchiveType::Zip, crate::types::ArchiveType::SevenZip]
    );

    let with = ToolReport {
        tar: Some("/usr/bin/tar".into()),
    };
    assert!(with.supported().contains(&crate::types::ArchiveType::Zstd));
}

#[test]
fn extraction_dir_strips_known_suffixes() {
    assert_eq!(extraction_dir(Path::new("/o/a.tar.gz")), Path::new("/o/a"));
    assert_eq!(extraction_dir(Path::new("/o/a.TGZ")), Path::new("/o/a"));
    assert_eq!(extraction_dir(Path::new("/o/a.7z")), Path::new("/o/a"));
    assert_eq!(extraction_dir(Path::new("/o/v1.2.zip")), Path::new("/o/v1.2"));
    assert_eq!(
        extraction_dir(Path::new("/o/noext")),
        Path::new("/o/noext_extracted")
    );
    assert_eq!(extraction_dir(Path::new("/o/.zip")), Path::new("/o/.zip_extracted"));
}
