//! Batch extraction to the output directory

mod common;

use common::{gzip_container, ogg, plain, CacheFixture};
use rscache::extract::{find_extracted, ExtractOutcome};
use rscache::{CacheError, CacheReader, ExtractReport, Extractor};
use std::fs;

/// Archive 0 with two good files, an empty record and a broken chain
fn fixture() -> CacheFixture {
    let mut fixture = CacheFixture::new();
    fixture.add_file(0, 0, &plain(&ogg(b"first track")));
    let sector = fixture.add_file(0, 1, &gzip_container(b"\x89PNG image data"));
    fixture.set_record(0, 2, 0, 0);
    fixture.set_record(0, 3, 20, sector);
    fixture.add_file(7, 0, &plain(b"no magic"));
    fixture
}

#[test]
fn test_extract_all() {
    let fixture = fixture();
    let mut reader = CacheReader::open(fixture.write()).unwrap();
    let out = reader.config().output_dir.clone();

    let report = Extractor::new(&mut reader).extract_all().unwrap();
    assert_eq!(
        report,
        ExtractReport {
            written: 3,
            skipped: 0,
            invalid: 1,
            failed: 1,
        }
    );

    assert_eq!(fs::read(out.join("0").join("0.ogg")).unwrap(), b"OggSfirst track");
    assert_eq!(fs::read(out.join("0").join("1.png")).unwrap(), b"\x89PNG image data");
    assert_eq!(fs::read(out.join("7").join("0")).unwrap(), b"no magic");
    assert!(find_extracted(&out.join("0"), 2).unwrap().is_none());
    assert!(find_extracted(&out.join("0"), 3).unwrap().is_none());
}

#[test]
fn test_existing_files_are_skipped() {
    let fixture = fixture();
    let mut reader = CacheReader::open(fixture.write()).unwrap();

    let first = Extractor::new(&mut reader).extract_archive(0).unwrap();
    assert_eq!(first.written, 2);

    let second = Extractor::new(&mut reader).extract_archive(0).unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.skipped, 2);

    let third = Extractor::new(&mut reader)
        .overwrite(true)
        .extract_archive(0)
        .unwrap();
    assert_eq!(third.written, 2);
    assert_eq!(third.skipped, 0);
}

#[test]
fn test_overwrite_replaces_other_extension() {
    let fixture = fixture();
    let mut reader = CacheReader::open(fixture.write()).unwrap();
    let dir = reader.config().archive_output_dir(0);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("0.bin"), b"stale").unwrap();

    let outcome = Extractor::new(&mut reader).extract_file(0, 0).unwrap();
    assert_eq!(outcome, ExtractOutcome::Skipped(dir.join("0.bin")));

    let outcome = Extractor::new(&mut reader)
        .overwrite(true)
        .extract_file(0, 0)
        .unwrap();
    assert_eq!(outcome, ExtractOutcome::Written(dir.join("0.ogg")));
    assert!(!dir.join("0.bin").exists());
}

#[test]
fn test_missing_archive_is_an_error() {
    let fixture = fixture();
    let mut reader = CacheReader::open(fixture.write()).unwrap();

    assert!(matches!(
        Extractor::new(&mut reader).extract_archive(12),
        Err(CacheError::IndexFileMissing { archive: 12 })
    ));
}

#[test]
fn test_archive_rerun_uses_existing_outputs() {
    let mut fixture = CacheFixture::new();
    for file in 0..2000 {
        fixture.add_file(3, file, &plain(format!("file {}", file).as_bytes()));
    }
    let mut reader = CacheReader::open(fixture.write()).unwrap();
    let dir = reader.config().archive_output_dir(3);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("10.bin"), b"stale").unwrap();
    fs::write(dir.join("010"), b"not an id").unwrap();

    let report = Extractor::new(&mut reader).extract_archive(3).unwrap();
    assert_eq!(report.written, 1999);
    assert_eq!(report.skipped, 1);
    assert_eq!(fs::read(dir.join("10.bin")).unwrap(), b"stale");

    let report = Extractor::new(&mut reader).extract_archive(3).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.skipped, 2000);

    let report = Extractor::new(&mut reader)
        .overwrite(true)
        .extract_archive(3)
        .unwrap();
    assert_eq!(report.written, 2000);
    assert!(!dir.join("10.bin").exists());
    assert_eq!(fs::read(dir.join("10")).unwrap(), b"file 10");
    assert_eq!(fs::read(dir.join("010")).unwrap(), b"not an id");
}
