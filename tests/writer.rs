//! Archive creation

mod common;

use common::*;
use futures::{StreamExt, stream};
use rezip::io::collect_stream;
use rezip::zip::*;
use std::time::Duration;

fn items() -> Vec<ZipItem> {
    vec![
        ZipItem::text("hello.txt", "Hello world\n"),
        ZipItem::text("long.txt", "the quick brown fox ".repeat(50)).with_comment("repetitive"),
        ZipItem::directory("empty/"),
        ZipItem::file("empty/zero.bin", Vec::new()),
        ZipItem::file("empty/ones.bin", vec![1u8; 33]),
    ]
}

#[tokio::test]
async fn create_zip_round_trips() {
    // Items arrive asynchronously
    let source = stream::iter(items()).then(|item| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        item
    });
    let bytes = collect_stream(create_zip(source, options())).await.unwrap();
    assert_end_record_consistent(&bytes);

    let mut extractor = open(bytes).await;
    let entries = extractor.list_files().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
    assert_eq!(entries[1].compression_method, CompressionMethod::Deflate);
    assert_eq!(entries[1].comment, "repetitive");
    assert!(entries[1].compressed_size < entries[1].uncompressed_size);
    assert!(entries[2].is_directory);
    assert_eq!(entries[4].compression_method, CompressionMethod::Deflate);
    assert!(entries.iter().all(|e| e.flags & FLAG_UTF8 != 0));

    for item in items().iter().filter(|i| !i.is_directory) {
        let data = extractor.extract_entry(&item.name).await.unwrap();
        assert_eq!(Some(&data), item.data.as_ref(), "{}", item.name);
    }
}

#[tokio::test]
async fn empty_stream_writes_empty_archive() {
    let bytes = collect_stream(create_zip(stream::empty(), options())).await.unwrap();
    assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
    let extractor = open(bytes).await;
    assert!(extractor.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn threshold_is_configurable() {
    let bytes = build_zip_with(
        &[ZipItem::text("long.txt", "the quick brown fox ".repeat(50))],
        WriterOptions {
            deflate_threshold: 10_000,
            ..options()
        },
    );
    let extractor = open(bytes).await;
    assert_eq!(
        extractor.find("long.txt").unwrap().compression_method,
        CompressionMethod::Stored
    );
}

#[tokio::test]
async fn written_archive_streams_through_the_transformer() {
    let bytes = build_zip_with(
        &items(),
        WriterOptions {
            comment: Some("made by rezip".into()),
            ..options()
        },
    );
    let out = transform_in_chunks(&bytes, 7, PassthroughAll).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn unicode_names_are_flagged() {
    let bytes = build_zip(&[ZipItem::text("żółw.txt", "turtle")]);
    let Decode::Complete { record, .. } = LocalFileHeader::decode(&bytes).unwrap() else {
        panic!("expected a local header");
    };
    assert_eq!(record.name(), "żółw.txt");
    assert_eq!(record.flags & FLAG_UTF8, FLAG_UTF8);
    assert_eq!(record.last_modified, options().last_modified);
}
