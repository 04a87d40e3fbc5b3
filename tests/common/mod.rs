//! Archive builders shared by the integration tests

#![allow(dead_code)]

use rezip::io::MemoryReader;
use rezip::zip::*;
use std::sync::Arc;

pub fn options() -> WriterOptions {
    WriterOptions {
        last_modified: DosDateTime::from_components(2023, 10, 5, 14, 30, 12),
        ..WriterOptions::default()
    }
}

/// Write `items` into an in-memory archive.
pub fn build_zip(items: &[ZipItem]) -> Vec<u8> {
    build_zip_with(items, options())
}

pub fn build_zip_with(items: &[ZipItem], options: WriterOptions) -> Vec<u8> {
    let mut writer = ZipWriter::new(options);
    let mut out = Vec::new();
    for item in items {
        for chunk in writer.add(item).unwrap() {
            out.extend_from_slice(&chunk);
        }
    }
    out.extend_from_slice(&writer.finish().unwrap());
    out
}

/// The three-file archive used by the placeholder scenarios.
pub fn three_files() -> Vec<u8> {
    build_zip(&[
        ZipItem::text("hello.txt", "Hello world\n"),
        ZipItem::text("three-files/donut.txt", "I like to eat a ${placeholder} every morning.\n".repeat(4)),
        ZipItem::directory("world"),
        ZipItem::file("world/binary.bin", (0..=255u8).cycle().take(2000).collect::<Vec<_>>())
            .with_comment("File #3"),
    ])
}

/// Build an archive whose entries carry their sizes in data descriptors
/// (flag bit 3), the way streaming zippers write them.
pub fn build_streamed_zip(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut directory = Vec::new();

    for &(name, content, method) in entries {
        let data = compress(content, method).unwrap();
        let crc = crc32(content);
        let offset = out.len() as u32;
        let header = LocalFileHeader {
            version_needed: 20,
            flags: FLAG_DATA_DESCRIPTOR | FLAG_UTF8,
            compression_method: method,
            last_modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: name.as_bytes().to_vec(),
            extra: Vec::new(),
        };
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&data);
        out.extend_from_slice(
            &DataDescriptor {
                crc32: crc,
                compressed_size: data.len() as u32,
                uncompressed_size: content.len() as u32,
            }
            .encode(),
        );
        directory.push(CentralDirectoryEntry {
            version_made_by: 20,
            version_needed: 20,
            flags: header.flags,
            compression_method: method,
            last_modified: header.last_modified,
            crc32: crc,
            compressed_size: data.len() as u32,
            uncompressed_size: content.len() as u32,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0x80,
            local_header_offset: offset,
            file_name: name.as_bytes().to_vec(),
            extra: Vec::new(),
            comment: Vec::new(),
        });
    }

    let cd_offset = out.len() as u32;
    for record in &directory {
        out.extend_from_slice(&record.encode());
    }
    let cd_size = out.len() as u32 - cd_offset;
    out.extend_from_slice(
        &EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: directory.len() as u16,
            total_entries: directory.len() as u16,
            cd_size,
            cd_offset,
            comment: Vec::new(),
        }
        .encode(),
    );
    out
}

pub async fn open(bytes: Vec<u8>) -> ZipExtractor<MemoryReader> {
    let mut extractor = ZipExtractor::new(Arc::new(MemoryReader::new(bytes)));
    extractor.open().await.unwrap();
    extractor
}

/// Every non-directory entry with its extracted content, in directory order.
pub async fn read_all(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut extractor = open(bytes).await;
    let names: Vec<String> = extractor
        .list_files()
        .unwrap()
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| e.file_name.clone())
        .collect();

    let mut out = Vec::new();
    for name in names {
        let data = extractor.extract_entry(&name).await.unwrap();
        out.push((name, data));
    }
    out
}

/// Run the synchronous transformer over `bytes` split into `chunk_size` pieces.
pub fn transform_in_chunks<S: Selector>(bytes: &[u8], chunk_size: usize, selector: S) -> Result<Vec<u8>> {
    let mut transformer = ZipTransformer::new(selector);
    let mut out = Vec::new();
    for chunk in bytes.chunks(chunk_size) {
        for piece in transformer.push(chunk)? {
            out.extend_from_slice(&piece);
        }
    }
    transformer.finish()?;
    Ok(out)
}

/// Check that the EOCD exactly describes the Central Directory before it.
pub fn assert_end_record_consistent(bytes: &[u8]) {
    let pos = scan_for_eocd(bytes).expect("end of central directory");
    let end = EndOfCentralDirectory::decode_tail(&bytes[pos..]).unwrap();
    assert_eq!(end.cd_offset as usize + end.cd_size as usize, pos);
    let entries = parse_central_directory(&bytes[end.cd_offset as usize..pos]).unwrap();
    assert_eq!(entries.len(), end.total_entries as usize);
    assert_eq!(end.disk_entries, end.total_entries);
}
