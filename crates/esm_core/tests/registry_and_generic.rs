use std::io::Cursor;

use esm_core::codec::{LoadContext, RecordCodec};
use esm_core::config::ReadOptions;
use esm_core::error::{EsmError, EsmErrorKind};
use esm_core::header::RecordHeader;
use esm_core::reader::LittleEndianReader;
use esm_core::records::GenericRecord;
use esm_core::records::skyrim::{ASPC, AcousticSpaceRecord, CLFM};
use esm_core::{Dialect, RecordRegistry, Tag};

const AACT: &[u8] = b"AACT\x19\0\0\0\0\0\0\0\x65\x40\x09\0\x11\x60\x0C\0\x1F\0\x01\0EDID\x13\0ActionShieldChange\0";

fn dispatch(
    registry: &RecordRegistry,
    bytes: &[u8],
    options: &ReadOptions,
) -> Result<Box<dyn RecordCodec>, EsmError> {
    let mut reader = LittleEndianReader::new(Cursor::new(bytes));
    let tag = reader.read_tag()?;
    registry.dispatch(tag, &mut reader, &LoadContext::plain(), options)
}

fn skyrim() -> RecordRegistry {
    RecordRegistry::with_builtin(Dialect::Skyrim).expect("builtin registry")
}

#[test]
fn registering_a_tag_twice_fails() {
    let mut builder = RecordRegistry::builder(Dialect::Skyrim);
    builder
        .register(ASPC, AcousticSpaceRecord::boxed)
        .expect("first registration");
    let err = builder
        .register(ASPC, AcousticSpaceRecord::boxed)
        .expect_err("second registration");
    assert!(matches!(err, EsmError::DuplicateRegistration(tag) if tag == ASPC));
    assert_eq!(err.kind(), EsmErrorKind::DuplicateRegistration);
}

#[test]
fn builtin_registries_list_their_schemas() {
    let sr = skyrim();
    assert_eq!(sr.dialect(), Dialect::Skyrim);
    assert_eq!(sr.tags(), vec![ASPC, CLFM, Tag::TES4]);
    assert!(!sr.is_registered(Tag(*b"AACT")));

    let mw = RecordRegistry::with_builtin(Dialect::Morrowind).expect("builtin registry");
    assert_eq!(
        mw.tags(),
        vec![Tag(*b"CELL"), Tag(*b"GLOB"), Tag::TES3]
    );
}

#[test]
fn registry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecordRegistry>();

    let registry = skyrim();
    std::thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                let record = dispatch(&registry, AACT, &ReadOptions::default()).expect("load");
                assert_eq!(record.written_size(), 0x19);
            });
        }
    });
}

#[test]
fn generic_record_keeps_payload_verbatim() {
    let record = dispatch(&skyrim(), AACT, &ReadOptions::default()).expect("AACT loads");
    assert!(record.stores_raw_payload());
    assert_eq!(record.header().form_id(), Some(0x0009_4065));
    assert_eq!(record.editor_id().as_deref(), Some("ActionShieldChange"));
    assert_eq!(record.to_bytes().expect("save"), AACT);
}

#[test]
fn generic_record_size_is_capped() {
    let mut bytes = b"AACT".to_vec();
    let size = 256 * 1024 + 1;
    bytes.extend_from_slice(&(size as u32).to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);
    bytes.resize(24 + size, 0);

    let err = dispatch(&skyrim(), &bytes, &ReadOptions::default()).expect_err("over cap");
    assert!(matches!(
        err,
        EsmError::OversizedRecord { size: s, limit: 262_144, .. } if s == size as u32
    ));

    let relaxed = ReadOptions {
        max_record_size: 1024 * 1024,
        ..ReadOptions::default()
    };
    let record = dispatch(&skyrim(), &bytes, &relaxed).expect("raised cap");
    assert_eq!(record.written_size(), size as u32);
}

#[test]
fn generic_clones_do_not_share_storage() {
    let mut original = GenericRecord::new(Tag(*b"AACT"), Dialect::Skyrim);
    original.set_data(vec![1, 2, 3]);
    let mut copy = original.clone();
    copy.set_data(vec![9]);
    assert_eq!(original.data(), &[1, 2, 3]);
    assert_eq!(copy.data(), &[9]);
    assert_ne!(original, copy);
}

#[test]
fn generic_load_reads_exactly_the_declared_size() {
    let mut bytes = AACT.to_vec();
    bytes.extend_from_slice(b"trailing");
    let mut reader = LittleEndianReader::new(Cursor::new(&bytes[..]));
    let tag = reader.read_tag().expect("tag");
    let header = RecordHeader::read(&mut reader, Dialect::Skyrim, tag).expect("header");
    let record = GenericRecord::load(&mut reader, header).expect("load");
    assert_eq!(record.data(), &AACT[24..]);
    assert_eq!(reader.position().expect("position"), AACT.len() as u64);
}

#[test]
fn deleted_generic_load_still_consumes_the_declared_size() {
    let mut bytes = AACT.to_vec();
    bytes[8] |= 0x20;
    bytes.extend_from_slice(AACT);
    let mut reader = LittleEndianReader::new(Cursor::new(&bytes[..]));
    let header = RecordHeader::read_tagged(&mut reader, Dialect::Skyrim).expect("header");
    let record = GenericRecord::load(&mut reader, header).expect("load");
    assert!(record.data().is_empty());
    assert_eq!(reader.position().expect("position"), AACT.len() as u64);

    let next = RecordHeader::read_tagged(&mut reader, Dialect::Skyrim).expect("next header");
    assert_eq!(next.tag, Tag(*b"AACT"));
    assert!(!next.is_deleted());
}

#[test]
fn deleted_generic_record_is_written_header_only() {
    let mut bytes = AACT.to_vec();
    bytes[8] |= 0x20;
    let record = dispatch(&skyrim(), &bytes, &ReadOptions::default()).expect("load");
    assert_eq!(record.written_size(), 0);
    let saved = record.to_bytes().expect("save");
    assert_eq!(saved.len(), 24);
    assert_eq!(&saved[4..8], &[0, 0, 0, 0]);
}

#[test]
fn compressed_generic_record_is_not_reinflated() {
    let mut bytes = b"AACT".to_vec();
    let payload = b"\x10\0\0\0not really zlib";
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&0x0004_0000u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 12]);
    bytes.extend_from_slice(payload);

    let record = dispatch(&skyrim(), &bytes, &ReadOptions::default()).expect("load");
    assert!(record.header().is_compressed());
    assert_eq!(record.editor_id(), None);
    assert_eq!(record.to_bytes().expect("save"), bytes);
}

#[test]
fn corrupt_compressed_payload_of_a_schema_is_rejected() {
    let mut bytes = b"ASPC".to_vec();
    let payload = b"\x40\0\0\0not really zlib";
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&0x0004_0000u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 12]);
    bytes.extend_from_slice(payload);

    let err = dispatch(&skyrim(), &bytes, &ReadOptions::default()).expect_err("bad zlib");
    assert_eq!(err.kind(), EsmErrorKind::Decompression);
}

/// A schema whose size prediction is wrong.
#[derive(Debug, Clone, PartialEq)]
struct Miscounted {
    header: RecordHeader,
}

impl RecordCodec for Miscounted {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(
        &mut self,
        cursor: &mut esm_core::cursor::SubRecordCursor<'_>,
        _ctx: &LoadContext<'_>,
    ) -> esm_core::Result<()> {
        cursor.take_rest();
        Ok(())
    }

    fn body_size(&self) -> u32 {
        12
    }

    fn write_body(&self, out: &mut esm_core::writer::SubRecordWriter<'_>) -> esm_core::Result<()> {
        out.write_field(Tag(*b"DATA"), &7u32)
    }
}

#[test]
fn size_prediction_mismatch_fails_the_save() {
    let record = Miscounted {
        header: RecordHeader::new(Tag(*b"MISC"), Dialect::Skyrim),
    };
    let mut out = Vec::new();
    let err = record.save(&mut out).expect_err("prediction is off by two");
    assert!(matches!(
        err,
        EsmError::SizePrediction { predicted: 12, written: 10, .. }
    ));
}

#[test]
fn custom_schemas_take_precedence_over_the_fallback() {
    fn miscounted() -> Box<dyn RecordCodec> {
        Box::new(Miscounted {
            header: RecordHeader::new(Tag(*b"AACT"), Dialect::Skyrim),
        })
    }
    let mut builder = RecordRegistry::builder(Dialect::Skyrim);
    builder
        .register(Tag(*b"AACT"), miscounted)
        .expect("register");
    let registry = builder.build();
    let record = dispatch(&registry, AACT, &ReadOptions::default()).expect("load");
    assert!(record.as_any().is::<Miscounted>());
    assert_eq!(record.header().form_id(), Some(0x0009_4065));
}
