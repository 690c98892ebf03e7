use std::io::Cursor;
use std::num::NonZeroU32;

use esm_core::codec::{LoadContext, RecordCodec};
use esm_core::config::ReadOptions;
use esm_core::error::{EsmError, EsmErrorKind};
use esm_core::header::FLAG_COMPRESSED;
use esm_core::reader::LittleEndianReader;
use esm_core::records::skyrim::{AcousticSpaceRecord, ColourFormRecord, Tes4Record};
use esm_core::strings::{LocalizedString, StringTable};
use esm_core::{Dialect, RecordRegistry, Tag};

const ASPC_TEMPLE: &[u8] = b"ASPC\x64\0\0\0\0\0\0\0\x0D\xF9\x10\0\x05\x68\x27\x00\x27\x00\x02\0EDID\x2E\0IntRoomWoodLargeTempleOfKynarethAcousticSpace\0OBND\x0C\0\0\0\0\0\0\0\0\0\0\0\0\0SNAM\x04\0\x08\x5D\x0C\0RDAT\x04\0\x0E\xF9\x10\0BNAM\x04\0\x46\x32\x0E\0";

const ASPC_HELGEN: &[u8] = b"ASPC\x34\0\0\0\0\0\0\0\xAA\xD8\x10\0\x16\x67\x27\0\x27\0\x02\0EDID\x12\0ExtHelgenAttackAS\0OBND\x0C\0\xBE\xF1\xD0\xF0\x26\xFA\x42\x0E\x30\x0F\xDA\x05RDAT\x04\0\xA9\xD8\x10\0";

fn load_with(bytes: &[u8], ctx: &LoadContext<'_>) -> Result<Box<dyn RecordCodec>, EsmError> {
    let registry = RecordRegistry::with_builtin(Dialect::Skyrim).expect("builtin registry");
    let mut reader = LittleEndianReader::new(Cursor::new(bytes));
    let tag = reader.read_tag()?;
    registry.dispatch(tag, &mut reader, ctx, &ReadOptions::default())
}

fn load(bytes: &[u8]) -> Result<Box<dyn RecordCodec>, EsmError> {
    load_with(bytes, &LoadContext::plain())
}

fn aspc(record: &dyn RecordCodec) -> &AcousticSpaceRecord {
    record
        .as_any()
        .downcast_ref::<AcousticSpaceRecord>()
        .expect("ASPC record")
}

/// Builds an ASPC record from sub-record bytes with a fresh header.
fn aspc_bytes(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"ASPC");
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0; 12]);
    out.extend_from_slice(&[0x27, 0, 0x02, 0]);
    out.extend_from_slice(body);
    out
}

const EDID_OBND: &[u8] = b"EDID\x04\0abc\0OBND\x0C\0\0\0\0\0\0\0\0\0\0\0\0\0";

#[test]
fn acoustic_space_fixture_loads_and_saves_identically() {
    let record = load(ASPC_TEMPLE).expect("fixture should load");
    let aspc = aspc(record.as_ref());

    assert_eq!(aspc.editor_id, "IntRoomWoodLargeTempleOfKynarethAcousticSpace");
    assert_eq!(aspc.bounds, [0; 12]);
    assert_eq!(aspc.looping_sound, NonZeroU32::new(0x000C_5D08));
    assert_eq!(aspc.region, NonZeroU32::new(0x0010_F90E));
    assert_eq!(aspc.environment_type, NonZeroU32::new(0x000E_3246));
    assert_eq!(aspc.header.form_id(), Some(0x0010_F90D));
    assert_eq!(record.written_size(), 0x64);
    assert_eq!(record.editor_id().as_deref(), Some("IntRoomWoodLargeTempleOfKynarethAcousticSpace"));

    assert_eq!(record.to_bytes().expect("save"), ASPC_TEMPLE);
}

#[test]
fn acoustic_space_with_only_region_round_trips() {
    let record = load(ASPC_HELGEN).expect("fixture should load");
    let aspc = aspc(record.as_ref());

    assert_eq!(aspc.editor_id, "ExtHelgenAttackAS");
    assert_eq!(
        aspc.bounds,
        [0xBE, 0xF1, 0xD0, 0xF0, 0x26, 0xFA, 0x42, 0x0E, 0x30, 0x0F, 0xDA, 0x05]
    );
    assert_eq!(aspc.looping_sound, None);
    assert_eq!(aspc.region, NonZeroU32::new(0x0010_D8A9));
    assert_eq!(aspc.environment_type, None);
    assert_eq!(record.to_bytes().expect("save"), ASPC_HELGEN);
}

#[test]
fn each_optional_form_id_adds_ten_bytes() {
    let mut record = AcousticSpaceRecord {
        editor_id: "abc".to_string(),
        ..AcousticSpaceRecord::default()
    };
    let base = record.written_size();
    assert_eq!(base, 10 + 18);

    record.looping_sound = NonZeroU32::new(1);
    assert_eq!(record.written_size(), base + 10);
    record.region = NonZeroU32::new(2);
    assert_eq!(record.written_size(), base + 20);
    record.environment_type = NonZeroU32::new(3);
    assert_eq!(record.written_size(), base + 30);

    let mut bytes = Vec::new();
    let written = record.save(&mut bytes).expect("save");
    assert_eq!(written, u64::from(24 + base + 30));
    assert_eq!(bytes.len() as u64, written);
    let reloaded = load(&bytes).expect("reload");
    record.header.declared_size = base + 30;
    assert_eq!(aspc(reloaded.as_ref()), &record);
}

#[test]
fn duplicate_optional_sub_record_is_rejected() {
    let mut body = EDID_OBND.to_vec();
    body.extend_from_slice(b"SNAM\x04\0\x01\0\0\0SNAM\x04\0\x02\0\0\0");
    let err = load(&aspc_bytes(&body)).expect_err("duplicate SNAM");
    assert_eq!(err.kind(), EsmErrorKind::DuplicateSubRecord);
}

#[test]
fn zero_form_id_is_rejected() {
    let mut body = EDID_OBND.to_vec();
    body.extend_from_slice(b"RDAT\x04\0\0\0\0\0");
    let err = load(&aspc_bytes(&body)).expect_err("zero RDAT");
    assert_eq!(err.kind(), EsmErrorKind::ZeroSentinelViolation);
}

#[test]
fn unknown_sub_record_is_rejected() {
    let mut body = EDID_OBND.to_vec();
    body.extend_from_slice(b"XNAM\x04\0\x01\0\0\0");
    let err = load(&aspc_bytes(&body)).expect_err("unknown XNAM");
    match err {
        EsmError::UnknownSubRecord { record, sub } => {
            assert_eq!(record, Tag(*b"ASPC"));
            assert_eq!(sub, Tag(*b"XNAM"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_required_fields_are_rejected() {
    let short_bounds = aspc_bytes(b"EDID\x04\0abc\0OBND\x0B\0\0\0\0\0\0\0\0\0\0\0\0");
    assert_eq!(
        load(&short_bounds).expect_err("short OBND").kind(),
        EsmErrorKind::InvalidLength
    );

    let no_editor_id = aspc_bytes(b"OBND\x0C\0\0\0\0\0\0\0\0\0\0\0\0\0");
    assert_eq!(
        load(&no_editor_id).expect_err("missing EDID").kind(),
        EsmErrorKind::UnexpectedTag
    );

    let wrong_length = aspc_bytes(b"EDID\x04\0abc\0OBND\x0C\0\0\0\0\0\0\0\0\0\0\0\0\0SNAM\x03\0\x01\0\0");
    assert_eq!(
        load(&wrong_length).expect_err("3-byte SNAM").kind(),
        EsmErrorKind::InvalidLength
    );
}

#[test]
fn truncated_record_fails_without_panicking() {
    for len in [3, 10, 24, 40, ASPC_TEMPLE.len() - 1] {
        let err = load(&ASPC_TEMPLE[..len]).expect_err("truncated input");
        assert!(
            matches!(err.kind(), EsmErrorKind::UnexpectedEof | EsmErrorKind::Io),
            "len {len}: {err:?}"
        );
    }
}

#[test]
fn sub_record_overrunning_the_record_is_rejected() {
    let mut bytes = aspc_bytes(EDID_OBND);
    // Declared size now ends in the middle of OBND.
    bytes[4] = 14;
    bytes.truncate(24 + 14);
    assert!(load(&bytes).is_err());
}

#[test]
fn deleted_record_short_circuits() {
    let mut bytes = ASPC_TEMPLE.to_vec();
    bytes[8] |= 0x20;
    let record = load(&bytes).expect("deleted record loads");
    assert!(record.header().is_deleted());
    assert_eq!(record.written_size(), 0);
    assert_eq!(aspc(record.as_ref()).editor_id, "");

    let saved = record.to_bytes().expect("save deleted");
    assert_eq!(saved.len(), 24);
    assert_eq!(&saved[..4], b"ASPC");
    assert_eq!(&saved[4..8], &[0, 0, 0, 0]);
    assert_eq!(&saved[8..24], &bytes[8..24]);
}

#[test]
fn compressed_record_is_inflated_for_its_schema() {
    let plain = load(ASPC_TEMPLE).expect("fixture");
    let mut compressed = plain.clone();
    compressed.header_mut().set_compressed(true);
    let bytes = compressed.to_bytes().expect("save compressed");
    assert_eq!(
        u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) & FLAG_COMPRESSED,
        FLAG_COMPRESSED
    );
    assert_ne!(&bytes[24..], &ASPC_TEMPLE[24..]);

    let reloaded = load(&bytes).expect("compressed record loads");
    let reloaded = aspc(reloaded.as_ref());
    assert_eq!(reloaded.editor_id, aspc(plain.as_ref()).editor_id);
    assert_eq!(reloaded.region, aspc(plain.as_ref()).region);
}

#[test]
fn equality_is_deep_and_clones_are_independent() {
    let a = load(ASPC_TEMPLE).expect("fixture");
    let b = load(ASPC_TEMPLE).expect("fixture");
    let c = load(ASPC_HELGEN).expect("fixture");
    assert!(a.eq_dyn(a.as_ref()));
    assert!(*a == *b && *b == *a);
    assert!(*a != *c && *c != *a);

    let mut d = a.clone();
    d.as_any_mut()
        .downcast_mut::<AcousticSpaceRecord>()
        .expect("ASPC")
        .region = None;
    assert!(*a != *d);
    assert_eq!(aspc(a.as_ref()).region, NonZeroU32::new(0x0010_F90E));
}

fn with_editor_id(editor_id: String) -> Box<dyn RecordCodec> {
    let mut record = load(ASPC_HELGEN).expect("fixture");
    record
        .as_any_mut()
        .downcast_mut::<AcousticSpaceRecord>()
        .expect("ASPC")
        .editor_id = editor_id;
    record
}

#[test]
fn editor_id_that_could_not_be_reloaded_is_not_saved() {
    let err = with_editor_id("a".repeat(600))
        .to_bytes()
        .expect_err("600 characters");
    assert_eq!(err.kind(), EsmErrorKind::StringTooLong);

    let err = with_editor_id("a\0b".to_owned())
        .to_bytes()
        .expect_err("embedded NUL");
    assert_eq!(err.kind(), EsmErrorKind::InvalidValue);

    let saved = with_editor_id("a".repeat(510)).to_bytes().expect("at the limit");
    load(&saved).expect("reloads");
}

fn clfm_bytes(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"CLFM");
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0, 0x10, 0x20, 0x30, 0x00]);
    out.extend_from_slice(&[0x05, 0, 0, 0, 0x2B, 0, 0x0C, 0]);
    out.extend_from_slice(body);
    out
}

#[test]
fn colour_form_with_inline_name_round_trips() {
    let bytes = clfm_bytes(
        b"EDID\x0A\0HairBlond\0FULL\x0A\0foo bar 3\0CNAM\x04\0\x10\x20\x30\x00FNAM\x04\0\x01\0\0\0",
    );
    let record = load(&bytes).expect("CLFM loads");
    let clfm = record
        .as_any()
        .downcast_ref::<ColourFormRecord>()
        .expect("CLFM");
    assert_eq!(clfm.editor_id, "HairBlond");
    assert_eq!(clfm.name, Some(LocalizedString::Inline("foo bar 3".to_string())));
    assert_eq!(clfm.colour, 0x0030_2010);
    assert!(clfm.is_playable());
    assert_eq!(record.to_bytes().expect("save"), bytes);
}

#[test]
fn colour_form_with_indexed_name_checks_the_string_table() {
    let bytes = clfm_bytes(
        b"EDID\x0A\0HairBlond\0FULL\x04\0\x7c\x26\x01\0CNAM\x04\0\x10\x20\x30\x00FNAM\x04\0\0\0\0\0",
    );

    let mut table = StringTable::new();
    table.add(0x0001_267C, "Blond");
    let ctx = LoadContext::localized(Some(&table));
    let record = load_with(&bytes, &ctx).expect("localized CLFM loads");
    let clfm = record
        .as_any()
        .downcast_ref::<ColourFormRecord>()
        .expect("CLFM");
    let name = clfm.name.as_ref().expect("FULL present");
    assert_eq!(name, &LocalizedString::Index(0x0001_267C));
    assert_eq!(name.resolve(Some(&table)).expect("resolve"), "Blond");
    assert!(!clfm.is_playable());
    assert_eq!(record.to_bytes().expect("save"), bytes);

    let empty = StringTable::new();
    let err = load_with(&bytes, &LoadContext::localized(Some(&empty))).expect_err("missing id");
    assert_eq!(err.kind(), EsmErrorKind::StringIndexNotFound);
}

#[test]
fn colour_form_requires_colour_and_flags() {
    let bytes = clfm_bytes(b"EDID\x0A\0HairBlond\0CNAM\x04\0\x10\x20\x30\x00");
    let err = load(&bytes).expect_err("FNAM missing");
    assert_eq!(err.kind(), EsmErrorKind::MissingRequiredSubRecord);
}

fn tes4_with_master() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"HEDR\x0C\0\x9A\x99\xD9\x3F\x69\x05\0\0\xDF\x09\x00\xFF");
    body.extend_from_slice(b"CNAM\x09\0bnesmith\0");
    body.extend_from_slice(b"MAST\x0B\0Skyrim.esm\0");
    body.extend_from_slice(b"DATA\x08\0\0\0\0\0\0\0\0\0");
    let forms: Vec<u32> = (0..39).map(|i| 0x0007_48FE + i * 0x10).collect();
    body.extend_from_slice(b"ONAM\x9C\0");
    for form in &forms {
        body.extend_from_slice(&form.to_le_bytes());
    }
    body.extend_from_slice(b"INTV\x04\0\x21\0\0\0");
    body.extend_from_slice(b"INCC\x04\0\x17\0\0\0");

    let mut out = Vec::new();
    out.extend_from_slice(b"TES4");
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(b"\x81\0\0\0\0\0\0\0\0\0\0\0\x2B\0\0\0");
    out.extend_from_slice(&body);
    out
}

#[test]
fn file_header_with_master_and_overrides_round_trips() {
    let bytes = tes4_with_master();
    assert_eq!(bytes.len(), 24 + 0xF6);

    let record = load(&bytes).expect("TES4 loads");
    let tes4 = record.as_any().downcast_ref::<Tes4Record>().expect("TES4");
    assert!((tes4.version - 1.7).abs() < 1e-6);
    assert_eq!(tes4.num_records, 0x569);
    assert_eq!(tes4.next_object_id, 0xFF00_09DF);
    assert_eq!(tes4.author, "bnesmith");
    assert_eq!(tes4.summary, None);
    assert_eq!(tes4.masters.len(), 1);
    assert_eq!(tes4.masters[0].file_name, "Skyrim.esm");
    assert_eq!(tes4.masters[0].data, 0);
    assert_eq!(tes4.overridden_forms.len(), 39);
    assert_eq!(tes4.overridden_forms[0], 0x0007_48FE);
    assert_eq!(tes4.internal_version, 0x21);
    assert_eq!(tes4.incc, Some(0x17));
    assert!(tes4.is_master());
    assert!(tes4.is_localized());

    assert_eq!(record.to_bytes().expect("save"), bytes);
}

#[test]
fn master_without_data_is_rejected() {
    let body = b"HEDR\x0C\0\x9A\x99\xD9\x3F\x69\x05\0\0\xDF\x09\x00\xFFCNAM\x09\0bnesmith\0MAST\x0B\0Skyrim.esm\0INTV\x04\0\x21\0\0\0";
    let mut bytes = b"TES4".to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);
    bytes.extend_from_slice(body);
    let err = load(&bytes).expect_err("MAST without DATA");
    assert_eq!(err.kind(), EsmErrorKind::UnexpectedTag);
}

fn tes4_bytes(middle: &[u8]) -> Vec<u8> {
    let mut body = b"HEDR\x0C\0\x9A\x99\xD9\x3F\x69\x05\0\0\xDF\x09\x00\xFFCNAM\x09\0bnesmith\0".to_vec();
    body.extend_from_slice(middle);
    body.extend_from_slice(b"INTV\x04\0\x21\0\0\0");
    let mut bytes = b"TES4".to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);
    bytes.extend_from_slice(&body);
    bytes
}

#[test]
fn empty_override_list_is_rejected() {
    let err = load(&tes4_bytes(b"ONAM\0\0")).expect_err("ONAM of length 0");
    assert!(matches!(
        err,
        EsmError::InvalidLength {
            expected: 4,
            found: 0,
            ..
        }
    ));
}

#[test]
fn empty_summary_is_missing_its_terminator() {
    let err = load(&tes4_bytes(b"SNAM\0\0")).expect_err("SNAM of length 0");
    assert_eq!(err.kind(), EsmErrorKind::MissingTerminator);
}

#[test]
fn file_header_without_overrides_round_trips() {
    let bytes = tes4_bytes(b"SNAM\x05\0test\0");
    let record = load(&bytes).expect("TES4 loads");
    let tes4 = record.as_any().downcast_ref::<Tes4Record>().expect("TES4");
    assert!(tes4.overridden_forms.is_empty());
    assert_eq!(tes4.summary.as_deref(), Some("test"));
    assert_eq!(record.to_bytes().expect("save"), bytes);
}

#[test]
fn oversized_declared_size_is_rejected_before_reading() {
    let mut bytes = ASPC_TEMPLE.to_vec();
    bytes[4..8].copy_from_slice(&(300 * 1024u32).to_le_bytes());
    let err = load(&bytes).expect_err("oversized");
    assert_eq!(err.kind(), EsmErrorKind::OversizedRecord);
}
