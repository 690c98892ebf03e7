use crate::cursor::SubRecordCursor;
use crate::dialect::LengthWidth;
use crate::error::Result;
use crate::field::sub_record_size;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

/// Presence-flagged sub-record payload kept verbatim.
///
/// Clearing the presence flag suppresses the sub-record on save even if the
/// bytes are still retained.
#[derive(Debug, Clone, Default)]
pub struct OpaqueBlob {
    present: bool,
    data: Vec<u8>,
}

impl OpaqueBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            present: true,
            data,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.present = true;
    }

    pub fn len(&self) -> usize {
        if self.present { self.data.len() } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a length field and that many bytes. The tag has already been
    /// consumed by the caller. Presence is set only on success.
    pub fn load(&mut self, cursor: &mut SubRecordCursor<'_>) -> Result<()> {
        let len = cursor.read_length()?;
        let bytes = cursor.read_value(len)?;
        self.data = bytes.to_vec();
        self.present = true;
        Ok(())
    }

    pub fn save(&self, out: &mut SubRecordWriter<'_>, tag: Tag) -> Result<()> {
        if !self.present {
            return Ok(());
        }
        out.write_raw(tag, &self.data)
    }

    pub fn written_size(&self, width: LengthWidth) -> u32 {
        if !self.present {
            return 0;
        }
        sub_record_size(width, self.data.len())
    }
}

impl PartialEq for OpaqueBlob {
    fn eq(&self, other: &Self) -> bool {
        match (self.present, other.present) {
            (false, false) => true,
            (true, true) => self.data == other.data,
            _ => false,
        }
    }
}

impl Eq for OpaqueBlob {}

#[cfg(test)]
mod tests {
    use super::OpaqueBlob;
    use crate::cursor::SubRecordCursor;
    use crate::dialect::LengthWidth;
    use crate::error::EsmErrorKind;
    use crate::tag::Tag;
    use crate::writer::SubRecordWriter;

    const DNAM: Tag = Tag(*b"DNAM");

    #[test]
    fn absent_blob_writes_nothing() {
        let mut blob = OpaqueBlob::from_bytes(vec![1, 2, 3]);
        blob.set_present(false);
        assert_eq!(blob.written_size(LengthWidth::U16), 0);

        let mut out = Vec::new();
        blob.save(&mut SubRecordWriter::new(&mut out, LengthWidth::U16), DNAM)
            .expect("save");
        assert!(out.is_empty());
        assert_eq!(blob.data(), &[1, 2, 3]);
    }

    #[test]
    fn present_blob_writes_tag_length_and_bytes() {
        let blob = OpaqueBlob::from_bytes(vec![9, 8, 7, 6]);
        assert_eq!(blob.written_size(LengthWidth::U16), 10);
        assert_eq!(blob.written_size(LengthWidth::U32), 12);

        let mut out = Vec::new();
        blob.save(&mut SubRecordWriter::new(&mut out, LengthWidth::U16), DNAM)
            .expect("save");
        assert_eq!(out, b"DNAM\x04\0\x09\x08\x07\x06");
    }

    #[test]
    fn load_reads_length_and_payload() {
        let payload = b"DNAM\x03\0abc";
        let mut cursor = SubRecordCursor::begin(Tag(*b"TEST"), payload, LengthWidth::U16);
        assert_eq!(cursor.next_tag().expect("tag"), DNAM);

        let mut blob = OpaqueBlob::new();
        blob.load(&mut cursor).expect("load");
        assert!(blob.is_present());
        assert_eq!(blob.data(), b"abc");
    }

    #[test]
    fn failed_load_leaves_blob_absent() {
        let payload = b"DNAM\x09\0abc";
        let mut cursor = SubRecordCursor::begin(Tag(*b"TEST"), payload, LengthWidth::U16);
        cursor.next_tag().expect("tag");

        let mut blob = OpaqueBlob::new();
        let err = blob.load(&mut cursor).expect_err("truncated");
        assert_eq!(err.kind(), EsmErrorKind::UnexpectedEof);
        assert!(!blob.is_present());
    }

    #[test]
    fn equality_ignores_retained_bytes_of_absent_blobs() {
        let mut a = OpaqueBlob::from_bytes(vec![1]);
        let mut b = OpaqueBlob::from_bytes(vec![2]);
        assert_ne!(a, b);
        a.set_present(false);
        b.set_present(false);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, OpaqueBlob::from_bytes(vec![1]));
    }
}
