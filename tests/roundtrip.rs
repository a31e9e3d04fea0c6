use pretty_assertions::assert_eq;

use rpmkit::{
    write_headers, Header, Lead, LeadType, Reader, TagValue, WriteTo, HEADER_IMMUTABLE,
    HEADER_SIGNATURES, RPM_BIN_TYPE, RPM_INT16_TYPE, RPM_INT32_TYPE, RPM_INT64_TYPE,
};

fn make_hdr() -> Header {
    let mut hdr = Header::new();
    hdr.add_string(1u32, "foo");
    hdr.add_string_i18n(1u32, "I18N");
    hdr.add_string_array(2u32, ["foo", "bar", "baz"]);
    hdr.add_int16(3u32, &[0x1122, 0x3344, 0x5566]);
    hdr.add_int32(4u32, &[0x11223344, 0x55667788, 0x99112233]);
    hdr.add_int64(5u32, &[0x1122334455667788, 0x99, 0xff]);
    hdr.add_bin(6u32, *b"foo");
    hdr
}

fn serialize(hdr: &Header) -> Vec<u8> {
    let mut buf = Vec::new();
    let n = hdr.write_to(&mut buf).expect("header write");
    assert_eq!(n, buf.len() as u64, "write_to returns the bytes written");
    buf
}

#[test]
fn header_roundtrip() {
    let hdr = make_hdr();
    let buf = serialize(&hdr);

    let have = Reader::new(&buf[..]).next().expect("header read");

    assert_eq!(hdr.len(), have.len());
    for (want, got) in hdr.tags().iter().zip(have.tags()) {
        assert_eq!(want, got);
    }
}

#[test]
fn header_roundtrip_with_region() {
    let mut hdr = make_hdr();
    hdr.set_region(HEADER_IMMUTABLE);
    let buf = serialize(&hdr);

    let have = Reader::new(&buf[..]).next().expect("header read");

    // the region is moved out of the tag list
    assert_eq!(hdr.len(), have.len());
    for (want, got) in hdr.tags().iter().zip(have.tags()) {
        assert_eq!(want, got);
    }

    // its value is a synthetic tag header pointing back at the index
    let region = have.region_tag().expect("region is recognized");
    assert_eq!(region.id(), HEADER_IMMUTABLE);
    assert_eq!(region.type_code(), RPM_BIN_TYPE);
    assert_eq!(region.count(), 16);

    let data = region.as_binary().expect("region value is binary");
    assert_eq!(data.len(), 16);
    let id = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let type_code = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let offset = u32::from_be_bytes(data[8..12].try_into().unwrap());
    let count = u32::from_be_bytes(data[12..16].try_into().unwrap());
    assert_eq!(id, HEADER_IMMUTABLE);
    assert_eq!(type_code, RPM_BIN_TYPE);
    assert_eq!(offset, 0xffffff80, "-(7 + 1) * 16 for 7 data tags");
    assert_eq!(count, 16);

    // a re-serialized parse is byte equal
    assert_eq!(serialize(&have), buf);
}

#[test]
fn header_alignment_and_length_invariants() {
    let mut hdr = make_hdr();
    hdr.set_region(HEADER_SIGNATURES);
    let buf = serialize(&hdr);

    let entries = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    let length = u32::from_be_bytes(buf[12..16].try_into().unwrap());
    assert_eq!(buf.len() as u32, 16 + entries * 16 + length);

    let index = &buf[16..16 + entries as usize * 16];
    let data = &buf[16 + entries as usize * 16..];
    let mut parsed = Vec::new();
    for entry in index.chunks(16) {
        let type_code = u32::from_be_bytes(entry[4..8].try_into().unwrap());
        let offset = u32::from_be_bytes(entry[8..12].try_into().unwrap());
        let count = u32::from_be_bytes(entry[12..16].try_into().unwrap());
        let align = match type_code {
            RPM_INT16_TYPE => 2,
            RPM_INT32_TYPE => 4,
            RPM_INT64_TYPE => 8,
            _ => 1,
        };
        assert_eq!(offset % align, 0, "offset {offset:#x} aligned to {align}");
        parsed.push((type_code, offset as usize, count as usize));
    }

    // the region entry leads the index, data order is its offset order
    parsed.sort_unstable_by_key(|e| e.1);
    for pair in parsed.windows(2) {
        assert!(pair[0].1 < pair[1].1, "offsets strictly increasing");
    }

    // padding between fixed size values is short and zero
    for (i, &(type_code, offset, count)) in parsed.iter().enumerate() {
        let value_len = match type_code {
            RPM_INT16_TYPE => count * 2,
            RPM_INT32_TYPE => count * 4,
            RPM_INT64_TYPE => count * 8,
            RPM_BIN_TYPE => count,
            _ => continue,
        };
        let end = offset + value_len;
        let next = match parsed.get(i + 1) {
            Some(&(_, next, _)) => next,
            None => length as usize,
        };
        assert!(next - end < 8, "padding shorter than 8 bytes");
        assert!(data[end..next].iter().all(|&b| b == 0), "padding is zeros");
    }
}

#[test]
fn header_json_roundtrip() {
    let hdr = make_hdr();
    let encoded = serde_json::to_string(&hdr).expect("header marshal");
    let have: Header = serde_json::from_str(&encoded).expect("header unmarshal");
    assert_eq!(serialize(&hdr), serialize(&have));
}

#[test]
fn header_json_roundtrip_with_region() {
    let mut hdr = make_hdr();
    hdr.set_region(HEADER_IMMUTABLE);
    let encoded = serde_json::to_string(&hdr).expect("header marshal");
    let have: Header = serde_json::from_str(&encoded).expect("header unmarshal");

    assert_eq!(hdr.len(), have.len());
    assert_eq!(hdr.region_tag(), have.region_tag());
    assert_eq!(serialize(&hdr), serialize(&have));
}

#[test]
fn json_data_shapes() {
    let hdr = make_hdr();
    let encoded = serde_json::to_value(&hdr).expect("header marshal");
    let tags = encoded.as_array().expect("headers marshal as a tag array");
    assert_eq!(tags.len(), hdr.len());

    // string vectors stay arrays, binary data becomes a base64 string
    assert!(tags[0]["Data"].is_array());
    assert_eq!(tags[0]["Data"][0], "foo");
    assert_eq!(tags[0]["Tag"], 1);
    assert!(tags[6]["Data"].is_string());
    assert_eq!(tags[6]["Data"], "Zm9v");
}

#[test]
fn lead_roundtrip() {
    let lead = Lead::new("test", LeadType::Binary);
    let mut buf = Vec::new();
    let n = lead.write_to(&mut buf).expect("lead write");
    assert_eq!(n, 96);
    assert_eq!(buf.len(), 96);

    let have = Reader::new(&buf[..]).lead().expect("lead read");
    assert_eq!(lead, have);
}

#[test]
fn lead_bad_magic() {
    let lead = Lead::new("test", LeadType::Binary);
    let mut buf = Vec::new();
    lead.write_to(&mut buf).expect("lead write");
    buf[..4].copy_from_slice(b"test");

    let err = Reader::new(&buf[..]).lead().unwrap_err();
    assert!(matches!(err.root(), rpmkit::Error::InvalidLead));
}

#[test]
fn framed_package_roundtrip() {
    let lead = Lead::new("test", LeadType::Binary);
    let mut h1 = make_hdr();
    h1.set_region(HEADER_SIGNATURES);
    let mut h2 = make_hdr();
    h2.set_region(HEADER_IMMUTABLE);

    let mut buf = Vec::new();
    let n = write_headers(&mut buf, &[&lead, &h1, &h2]).expect("write");
    assert_eq!(n, buf.len() as u64);

    let mut r = Reader::new(&buf[..]);
    assert_eq!(r.lead().expect("lead read"), lead);

    for want in [&h1, &h2] {
        let have = r.next().expect("header read");
        assert_eq!(serialize(want), serialize(&have));
    }
}

#[test]
fn header_values_survive() {
    let hdr = make_hdr();
    let buf = serialize(&hdr);
    let have = Reader::new(&buf[..]).next().expect("header read");

    let tags = have.tags();
    assert_eq!(tags[0].as_str().expect("string tag"), "foo");
    assert_eq!(tags[1].as_str().expect("i18n tag"), "I18N");
    assert_eq!(
        tags[2].as_string_array().expect("string array tag"),
        ["foo", "bar", "baz"]
    );
    assert_eq!(
        tags[3].as_u16_array().expect("int16 tag"),
        [0x1122, 0x3344, 0x5566]
    );
    assert_eq!(
        tags[4].as_u32_array().expect("int32 tag"),
        [0x11223344, 0x55667788, 0x99112233]
    );
    assert_eq!(
        tags[5].as_u64_array().expect("int64 tag"),
        [0x1122334455667788, 0x99, 0xff]
    );
    assert_eq!(tags[6].as_binary().expect("bin tag"), b"foo");

    // a typed accessor on the wrong shape is a mismatch
    assert!(tags[6].as_str().is_err());
    assert!(matches!(tags[6].value(), TagValue::Bin(_)));
}
