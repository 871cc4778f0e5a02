//! Parse a hand-built minimal container end to end.

use dexemu_dex::{Dex, DexError};

fn push_uleb(out: &mut Vec<u8>, mut val: u64) {
    loop {
        let byte = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// One class `LFoo;` with a static `go()V` whose body is `return-void`,
/// plus a string with an embedded MUTF-8 null.
fn minimal_container() -> Vec<u8> {
    let strings = ["LFoo;", "V", "go", "a\u{0}b"];
    let s = strings.len();
    let t = 2; // LFoo; V
    let p = 1; // ()V
    let m = 1; // LFoo;->go
    let c = 1;

    let data_start = 0x70 + 4 * s + 4 * t + 12 * p + 8 * m + 32 * c;
    let mut blob = Vec::new();

    let mut string_offs = Vec::new();
    for text in strings {
        string_offs.push((data_start + blob.len()) as u32);
        push_uleb(&mut blob, text.chars().count() as u64);
        blob.extend_from_slice(&simd_cesu8::mutf8::encode(text));
        blob.push(0);
    }

    // code item, 4-aligned
    while (data_start + blob.len()) % 4 != 0 {
        blob.push(0);
    }
    let code_off = (data_start + blob.len()) as u32;
    blob.extend_from_slice(&1u16.to_le_bytes()); // registers_size
    blob.extend_from_slice(&[0u8; 6]); // ins, outs, tries
    blob.extend_from_slice(&0u32.to_le_bytes()); // debug_info_off
    blob.extend_from_slice(&1u32.to_le_bytes()); // insns_size in units
    blob.extend_from_slice(&[0x0e, 0x00]); // return-void

    // class data: 0 static fields, 0 instance, 1 direct, 0 virtual
    let class_data_off = (data_start + blob.len()) as u32;
    push_uleb(&mut blob, 0);
    push_uleb(&mut blob, 0);
    push_uleb(&mut blob, 1);
    push_uleb(&mut blob, 0);
    push_uleb(&mut blob, 0); // method idx 0
    push_uleb(&mut blob, 0x8); // static
    push_uleb(&mut blob, code_off as u64);

    let mut out = Vec::new();
    out.extend_from_slice(b"dex\n035\0");
    out.extend_from_slice(&0u32.to_le_bytes()); // checksum (warn-only)
    out.extend_from_slice(&[0u8; 20]); // signature
    out.extend_from_slice(&((data_start + blob.len()) as u32).to_le_bytes());
    out.extend_from_slice(&0x70u32.to_le_bytes());
    out.extend_from_slice(&0x12345678u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 12]); // link size/off, map_off

    let mut offset = 0x70u32;
    for (count, width) in [(s, 4u32), (t, 4), (p, 12), (0usize, 8), (m, 8), (c, 32)] {
        out.extend_from_slice(&(count as u32).to_le_bytes());
        let table_off = if count == 0 { 0 } else { offset };
        out.extend_from_slice(&table_off.to_le_bytes());
        offset += count as u32 * width;
    }
    out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data_start as u32).to_le_bytes());
    assert_eq!(out.len(), 0x70);

    for off in string_offs {
        out.extend_from_slice(&off.to_le_bytes());
    }
    // type_ids: descriptors LFoo; and V
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    // proto: shorty "V", return type V, no params
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    // method: class LFoo;, proto 0, name "go"
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    // class def
    out.extend_from_slice(&0u32.to_le_bytes()); // class LFoo;
    out.extend_from_slice(&0x1u32.to_le_bytes()); // public
    out.extend_from_slice(&u32::MAX.to_le_bytes()); // no superclass
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&class_data_off.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    assert_eq!(out.len(), data_start);
    out.extend_from_slice(&blob);
    out
}

#[test]
fn parses_tables_and_strings() {
    let dex = Dex::new(minimal_container()).unwrap();

    assert_eq!(dex.string_ids.len(), 4);
    assert_eq!(dex.get_string(0).as_deref(), Some("LFoo;"));
    assert_eq!(dex.get_type(0).as_deref(), Some("LFoo;"));
    // the 0xC0 0x80 null encoding survives the round trip
    assert_eq!(dex.get_string(3).as_deref(), Some("a\u{0}b"));
    assert!(dex.get_string(99).is_none());

    let method = &dex.method_ids[0];
    assert_eq!(method.get_class(&dex).as_deref(), Some("LFoo;"));
    assert_eq!(method.get_name(&dex).as_deref(), Some("go"));
    assert_eq!(method.get_prototype(&dex).unwrap().text(&dex), "()V");
}

#[test]
fn walks_class_data_to_the_code_item() {
    let dex = Dex::new(minimal_container()).unwrap();

    let class_def = &dex.class_defs[0];
    assert_eq!(class_def.get_name(&dex).as_deref(), Some("LFoo;"));
    assert!(class_def.get_superclass(&dex).is_none());

    let class_data = dex.class_data(class_def.class_data_off).unwrap();
    assert_eq!(class_data.direct_methods.len(), 1);
    let method = &class_data.direct_methods[0];
    assert!(method.access_flags.is_static());

    let (registers, insns) = dex.code_item(method.code_off).unwrap();
    assert_eq!(registers, 1);
    assert_eq!(insns, &[0x0e, 0x00]);
}

#[test]
fn rejects_garbage() {
    assert!(matches!(
        Dex::new(b"not a dex".to_vec()),
        Err(DexError::InvalidHeader)
    ));
}
