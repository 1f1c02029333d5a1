//! Deterministic byte encoding of composite-key paths (spec.md §2 item 2,
//! §6.4). All encoded keys are UTF-8 except for the integer suffixes used
//! to keep list/time-series child keys in numeric order under the
//! ByteStore's lexicographic prefix scan — those flip the sign bit before
//! big-endian encoding so negative values still sort before non-negative
//! ones byte-for-byte (see `encode_i64_suffix`/`decode_i64_suffix`).

/// Order-preserving encoding of an `i64`: flipping the sign bit before
/// big-endian encoding makes unsigned byte-lexicographic order on the
/// result agree with signed numeric order on the input.
fn encode_i64_suffix(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1u64 << 63)).to_be_bytes()
}

/// `list:<name>`
pub fn list_meta(name: &str) -> Vec<u8> {
    format!("list:{name}").into_bytes()
}

/// `list:<name>:item:` — the prefix shared by every item of the list.
pub fn list_item_prefix(name: &str) -> Vec<u8> {
    format!("list:{name}:item:").into_bytes()
}

/// `list:<name>:item:<i64, sign-bit-flipped big-endian>`
pub fn list_item(name: &str, index: i64) -> Vec<u8> {
    let mut key = list_item_prefix(name);
    key.extend_from_slice(&encode_i64_suffix(index));
    key
}

/// `map:<name>`
pub fn map_meta(name: &str) -> Vec<u8> {
    format!("map:{name}").into_bytes()
}

/// `map:<name>:field:`
pub fn map_field_prefix(name: &str) -> Vec<u8> {
    format!("map:{name}:field:").into_bytes()
}

/// `map:<name>:field:<string>`
pub fn map_field(name: &str, field: &str) -> Vec<u8> {
    let mut key = map_field_prefix(name);
    key.extend_from_slice(field.as_bytes());
    key
}

/// `set:<name>`
pub fn set_meta(name: &str) -> Vec<u8> {
    format!("set:{name}").into_bytes()
}

/// `set:<name>:item:`
pub fn set_item_prefix(name: &str) -> Vec<u8> {
    format!("set:{name}:item:").into_bytes()
}

/// `set:<name>:item:<string(member)>`
pub fn set_item(name: &str, member: &str) -> Vec<u8> {
    let mut key = set_item_prefix(name);
    key.extend_from_slice(member.as_bytes());
    key
}

/// `ts:<name>`
pub fn ts_meta(name: &str) -> Vec<u8> {
    format!("ts:{name}").into_bytes()
}

/// `ts:<name>:point:`
pub fn ts_point_prefix(name: &str) -> Vec<u8> {
    format!("ts:{name}:point:").into_bytes()
}

/// `ts:<name>:point:<i64 nanos, sign-bit-flipped big-endian>`
pub fn ts_point(name: &str, nanos: i64) -> Vec<u8> {
    let mut key = ts_point_prefix(name);
    key.extend_from_slice(&encode_i64_suffix(nanos));
    key
}

/// `bloom:<name>`
pub fn bloom_meta(name: &str) -> Vec<u8> {
    format!("bloom:{name}").into_bytes()
}

/// Given a composite metadata key (e.g. `list:<name>`) and the literal
/// prefixes that built it, recomputes the child-record prefix (e.g.
/// `list:<name>:item:`) directly from the key bytes. Used by TTL expiry,
/// which only has the raw key of an expiring metadata record on hand.
pub fn child_prefix_for_meta_key(meta_prefix: &str, child_literal: &str, key: &[u8]) -> Option<Vec<u8>> {
    let prefix_bytes = meta_prefix.as_bytes();
    if !key.starts_with(prefix_bytes) {
        return None;
    }
    let name = std::str::from_utf8(&key[prefix_bytes.len()..]).ok()?;
    Some(format!("{meta_prefix}{name}:{child_literal}").into_bytes())
}

/// Decodes the sign-bit-flipped big-endian `i64` suffix appended after
/// `prefix` (the inverse of `encode_i64_suffix`). Used to recover the
/// logical index/timestamp from a scanned key without storing it
/// redundantly in the record payload.
pub fn decode_i64_suffix(prefix_len: usize, key: &[u8]) -> Option<i64> {
    let suffix = key.get(prefix_len..prefix_len + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(suffix);
    Some((u64::from_be_bytes(buf) ^ (1u64 << 63)) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_keys_sort_numerically() {
        let mut keys = vec![
            list_item("l", 5),
            list_item("l", -3),
            list_item("l", 0),
            list_item("l", 100),
        ];
        keys.sort();
        let indices: Vec<i64> = keys
            .iter()
            .map(|k| decode_i64_suffix(list_item_prefix("l").len(), k).unwrap())
            .collect();
        assert_eq!(indices, vec![-3, 0, 5, 100]);
    }

    #[test]
    fn ts_point_keys_sort_numerically() {
        let mut keys = vec![ts_point("t", 1_000), ts_point("t", -500), ts_point("t", 0)];
        keys.sort();
        let nanos: Vec<i64> = keys
            .iter()
            .map(|k| decode_i64_suffix(ts_point_prefix("t").len(), k).unwrap())
            .collect();
        assert_eq!(nanos, vec![-500, 0, 1_000]);
    }

    #[test]
    fn i64_suffix_round_trips_across_full_range() {
        for v in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX - 1, i64::MAX] {
            let key = list_item("l", v);
            let decoded = decode_i64_suffix(list_item_prefix("l").len(), &key).unwrap();
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn prefixes_are_stable_and_distinct() {
        assert!(list_item("a", 0).starts_with(&list_item_prefix("a")));
        assert!(map_field("a", "f").starts_with(&map_field_prefix("a")));
        assert_ne!(list_meta("a"), map_meta("a"));
    }
}
