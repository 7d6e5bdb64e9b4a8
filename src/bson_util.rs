use std::{io::Read, time::Duration};

use serde::{Deserialize, Deserializer, Serializer};

use crate::{
    bson::{Bson, Document},
    error::{Error, ErrorKind, Result},
};

/// Coerce numeric types into an `i64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_int(val: &Bson) -> Option<i64> {
    match *val {
        Bson::Int32(i) => Some(i64::from(i)),
        Bson::Int64(i) => Some(i),
        Bson::Double(f) if (f - (f as i64 as f64)).abs() <= f64::EPSILON => Some(f as i64),
        _ => None,
    }
}

/// Coerce numeric types into an `u64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_u64(val: &Bson) -> Option<u64> {
    match *val {
        Bson::Int32(i) => u64::try_from(i).ok(),
        Bson::Int64(i) => u64::try_from(i).ok(),
        Bson::Double(f) if (f - (f as u64 as f64)).abs() <= f64::EPSILON => Some(f as u64),
        _ => None,
    }
}

/// Reads the numeric `key` out of a reply document, treating a missing field as zero.
pub(crate) fn get_u64_or_zero(document: &Document, key: &str) -> u64 {
    document.get(key).and_then(get_u64).unwrap_or(0)
}

pub(crate) fn first_key(document: &Document) -> Option<&str> {
    document.keys().next().map(String::as_str)
}

pub(crate) fn update_document_check(update: &Document) -> Result<()> {
    match first_key(update) {
        Some(s) if s.starts_with('$') => Ok(()),
        _ => Err(Error::invalid_argument(
            "update document must have first key starting with '$'",
        )),
    }
}

pub(crate) fn replacement_document_check(replacement: &Document) -> Result<()> {
    match first_key(replacement) {
        Some(s) if s.starts_with('$') => Err(Error::invalid_argument(
            "replace document must have first key not starting with '$'",
        )),
        _ => Ok(()),
    }
}

/// The number of bytes `document` occupies once serialized.
pub(crate) fn doc_size_bytes(document: &Document) -> Result<usize> {
    let mut bytes = Vec::new();
    document.to_writer(&mut bytes)?;
    Ok(bytes.len())
}

/// The size in bytes of the provided document's entry in a BSON array at the given index.
pub(crate) fn array_entry_size_bytes(index: usize, doc_len: usize) -> usize {
    //   * type (1 byte)
    //   * number of decimal digits in key
    //   * null terminator for the key (1 byte)
    //   * size of value
    1 + num_decimal_digits(index) + 1 + doc_len
}

/// The number of digits in `n` in base 10.
/// Useful for calculating the size of an array entry in BSON.
fn num_decimal_digits(mut n: usize) -> usize {
    let mut digits = 0;

    loop {
        n /= 10;
        digits += 1;

        if n == 0 {
            return digits;
        }
    }
}

/// Read a document's raw BSON bytes from the provided reader and decode them.
pub(crate) fn read_document<R: Read>(reader: &mut R) -> Result<Document> {
    let mut length_bytes = [0u8; 4];
    reader.read_exact(&mut length_bytes)?;
    let length = i32::from_le_bytes(length_bytes);
    if length < 5 {
        return Err(Error::invalid_response(format!(
            "invalid document length {length}"
        )));
    }

    let mut bytes = Vec::with_capacity(length as usize);
    bytes.extend_from_slice(&length_bytes);
    reader
        .take(length as u64 - 4)
        .read_to_end(&mut bytes)?;
    if bytes.len() != length as usize {
        return Err(ErrorKind::from(std::io::ErrorKind::UnexpectedEof).into());
    }

    Ok(Document::from_reader(bytes.as_slice())?)
}

pub(crate) fn serialize_duration_option_as_int_millis<S: Serializer>(
    val: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match val {
        Some(duration) if duration.as_millis() > i32::MAX as u128 => {
            serializer.serialize_i64(duration.as_millis().try_into().unwrap_or(i64::MAX))
        }
        Some(duration) => serializer.serialize_i32(duration.as_millis() as i32),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_duration_option_from_u64_millis<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}
