//! Registered column types and their binary codec.
//!
//! Cells and clause values travel as raw bytes. A [`ColumnType`] turns those
//! bytes into a [`DataValue`] (and back), using the big-endian layouts of the
//! row store: fixed-width integers and floats, two's complement varints,
//! `scale ++ varint` decimals, millisecond timestamps and 16-byte UUIDs.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};

/// The type a column is registered with in the table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Ascii,
    #[serde(alias = "varchar")]
    Text,
    Boolean,
    Int,
    BigInt,
    Varint,
    Counter,
    Float,
    Double,
    Decimal,
    Timestamp,
    Uuid,
    Blob,
}

impl ColumnType {
    /// Whether aggregates may treat values of this type as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Int
                | ColumnType::Varint
                | ColumnType::BigInt
                | ColumnType::Counter
                | ColumnType::Decimal
                | ColumnType::Float
                | ColumnType::Double
        )
    }

    /// The CQL name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Ascii => "ascii",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Varint => "varint",
            ColumnType::Counter => "counter",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Uuid => "uuid",
            ColumnType::Blob => "blob",
        }
    }

    /// Decode raw cell bytes. An empty buffer decodes to `Null` for every
    /// type except the textual ones and `blob`, where it is an empty value.
    pub fn decode(&self, bytes: &[u8]) -> Result<DataValue> {
        match self {
            ColumnType::Text => String::from_utf8(bytes.to_vec())
                .map(DataValue::Text)
                .map_err(|e| RowlensError::storage(format!("invalid UTF-8 text: {e}"))),
            ColumnType::Ascii => {
                if !bytes.is_ascii() {
                    return Err(RowlensError::storage("invalid ASCII text"));
                }
                Ok(DataValue::Text(String::from_utf8_lossy(bytes).into_owned()))
            }
            ColumnType::Blob => Ok(DataValue::Blob(bytes.to_vec())),
            _ if bytes.is_empty() => Ok(DataValue::Null),
            ColumnType::Boolean => {
                expect_len(self, bytes, 1)?;
                Ok(DataValue::Boolean(bytes[0] != 0))
            }
            ColumnType::Int => {
                expect_len(self, bytes, 4)?;
                Ok(DataValue::Int(Cursor::new(bytes).read_i32::<BigEndian>()?))
            }
            ColumnType::BigInt => {
                expect_len(self, bytes, 8)?;
                Ok(DataValue::BigInt(Cursor::new(bytes).read_i64::<BigEndian>()?))
            }
            ColumnType::Counter => {
                expect_len(self, bytes, 8)?;
                Ok(DataValue::Counter(Cursor::new(bytes).read_i64::<BigEndian>()?))
            }
            ColumnType::Float => {
                expect_len(self, bytes, 4)?;
                Ok(DataValue::Float(Cursor::new(bytes).read_f32::<BigEndian>()?))
            }
            ColumnType::Double => {
                expect_len(self, bytes, 8)?;
                Ok(DataValue::Double(Cursor::new(bytes).read_f64::<BigEndian>()?))
            }
            ColumnType::Varint => Ok(DataValue::Varint(decode_varint(bytes)?)),
            ColumnType::Decimal => {
                if bytes.len() < 5 {
                    return Err(RowlensError::storage(format!(
                        "decimal value needs at least 5 bytes, got {}",
                        bytes.len()
                    )));
                }
                let scale = Cursor::new(&bytes[..4]).read_i32::<BigEndian>()?;
                let unscaled = decode_varint(&bytes[4..])?;
                Ok(DataValue::Decimal { unscaled, scale })
            }
            ColumnType::Timestamp => {
                expect_len(self, bytes, 8)?;
                let millis = Cursor::new(bytes).read_i64::<BigEndian>()?;
                DateTime::from_timestamp_millis(millis)
                    .map(DataValue::Timestamp)
                    .ok_or_else(|| RowlensError::storage(format!("timestamp {millis} out of range")))
            }
            ColumnType::Uuid => Uuid::from_slice(bytes)
                .map(DataValue::Uuid)
                .map_err(|e| RowlensError::storage(format!("invalid uuid: {e}"))),
        }
    }

    /// Decode raw bytes and render them in the type's textual form.
    pub fn get_string(&self, bytes: &[u8]) -> Result<String> {
        Ok(self.decode(bytes)?.to_string())
    }

    /// Encode a value with this type's binary layout.
    pub fn encode(&self, value: &DataValue) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match (self, value) {
            (_, DataValue::Null) => {}
            (ColumnType::Text | ColumnType::Ascii, DataValue::Text(s)) => {
                if *self == ColumnType::Ascii && !s.is_ascii() {
                    return Err(RowlensError::invalid_argument(format!(
                        "'{s}' is not ASCII"
                    )));
                }
                out.extend_from_slice(s.as_bytes());
            }
            (ColumnType::Blob, DataValue::Blob(b)) => out.extend_from_slice(b),
            (ColumnType::Boolean, DataValue::Boolean(b)) => out.push(u8::from(*b)),
            (ColumnType::Int, DataValue::Int(v)) => out.write_i32::<BigEndian>(*v)?,
            (ColumnType::BigInt, DataValue::BigInt(v))
            | (ColumnType::Counter, DataValue::Counter(v)) => out.write_i64::<BigEndian>(*v)?,
            (ColumnType::Float, DataValue::Float(v)) => out.write_f32::<BigEndian>(*v)?,
            (ColumnType::Double, DataValue::Double(v)) => out.write_f64::<BigEndian>(*v)?,
            (ColumnType::Varint, DataValue::Varint(v)) => out.extend(encode_varint(*v)),
            (ColumnType::Decimal, DataValue::Decimal { unscaled, scale }) => {
                out.write_i32::<BigEndian>(*scale)?;
                out.extend(encode_varint(*unscaled));
            }
            (ColumnType::Timestamp, DataValue::Timestamp(ts)) => {
                out.write_i64::<BigEndian>(ts.timestamp_millis())?
            }
            (ColumnType::Uuid, DataValue::Uuid(u)) => out.extend_from_slice(u.as_bytes()),
            (ty, value) => {
                return Err(RowlensError::invalid_argument(format!(
                    "cannot encode {value:?} as {ty}"
                )));
            }
        }
        Ok(out)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = RowlensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(ColumnType::Ascii),
            "text" | "varchar" => Ok(ColumnType::Text),
            "boolean" => Ok(ColumnType::Boolean),
            "int" => Ok(ColumnType::Int),
            "bigint" => Ok(ColumnType::BigInt),
            "varint" => Ok(ColumnType::Varint),
            "counter" => Ok(ColumnType::Counter),
            "float" => Ok(ColumnType::Float),
            "double" => Ok(ColumnType::Double),
            "decimal" => Ok(ColumnType::Decimal),
            "timestamp" => Ok(ColumnType::Timestamp),
            "uuid" => Ok(ColumnType::Uuid),
            "blob" => Ok(ColumnType::Blob),
            other => Err(RowlensError::invalid_argument(format!(
                "unknown column type '{other}'"
            ))),
        }
    }
}

fn expect_len(ty: &ColumnType, bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() != len {
        return Err(RowlensError::storage(format!(
            "{ty} value needs {len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

/// Decode a big-endian two's complement integer of at most 16 bytes.
fn decode_varint(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(RowlensError::storage(format!(
            "varint of {} bytes is not supported",
            bytes.len()
        )));
    }
    let mut value: i128 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for b in bytes {
        value = (value << 8) | i128::from(*b);
    }
    Ok(value)
}

/// Encode a varint with the fewest bytes that preserve its sign.
fn encode_varint(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_decoding() {
        assert_eq!(
            ColumnType::Int.decode(&[0, 0, 0, 42]).unwrap(),
            DataValue::Int(42)
        );
        assert_eq!(
            ColumnType::BigInt.decode(&(-7i64).to_be_bytes()).unwrap(),
            DataValue::BigInt(-7)
        );
        assert!(ColumnType::Int.decode(&[0, 1]).is_err());
        assert_eq!(ColumnType::Int.decode(&[]).unwrap(), DataValue::Null);
    }

    #[test]
    fn test_varint_sign_extension() {
        assert_eq!(decode_varint(&[0xff]).unwrap(), -1);
        assert_eq!(decode_varint(&[0x00, 0x80]).unwrap(), 128);
        assert_eq!(decode_varint(&[0xff, 0x7f]).unwrap(), -129);
        assert_eq!(encode_varint(128), vec![0x00, 0x80]);
        assert_eq!(encode_varint(-1), vec![0xff]);
        assert_eq!(encode_varint(0), vec![0x00]);
    }

    #[test]
    fn test_decimal_layout() {
        let value = DataValue::Decimal {
            unscaled: 12345,
            scale: 2,
        };
        let bytes = ColumnType::Decimal.encode(&value).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(ColumnType::Decimal.get_string(&bytes).unwrap(), "123.45");
    }

    #[test]
    fn test_text_and_ascii() {
        assert_eq!(ColumnType::Text.get_string("héllo".as_bytes()).unwrap(), "héllo");
        assert!(ColumnType::Ascii.decode("héllo".as_bytes()).is_err());
        assert!(ColumnType::Text.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_encode_type_mismatch() {
        assert!(ColumnType::Int.encode(&DataValue::from("x")).is_err());
    }

    #[test]
    fn test_numeric_family() {
        assert!(ColumnType::Counter.is_numeric());
        assert!(ColumnType::Decimal.is_numeric());
        assert!(!ColumnType::Text.is_numeric());
        assert!(!ColumnType::Timestamp.is_numeric());
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!("VARCHAR".parse::<ColumnType>().unwrap(), ColumnType::Text);
        assert!("geo".parse::<ColumnType>().is_err());
    }
}
