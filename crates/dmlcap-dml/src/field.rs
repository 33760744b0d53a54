//! DML record field types and their little-endian wire encoding.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::message::Fields;

/// Primitive DML field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Signed 8-bit integer.
    Byt,
    /// Unsigned 8-bit integer.
    Ubyt,
    /// Signed 16-bit integer.
    Shrt,
    /// Unsigned 16-bit integer.
    Ushrt,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    Uint,
    /// 32-bit float.
    Flt,
    /// 64-bit float.
    Dbl,
    /// 64-bit global identifier.
    Gid,
    /// Byte string with a u16 length prefix.
    Str,
    /// UTF-16LE string with a u16 code-unit count prefix.
    Wstr,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Byt => "BYT",
            Self::Ubyt => "UBYT",
            Self::Shrt => "SHRT",
            Self::Ushrt => "USHRT",
            Self::Int => "INT",
            Self::Uint => "UINT",
            Self::Flt => "FLT",
            Self::Dbl => "DBL",
            Self::Gid => "GID",
            Self::Str => "STR",
            Self::Wstr => "WSTR",
        }
    }
}

/// A named field in a record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
}

/// Decode a record laid out as `specs` from `payload`.
///
/// Fields are read in order. Bytes left over after the last field are ignored.
pub fn decode_record(specs: &[FieldSpec], payload: &[u8]) -> Result<Fields, DecodeError> {
    let mut cursor = FieldCursor::new(payload);
    let mut fields = Fields::with_capacity(specs.len());
    for spec in specs {
        let value = cursor.read(spec)?;
        fields.push(spec.name.clone(), value);
    }
    Ok(fields)
}

struct FieldCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read(&mut self, spec: &FieldSpec) -> Result<FieldValue, DecodeError> {
        let value = match spec.ty {
            FieldType::Byt => FieldValue::Int(i8::from_le_bytes(self.take_array(spec)?).into()),
            FieldType::Ubyt => FieldValue::UInt(u8::from_le_bytes(self.take_array(spec)?).into()),
            FieldType::Shrt => FieldValue::Int(i16::from_le_bytes(self.take_array(spec)?).into()),
            FieldType::Ushrt => {
                FieldValue::UInt(u16::from_le_bytes(self.take_array(spec)?).into())
            }
            FieldType::Int => FieldValue::Int(i32::from_le_bytes(self.take_array(spec)?).into()),
            FieldType::Uint => FieldValue::UInt(u32::from_le_bytes(self.take_array(spec)?).into()),
            FieldType::Flt => FieldValue::Float32(f32::from_le_bytes(self.take_array(spec)?)),
            FieldType::Dbl => FieldValue::Float64(f64::from_le_bytes(self.take_array(spec)?)),
            FieldType::Gid => FieldValue::UInt(u64::from_le_bytes(self.take_array(spec)?)),
            FieldType::Str => {
                let len = u16::from_le_bytes(self.take_array(spec)?) as usize;
                let raw = self.take(spec, len)?;
                FieldValue::Text(String::from_utf8_lossy(raw).into_owned())
            }
            FieldType::Wstr => {
                let units = u16::from_le_bytes(self.take_array(spec)?) as usize;
                let raw = self.take(spec, units * 2)?;
                let utf16: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                FieldValue::Text(String::from_utf16_lossy(&utf16))
            }
        };
        Ok(value)
    }

    fn take(&mut self, spec: &FieldSpec, len: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.buf.len() - self.pos;
        if len > available {
            return Err(DecodeError::Truncated {
                field: spec.name.clone(),
                needed: len,
                available,
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self, spec: &FieldSpec) -> Result<[u8; N], DecodeError> {
        let raw = self.take(spec, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Ok(out)
    }
}
