//! Rewrites physically decoded values according to their logical type.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::{LogicalKind, LogicalType, PrimitiveNode};
use crate::value::{TimeUnit, Value};

/// A caller-supplied converter, applied to a decoded value array in place.
pub type Converter = Box<dyn Fn(&mut Vec<Value>, &PrimitiveNode) -> Result<()> + Send + Sync>;

/// Converters keyed by logical type, consulted before the built-in
/// conversions.
#[derive(Default)]
pub struct Converters {
    custom: HashMap<LogicalKind, Converter>,
}

impl Converters {
    pub fn with(mut self, kind: LogicalKind, converter: Converter) -> Self {
        self.custom.insert(kind, converter);
        self
    }
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converters")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Applies the configured or default conversion for the leaf's logical type.
pub(crate) fn convert_values(
    values: &mut Vec<Value>,
    primitive: &PrimitiveNode,
    utf8: bool,
    converters: &Converters,
) -> Result<()> {
    let logical = match primitive.logical_type {
        Some(logical) => logical,
        None => return Ok(()),
    };
    if let Some(converter) = converters.custom.get(&logical.kind()) {
        return converter(values, primitive);
    }
    match logical {
        LogicalType::String | LogicalType::Enum => {
            if utf8 {
                for value in values.iter_mut() {
                    bytes_to_utf8(value)?;
                }
            }
        }
        LogicalType::Json => {
            for value in values.iter_mut() {
                if let Value::Bytes(bytes) = value {
                    let json = serde_json::from_slice(bytes).map_err(|error| {
                        Error::CorruptPage(format!("invalid JSON value: {}", error))
                    })?;
                    *value = Value::Json(json);
                }
            }
        }
        // BSON stays as raw bytes unless a converter is configured
        LogicalType::Bson => {}
        LogicalType::Decimal { scale, .. } => {
            for value in values.iter_mut() {
                let unscaled = match value {
                    Value::Int32(int) => *int as i128,
                    Value::Int64(int) => *int as i128,
                    Value::Bytes(bytes) => decimal_from_be_bytes(bytes)?,
                    _ => continue,
                };
                *value = Value::Decimal { unscaled, scale };
            }
        }
        LogicalType::Date => {
            for value in values.iter_mut() {
                if let Value::Int32(days) = value {
                    *value = Value::Date(*days);
                }
            }
        }
        // times stay as their physical integers
        LogicalType::TimeMillis | LogicalType::TimeMicros => {}
        LogicalType::TimestampMillis => timestamps(values, TimeUnit::Millisecond),
        LogicalType::TimestampMicros => timestamps(values, TimeUnit::Microsecond),
        LogicalType::TimestampNanos => timestamps(values, TimeUnit::Nanosecond),
        LogicalType::Integer {
            bit_width,
            is_signed: false,
        } => {
            // unsigned integers are stored in the signed physical types with
            // their bit pattern preserved
            for value in values.iter_mut() {
                if let Value::Int32(int) = value {
                    let unsigned = match bit_width {
                        8 => (*int as u8) as i64,
                        16 => (*int as u16) as i64,
                        _ => (*int as u32) as i64,
                    };
                    *value = Value::Int64(unsigned);
                }
            }
        }
        // signed widths are already sign-correct in their physical type
        LogicalType::Integer { is_signed: true, .. } => {}
        LogicalType::Uuid => {
            for value in values.iter_mut() {
                if let Value::Bytes(bytes) = value {
                    if bytes.len() != 16 {
                        return Err(Error::CorruptPage(format!(
                            "a UUID holds {} bytes",
                            bytes.len()
                        )));
                    }
                    let mut uuid = [0u8; 16];
                    uuid.copy_from_slice(bytes);
                    *value = Value::Uuid(uuid);
                }
            }
        }
        LogicalType::Interval => {
            for value in values.iter_mut() {
                if let Value::Bytes(bytes) = value {
                    if bytes.len() != 12 {
                        return Err(Error::CorruptPage(format!(
                            "an INTERVAL holds {} bytes",
                            bytes.len()
                        )));
                    }
                    *value = Value::Interval {
                        months: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
                        days: i32::from_le_bytes(bytes[4..8].try_into().unwrap()),
                        millis: i32::from_le_bytes(bytes[8..12].try_into().unwrap()),
                    };
                }
            }
        }
        LogicalType::Float16 => {
            for value in values.iter_mut() {
                if let Value::Bytes(bytes) = value {
                    if bytes.len() != 2 {
                        return Err(Error::CorruptPage(format!(
                            "a FLOAT16 holds {} bytes",
                            bytes.len()
                        )));
                    }
                    let bits = u16::from_le_bytes([bytes[0], bytes[1]]);
                    *value = Value::Float(f16_to_f32(bits));
                }
            }
        }
        LogicalType::Unknown => {}
    }
    Ok(())
}

fn timestamps(values: &mut [Value], unit: TimeUnit) {
    for value in values.iter_mut() {
        if let Value::Int64(int) = value {
            *value = Value::Timestamp { value: *int, unit };
        }
    }
}

fn bytes_to_utf8(value: &mut Value) -> Result<()> {
    if let Value::Bytes(bytes) = value {
        let bytes = std::mem::take(bytes);
        let string = String::from_utf8(bytes)
            .map_err(|_| Error::CorruptPage("invalid UTF-8 in a STRING column".to_string()))?;
        *value = Value::Utf8(string);
    }
    Ok(())
}

/// Interprets a big-endian two's-complement integer of up to 16 bytes.
fn decimal_from_be_bytes(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 16 {
        return Err(Error::UnsupportedFeature(format!(
            "decimals of {} bytes exceed 128 bits",
            bytes.len()
        )));
    }
    let mut buffer = if bytes[0] & 0x80 != 0 {
        [0xffu8; 16]
    } else {
        [0u8; 16]
    };
    buffer[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buffer))
}

fn f16_to_f32(bits: u16) -> f32 {
    let sign = (bits >> 15) as u32;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;
    if exponent == 0x1f {
        return f32::from_bits((sign << 31) | 0x7f80_0000 | (mantissa << 13));
    }
    if exponent == 0 {
        let magnitude = mantissa as f32 * (-24f32).exp2();
        return if sign == 1 { -magnitude } else { magnitude };
    }
    f32::from_bits((sign << 31) | ((exponent + 112) << 23) | (mantissa << 13))
}
