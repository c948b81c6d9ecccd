use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// A decoded cell value.
///
/// Every variant corresponds to one registered column type, so a value
/// always remembers the width it was stored with. Aggregates rely on this
/// to widen numbers explicitly by their source type.
#[derive(Debug, Clone)]
pub enum DataValue {
    Null,
    Boolean(bool),
    /// 32-bit signed integer (`int`).
    Int(i32),
    /// 64-bit signed integer (`bigint`).
    BigInt(i64),
    /// 64-bit counter value (`counter`).
    Counter(i64),
    /// Arbitrary precision integer (`varint`), limited to 128 bits.
    Varint(i128),
    Float(f32),
    Double(f64),
    /// Decimal number represented as `unscaled * 10^-scale`.
    Decimal { unscaled: i128, scale: i32 },
    /// UTF-8 text (`text`, `varchar`, `ascii`).
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Blob(Vec<u8>),
}

impl DataValue {
    /// Returns the text value if this is a Text variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Widen a numeric value to `f64`.
    ///
    /// Returns `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Int(v) => Some(f64::from(*v)),
            DataValue::BigInt(v) | DataValue::Counter(v) => Some(*v as f64),
            DataValue::Varint(v) => Some(*v as f64),
            DataValue::Float(v) => Some(f64::from(*v)),
            DataValue::Double(v) => Some(*v),
            DataValue::Decimal { unscaled, scale } => Some(decimal_to_f64(*unscaled, *scale)),
            _ => None,
        }
    }

    /// Returns the timestamp as milliseconds since the epoch.
    pub fn as_timestamp_millis(&self) -> Option<i64> {
        match self {
            DataValue::Timestamp(ts) => Some(ts.timestamp_millis()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Whether the value belongs to the numeric family.
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Rank used to order values of different variants.
    fn rank(&self) -> u8 {
        match self {
            DataValue::Null => 0,
            DataValue::Boolean(_) => 1,
            DataValue::Int(_) => 2,
            DataValue::BigInt(_) => 3,
            DataValue::Counter(_) => 4,
            DataValue::Varint(_) => 5,
            DataValue::Float(_) => 6,
            DataValue::Double(_) => 7,
            DataValue::Decimal { .. } => 8,
            DataValue::Text(_) => 9,
            DataValue::Timestamp(_) => 10,
            DataValue::Uuid(_) => 11,
            DataValue::Blob(_) => 12,
        }
    }

    /// Render the value in its natural JSON form.
    ///
    /// Numbers stay numbers, everything else becomes a string. Floats are
    /// rendered through their shortest decimal representation so that `0.1f32`
    /// prints as `0.1` rather than its widened binary value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            DataValue::Null => Value::Null,
            DataValue::Boolean(b) => Value::Bool(*b),
            DataValue::Int(v) => Value::from(*v),
            DataValue::BigInt(v) | DataValue::Counter(v) => Value::from(*v),
            DataValue::Varint(v) => match i64::try_from(*v) {
                Ok(small) => Value::from(small),
                Err(_) => float_json(*v as f64),
            },
            DataValue::Float(v) => float_json(v.to_string().parse::<f64>().unwrap_or(f64::NAN)),
            DataValue::Double(v) => float_json(*v),
            DataValue::Decimal { unscaled, scale } => {
                float_json(decimal_to_f64(*unscaled, *scale))
            }
            other => Value::String(other.to_string()),
        }
    }
}

fn float_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn decimal_to_f64(unscaled: i128, scale: i32) -> f64 {
    unscaled as f64 / 10f64.powi(scale)
}

/// Compare two decimals exactly when both fit after rescaling.
fn decimal_cmp(a: (i128, i32), b: (i128, i32)) -> Ordering {
    let (ua, sa) = a;
    let (ub, sb) = b;
    let exact = match sa.cmp(&sb) {
        Ordering::Equal => Some(ua.cmp(&ub)),
        Ordering::Less => 10i128
            .checked_pow(sb.abs_diff(sa))
            .and_then(|factor| ua.checked_mul(factor))
            .map(|scaled| scaled.cmp(&ub)),
        Ordering::Greater => 10i128
            .checked_pow(sa.abs_diff(sb))
            .and_then(|factor| ub.checked_mul(factor))
            .map(|scaled| ua.cmp(&scaled)),
    };
    exact.unwrap_or_else(|| decimal_to_f64(ua, sa).total_cmp(&decimal_to_f64(ub, sb)))
}

fn format_decimal(unscaled: i128, scale: i32) -> String {
    if scale <= 0 {
        let mut s = unscaled.to_string();
        if unscaled != 0 {
            s.extend(std::iter::repeat_n('0', scale.unsigned_abs() as usize));
        }
        return s;
    }

    let digits = unscaled.unsigned_abs().to_string();
    let scale = scale as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        (int_part.to_string(), frac_part.to_string())
    } else {
        ("0".to_string(), format!("{}{}", "0".repeat(scale - digits.len()), digits))
    };
    let sign = if unscaled < 0 { "-" } else { "" };
    format!("{sign}{int_part}.{frac_part}")
}

/// Natural ordering: same-variant values compare by value, floats use a total
/// order, and values of different variants order by variant rank.
impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::BigInt(a), Self::BigInt(b)) | (Self::Counter(a), Self::Counter(b)) => a.cmp(b),
            (Self::Varint(a), Self::Varint(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (
                Self::Decimal {
                    unscaled: ua,
                    scale: sa,
                },
                Self::Decimal {
                    unscaled: ub,
                    scale: sb,
                },
            ) => decimal_cmp((*ua, *sa), (*ub, *sb)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Uuid(a), Self::Uuid(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DataValue {}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "null"),
            DataValue::Boolean(b) => write!(f, "{b}"),
            DataValue::Int(v) => write!(f, "{v}"),
            DataValue::BigInt(v) | DataValue::Counter(v) => write!(f, "{v}"),
            DataValue::Varint(v) => write!(f, "{v}"),
            DataValue::Float(v) => write!(f, "{v}"),
            DataValue::Double(v) => write!(f, "{v}"),
            DataValue::Decimal { unscaled, scale } => {
                write!(f, "{}", format_decimal(*unscaled, *scale))
            }
            DataValue::Text(s) => write!(f, "{s}"),
            DataValue::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            DataValue::Uuid(u) => write!(f, "{}", u.hyphenated()),
            DataValue::Blob(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

// --- Conversions ---

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Text(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_string())
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::BigInt(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Float(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Double(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(v: DateTime<Utc>) -> Self {
        DataValue::Timestamp(v)
    }
}

impl From<Uuid> for DataValue {
    fn from(v: Uuid) -> Self {
        DataValue::Uuid(v)
    }
}
