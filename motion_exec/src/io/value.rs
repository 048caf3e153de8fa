//! Values stored in the controllers IO

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Status of the current target pose.
///
/// This is the authoritative answer to "are we done moving". It is produced by the filters and
/// controllers which detect arrival or stalls, and consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetPoseStatus {
    Moving,
    Reached,
    IntermediateReached,
    Blocked,
    Timeout
}

/// A value held by the IO.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    F32(f32),
    F64(f64),
    I32(i32),
    Bool(bool),
    /// Short string, at most `MAX_STRING_LEN` bytes
    Str(String),
    Status(TargetPoseStatus)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Types which can be extracted from a `Value`.
pub trait FromValue: Sized {
    /// Name of the type, used in mismatch messages
    const TYPE_NAME: &'static str;

    /// Extract the value, or `None` if the variant doesn't match.
    fn from_value(value: &Value) -> Option<Self>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TargetPoseStatus {
    fn default() -> Self {
        TargetPoseStatus::Moving
    }
}

impl Value {
    /// Name of the stored type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::F32(_) => f32::TYPE_NAME,
            Value::F64(_) => f64::TYPE_NAME,
            Value::I32(_) => i32::TYPE_NAME,
            Value::Bool(_) => bool::TYPE_NAME,
            Value::Str(_) => String::TYPE_NAME,
            Value::Status(_) => TargetPoseStatus::TYPE_NAME,
        }
    }
}

macro_rules! impl_value_conversions {
    ($t:ty, $variant:ident, $name:expr) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        }

        impl FromValue for $t {
            const TYPE_NAME: &'static str = $name;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None
                }
            }
        }
    };
}

impl_value_conversions!(f32, F32, "f32");
impl_value_conversions!(f64, F64, "f64");
impl_value_conversions!(i32, I32, "i32");
impl_value_conversions!(bool, Bool, "bool");
impl_value_conversions!(String, Str, "string");
impl_value_conversions!(TargetPoseStatus, Status, "target_pose_status");

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
