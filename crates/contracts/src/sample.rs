//! Sample element kinds and type-tagged sample storage.
//!
//! A stream's element kind is fixed at allocation. Storage is a tagged
//! variant with one backing `Vec<T>` per kind and one accessor pair per
//! concrete kind; a mismatched access fails with `TypeMismatch` instead of
//! reinterpreting memory.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Element kind of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    U8,
    I16,
    I32,
    I64,
    #[default]
    F32,
    F64,
    Bool,
    Char,
    Str,
}

impl SampleType {
    /// Width of one element in the raw byte encoding.
    ///
    /// `Str` is variable-width and reports 0; it has no raw byte view.
    pub fn size_of(self) -> usize {
        match self {
            Self::U8 | Self::Bool => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::F64 => 8,
            Self::Str => 0,
        }
    }

    /// Whether elements of this kind convert losslessly-enough to `f64`
    /// for generic numeric transforms (`Bool` maps to 0/1)
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Char | Self::Str)
    }

    /// Lowercase name, matching the serialized form
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-tagged sample storage
///
/// Element count is `num * dim` for the owning stream; elements are laid out
/// sample-major (all channels of sample 0, then sample 1, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleData {
    U8(#[serde(with = "serde_bytes")] Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Char(Vec<char>),
    Str(Vec<String>),
}

macro_rules! per_kind {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            SampleData::U8($v) => $body,
            SampleData::I16($v) => $body,
            SampleData::I32($v) => $body,
            SampleData::I64($v) => $body,
            SampleData::F32($v) => $body,
            SampleData::F64($v) => $body,
            SampleData::Bool($v) => $body,
            SampleData::Char($v) => $body,
            SampleData::Str($v) => $body,
        }
    };
}

macro_rules! typed_accessors {
    ($($variant:ident, $ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        impl SampleData {
            $(
                /// Borrow the backing slice; fails unless the kind matches
                pub fn $as_ref(&self) -> Result<&[$ty], PipelineError> {
                    match self {
                        Self::$variant(v) => Ok(v),
                        other => Err(PipelineError::TypeMismatch {
                            expected: SampleType::$variant,
                            actual: other.kind(),
                        }),
                    }
                }

                /// Mutably borrow the backing slice; fails unless the kind matches
                pub fn $as_mut(&mut self) -> Result<&mut [$ty], PipelineError> {
                    match self {
                        Self::$variant(v) => Ok(v),
                        other => Err(PipelineError::TypeMismatch {
                            expected: SampleType::$variant,
                            actual: other.kind(),
                        }),
                    }
                }
            )*
        }
    };
}

typed_accessors! {
    U8, u8, as_u8, as_u8_mut;
    I16, i16, as_i16, as_i16_mut;
    I32, i32, as_i32, as_i32_mut;
    I64, i64, as_i64, as_i64_mut;
    F32, f32, as_f32, as_f32_mut;
    F64, f64, as_f64, as_f64_mut;
    Bool, bool, as_bool, as_bool_mut;
    Char, char, as_char, as_char_mut;
    Str, String, as_str_slice, as_str_slice_mut;
}

impl SampleData {
    /// Allocate zeroed storage for `len` elements of the given kind
    pub fn zeroed(kind: SampleType, len: usize) -> Self {
        match kind {
            SampleType::U8 => Self::U8(vec![0; len]),
            SampleType::I16 => Self::I16(vec![0; len]),
            SampleType::I32 => Self::I32(vec![0; len]),
            SampleType::I64 => Self::I64(vec![0; len]),
            SampleType::F32 => Self::F32(vec![0.0; len]),
            SampleType::F64 => Self::F64(vec![0.0; len]),
            SampleType::Bool => Self::Bool(vec![false; len]),
            SampleType::Char => Self::Char(vec!['\0'; len]),
            SampleType::Str => Self::Str(vec![String::new(); len]),
        }
    }

    /// Kind tag of this storage
    pub fn kind(&self) -> SampleType {
        match self {
            Self::U8(_) => SampleType::U8,
            Self::I16(_) => SampleType::I16,
            Self::I32(_) => SampleType::I32,
            Self::I64(_) => SampleType::I64,
            Self::F32(_) => SampleType::F32,
            Self::F64(_) => SampleType::F64,
            Self::Bool(_) => SampleType::Bool,
            Self::Char(_) => SampleType::Char,
            Self::Str(_) => SampleType::Str,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        per_kind!(self, v => v.len())
    }

    /// Whether the storage holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_range(&self, what: &str, off: usize, count: usize) -> Result<(), PipelineError> {
        if off.checked_add(count).map_or(true, |end| end > self.len()) {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "{what} range {off}..{} out of bounds for {} elements",
                    off.saturating_add(count),
                    self.len()
                ),
            });
        }
        Ok(())
    }

    /// Copy `count` elements from `src[src_off..]` into `self[dst_off..]`
    ///
    /// Fails on kind mismatch or out-of-bounds ranges; never reinterprets.
    pub fn copy_from(
        &mut self,
        dst_off: usize,
        src: &SampleData,
        src_off: usize,
        count: usize,
    ) -> Result<(), PipelineError> {
        src.check_range("source", src_off, count)?;
        self.check_range("destination", dst_off, count)?;

        macro_rules! copy_arm {
            ($($variant:ident),*) => {
                match (self, src) {
                    $(
                        (Self::$variant(d), Self::$variant(s)) => {
                            d[dst_off..dst_off + count]
                                .clone_from_slice(&s[src_off..src_off + count]);
                            Ok(())
                        }
                    )*
                    (d, s) => Err(PipelineError::TypeMismatch {
                        expected: d.kind(),
                        actual: s.kind(),
                    }),
                }
            };
        }
        copy_arm!(U8, I16, I32, I64, F32, F64, Bool, Char, Str)
    }

    /// Copy out `count` elements starting at `off` into fresh storage
    pub fn slice(&self, off: usize, count: usize) -> Result<SampleData, PipelineError> {
        self.check_range("slice", off, count)?;
        per_kind!(self, v => Ok(Self::from_vec_like(v, off, count)))
    }

    fn from_vec_like<T>(v: &[T], off: usize, count: usize) -> SampleData
    where
        T: Clone,
        SampleData: FromElements<T>,
    {
        SampleData::from_elements(v[off..off + count].to_vec())
    }

    /// Element converted to `f64` for generic numeric transforms
    ///
    /// `Bool` maps to 0/1; `Char` and `Str` are rejected.
    pub fn element_as_f64(&self, idx: usize) -> Result<f64, PipelineError> {
        self.check_range("element", idx, 1)?;
        match self {
            Self::U8(v) => Ok(f64::from(v[idx])),
            Self::I16(v) => Ok(f64::from(v[idx])),
            Self::I32(v) => Ok(f64::from(v[idx])),
            Self::I64(v) => Ok(v[idx] as f64),
            Self::F32(v) => Ok(f64::from(v[idx])),
            Self::F64(v) => Ok(v[idx]),
            Self::Bool(v) => Ok(if v[idx] { 1.0 } else { 0.0 }),
            other => Err(PipelineError::UnsupportedKind {
                kind: other.kind(),
                operation: "numeric conversion",
            }),
        }
    }

    /// Element rendered as text, for plain-text logging
    pub fn element_to_string(&self, idx: usize) -> Option<String> {
        if idx >= self.len() {
            return None;
        }
        Some(match self {
            Self::U8(v) => v[idx].to_string(),
            Self::I16(v) => v[idx].to_string(),
            Self::I32(v) => v[idx].to_string(),
            Self::I64(v) => v[idx].to_string(),
            Self::F32(v) => v[idx].to_string(),
            Self::F64(v) => v[idx].to_string(),
            Self::Bool(v) => v[idx].to_string(),
            Self::Char(v) => v[idx].to_string(),
            Self::Str(v) => v[idx].clone(),
        })
    }

    /// Native-endian raw byte view of the storage
    ///
    /// Fixed-width kinds only; `Str` has no raw encoding.
    pub fn to_raw_bytes(&self) -> Result<Bytes, PipelineError> {
        let mut buf = BytesMut::with_capacity(self.len() * self.kind().size_of().max(1));
        match self {
            Self::U8(v) => buf.extend_from_slice(v),
            Self::I16(v) => buf.extend_from_slice(bytemuck::cast_slice(v)),
            Self::I32(v) => buf.extend_from_slice(bytemuck::cast_slice(v)),
            Self::I64(v) => buf.extend_from_slice(bytemuck::cast_slice(v)),
            Self::F32(v) => buf.extend_from_slice(bytemuck::cast_slice(v)),
            Self::F64(v) => buf.extend_from_slice(bytemuck::cast_slice(v)),
            Self::Bool(v) => {
                for b in v {
                    buf.put_u8(u8::from(*b));
                }
            }
            Self::Char(v) => {
                for c in v {
                    buf.put_u32_ne(*c as u32);
                }
            }
            Self::Str(_) => {
                return Err(PipelineError::UnsupportedKind {
                    kind: SampleType::Str,
                    operation: "raw byte view",
                })
            }
        }
        Ok(buf.freeze())
    }

    /// Rebuild storage from a native-endian raw byte encoding
    pub fn from_raw_bytes(kind: SampleType, raw: &[u8]) -> Result<SampleData, PipelineError> {
        let width = kind.size_of();
        if width == 0 {
            return Err(PipelineError::UnsupportedKind {
                kind,
                operation: "raw byte view",
            });
        }
        if raw.len() % width != 0 {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "raw buffer of {} bytes is not a multiple of element width {width}",
                    raw.len()
                ),
            });
        }
        Ok(match kind {
            SampleType::U8 => Self::U8(raw.to_vec()),
            SampleType::I16 => Self::I16(bytemuck::pod_collect_to_vec(raw)),
            SampleType::I32 => Self::I32(bytemuck::pod_collect_to_vec(raw)),
            SampleType::I64 => Self::I64(bytemuck::pod_collect_to_vec(raw)),
            SampleType::F32 => Self::F32(bytemuck::pod_collect_to_vec(raw)),
            SampleType::F64 => Self::F64(bytemuck::pod_collect_to_vec(raw)),
            SampleType::Bool => Self::Bool(raw.iter().map(|b| *b != 0).collect()),
            SampleType::Char => Self::Char(
                raw.chunks_exact(4)
                    .map(|c| {
                        let code = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
                    })
                    .collect(),
            ),
            SampleType::Str => unreachable!("width 0 rejected above"),
        })
    }
}

/// Internal helper mapping element types back to their variant
trait FromElements<T> {
    fn from_elements(v: Vec<T>) -> SampleData;
}

macro_rules! from_elements {
    ($($variant:ident, $ty:ty;)*) => {
        $(
            impl FromElements<$ty> for SampleData {
                fn from_elements(v: Vec<$ty>) -> SampleData {
                    SampleData::$variant(v)
                }
            }
        )*
    };
}

from_elements! {
    U8, u8;
    I16, i16;
    I32, i32;
    I64, i64;
    F32, f32;
    F64, f64;
    Bool, bool;
    Char, char;
    Str, String;
}
