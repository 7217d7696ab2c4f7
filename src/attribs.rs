//! Generic (user-declared) vertex attributes.
//!
//! Attributes are declared once per [`Tessellator`](crate::Tessellator) with
//! a name, a semantic kind, a scalar type and an arity of 1 to 4. The kind
//! tells the batching stage which transform applies when transform-ahead is
//! enabled: [`AttribKind::Position`] goes through the model matrix,
//! [`AttribKind::Normal`] through the normal matrix, everything else is
//! copied untouched.

use crate::error::TessError;

/// Semantic role of a generic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribKind {
    /// Transformed like a position.
    Position,
    /// Transformed like a normal and renormalised after blending.
    Normal,
    /// A color; never transformed.
    Color,
    /// Anything else; never transformed.
    Other,
}

/// Scalar type of a generic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribType {
    /// 32-bit float components.
    Float,
    /// 32-bit signed integer components.
    Int,
    /// Boolean components.
    Bool,
}

/// The full declaration of a generic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribFormat {
    /// Semantic role.
    pub kind: AttribKind,
    /// Scalar type.
    pub ty: AttribType,
    /// Number of components, 1 to 4.
    pub arity: u8,
}

impl AttribFormat {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(kind: AttribKind, ty: AttribType, arity: u8) -> Self {
        Self { kind, ty, arity }
    }

    /// Number of components as an index.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.arity as usize
    }

    /// Whether blending must renormalise this attribute.
    #[must_use]
    pub const fn is_normal_vector(&self) -> bool {
        matches!(self.kind, AttribKind::Normal)
            && matches!(self.ty, AttribType::Float)
            && self.arity == 3
    }
}

/// Handle to a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttribId(pub(crate) usize);

impl AttribId {
    /// Declaration order of this attribute.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AttribDef {
    name: String,
    format: AttribFormat,
}

/// The set of declared generic attributes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttribRegistry {
    defs: Vec<AttribDef>,
}

impl AttribRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with `format`.
    ///
    /// Redeclaring with an identical format returns the existing id.
    ///
    /// # Errors
    ///
    /// [`TessError::AttributeMismatch`] if `name` exists with another
    /// format (the original declaration is kept), or
    /// [`TessError::InvalidArity`] for an arity outside 1 to 4.
    pub fn define(&mut self, name: &str, format: AttribFormat) -> Result<AttribId, TessError> {
        if !(1..=4).contains(&format.arity) {
            return Err(TessError::InvalidArity {
                name: name.to_owned(),
                arity: format.arity,
            });
        }
        if let Some(id) = self.lookup(name) {
            let existing = self.defs[id.0].format;
            if existing == format {
                return Ok(id);
            }
            log::warn!(
                "attribute `{name}` redeclared as {format:?}; keeping original {existing:?}"
            );
            return Err(TessError::AttributeMismatch {
                name: name.to_owned(),
                existing,
                requested: format,
            });
        }
        self.defs.push(AttribDef {
            name: name.to_owned(),
            format,
        });
        Ok(AttribId(self.defs.len() - 1))
    }

    /// Find a declared attribute by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<AttribId> {
        self.defs.iter().position(|d| d.name == name).map(AttribId)
    }

    /// Format of a declared attribute.
    #[must_use]
    pub fn format(&self, id: AttribId) -> AttribFormat {
        self.defs[id.0].format
    }

    /// Name of a declared attribute.
    #[must_use]
    pub fn name(&self, id: AttribId) -> &str {
        &self.defs[id.0].name
    }

    /// Number of declared attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether no attribute is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Formats in declaration order.
    pub fn formats(&self) -> impl Iterator<Item = AttribFormat> + '_ {
        self.defs.iter().map(|d| d.format)
    }

    /// Total number of components over all attributes.
    #[must_use]
    pub fn packed_width(&self) -> usize {
        self.defs.iter().map(|d| d.format.width()).sum()
    }
}

/// One column of generic attribute values, `arity` components per vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum AttribData {
    /// Float components.
    Float(Vec<f32>),
    /// Integer components.
    Int(Vec<i32>),
    /// Boolean components.
    Bool(Vec<bool>),
}

impl AttribData {
    /// An empty column for `ty`.
    #[must_use]
    pub fn new(ty: AttribType) -> Self {
        match ty {
            AttribType::Float => Self::Float(Vec::new()),
            AttribType::Int => Self::Int(Vec::new()),
            AttribType::Bool => Self::Bool(Vec::new()),
        }
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    /// Whether the column is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        match self {
            Self::Float(v) => v.clear(),
            Self::Int(v) => v.clear(),
            Self::Bool(v) => v.clear(),
        }
    }

    /// Append one vertex worth of values given as doubles.
    ///
    /// Missing components are zero; integers are rounded; booleans are
    /// `value != 0`.
    #[expect(clippy::cast_possible_truncation)]
    pub fn push_packed(&mut self, values: &[f64], arity: usize) {
        let value = |k: usize| values.get(k).copied().unwrap_or(0.0);
        match self {
            Self::Float(v) => v.extend((0..arity).map(|k| value(k) as f32)),
            Self::Int(v) => v.extend((0..arity).map(|k| value(k).round() as i32)),
            Self::Bool(v) => v.extend((0..arity).map(|k| value(k) != 0.0)),
        }
    }

    /// Append vertex `vertex` of `src` (same type) to this column.
    pub fn push_from(&mut self, src: &Self, vertex: usize, arity: usize) {
        let range = vertex * arity..(vertex + 1) * arity;
        match (self, src) {
            (Self::Float(dst), Self::Float(src)) => dst.extend_from_slice(&src[range]),
            (Self::Int(dst), Self::Int(src)) => dst.extend_from_slice(&src[range]),
            (Self::Bool(dst), Self::Bool(src)) => dst.extend_from_slice(&src[range]),
            _ => debug_assert!(false, "attribute column type mismatch"),
        }
    }

    /// Append vertex `vertex` as doubles to `out`.
    pub fn pack(&self, vertex: usize, arity: usize, out: &mut Vec<f64>) {
        let range = vertex * arity..(vertex + 1) * arity;
        match self {
            Self::Float(v) => out.extend(v[range].iter().map(|&x| f64::from(x))),
            Self::Int(v) => out.extend(v[range].iter().map(|&x| f64::from(x))),
            Self::Bool(v) => out.extend(v[range].iter().map(|&x| if x { 1.0 } else { 0.0 })),
        }
    }

    /// Float view of vertex `vertex`, zero padded to four components.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn get(&self, vertex: usize, arity: usize) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (k, slot) in out.iter_mut().enumerate().take(arity) {
            let i = vertex * arity + k;
            *slot = match self {
                Self::Float(v) => v[i],
                Self::Int(v) => v[i] as f32,
                Self::Bool(v) => f32::from(u8::from(v[i])),
            };
        }
        out
    }

    /// Overwrite vertex `vertex` with float values.
    #[expect(clippy::cast_possible_truncation)]
    pub fn set(&mut self, vertex: usize, arity: usize, values: [f32; 4]) {
        for (k, &value) in values.iter().enumerate().take(arity) {
            let i = vertex * arity + k;
            match self {
                Self::Float(v) => v[i] = value,
                Self::Int(v) => v[i] = value.round() as i32,
                Self::Bool(v) => v[i] = value != 0.0,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const UV2: AttribFormat = AttribFormat::new(AttribKind::Other, AttribType::Float, 2);

    #[test]
    fn redefinition_with_same_format_is_idempotent() {
        let mut registry = AttribRegistry::new();
        let a = registry.define("uv2", UV2).unwrap();
        let b = registry.define("uv2", UV2).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn redefinition_with_other_format_is_rejected_and_original_kept() {
        let mut registry = AttribRegistry::new();
        registry.define("uv2", UV2).unwrap();
        let other = AttribFormat::new(AttribKind::Other, AttribType::Int, 2);
        let err = registry.define("uv2", other).unwrap_err();
        assert!(matches!(err, TessError::AttributeMismatch { .. }));
        let id = registry.lookup("uv2").unwrap();
        assert_eq!(registry.format(id), UV2);
    }

    #[test]
    fn arity_out_of_range_is_rejected() {
        let mut registry = AttribRegistry::new();
        let bad = AttribFormat::new(AttribKind::Other, AttribType::Float, 5);
        assert!(matches!(
            registry.define("wide", bad),
            Err(TessError::InvalidArity { arity: 5, .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn int_columns_round_when_packed() {
        let mut data = AttribData::new(AttribType::Int);
        data.push_packed(&[1.6, -2.4], 2);
        data.push_packed(&[7.0], 2);
        assert_eq!(data, AttribData::Int(vec![2, -2, 7, 0]));
        let mut out = Vec::new();
        data.pack(1, 2, &mut out);
        assert_eq!(out, vec![7.0, 0.0]);
    }

    #[test]
    fn bool_columns_pack_as_zero_or_one() {
        let mut data = AttribData::new(AttribType::Bool);
        data.push_packed(&[0.0, 0.25], 2);
        let mut out = Vec::new();
        data.pack(0, 2, &mut out);
        assert_eq!(out, vec![0.0, 1.0]);
        assert_eq!(data.get(0, 2), [0.0, 1.0, 0.0, 0.0]);
    }
}
