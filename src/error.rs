//! Error types for the tessellation pipeline.

use thiserror::Error;

use crate::attribs::AttribFormat;

/// Errors reported by the polygon triangulation engine through the
/// [`TriangulatorCallback::error`](crate::triangulator::TriangulatorCallback::error)
/// hook.
///
/// These are recoverable: the offending shape's fill is dropped from the
/// current frame and rendering continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriangulationError {
    /// The engine rejected the polygon (self-intersection it could not
    /// resolve, non-finite coordinates, ...).
    #[error("triangulation engine rejected the polygon: {0}")]
    Engine(String),
    /// A vertex carried fewer values than the packed attribute layout
    /// requires.
    #[error("vertex data has {found} values, expected at least {expected}")]
    MalformedVertex {
        /// Values received.
        found: usize,
        /// Minimum values required.
        expected: usize,
    },
    /// `begin_contour`/`end_contour` calls were not balanced.
    #[error("unbalanced contour nesting")]
    ContourNesting,
}

/// Errors produced while recording or tessellating a shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TessError {
    /// A single primitive does not fit even an empty index block.
    #[error("tessellation capacity exceeded: {needed} vertices needed, block limit is {max}")]
    CapacityExceeded {
        /// Vertices the primitive needs in one block.
        needed: usize,
        /// The configured index width.
        max: usize,
    },
    /// The triangulation engine failed on a polygon.
    #[error(transparent)]
    Triangulation(#[from] TriangulationError),
    /// A generic attribute was redefined with a different format.
    #[error("attribute `{name}` already declared as {existing:?}, cannot redeclare as {requested:?}")]
    AttributeMismatch {
        /// Attribute name.
        name: String,
        /// The original declaration, which stays in effect.
        existing: AttribFormat,
        /// The rejected declaration.
        requested: AttribFormat,
    },
    /// An attribute format is outside the supported range (arity 1 to 4).
    #[error("attribute `{name}` has unsupported arity {arity}")]
    InvalidArity {
        /// Attribute name.
        name: String,
        /// Requested arity.
        arity: u8,
    },
    /// A value was set for an attribute that was never declared.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// Drawing calls were issued in the wrong order.
    #[error("invalid shape state: {0}")]
    ShapeState(&'static str),
    /// The GPU backend failed to create or compile a resource.
    #[error("GPU backend error: {0}")]
    Gpu(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_both_sides() {
        let err = TessError::CapacityExceeded {
            needed: 70_000,
            max: 65_536,
        };
        assert_eq!(
            err.to_string(),
            "tessellation capacity exceeded: 70000 vertices needed, block limit is 65536"
        );
    }

    #[test]
    fn triangulation_error_is_transparent() {
        let err: TessError = TriangulationError::ContourNesting.into();
        assert_eq!(err.to_string(), "unbalanced contour nesting");
    }
}
