//! Tuple schemas.
//!
//! Schemas are immutable values carried by pipelines as input/output
//! contracts (spec.md section 3). SQL parsing and catalog bookkeeping that
//! *produce* schemas are out of scope here (spec.md section 1); this module
//! only models the schema value itself and the edit-diff used by the
//! `SchemaUpdate` reconfiguration path (SPEC_FULL.md section 3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Char,
    /// Variable-sized payload: stored as a child-buffer reference plus
    /// length (spec.md section 3).
    VarSized,
}

impl PrimitiveType {
    /// Fixed in-tuple width in bytes. `VarSized` fields store a
    /// `(child_index: u32, offset: u32, length: u32)` triple inline and the
    /// bytes themselves live in a child buffer.
    pub fn fixed_width(self) -> usize {
        match self {
            PrimitiveType::Int8 | PrimitiveType::UInt8 | PrimitiveType::Boolean | PrimitiveType::Char => 1,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 2,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => 4,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 8,
            PrimitiveType::VarSized => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: PrimitiveType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: PrimitiveType, nullable: bool) -> Self {
        Self { name: name.into(), ty, nullable }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TupleSchema {
    pub fields: Vec<Field>,
}

impl TupleSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Sum of fixed field widths; the per-tuple stride within a buffer.
    pub fn tuple_size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.fixed_width()).sum()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Compute the ordered edit list turning `self` into `other`. Used to
    /// validate a mid-query `SchemaUpdate` reconfiguration (SPEC_FULL.md
    /// section 3) before it is applied to a running pipeline.
    pub fn diff(&self, other: &TupleSchema) -> Vec<SchemaEdit> {
        let mut edits = Vec::new();
        for field in &other.fields {
            match self.field(&field.name) {
                None => edits.push(SchemaEdit::Added(field.clone())),
                Some(existing) if existing.ty != field.ty => {
                    edits.push(SchemaEdit::TypeChanged {
                        name: field.name.clone(),
                        from: existing.ty,
                        to: field.ty,
                    })
                }
                Some(_) => {}
            }
        }
        for field in &self.fields {
            if other.field(&field.name).is_none() {
                edits.push(SchemaEdit::Removed(field.clone()));
            }
        }
        edits
    }

    /// A schema update is compatible if it only adds nullable fields or
    /// removes fields — it never silently reinterprets the bytes of an
    /// existing non-nullable field.
    pub fn is_compatible_update(&self, other: &TupleSchema) -> bool {
        self.diff(other).iter().all(|edit| match edit {
            SchemaEdit::Added(f) => f.nullable,
            SchemaEdit::Removed(_) => true,
            SchemaEdit::TypeChanged { .. } => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaEdit {
    Added(Field),
    Removed(Field),
    TypeChanged { name: String, from: PrimitiveType, to: PrimitiveType },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_size_sums_fixed_widths() {
        let schema = TupleSchema::new(vec![
            Field::new("a", PrimitiveType::Int64, false),
            Field::new("b", PrimitiveType::Boolean, false),
        ]);
        assert_eq!(schema.tuple_size(), 9);
    }

    #[test]
    fn diff_detects_added_removed_and_type_changed() {
        let a = TupleSchema::new(vec![
            Field::new("x", PrimitiveType::Int32, false),
            Field::new("y", PrimitiveType::Int64, false),
        ]);
        let b = TupleSchema::new(vec![
            Field::new("x", PrimitiveType::Int64, false),
            Field::new("z", PrimitiveType::Boolean, true),
        ]);
        let edits = a.diff(&b);
        assert!(edits.contains(&SchemaEdit::Added(Field::new("z", PrimitiveType::Boolean, true))));
        assert!(edits.contains(&SchemaEdit::Removed(Field::new("y", PrimitiveType::Int64, false))));
        assert!(edits.iter().any(|e| matches!(e, SchemaEdit::TypeChanged { name, .. } if name == "x")));
    }

    #[test]
    fn compatible_update_allows_nullable_add_and_remove_only() {
        let a = TupleSchema::new(vec![Field::new("x", PrimitiveType::Int32, false)]);
        let add_nullable = TupleSchema::new(vec![
            Field::new("x", PrimitiveType::Int32, false),
            Field::new("y", PrimitiveType::Int32, true),
        ]);
        assert!(a.is_compatible_update(&add_nullable));

        let retype = TupleSchema::new(vec![Field::new("x", PrimitiveType::Int64, false)]);
        assert!(!a.is_compatible_update(&retype));
    }
}
