//! Marks: inline formatting attached to text and inline nodes

use crate::schema::MarkType;
use crate::Attrs;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A mark instance (type + attributes)
#[derive(Clone, PartialEq, Eq)]
pub struct Mark {
    ty: Arc<MarkType>,
    attrs: Attrs,
}

impl Mark {
    pub fn new(ty: Arc<MarkType>, attrs: Attrs) -> Self {
        Self { ty, attrs }
    }

    pub fn mark_type(&self) -> &MarkType {
        &self.ty
    }

    pub fn name(&self) -> &str {
        &self.ty.name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Insert this mark into a rank-ordered set, replacing a mark of the same type
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut result: Vec<Mark> = set
            .iter()
            .filter(|m| m.name() != self.name())
            .cloned()
            .collect();
        let at = result
            .iter()
            .position(|m| m.ty.rank > self.ty.rank)
            .unwrap_or(result.len());
        result.insert(at, self.clone());
        result
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a == b
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.ty.name)
        } else {
            write!(f, "{}{:?}", self.ty.name, self.attrs)
        }
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Mark", 2)?;
        state.serialize_field("type", &self.ty.name)?;
        state.serialize_field("attrs", &self.attrs)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Attrs, Schema};

    #[test]
    fn test_add_to_set_orders_by_rank() {
        let schema = Schema::basic();
        let em = schema.mark("em", Attrs::new()).unwrap();
        let strong = schema.mark("strong", Attrs::new()).unwrap();

        let set = em.add_to_set(&[]);
        let set = strong.add_to_set(&set);

        let names: Vec<_> = set.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["strong", "em"]);
    }

    #[test]
    fn test_add_to_set_replaces_same_type() {
        let schema = Schema::basic();
        let mut a = Attrs::new();
        a.insert("href".to_string(), "a".to_string());
        let mut b = Attrs::new();
        b.insert("href".to_string(), "b".to_string());
        let first = schema.mark("link", a).unwrap();
        let second = schema.mark("link", b).unwrap();

        let set = second.add_to_set(&first.add_to_set(&[]));
        assert_eq!(set.len(), 1);
        assert_eq!(set[0], second);
    }
}
