//! The in-memory metadata graph: types, methods, fields.

use crate::body::MethodBody;
use crate::ids::{FieldId, MethodId, TypeId};

/// A type (class/struct/interface) declared in the module.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub namespace: String,
    pub name: String,
    /// `Some` for a nested type, naming its immediately enclosing type.
    pub declaring_type: Option<TypeId>,
    /// Fully-qualified or simple attribute names attached to this type.
    pub attributes: Vec<String>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
}

impl TypeDef {
    /// `Namespace.Outer/Inner`-style fully qualified name, ignoring nesting
    /// (nesting is resolved separately via `Module::outermost_declaring_type`).
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A method declared on a [`TypeDef`].
#[derive(Clone, Debug)]
pub struct MethodDef {
    pub name: String,
    pub declaring_type: TypeId,
    pub attributes: Vec<String>,
    pub is_native: bool,
    pub is_static_constructor: bool,
    /// `None` means a `void` return, matching the clone rule in
    /// spec.md §4.4 ("a method shell is created with matching return
    /// type").
    pub return_type: Option<TypeId>,
    /// `None` for native methods and for bodies that failed to parse.
    pub body: Option<MethodBody>,
}

/// A field declared on a [`TypeDef`].
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    pub declaring_type: TypeId,
    pub type_ref: TypeId,
}

/// The full parsed metadata graph of one module, plus its code streams.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub name: String,
    pub types: Vec<TypeDef>,
    pub methods: Vec<MethodDef>,
    pub fields: Vec<FieldDef>,
}

impl Module {
    pub fn type_ref(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    pub fn method_ref(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.index()]
    }

    pub fn field_ref(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    /// Walks `declaring_type` links to the outermost enclosing type.
    ///
    /// Used by the filter (spec.md §4.3): opt-out attributes and
    /// include/exclude globs are always evaluated against the
    /// *outermost* declaring type, so a nested type inherits its
    /// parent's exclusion regardless of its own attributes.
    pub fn outermost_declaring_type(&self, mut id: TypeId) -> TypeId {
        loop {
            match self.type_ref(id).declaring_type {
                Some(parent) => id = parent,
                None => return id,
            }
        }
    }

    /// Adds a new type to the module and returns its id.
    pub fn add_type(&mut self, type_def: TypeDef) -> TypeId {
        let id = TypeId::from(self.types.len());
        self.types.push(type_def);
        id
    }

    /// Adds a new method to the module, registers it on its declaring
    /// type, and returns its id.
    pub fn add_method(&mut self, method: MethodDef) -> MethodId {
        let declaring_type = method.declaring_type;
        let id = MethodId::from(self.methods.len());
        self.methods.push(method);
        self.type_mut(declaring_type).methods.push(id);
        id
    }

    /// Adds a new field to the module, registers it on its declaring
    /// type, and returns its id.
    pub fn add_field(&mut self, field: FieldDef) -> FieldId {
        let declaring_type = field.declaring_type;
        let id = FieldId::from(self.fields.len());
        self.fields.push(field);
        self.type_mut(declaring_type).fields.push(id);
        id
    }
}
