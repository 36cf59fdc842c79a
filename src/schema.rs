// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A minimal schema DSL compiler and the typed-view machinery the lens
//! pipeline uses to interpret a node through a named type.
//!
//! This is not a general IPLD Schema implementation. It compiles exactly
//! three representation shapes — `tuple`, `map`, and `listpairs` structs —
//! plus link (`&Type`), list (`[Type]`) and map (`{K:V}`) field shapes one
//! level deep. That is enough to back a resolver that needs to apply a
//! schema's *representation* to a raw node and later recover the node's
//! *representation form* again (the "substrate") without pretending to be
//! a full schema-kind compiler.

use crate::node::Node;
use crate::Error;
use indexmap::IndexMap;
use std::collections::HashMap;

/// One field of a compiled struct type: its name in the type-level (map)
/// form, and the shape its value must take.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

/// The shape a field's value is permitted to take. Nesting stops at one
/// level: a `List`/`Map` field may itself hold `Link`s or scalars, but not
/// a further nested `List`/`Map` — sufficient for the struct types this
/// compiler accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Any,
    Link(String),
    List(Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
}

/// How a struct's fields are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Fields appear as a list, in declaration order, values only.
    Tuple,
    /// Fields appear as a map, keyed by field name.
    Map,
    /// `{String:String} representation listpairs`: a list of `[key, value]`
    /// pairs rather than a map — only the degenerate string-keyed,
    /// string-valued case is accepted.
    ListPairs,
}

/// A compiled struct type: its name, declared fields (empty for
/// `listpairs`, which has no named fields), and wire representation.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<Field>,
    pub representation: Representation,
}

/// A compiled schema: every struct type it declares, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, StructType>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&StructType> {
        self.types.get(name)
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

/// Parses the reference schema DSL (see module docs for the shapes this
/// accepts) into a [`Schema`].
///
/// Grammar, one declaration per line, blank lines and `#`-comments
/// ignored:
///
/// ```text
/// struct Name { field1 Type1, field2 [Type2], field3 {String:String} } representation tuple
/// struct Name { field1 Type1 } representation map
/// struct Name {String:String} representation listpairs
/// ```
pub fn compile(dsl: &str) -> Result<Schema, Error> {
    let mut types = HashMap::new();
    for line in dsl.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ty = compile_struct_decl(line)?;
        types.insert(ty.name.clone(), ty);
    }
    Ok(Schema { types })
}

fn compile_struct_decl(line: &str) -> Result<StructType, Error> {
    let rest = line
        .strip_prefix("struct ")
        .ok_or_else(|| Error::SchemaMismatch {
            type_name: String::new(),
            node: String::new(),
            schema_dsl: format!("expected 'struct' declaration, got: {line:?}"),
        })?;

    let (name, rest) = rest
        .split_once(|c: char| c.is_whitespace())
        .ok_or_else(|| bad_decl(line))?;

    if let Some(fields_str) = rest.trim().strip_prefix("{String:String}") {
        let repr = parse_representation(fields_str.trim(), line)?;
        if repr != Representation::ListPairs {
            return Err(bad_decl(line));
        }
        return Ok(StructType {
            name: name.to_owned(),
            fields: Vec::new(),
            representation: Representation::ListPairs,
        });
    }

    let rest = rest.trim();
    let open = rest.find('{').ok_or_else(|| bad_decl(line))?;
    let close = rest.find('}').ok_or_else(|| bad_decl(line))?;
    let body = &rest[open + 1..close];
    let after = rest[close + 1..].trim();

    let representation = parse_representation(after, line)?;
    if representation == Representation::ListPairs {
        return Err(bad_decl(line));
    }

    let mut fields = Vec::new();
    for field_decl in body.split(',') {
        let field_decl = field_decl.trim();
        if field_decl.is_empty() {
            continue;
        }
        let (fname, fshape) = field_decl
            .split_once(|c: char| c.is_whitespace())
            .ok_or_else(|| bad_decl(line))?;
        fields.push(Field {
            name: fname.trim().to_owned(),
            shape: parse_shape(fshape.trim())?,
        });
    }

    Ok(StructType {
        name: name.to_owned(),
        fields,
        representation,
    })
}

fn parse_representation(after: &str, line: &str) -> Result<Representation, Error> {
    match after.strip_prefix("representation").map(str::trim) {
        Some("tuple") => Ok(Representation::Tuple),
        Some("map") => Ok(Representation::Map),
        Some("listpairs") => Ok(Representation::ListPairs),
        _ => Err(bad_decl(line)),
    }
}

fn parse_shape(text: &str) -> Result<Shape, Error> {
    if let Some(inner) = text.strip_prefix('&') {
        return Ok(Shape::Link(inner.to_owned()));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return Ok(Shape::List(Box::new(parse_shape(inner)?)));
    }
    if let Some(inner) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let (k, v) = inner
            .split_once(':')
            .ok_or_else(|| Error::SchemaMismatch {
                type_name: String::new(),
                node: String::new(),
                schema_dsl: format!("bad map shape: {text:?}"),
            })?;
        return Ok(Shape::Map(
            Box::new(parse_shape(k)?),
            Box::new(parse_shape(v)?),
        ));
    }
    Ok(match text {
        "Bool" => Shape::Bool,
        "Int" => Shape::Int,
        "Float" => Shape::Float,
        "String" => Shape::String,
        "Bytes" => Shape::Bytes,
        "Any" => Shape::Any,
        other => Shape::Link(other.to_owned()),
    })
}

fn bad_decl(line: &str) -> Error {
    Error::SchemaMismatch {
        type_name: String::new(),
        node: String::new(),
        schema_dsl: format!("malformed struct declaration: {line:?}"),
    }
}

/// The schema-typed view of a node: a reinterpretation that, unlike an
/// ADL's, is reversible purely from the schema definition, not from
/// additional stored state. `to_representation` recovers the node exactly
/// as it sits on the wire (the "substrate") regardless of which
/// representation the schema declares, so callers that only need the raw
/// shape (for example the patcher rebuilding a parent after a child
/// changed) never need to know the type was applied at all.
pub trait TypedView {
    fn type_name(&self) -> &str;
    fn to_representation(&self) -> &Node;
}

/// Applies `schema`'s `type_name` struct type to `node`, producing a typed
/// view in the declared representation, or `Error::SchemaMismatch` if the
/// node's shape doesn't fit.
pub fn apply(schema: &Schema, type_name: &str, node: Node) -> Result<StructView, Error> {
    let ty = schema
        .get(type_name)
        .ok_or_else(|| Error::SchemaMismatch {
            type_name: type_name.to_owned(),
            node: format!("{node:?}"),
            schema_dsl: "type not declared in schema".to_owned(),
        })?
        .clone();

    match ty.representation {
        Representation::Tuple => {
            let items = node.as_list().ok_or_else(|| mismatch(&ty, &node))?;
            if items.len() != ty.fields.len() {
                return Err(mismatch(&ty, &node));
            }
        }
        Representation::Map => {
            let map = node.as_map().ok_or_else(|| mismatch(&ty, &node))?;
            for field in &ty.fields {
                if !map.contains_key(&field.name) {
                    return Err(mismatch(&ty, &node));
                }
            }
        }
        Representation::ListPairs => {
            let items = node.as_list().ok_or_else(|| mismatch(&ty, &node))?;
            for pair in items {
                let pair = pair.as_list().ok_or_else(|| mismatch(&ty, &node))?;
                if pair.len() != 2 {
                    return Err(mismatch(&ty, &node));
                }
            }
        }
    }

    Ok(StructView {
        type_name: ty.name.clone(),
        ty,
        node,
    })
}

fn mismatch(ty: &StructType, node: &Node) -> Error {
    Error::SchemaMismatch {
        type_name: ty.name.clone(),
        node: format!("{node:?}"),
        schema_dsl: format!("{:?} representation {:?}", ty.fields, ty.representation),
    }
}

/// A node reinterpreted through a compiled [`StructType`].
#[derive(Debug, Clone)]
pub struct StructView {
    type_name: String,
    ty: StructType,
    node: Node,
}

impl StructView {
    /// Looks up a field by its type-level name, regardless of whether the
    /// node underneath is laid out as `tuple`, `map`, or `listpairs`.
    pub fn field(&self, name: &str) -> Option<&Node> {
        match self.ty.representation {
            Representation::Map => self.node.as_map()?.get(name),
            Representation::Tuple => {
                let idx = self.ty.fields.iter().position(|f| f.name == name)?;
                self.node.as_list()?.get(idx)
            }
            Representation::ListPairs => self.node.as_list()?.iter().find_map(|pair| {
                let pair = pair.as_list()?;
                if pair.first()?.as_str()? == name {
                    pair.get(1)
                } else {
                    None
                }
            }),
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        match self.ty.representation {
            Representation::ListPairs => self
                .node
                .as_list()
                .into_iter()
                .flatten()
                .filter_map(|pair| pair.as_list()?.first()?.as_str())
                .map(ToOwned::to_owned)
                .collect(),
            _ => self.ty.fields.iter().map(|f| f.name.clone()).collect(),
        }
    }

    /// Returns this view's underlying representation node with `name`'s
    /// value replaced by `value`, laid out the same way the original
    /// node was (tuple/map/listpairs) — the inverse of [`field`], used to
    /// round-trip a patch applied to a lensed view back to substrate form.
    pub fn with_field(&self, name: &str, value: Node) -> Result<Node, Error> {
        match self.ty.representation {
            Representation::Map => {
                let mut map = self.node.as_map().cloned().unwrap_or_default();
                map.insert(name.to_owned(), value);
                Ok(Node::Map(map))
            }
            Representation::Tuple => {
                let idx = self
                    .ty
                    .fields
                    .iter()
                    .position(|f| f.name == name)
                    .ok_or_else(|| mismatch(&self.ty, &self.node))?;
                let mut items = self.node.as_list().map(<[Node]>::to_vec).unwrap_or_default();
                if idx >= items.len() {
                    return Err(mismatch(&self.ty, &self.node));
                }
                items[idx] = value;
                Ok(Node::List(items))
            }
            Representation::ListPairs => {
                let mut items = self.node.as_list().map(<[Node]>::to_vec).unwrap_or_default();
                let existing = items.iter_mut().find(|pair| {
                    pair.as_list()
                        .and_then(|p| p.first())
                        .and_then(Node::as_str)
                        == Some(name)
                });
                match existing {
                    Some(Node::List(pair)) => {
                        if pair.len() != 2 {
                            return Err(mismatch(&self.ty, &self.node));
                        }
                        pair[1] = value;
                    }
                    _ => items.push(Node::List(vec![Node::from(name), value])),
                }
                Ok(Node::List(items))
            }
        }
    }

    /// Returns this view's representation node with `name`'s entry removed
    /// entirely, laid out the same way as [`with_field`](Self::with_field)
    /// but for deletion rather than assignment — the inverse a `remove`
    /// patch operation needs through a schema-lensed segment. A tuple's
    /// arity is fixed by the schema, so removing one of its fields has no
    /// representation to fall back to and is rejected.
    pub fn without_field(&self, name: &str) -> Result<Node, Error> {
        match self.ty.representation {
            Representation::Map => {
                let mut map = self.node.as_map().cloned().unwrap_or_default();
                map.shift_remove(name)
                    .ok_or_else(|| Error::MissingKey(name.to_owned()))?;
                Ok(Node::Map(map))
            }
            Representation::Tuple => Err(Error::InvalidPatchOp(format!(
                "cannot remove field {name:?} from a fixed-arity tuple representation"
            ))),
            Representation::ListPairs => {
                let mut items = self.node.as_list().map(<[Node]>::to_vec).unwrap_or_default();
                let idx = items
                    .iter()
                    .position(|pair| {
                        pair.as_list().and_then(|p| p.first()).and_then(Node::as_str)
                            == Some(name)
                    })
                    .ok_or_else(|| Error::MissingKey(name.to_owned()))?;
                items.remove(idx);
                Ok(Node::List(items))
            }
        }
    }

    /// Converts this view to a plain map node keyed by field name,
    /// regardless of underlying representation. Useful for callers that
    /// want a uniform walk target without caring about wire layout.
    pub fn to_map(&self) -> Node {
        let mut map = IndexMap::new();
        for name in self.field_names() {
            if let Some(value) = self.field(&name) {
                map.insert(name, value.clone());
            }
        }
        Node::Map(map)
    }
}

impl TypedView for StructView {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn to_representation(&self) -> &Node {
        &self.node
    }
}
