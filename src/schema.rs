//! Index schema.
//!
//! Declares the fields of an index, including object fields that group other
//! fields either flattened into the parent document or as nested documents.
//! Building a schema resolves every field to its absolute path and to its
//! nesting path hierarchy: the chain of nested objects enclosing it, from the
//! outermost to the innermost.
//!
//! ```
//! use nestor::schema::{FieldType, IndexSchema, ObjectStructure};
//!
//! let schema = IndexSchema::builder("books")
//!     .field("title", FieldType::text().analyzer("english"))
//!     .object("authors", ObjectStructure::Nested, |o| {
//!         o.field("name", FieldType::keyword())
//!             .object("awards", ObjectStructure::Nested, |o| o.field("year", FieldType::integer()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let year = schema.value_field("authors.awards.year").unwrap();
//! assert_eq!(year.nested_path_hierarchy(), ["authors", "authors.awards"]);
//! ```

pub mod field;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{NestorError, Result};
use crate::util::path;

pub use field::{FieldKind, FieldType, FieldValue, GeoPoint};

/// How an object field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStructure {
    /// Sub-fields are flattened into the parent document.
    #[default]
    Flattened,
    /// Each object is indexed as a separate, nested document.
    Nested,
}

/// A declared field, before path resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDefinition {
    Value {
        name: String,
        field_type: FieldType,
        #[serde(default)]
        multi_valued: bool,
    },
    Object {
        name: String,
        #[serde(default)]
        structure: ObjectStructure,
        #[serde(default)]
        multi_valued: bool,
        #[serde(default)]
        children: Vec<FieldDefinition>,
    },
}

impl FieldDefinition {
    fn name(&self) -> &str {
        match self {
            FieldDefinition::Value { name, .. } | FieldDefinition::Object { name, .. } => name,
        }
    }
}

/// A resolved value field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFieldDescriptor {
    absolute_path: String,
    relative_name: String,
    field_type: FieldType,
    multi_valued: bool,
    nested_path_hierarchy: Vec<String>,
}

impl ValueFieldDescriptor {
    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    pub fn relative_name(&self) -> &str {
        &self.relative_name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Nested objects enclosing this field, outermost first.
    pub fn nested_path_hierarchy(&self) -> &[String] {
        &self.nested_path_hierarchy
    }
}

/// A resolved object field.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFieldDescriptor {
    absolute_path: String,
    relative_name: String,
    structure: ObjectStructure,
    multi_valued: bool,
    nested_path_hierarchy: Vec<String>,
}

impl ObjectFieldDescriptor {
    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    pub fn relative_name(&self) -> &str {
        &self.relative_name
    }

    pub fn structure(&self) -> ObjectStructure {
        self.structure
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Nested objects enclosing this object, outermost first.
    ///
    /// For a nested object the last element is the object itself.
    pub fn nested_path_hierarchy(&self) -> &[String] {
        &self.nested_path_hierarchy
    }
}

/// A resolved field of either sort.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDescriptor {
    Value(ValueFieldDescriptor),
    Object(ObjectFieldDescriptor),
}

/// The schema of a single index.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    name: String,
    definitions: Vec<FieldDefinition>,
    fields: AHashMap<String, FieldDescriptor>,
}

impl IndexSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Build a schema from raw definitions, e.g. deserialized from JSON.
    pub fn from_definitions(
        name: impl Into<String>,
        definitions: Vec<FieldDefinition>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(NestorError::invalid_argument("Index name must not be empty"));
        }

        let mut fields = AHashMap::new();
        resolve(&definitions, None, &[], &mut fields)?;

        Ok(IndexSchema {
            name,
            definitions,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, absolute_path: &str) -> Option<&FieldDescriptor> {
        self.fields.get(absolute_path)
    }

    pub fn value_field(&self, absolute_path: &str) -> Option<&ValueFieldDescriptor> {
        match self.fields.get(absolute_path) {
            Some(FieldDescriptor::Value(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    pub fn object_field(&self, absolute_path: &str) -> Option<&ObjectFieldDescriptor> {
        match self.fields.get(absolute_path) {
            Some(FieldDescriptor::Object(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    /// Absolute paths of all fields, sorted.
    pub fn field_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Elasticsearch mapping of this index (`{"properties": {...}}`).
    pub fn to_mapping(&self) -> Value {
        json!({ "properties": properties_mapping(&self.definitions) })
    }
}

fn resolve(
    definitions: &[FieldDefinition],
    parent: Option<&str>,
    parent_hierarchy: &[String],
    fields: &mut AHashMap<String, FieldDescriptor>,
) -> Result<()> {
    for definition in definitions {
        let name = definition.name();
        if name.is_empty() || name.contains('.') {
            return Err(NestorError::invalid_argument(format!(
                "Invalid field name '{name}': names must be non-empty and must not contain '.'"
            )));
        }

        let absolute_path = path::join(parent, name);
        if fields.contains_key(&absolute_path) {
            return Err(NestorError::invalid_argument(format!(
                "Field '{absolute_path}' is declared more than once"
            )));
        }

        match definition {
            FieldDefinition::Value {
                field_type,
                multi_valued,
                ..
            } => {
                field_type.validate(&absolute_path)?;
                fields.insert(
                    absolute_path.clone(),
                    FieldDescriptor::Value(ValueFieldDescriptor {
                        absolute_path,
                        relative_name: name.to_string(),
                        field_type: field_type.clone(),
                        multi_valued: *multi_valued,
                        nested_path_hierarchy: parent_hierarchy.to_vec(),
                    }),
                );
            }
            FieldDefinition::Object {
                structure,
                multi_valued,
                children,
                ..
            } => {
                let mut hierarchy = parent_hierarchy.to_vec();
                if *structure == ObjectStructure::Nested {
                    hierarchy.push(absolute_path.clone());
                }

                fields.insert(
                    absolute_path.clone(),
                    FieldDescriptor::Object(ObjectFieldDescriptor {
                        absolute_path: absolute_path.clone(),
                        relative_name: name.to_string(),
                        structure: *structure,
                        multi_valued: *multi_valued,
                        nested_path_hierarchy: hierarchy.clone(),
                    }),
                );

                resolve(children, Some(&absolute_path), &hierarchy, fields)?;
            }
        }
    }
    Ok(())
}

fn properties_mapping(definitions: &[FieldDefinition]) -> Value {
    let mut properties = Map::new();
    for definition in definitions {
        let mapping = match definition {
            FieldDefinition::Value { field_type, .. } => field_type.to_mapping(),
            FieldDefinition::Object {
                structure,
                children,
                ..
            } => {
                let type_name = match structure {
                    ObjectStructure::Flattened => "object",
                    ObjectStructure::Nested => "nested",
                };
                json!({
                    "type": type_name,
                    "dynamic": "strict",
                    "properties": properties_mapping(children),
                })
            }
        };
        properties.insert(definition.name().to_string(), mapping);
    }
    Value::Object(properties)
}

/// Builder for the fields of an object (or of the index root).
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    children: Vec<FieldDefinition>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.children.push(FieldDefinition::Value {
            name: name.into(),
            field_type,
            multi_valued: false,
        });
        self
    }

    pub fn multi_valued_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.children.push(FieldDefinition::Value {
            name: name.into(),
            field_type,
            multi_valued: true,
        });
        self
    }

    /// Add an object field whose sub-fields are declared by `build`.
    pub fn object<F>(mut self, name: impl Into<String>, structure: ObjectStructure, build: F) -> Self
    where
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        let children = build(ObjectBuilder::new()).children;
        self.children.push(FieldDefinition::Object {
            name: name.into(),
            structure,
            multi_valued: true,
            children,
        });
        self
    }
}

/// Builder for [`IndexSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    root: ObjectBuilder,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            name: name.into(),
            root: ObjectBuilder::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.root = self.root.field(name, field_type);
        self
    }

    pub fn multi_valued_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.root = self.root.multi_valued_field(name, field_type);
        self
    }

    pub fn object<F>(mut self, name: impl Into<String>, structure: ObjectStructure, build: F) -> Self
    where
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        self.root = self.root.object(name, structure, build);
        self
    }

    pub fn build(self) -> Result<IndexSchema> {
        IndexSchema::from_definitions(self.name, self.root.children)
    }
}
