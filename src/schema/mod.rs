//! The parquet schema tree and the per-leaf [`ColumnDescriptor`]s derived
//! from it.
use parquet_format_safe::{
    ConvertedType, FieldRepetitionType, LogicalType as FormatLogicalType, SchemaElement,
    TimeUnit as FormatTimeUnit, Type as FormatType,
};

use crate::error::{Error, Result};

/// How often a field may appear in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

/// The physical type of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray(usize),
}

impl PhysicalType {
    /// The in-file width of a value of this type, when fixed.
    pub fn byte_width(&self) -> Option<usize> {
        Some(match self {
            PhysicalType::Boolean | PhysicalType::ByteArray => return None,
            PhysicalType::Int32 | PhysicalType::Float => 4,
            PhysicalType::Int64 | PhysicalType::Double => 8,
            PhysicalType::Int96 => 12,
            PhysicalType::FixedLenByteArray(size) => *size,
        })
    }
}

/// The logical (or legacy converted) type annotating a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    String,
    Enum,
    Decimal { precision: i32, scale: i32 },
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    TimestampNanos,
    Integer { bit_width: i8, is_signed: bool },
    Json,
    Bson,
    Uuid,
    Interval,
    Float16,
    Unknown,
}

/// The shape of a [`LogicalType`], used to key converter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKind {
    String,
    Enum,
    Decimal,
    Date,
    Time,
    Timestamp,
    Integer,
    Json,
    Bson,
    Uuid,
    Interval,
    Float16,
    Unknown,
}

impl LogicalType {
    pub fn kind(&self) -> LogicalKind {
        match self {
            LogicalType::String => LogicalKind::String,
            LogicalType::Enum => LogicalKind::Enum,
            LogicalType::Decimal { .. } => LogicalKind::Decimal,
            LogicalType::Date => LogicalKind::Date,
            LogicalType::TimeMillis | LogicalType::TimeMicros => LogicalKind::Time,
            LogicalType::TimestampMillis
            | LogicalType::TimestampMicros
            | LogicalType::TimestampNanos => LogicalKind::Timestamp,
            LogicalType::Integer { .. } => LogicalKind::Integer,
            LogicalType::Json => LogicalKind::Json,
            LogicalType::Bson => LogicalKind::Bson,
            LogicalType::Uuid => LogicalKind::Uuid,
            LogicalType::Interval => LogicalKind::Interval,
            LogicalType::Float16 => LogicalKind::Float16,
            LogicalType::Unknown => LogicalKind::Unknown,
        }
    }
}

/// The logical annotation of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLogicalType {
    List,
    Map,
}

/// A node of the schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Group(GroupNode),
    Primitive(PrimitiveNode),
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Group(group) => &group.name,
            SchemaNode::Primitive(primitive) => &primitive.name,
        }
    }

    pub fn repetition(&self) -> Repetition {
        match self {
            SchemaNode::Group(group) => group.repetition,
            SchemaNode::Primitive(primitive) => primitive.repetition,
        }
    }
}

/// An internal node carrying child fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub name: String,
    pub repetition: Repetition,
    pub logical_type: Option<GroupLogicalType>,
    pub children: Vec<SchemaNode>,
}

/// A leaf node carrying a physical type.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveNode {
    pub name: String,
    pub repetition: Repetition,
    pub physical_type: PhysicalType,
    pub logical_type: Option<LogicalType>,
}

/// One edge of the path from the root to a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEdge {
    pub name: String,
    pub repetition: Repetition,
    pub is_group: bool,
    /// Cumulative definition level at this edge.
    pub def_level: u32,
    /// Cumulative repetition level at this edge.
    pub rep_level: u32,
}

/// A leaf of the schema together with the levels derived from its path.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub primitive: PrimitiveNode,
    /// Path components below the root.
    pub path: Vec<String>,
    /// The edges of the path, root-most first; the last edge is the leaf.
    pub edges: Vec<PathEdge>,
    pub max_def_level: u32,
    pub max_rep_level: u32,
    /// Position of this leaf in the flattened schema, which by the format's
    /// invariant is also its column position within every row group.
    pub leaf_index: usize,
}

impl ColumnDescriptor {
    /// The dotted rendering of [`ColumnDescriptor::path`].
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

/// A schema tree together with its flattened leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    root: GroupNode,
    leaves: Vec<ColumnDescriptor>,
}

impl SchemaDescriptor {
    /// Builds a descriptor from an explicit tree, deriving levels per leaf.
    pub fn new(root: GroupNode) -> Self {
        let mut leaves = vec![];
        let mut edges = vec![];
        flatten(&root.children, &mut edges, 0, 0, &mut leaves);
        Self { root, leaves }
    }

    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    /// The top-level fields.
    pub fn fields(&self) -> &[SchemaNode] {
        &self.root.children
    }

    /// The flattened leaves, in file column order.
    pub fn leaves(&self) -> &[ColumnDescriptor] {
        &self.leaves
    }

    /// Resolves requested column names into leaf indices, in request order.
    ///
    /// A name selects the leaf whose dotted path equals it, or every leaf
    /// under it when it names a group. `None` selects all leaves.
    pub fn select(&self, columns: Option<&[String]>) -> Result<Vec<usize>> {
        let columns = match columns {
            None => return Ok((0..self.leaves.len()).collect()),
            Some(columns) => columns,
        };
        let mut selected = vec![];
        for name in columns {
            let mut found = false;
            for (index, leaf) in self.leaves.iter().enumerate() {
                let path = leaf.path_string();
                if path == *name || path.starts_with(&format!("{}.", name)) {
                    found = true;
                    if !selected.contains(&index) {
                        selected.push(index);
                    }
                }
            }
            if !found {
                return Err(Error::missing_column(name));
            }
        }
        Ok(selected)
    }

    /// Builds a descriptor from the footer's flattened `SchemaElement` list.
    pub(crate) fn try_from_thrift(elements: &[SchemaElement]) -> Result<Self> {
        if elements.is_empty() {
            return Err(Error::CorruptMetadata("empty schema".to_string()));
        }
        let mut index = 1;
        let num_children = elements[0].num_children.unwrap_or(0);
        if num_children < 0 {
            return Err(Error::CorruptMetadata(
                "negative child count in schema root".to_string(),
            ));
        }
        let mut children = Vec::with_capacity(num_children as usize);
        for _ in 0..num_children {
            children.push(node_from_thrift(elements, &mut index)?);
        }
        if index != elements.len() {
            return Err(Error::CorruptMetadata(format!(
                "schema declares {} elements but contains {}",
                index,
                elements.len()
            )));
        }
        Ok(Self::new(GroupNode {
            name: elements[0].name.clone(),
            repetition: Repetition::Required,
            logical_type: None,
            children,
        }))
    }
}

fn flatten(
    nodes: &[SchemaNode],
    edges: &mut Vec<PathEdge>,
    def_level: u32,
    rep_level: u32,
    leaves: &mut Vec<ColumnDescriptor>,
) {
    for node in nodes {
        let repetition = node.repetition();
        let def_level = match repetition {
            Repetition::Required => def_level,
            Repetition::Optional | Repetition::Repeated => def_level + 1,
        };
        let rep_level = match repetition {
            Repetition::Repeated => rep_level + 1,
            _ => rep_level,
        };
        edges.push(PathEdge {
            name: node.name().to_string(),
            repetition,
            is_group: matches!(node, SchemaNode::Group(_)),
            def_level,
            rep_level,
        });
        match node {
            SchemaNode::Group(group) => {
                flatten(&group.children, edges, def_level, rep_level, leaves)
            }
            SchemaNode::Primitive(primitive) => {
                let leaf_index = leaves.len();
                leaves.push(ColumnDescriptor {
                    primitive: primitive.clone(),
                    path: edges.iter().map(|edge| edge.name.clone()).collect(),
                    edges: edges.clone(),
                    max_def_level: def_level,
                    max_rep_level: rep_level,
                    leaf_index,
                });
            }
        }
        edges.pop();
    }
}

fn node_from_thrift(elements: &[SchemaElement], index: &mut usize) -> Result<SchemaNode> {
    let element = elements.get(*index).ok_or_else(|| {
        Error::CorruptMetadata("schema ends before all children are described".to_string())
    })?;
    *index += 1;

    let repetition = match element.repetition_type {
        Some(FieldRepetitionType::REQUIRED) | None => Repetition::Required,
        Some(FieldRepetitionType::OPTIONAL) => Repetition::Optional,
        Some(FieldRepetitionType::REPEATED) => Repetition::Repeated,
        Some(other) => {
            return Err(Error::CorruptMetadata(format!(
                "unknown repetition {}",
                other.0
            )))
        }
    };

    match element.num_children {
        Some(num_children) if num_children > 0 => {
            let logical_type = group_logical_from_thrift(element);
            let mut children = Vec::with_capacity(num_children as usize);
            for _ in 0..num_children {
                children.push(node_from_thrift(elements, index)?);
            }
            Ok(SchemaNode::Group(GroupNode {
                name: element.name.clone(),
                repetition,
                logical_type,
                children,
            }))
        }
        _ => {
            let physical_type = physical_from_thrift(element)?;
            let logical_type = logical_from_thrift(element)?;
            Ok(SchemaNode::Primitive(PrimitiveNode {
                name: element.name.clone(),
                repetition,
                physical_type,
                logical_type,
            }))
        }
    }
}

fn physical_from_thrift(element: &SchemaElement) -> Result<PhysicalType> {
    let type_ = element.type_.ok_or_else(|| {
        Error::CorruptMetadata(format!("field '{}' has neither children nor a type", element.name))
    })?;
    Ok(match type_ {
        FormatType::BOOLEAN => PhysicalType::Boolean,
        FormatType::INT32 => PhysicalType::Int32,
        FormatType::INT64 => PhysicalType::Int64,
        FormatType::INT96 => PhysicalType::Int96,
        FormatType::FLOAT => PhysicalType::Float,
        FormatType::DOUBLE => PhysicalType::Double,
        FormatType::BYTE_ARRAY => PhysicalType::ByteArray,
        FormatType::FIXED_LEN_BYTE_ARRAY => {
            let length = element.type_length.ok_or_else(|| {
                Error::CorruptMetadata(format!(
                    "fixed-length field '{}' misses its length",
                    element.name
                ))
            })?;
            if length < 0 {
                return Err(Error::CorruptMetadata(format!(
                    "fixed-length field '{}' has negative length",
                    element.name
                )));
            }
            PhysicalType::FixedLenByteArray(length as usize)
        }
        other => {
            return Err(Error::CorruptMetadata(format!(
                "unknown physical type {}",
                other.0
            )))
        }
    })
}

fn group_logical_from_thrift(element: &SchemaElement) -> Option<GroupLogicalType> {
    match element.logical_type {
        Some(FormatLogicalType::LIST(_)) => return Some(GroupLogicalType::List),
        Some(FormatLogicalType::MAP(_)) => return Some(GroupLogicalType::Map),
        _ => {}
    }
    match element.converted_type {
        Some(ConvertedType::LIST) => Some(GroupLogicalType::List),
        Some(ConvertedType::MAP) | Some(ConvertedType::MAP_KEY_VALUE) => {
            Some(GroupLogicalType::Map)
        }
        _ => None,
    }
}

fn logical_from_thrift(element: &SchemaElement) -> Result<Option<LogicalType>> {
    // the LogicalType annotation supersedes the legacy ConvertedType
    if let Some(logical) = &element.logical_type {
        let logical = match logical {
            FormatLogicalType::STRING(_) => LogicalType::String,
            FormatLogicalType::ENUM(_) => LogicalType::Enum,
            FormatLogicalType::DECIMAL(decimal) => LogicalType::Decimal {
                precision: decimal.precision,
                scale: decimal.scale,
            },
            FormatLogicalType::DATE(_) => LogicalType::Date,
            FormatLogicalType::TIME(time) => match time.unit {
                FormatTimeUnit::MILLIS(_) => LogicalType::TimeMillis,
                _ => LogicalType::TimeMicros,
            },
            FormatLogicalType::TIMESTAMP(timestamp) => match timestamp.unit {
                FormatTimeUnit::MILLIS(_) => LogicalType::TimestampMillis,
                FormatTimeUnit::MICROS(_) => LogicalType::TimestampMicros,
                FormatTimeUnit::NANOS(_) => LogicalType::TimestampNanos,
            },
            FormatLogicalType::INTEGER(integer) => LogicalType::Integer {
                bit_width: integer.bit_width,
                is_signed: integer.is_signed,
            },
            FormatLogicalType::JSON(_) => LogicalType::Json,
            FormatLogicalType::BSON(_) => LogicalType::Bson,
            FormatLogicalType::UUID(_) => LogicalType::Uuid,
            FormatLogicalType::UNKNOWN(_) => LogicalType::Unknown,
            _ => return Ok(None),
        };
        return Ok(Some(logical));
    }

    let converted = match element.converted_type {
        None => return Ok(None),
        Some(converted) => converted,
    };
    Ok(match converted {
        ConvertedType::UTF8 => Some(LogicalType::String),
        ConvertedType::ENUM => Some(LogicalType::Enum),
        ConvertedType::DECIMAL => Some(LogicalType::Decimal {
            precision: element.precision.unwrap_or(0),
            scale: element.scale.unwrap_or(0),
        }),
        ConvertedType::DATE => Some(LogicalType::Date),
        ConvertedType::TIME_MILLIS => Some(LogicalType::TimeMillis),
        ConvertedType::TIME_MICROS => Some(LogicalType::TimeMicros),
        ConvertedType::TIMESTAMP_MILLIS => Some(LogicalType::TimestampMillis),
        ConvertedType::TIMESTAMP_MICROS => Some(LogicalType::TimestampMicros),
        ConvertedType::JSON => Some(LogicalType::Json),
        ConvertedType::BSON => Some(LogicalType::Bson),
        ConvertedType::INTERVAL => Some(LogicalType::Interval),
        ConvertedType::INT_8 => Some(LogicalType::Integer {
            bit_width: 8,
            is_signed: true,
        }),
        ConvertedType::INT_16 => Some(LogicalType::Integer {
            bit_width: 16,
            is_signed: true,
        }),
        ConvertedType::INT_32 => Some(LogicalType::Integer {
            bit_width: 32,
            is_signed: true,
        }),
        ConvertedType::INT_64 => Some(LogicalType::Integer {
            bit_width: 64,
            is_signed: true,
        }),
        ConvertedType::UINT_8 => Some(LogicalType::Integer {
            bit_width: 8,
            is_signed: false,
        }),
        ConvertedType::UINT_16 => Some(LogicalType::Integer {
            bit_width: 16,
            is_signed: false,
        }),
        ConvertedType::UINT_32 => Some(LogicalType::Integer {
            bit_width: 32,
            is_signed: false,
        }),
        ConvertedType::UINT_64 => Some(LogicalType::Integer {
            bit_width: 64,
            is_signed: false,
        }),
        _ => None,
    })
}
