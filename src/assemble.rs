//! Reassembles nested records from per-column level and value streams.
//!
//! Shredding inverts the columnar encoding one leaf at a time: an explicit
//! loop over (repetition, definition) pairs maintains a stack of open lists,
//! one per repetition depth. A second pass merges the per-leaf results into
//! records by walking the shared path edges.
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::read::RowFormat;
use crate::schema::{ColumnDescriptor, PathEdge, Repetition};
use crate::value::{Row, Value};

/// The concatenated streams of one column over one row group.
#[derive(Debug, Default)]
pub(crate) struct ColumnLevels {
    pub rep: Vec<u32>,
    pub def: Vec<u32>,
    pub values: Vec<Value>,
}

/// One record's worth of a single leaf: lists materialized at repeated
/// edges, everything else reduced to the definition level reached.
#[derive(Debug, Clone)]
enum Shred {
    List(Vec<Shred>),
    Entry { def: u32, value: Option<Value> },
}

impl Shred {
    fn def(&self) -> u32 {
        match self {
            // a materialized list proves the path is defined to its depth
            Shred::List(_) => u32::MAX,
            Shred::Entry { def, .. } => *def,
        }
    }
}

/// Splits one leaf's streams into per-record [`Shred`]s.
fn shred_column(
    descriptor: &ColumnDescriptor,
    levels: ColumnLevels,
    num_rows: usize,
) -> Result<Vec<Shred>> {
    let max_rep = descriptor.max_rep_level;
    let max_def = descriptor.max_def_level;
    let num_positions = if max_def == 0 {
        levels.values.len()
    } else {
        levels.def.len()
    };
    let mut values = levels.values.into_iter();
    let mut records = Vec::with_capacity(num_rows);

    if max_rep == 0 {
        for index in 0..num_positions {
            let def = if max_def == 0 { 0 } else { levels.def[index] };
            let value = if def == max_def {
                Some(values.next().ok_or_else(short_column)?)
            } else {
                None
            };
            records.push(Shred::Entry { def, value });
        }
    } else {
        if levels.rep.len() != num_positions || levels.def.len() != num_positions {
            return Err(Error::oos(
                "repetition and definition streams differ in length",
            ));
        }
        // cumulative definition level of each repeated edge, by repetition depth
        let repeated_defs: Vec<u32> = descriptor
            .edges
            .iter()
            .filter(|edge| edge.repetition == Repetition::Repeated)
            .map(|edge| edge.def_level)
            .collect();

        // open lists, innermost last; the record's single top cell sits below them
        let mut stack: Vec<Vec<Shred>> = vec![];
        let mut record: Option<Shred> = None;
        let mut started = false;

        for index in 0..num_positions {
            let rep = levels.rep[index];
            let def = levels.def[index];
            if rep == 0 && started {
                finish_record(&mut stack, &mut record, &mut records)?;
            }
            let keep = if started && rep > 0 { rep as usize } else { 0 };
            close_lists(&mut stack, &mut record, keep)?;
            started = true;

            // the number of repeated edges this position's definition reaches
            let covered = repeated_defs
                .iter()
                .filter(|&&edge_def| edge_def <= def)
                .count();
            while stack.len() < covered {
                stack.push(vec![]);
            }
            let entry = Shred::Entry {
                def,
                value: if def == max_def {
                    Some(values.next().ok_or_else(short_column)?)
                } else {
                    None
                },
            };
            match stack.last_mut() {
                Some(open) => open.push(entry),
                None => place_record(&mut record, entry)?,
            }
        }
        if started {
            finish_record(&mut stack, &mut record, &mut records)?;
        }
    }

    if records.len() != num_rows {
        return Err(Error::oos(format!(
            "'{}' assembles into {} records, the row group holds {}",
            descriptor.path_string(),
            records.len(),
            num_rows
        )));
    }
    Ok(records)
}

fn short_column() -> Error {
    Error::oos("a column stream holds fewer values than its levels require")
}

fn place_record(record: &mut Option<Shred>, shred: Shred) -> Result<()> {
    if record.replace(shred).is_some() {
        return Err(Error::oos("a record assembles into two top-level cells"));
    }
    Ok(())
}

/// Closes open lists deeper than `keep`, folding each into its parent.
fn close_lists(
    stack: &mut Vec<Vec<Shred>>,
    record: &mut Option<Shred>,
    keep: usize,
) -> Result<()> {
    while stack.len() > keep {
        let closed = Shred::List(stack.pop().unwrap_or_default());
        match stack.last_mut() {
            Some(open) => open.push(closed),
            None => place_record(record, closed)?,
        }
    }
    Ok(())
}

fn finish_record(
    stack: &mut Vec<Vec<Shred>>,
    record: &mut Option<Shred>,
    records: &mut Vec<Shred>,
) -> Result<()> {
    close_lists(stack, record, 0)?;
    let shred = record
        .take()
        .ok_or_else(|| Error::oos("a record assembled into no cell"))?;
    records.push(shred);
    Ok(())
}

/// A leaf's position while merging: which edge is next and the shred part
/// below the edges already consumed.
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    edges: &'a [PathEdge],
    depth: usize,
    shred: &'a Shred,
}

impl<'a> Cursor<'a> {
    fn edge(&self) -> &'a PathEdge {
        &self.edges[self.depth]
    }
}

/// Merges the cursors of one group level into a keyed record.
fn merge_group(cursors: &[Cursor<'_>]) -> Result<Value> {
    let mut fields: IndexMap<&str, Vec<Cursor<'_>>> = IndexMap::new();
    for cursor in cursors {
        fields
            .entry(cursor.edge().name.as_str())
            .or_default()
            .push(*cursor);
    }
    let mut record = IndexMap::with_capacity(fields.len());
    for (name, cursors) in fields {
        record.insert(name.to_string(), merge_field(&cursors)?);
    }
    Ok(Value::Record(record))
}

/// Merges the cursors sharing one field edge into that field's value.
fn merge_field(cursors: &[Cursor<'_>]) -> Result<Value> {
    let edge = cursors[0].edge();
    match edge.repetition {
        Repetition::Repeated => merge_repeated(cursors, edge),
        Repetition::Optional => {
            let defined = cursors.iter().any(|cursor| cursor.shred.def() >= edge.def_level);
            if !defined {
                return Ok(Value::Null);
            }
            merge_present(cursors, edge)
        }
        Repetition::Required => merge_present(cursors, edge),
    }
}

/// Merges a defined, non-repeated edge: groups descend, leaves yield.
fn merge_present(cursors: &[Cursor<'_>], edge: &PathEdge) -> Result<Value> {
    if edge.is_group {
        let descended: Vec<Cursor<'_>> = cursors
            .iter()
            .map(|cursor| Cursor {
                edges: cursor.edges,
                depth: cursor.depth + 1,
                shred: cursor.shred,
            })
            .collect();
        merge_group(&descended)
    } else {
        leaf_value(cursors, edge)
    }
}

/// Merges a repeated edge into an ordered list, zipping the element lists
/// of every leaf below it.
fn merge_repeated(cursors: &[Cursor<'_>], edge: &PathEdge) -> Result<Value> {
    let length = cursors
        .iter()
        .map(|cursor| match cursor.shred {
            Shred::List(elements) => elements.len(),
            Shred::Entry { .. } => 0,
        })
        .max()
        .unwrap_or(0);
    if length == 0 {
        return Ok(Value::List(vec![]));
    }
    let mut elements = Vec::with_capacity(length);
    for index in 0..length {
        let element_cursors: Vec<Cursor<'_>> = cursors
            .iter()
            .filter_map(|cursor| match cursor.shred {
                Shred::List(list) => list.get(index).map(|shred| Cursor {
                    edges: cursor.edges,
                    depth: cursor.depth,
                    shred,
                }),
                Shred::Entry { .. } => None,
            })
            .collect();
        if element_cursors.is_empty() {
            return Err(Error::oos(
                "leaves under one repeated group disagree on its length",
            ));
        }
        if edge.is_group {
            let descended: Vec<Cursor<'_>> = element_cursors
                .iter()
                .map(|cursor| Cursor {
                    edges: cursor.edges,
                    depth: cursor.depth + 1,
                    shred: cursor.shred,
                })
                .collect();
            elements.push(merge_group(&descended)?);
        } else {
            elements.push(leaf_value(&element_cursors, edge)?);
        }
    }
    Ok(Value::List(elements))
}

fn leaf_value(cursors: &[Cursor<'_>], edge: &PathEdge) -> Result<Value> {
    if cursors.len() != 1 {
        return Err(Error::oos("two columns share one leaf path"));
    }
    match cursors[0].shred {
        Shred::Entry { def, value } => {
            if *def >= edge.def_level {
                match value {
                    Some(value) => Ok(value.clone()),
                    None => Err(Error::oos("a defined leaf position holds no value")),
                }
            } else {
                Ok(Value::Null)
            }
        }
        Shred::List(_) => Err(Error::oos("a leaf position assembled into a list")),
    }
}

/// The array row format: one cell per requested column, group edges
/// transparent, lists preserved.
fn tuple_cell(cursor: Cursor<'_>) -> Result<Value> {
    let edge = cursor.edge();
    match edge.repetition {
        Repetition::Optional if cursor.shred.def() < edge.def_level => Ok(Value::Null),
        Repetition::Repeated => match cursor.shred {
            Shred::List(elements) => {
                let mut list = Vec::with_capacity(elements.len());
                for shred in elements {
                    let element = Cursor {
                        edges: cursor.edges,
                        depth: cursor.depth,
                        shred,
                    };
                    if edge.is_group {
                        list.push(tuple_cell(Cursor {
                            depth: element.depth + 1,
                            ..element
                        })?);
                    } else {
                        list.push(leaf_value(&[element], edge)?);
                    }
                }
                Ok(Value::List(list))
            }
            Shred::Entry { .. } => Ok(Value::List(vec![])),
        },
        _ => {
            if edge.is_group {
                tuple_cell(Cursor {
                    depth: cursor.depth + 1,
                    ..cursor
                })
            } else {
                leaf_value(&[cursor], edge)
            }
        }
    }
}

/// Assembles the rows of one row group from its per-column streams.
pub(crate) fn assemble_rows(
    leaves: &[&ColumnDescriptor],
    columns: Vec<ColumnLevels>,
    num_rows: usize,
    row_format: RowFormat,
) -> Result<Vec<Row>> {
    debug_assert_eq!(leaves.len(), columns.len());
    let shredded: Vec<Vec<Shred>> = leaves
        .iter()
        .zip(columns)
        .map(|(descriptor, levels)| shred_column(descriptor, levels, num_rows))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(num_rows);
    for index in 0..num_rows {
        match row_format {
            RowFormat::Array => {
                let cells = leaves
                    .iter()
                    .zip(&shredded)
                    .map(|(descriptor, shreds)| {
                        tuple_cell(Cursor {
                            edges: &descriptor.edges,
                            depth: 0,
                            shred: &shreds[index],
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                rows.push(Row::Tuple(cells));
            }
            RowFormat::Object => {
                let cursors: Vec<Cursor<'_>> = leaves
                    .iter()
                    .zip(&shredded)
                    .map(|(descriptor, shreds)| Cursor {
                        edges: &descriptor.edges,
                        depth: 0,
                        shred: &shreds[index],
                    })
                    .collect();
                match merge_group(&cursors)? {
                    Value::Record(fields) => rows.push(Row::Object(fields)),
                    _ => return Err(Error::oos("a record assembled into a non-record")),
                }
            }
        }
    }
    Ok(rows)
}
