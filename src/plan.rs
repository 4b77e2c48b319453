//! Translates a row/column request into per-row-group byte ranges.
use crate::error::{Error, Result};
use crate::metadata::FileMetaData;

/// The byte range of one column chunk participating in a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRange {
    /// Index of the leaf in the schema's flattened leaves.
    pub leaf_index: usize,
    pub start: u64,
    pub end: u64,
}

/// The part of a plan covering one row group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub group_index: usize,
    /// File-global row index of the group's first row.
    pub start_row: u64,
    pub num_rows: u64,
    /// One range per requested column, in request order.
    pub columns: Vec<ColumnRange>,
}

/// The byte ranges a request will touch, grouped by row group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub row_start: u64,
    pub row_end: u64,
    /// Selected leaves, in request order.
    pub leaves: Vec<usize>,
    pub groups: Vec<GroupPlan>,
}

impl ReadPlan {
    /// The union of byte ranges this plan reads, suitable for seeding a
    /// prefetch cache.
    pub fn byte_ranges(&self) -> Vec<(u64, u64)> {
        self.groups
            .iter()
            .flat_map(|group| group.columns.iter().map(|column| (column.start, column.end)))
            .collect()
    }
}

/// Enumerates the row groups and column chunks intersecting the request.
///
/// Row groups disjoint from `[row_start, row_end)` are omitted, as are all
/// columns not named in `columns`. `row_end` defaults to and is clamped at
/// the file's row count.
pub fn plan_read(
    metadata: &FileMetaData,
    columns: Option<&[String]>,
    row_start: u64,
    row_end: Option<u64>,
) -> Result<ReadPlan> {
    let leaves = metadata.schema.select(columns)?;
    let row_end = row_end.unwrap_or(metadata.num_rows).min(metadata.num_rows);
    if row_start > row_end {
        return Err(Error::InvalidRequest(format!(
            "row span starting at {} is beyond its end at {}",
            row_start, row_end
        )));
    }

    let mut groups = vec![];
    let mut next_row = 0u64;
    for (group_index, group) in metadata.row_groups.iter().enumerate() {
        let start_row = next_row;
        next_row += group.num_rows;
        if start_row >= row_end || next_row <= row_start {
            continue;
        }
        let columns = leaves
            .iter()
            .map(|&leaf_index| {
                let (start, length) = group.columns[leaf_index].byte_range();
                ColumnRange {
                    leaf_index,
                    start,
                    end: start + length,
                }
            })
            .collect();
        groups.push(GroupPlan {
            group_index,
            start_row,
            num_rows: group.num_rows,
            columns,
        });
    }
    log::debug!(
        "planned {} of {} row groups over {} columns",
        groups.len(),
        metadata.row_groups.len(),
        leaves.len()
    );
    Ok(ReadPlan {
        row_start,
        row_end,
        leaves,
        groups,
    })
}
