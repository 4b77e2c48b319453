//! APIs to read from a parquet byte source.
//!
//! [`ParquetFile`] couples a [`ByteSource`] with parsed metadata and exposes
//! four entry points: [`read`](ParquetFile::read) assembles rows,
//! [`read_column`](ParquetFile::read_column) flattens one column,
//! [`read_dictionary`](ParquetFile::read_dictionary) and
//! [`read_dictionary_count`](ParquetFile::read_dictionary_count) inspect a
//! column's dictionary page without touching its data pages.
pub(crate) mod column;
mod decompress;
pub mod page_reader;

pub use page_reader::PageReader;

use parquet_format_safe::PageType;

use crate::assemble::{assemble_rows, ColumnLevels};
use crate::compression::Decompressors;
use crate::convert::Converters;
use crate::decode::{decode_dictionary_page, DecodeOptions, DecodedPage};
use crate::error::{Error, Result};
use crate::metadata::{read_metadata, FileMetaData};
use crate::page::CompressedDictPage;
use crate::plan::plan_read;
use crate::prefetch::PrefetchCache;
use crate::schema::{ColumnDescriptor, SchemaDescriptor};
use crate::source::ByteSource;
use crate::value::{Row, Value};

/// The shape of assembled rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// A positional tuple over the requested columns.
    Array,
    /// A keyed map over the schema's field names.
    Object,
}

impl Default for RowFormat {
    fn default() -> Self {
        RowFormat::Array
    }
}

/// One decoded page, as delivered through `on_chunk`.
#[derive(Debug, Clone)]
pub struct DataChunk {
    /// The column's dotted path.
    pub column: String,
    /// File-global row index of the page's first value.
    pub row_start: u64,
    pub row_end: u64,
    pub values: Vec<Value>,
}

/// The options of one read.
pub struct ReadRequest<'a> {
    /// Dotted column paths; a group name selects every leaf under it.
    /// `None` selects all columns.
    pub columns: Option<Vec<String>>,
    pub row_start: u64,
    /// Exclusive; defaults to and is clamped at the file's row count.
    pub row_end: Option<u64>,
    pub row_format: RowFormat,
    /// Surface dictionary indices instead of resolving them.
    pub raw_dictionary: bool,
    /// Decode STRING columns to UTF-8.
    pub utf8: bool,
    pub converters: Converters,
    pub decompressors: Decompressors,
    /// Called once per decoded page, in page order within each column; no
    /// order holds across columns. Panics unwind through the read.
    pub on_chunk: Option<Box<dyn FnMut(DataChunk) + Send + 'a>>,
}

impl Default for ReadRequest<'_> {
    fn default() -> Self {
        Self {
            columns: None,
            row_start: 0,
            row_end: None,
            row_format: RowFormat::default(),
            raw_dictionary: false,
            utf8: true,
            converters: Converters::default(),
            decompressors: Decompressors::default(),
            on_chunk: None,
        }
    }
}

impl<'a> ReadRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, T>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_row_range(mut self, start: u64, end: u64) -> Self {
        self.row_start = start;
        self.row_end = Some(end);
        self
    }

    pub fn with_row_format(mut self, row_format: RowFormat) -> Self {
        self.row_format = row_format;
        self
    }

    pub fn with_raw_dictionary(mut self, raw_dictionary: bool) -> Self {
        self.raw_dictionary = raw_dictionary;
        self
    }

    pub fn with_utf8(mut self, utf8: bool) -> Self {
        self.utf8 = utf8;
        self
    }

    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_decompressors(mut self, decompressors: Decompressors) -> Self {
        self.decompressors = decompressors;
        self
    }

    pub fn with_on_chunk(mut self, on_chunk: impl FnMut(DataChunk) + Send + 'a) -> Self {
        self.on_chunk = Some(Box::new(on_chunk));
        self
    }

    fn decode_options(&self) -> DecodeOptions<'_> {
        DecodeOptions {
            raw_dictionary: self.raw_dictionary,
            utf8: self.utf8,
            converters: &self.converters,
        }
    }
}

/// A parquet file: a byte source plus its parsed footer.
pub struct ParquetFile<S: ByteSource> {
    source: S,
    metadata: FileMetaData,
}

impl<S: ByteSource> ParquetFile<S> {
    /// Opens `source` by fetching and parsing its footer.
    pub async fn open(source: S) -> Result<Self> {
        let metadata = read_metadata(&source).await?;
        Ok(Self { source, metadata })
    }

    /// Couples `source` with metadata parsed elsewhere.
    pub fn with_metadata(source: S, metadata: FileMetaData) -> Self {
        Self { source, metadata }
    }

    pub fn metadata(&self) -> &FileMetaData {
        &self.metadata
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.metadata.schema
    }

    pub fn num_rows(&self) -> u64 {
        self.metadata.num_rows
    }

    /// Reads the requested rows.
    ///
    /// Planning prunes row groups disjoint from the row span; all fetches go
    /// through a coalescing prefetch cache. Per decoded page, `on_chunk` is
    /// invoked with the page's values; the assembled rows are returned once
    /// every selected column has been decoded. An error from any column
    /// cancels the read; values already delivered through `on_chunk` are not
    /// retracted, and no partial rows are returned.
    pub async fn read(&self, request: ReadRequest<'_>) -> Result<Vec<Row>> {
        let mut request = request;
        let plan = plan_read(
            &self.metadata,
            request.columns.as_deref(),
            request.row_start,
            request.row_end,
        )?;
        let cache = PrefetchCache::new(&self.source, &plan.byte_ranges());
        let leaves: Vec<&ColumnDescriptor> = plan
            .leaves
            .iter()
            .map(|&index| &self.metadata.schema.leaves()[index])
            .collect();

        let mut rows = Vec::new();
        for group in &plan.groups {
            let columns = column::read_group_columns(
                &cache,
                &self.metadata,
                group,
                request.decode_options(),
                &request.decompressors,
            )
            .await?;

            if let Some(on_chunk) = request.on_chunk.as_mut() {
                for (descriptor, pages) in leaves.iter().zip(&columns) {
                    for (row_start, page) in pages {
                        on_chunk(DataChunk {
                            column: descriptor.path_string(),
                            row_start: *row_start,
                            row_end: *row_start + page.num_values as u64,
                            values: page.values.clone(),
                        });
                    }
                }
            }

            let streams: Vec<ColumnLevels> = columns.into_iter().map(concatenate).collect();
            let assembled =
                assemble_rows(&leaves, streams, group.num_rows as usize, request.row_format)?;
            let from = plan.row_start.saturating_sub(group.start_row) as usize;
            let to = ((plan.row_end - group.start_row).min(group.num_rows)) as usize;
            rows.extend(assembled.into_iter().take(to).skip(from));
        }
        Ok(rows)
    }

    /// Reads one column, flattened across the matching row groups: one entry
    /// per value position within the requested rows, `Null` where the
    /// position is undefined.
    pub async fn read_column(&self, request: ReadRequest<'_>) -> Result<Vec<Value>> {
        let leaf = self.single_leaf(request.columns.as_deref())?;
        let columns = [leaf.path_string()];
        let plan = plan_read(
            &self.metadata,
            Some(&columns),
            request.row_start,
            request.row_end,
        )?;
        let cache = PrefetchCache::new(&self.source, &plan.byte_ranges());

        let mut values = Vec::new();
        for group in &plan.groups {
            let mut columns = column::read_group_columns(
                &cache,
                &self.metadata,
                group,
                request.decode_options(),
                &request.decompressors,
            )
            .await?;
            let pages = columns.remove(0);
            flatten_column(
                &mut values,
                leaf,
                pages,
                group.start_row,
                plan.row_start,
                plan.row_end,
            )?;
        }
        Ok(values)
    }

    /// Decodes the dictionary page of `column`'s first chunk that has one.
    ///
    /// A column without any dictionary page yields `Ok(None)`; an unknown
    /// column fails with [`Error::InvalidRequest`].
    pub async fn read_dictionary(&self, request: ReadRequest<'_>) -> Result<Option<Vec<Value>>> {
        let leaf = self.single_leaf(request.columns.as_deref())?;
        for group in &self.metadata.row_groups {
            let chunk = &group.columns[leaf.leaf_index];
            let offset = match chunk.dictionary_page_offset {
                Some(offset) => offset,
                None => continue,
            };
            // the dictionary page ends where the first data page starts
            let window = self.source.slice(offset, chunk.data_page_offset).await?;
            let mut cursor = std::io::Cursor::new(window.as_slice());
            let header = page_reader::read_page_header(&mut cursor, window.len())?;
            let num_values = dictionary_header(&header)?;
            let body_start = cursor.position() as usize;
            let body_length = usize::try_from(header.compressed_page_size)
                .map_err(|_| Error::CorruptPage("negative page size".to_string()))?;
            let body = window
                .get(body_start..body_start + body_length)
                .ok_or_else(|| {
                    Error::CorruptPage(
                        "the dictionary page body overlaps the data pages".to_string(),
                    )
                })?;
            let page = CompressedDictPage {
                buffer: body.to_vec(),
                num_values,
                uncompressed_size: usize::try_from(header.uncompressed_page_size)
                    .map_err(|_| Error::CorruptPage("negative page size".to_string()))?,
            };
            let page = decompress::decompress_dict_page(page, chunk.codec, &request.decompressors)?;
            let values = decode_dictionary_page(&page, leaf, request.decode_options())?;
            return Ok(Some(values));
        }
        Ok(None)
    }

    /// Returns the dictionary's value count by parsing only the page header.
    ///
    /// Reads a 256-byte window at the dictionary page offset and doubles it
    /// while the header does not fit, never crossing into the data pages.
    pub async fn read_dictionary_count(&self, request: ReadRequest<'_>) -> Result<Option<u64>> {
        let leaf = self.single_leaf(request.columns.as_deref())?;
        for group in &self.metadata.row_groups {
            let chunk = &group.columns[leaf.leaf_index];
            let offset = match chunk.dictionary_page_offset {
                Some(offset) => offset,
                None => continue,
            };
            let cap = chunk.data_page_offset;
            let mut window_size = 256u64;
            loop {
                let end = offset.saturating_add(window_size).min(cap);
                let window = self.source.slice(offset, end).await?;
                let mut cursor = std::io::Cursor::new(window.as_slice());
                match page_reader::read_page_header(&mut cursor, window.len()) {
                    Ok(header) => {
                        let num_values = dictionary_header(&header)?;
                        return Ok(Some(num_values as u64));
                    }
                    Err(error) => {
                        if end == cap {
                            return Err(error);
                        }
                        window_size *= 2;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Resolves the request's columns to exactly one leaf.
    fn single_leaf(&self, columns: Option<&[String]>) -> Result<&ColumnDescriptor> {
        let columns = columns.ok_or_else(|| {
            Error::InvalidRequest("exactly one column must be named".to_string())
        })?;
        let selected = self.metadata.schema.select(Some(columns))?;
        if selected.len() != 1 {
            return Err(Error::InvalidRequest(format!(
                "exactly one column must be named, the request resolves to {}",
                selected.len()
            )));
        }
        Ok(&self.metadata.schema.leaves()[selected[0]])
    }
}

/// Validates a header read at a dictionary page offset and returns the
/// dictionary's value count.
fn dictionary_header(header: &parquet_format_safe::PageHeader) -> Result<usize> {
    if header.type_ != PageType::DICTIONARY_PAGE {
        return Err(Error::CorruptPage(
            "the dictionary page offset does not hold a dictionary page".to_string(),
        ));
    }
    let dictionary = header.dictionary_page_header.as_ref().ok_or_else(|| {
        Error::CorruptPage("a dictionary page misses its dictionary header".to_string())
    })?;
    usize::try_from(dictionary.num_values).map_err(|_| {
        Error::CorruptPage("a dictionary page declares a negative value count".to_string())
    })
}

fn concatenate(pages: Vec<(u64, DecodedPage)>) -> ColumnLevels {
    let mut levels = ColumnLevels::default();
    for (_, page) in pages {
        levels.rep.extend(page.rep_levels);
        levels.def.extend(page.def_levels);
        levels.values.extend(page.values);
    }
    levels
}

/// Appends one chunk's positions that fall inside `[row_start, row_end)`.
fn flatten_column(
    out: &mut Vec<Value>,
    descriptor: &ColumnDescriptor,
    pages: Vec<(u64, DecodedPage)>,
    group_start: u64,
    row_start: u64,
    row_end: u64,
) -> Result<()> {
    let mut row = group_start;
    let mut first = true;
    for (_, page) in pages {
        let mut values = page.values.into_iter();
        for index in 0..page.num_values {
            let rep = if descriptor.max_rep_level == 0 {
                0
            } else {
                page.rep_levels[index]
            };
            let def = if descriptor.max_def_level == 0 {
                descriptor.max_def_level
            } else {
                page.def_levels[index]
            };
            if rep == 0 {
                if first {
                    first = false;
                } else {
                    row += 1;
                }
            }
            let value = if def == descriptor.max_def_level {
                values.next().ok_or_else(|| {
                    Error::oos("a column stream holds fewer values than its levels require")
                })?
            } else {
                Value::Null
            };
            if row >= row_start && row < row_end {
                out.push(value);
            }
        }
    }
    Ok(())
}
