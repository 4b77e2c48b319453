//! Typed model of the file footer and the reader that fetches it.
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::{
    ColumnChunk, FileMetaData as FormatFileMetaData, RowGroup, Statistics as FormatStatistics,
};

use crate::compression::Compression;
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::schema::{ColumnDescriptor, SchemaDescriptor};
use crate::source::ByteSource;

pub(crate) const PARQUET_MAGIC: [u8; 4] = *b"PAR1";
const HEADER_SIZE: u64 = PARQUET_MAGIC.len() as u64;
const FOOTER_SIZE: u64 = 8;
/// First guess for the footer fetch; footers larger than this trigger one
/// further read.
const DEFAULT_FOOTER_READ_SIZE: u64 = 512 * 1024;

/// Raw statistics of one column chunk, as stored in the footer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
    pub min_value: Option<Vec<u8>>,
    pub max_value: Option<Vec<u8>>,
}

impl From<&FormatStatistics> for Statistics {
    fn from(statistics: &FormatStatistics) -> Self {
        Self {
            null_count: statistics.null_count,
            distinct_count: statistics.distinct_count,
            min_value: statistics
                .min_value
                .clone()
                .or_else(|| statistics.min.clone()),
            max_value: statistics
                .max_value
                .clone()
                .or_else(|| statistics.max.clone()),
        }
    }
}

/// Metadata of one column chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMetaData {
    pub descriptor: ColumnDescriptor,
    pub codec: Compression,
    pub encodings: Vec<Encoding>,
    pub num_values: u64,
    pub total_uncompressed_size: u64,
    pub total_compressed_size: u64,
    pub data_page_offset: u64,
    pub index_page_offset: Option<u64>,
    pub dictionary_page_offset: Option<u64>,
    pub statistics: Option<Statistics>,
}

impl ColumnChunkMetaData {
    /// The `(start, length)` of this chunk's bytes in the file. The start is
    /// the dictionary page offset when a dictionary page exists.
    pub fn byte_range(&self) -> (u64, u64) {
        let start = match self.dictionary_page_offset {
            Some(dictionary_page_offset) => dictionary_page_offset.min(self.data_page_offset),
            None => self.data_page_offset,
        };
        (start, self.total_compressed_size)
    }

    fn try_from_thrift(descriptor: &ColumnDescriptor, column: &ColumnChunk) -> Result<Self> {
        let meta = column.meta_data.as_ref().ok_or_else(|| {
            Error::CorruptMetadata(format!(
                "column chunk '{}' misses its metadata",
                descriptor.path_string()
            ))
        })?;
        if meta.path_in_schema != descriptor.path {
            return Err(Error::CorruptMetadata(format!(
                "column chunk path {:?} does not match the schema leaf '{}'",
                meta.path_in_schema,
                descriptor.path_string()
            )));
        }
        let codec = Compression::try_from(meta.codec)?;
        let encodings = meta
            .encodings
            .iter()
            .map(|encoding| {
                Encoding::try_from(*encoding)
                    .map_err(|_| Error::CorruptMetadata(format!("unknown encoding {}", encoding.0)))
            })
            .collect::<Result<Vec<_>>>()?;
        let num_values = to_u64(meta.num_values, "column chunk value count")?;
        let data_page_offset = to_u64(meta.data_page_offset, "data page offset")?;
        let dictionary_page_offset = meta
            .dictionary_page_offset
            .map(|offset| to_u64(offset, "dictionary page offset"))
            .transpose()?;
        if let Some(dictionary_page_offset) = dictionary_page_offset {
            if dictionary_page_offset >= data_page_offset {
                return Err(Error::CorruptMetadata(format!(
                    "dictionary page of '{}' does not precede its data pages",
                    descriptor.path_string()
                )));
            }
        }
        Ok(Self {
            descriptor: descriptor.clone(),
            codec,
            encodings,
            num_values,
            total_uncompressed_size: to_u64(meta.total_uncompressed_size, "uncompressed size")?,
            total_compressed_size: to_u64(meta.total_compressed_size, "compressed size")?,
            data_page_offset,
            index_page_offset: meta
                .index_page_offset
                .map(|offset| to_u64(offset, "index page offset"))
                .transpose()?,
            dictionary_page_offset,
            statistics: meta.statistics.as_ref().map(Statistics::from),
        })
    }
}

/// Metadata of one row group.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupMetaData {
    pub columns: Vec<ColumnChunkMetaData>,
    pub num_rows: u64,
    pub total_byte_size: u64,
}

impl RowGroupMetaData {
    fn try_from_thrift(schema: &SchemaDescriptor, group: &RowGroup) -> Result<Self> {
        if group.columns.len() != schema.leaves().len() {
            return Err(Error::CorruptMetadata(format!(
                "row group holds {} column chunks but the schema has {} leaves",
                group.columns.len(),
                schema.leaves().len()
            )));
        }
        let columns = schema
            .leaves()
            .iter()
            .zip(group.columns.iter())
            .map(|(descriptor, column)| ColumnChunkMetaData::try_from_thrift(descriptor, column))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            num_rows: to_u64(group.num_rows, "row group row count")?,
            total_byte_size: to_u64(group.total_byte_size, "row group byte size")?,
        })
    }
}

/// Metadata of a file: schema and row groups.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaData {
    pub version: i32,
    pub num_rows: u64,
    pub created_by: Option<String>,
    pub schema: SchemaDescriptor,
    pub row_groups: Vec<RowGroupMetaData>,
}

impl FileMetaData {
    pub(crate) fn try_from_thrift(metadata: FormatFileMetaData) -> Result<Self> {
        let schema = SchemaDescriptor::try_from_thrift(&metadata.schema)?;
        let row_groups = metadata
            .row_groups
            .iter()
            .map(|group| RowGroupMetaData::try_from_thrift(&schema, group))
            .collect::<Result<Vec<_>>>()?;
        let num_rows = to_u64(metadata.num_rows, "file row count")?;
        let counted = row_groups.iter().map(|group| group.num_rows).sum::<u64>();
        if counted != num_rows {
            return Err(Error::CorruptMetadata(format!(
                "row groups hold {} rows but the footer declares {}",
                counted, num_rows
            )));
        }
        Ok(Self {
            version: metadata.version,
            num_rows,
            created_by: metadata.created_by,
            schema,
            row_groups,
        })
    }
}

fn to_u64(value: i64, what: &str) -> Result<u64> {
    value
        .try_into()
        .map_err(|_| Error::CorruptMetadata(format!("negative {}", what)))
}

/// Parses a footer's thrift bytes into [`FileMetaData`].
pub fn deserialize_metadata(footer: &[u8]) -> Result<FileMetaData> {
    let mut protocol = TCompactInputProtocol::new(footer, footer.len() * 32 + 1024);
    let metadata = FormatFileMetaData::read_from_in_protocol(&mut protocol)
        .map_err(|error| Error::CorruptMetadata(format!("could not parse the footer: {}", error)))?;
    FileMetaData::try_from_thrift(metadata)
}

/// Reads the footer of `source`.
///
/// This fetches the trailing [`DEFAULT_FOOTER_READ_SIZE`] bytes and issues
/// one further read when the footer turns out to be larger.
pub async fn read_metadata<S: ByteSource + ?Sized>(source: &S) -> Result<FileMetaData> {
    let length = source.byte_length();
    if length < HEADER_SIZE + FOOTER_SIZE {
        return Err(Error::CorruptMetadata(format!(
            "a file of {} bytes cannot hold a footer",
            length
        )));
    }
    let read = DEFAULT_FOOTER_READ_SIZE.min(length);
    let tail = source.slice(length - read, length).await?;

    if tail[tail.len() - 4..] != PARQUET_MAGIC {
        return Err(Error::CorruptMetadata(
            "the file does not end with the magic bytes".to_string(),
        ));
    }
    let footer_length =
        u32::from_le_bytes(tail[tail.len() - 8..tail.len() - 4].try_into().unwrap()) as u64;
    if footer_length + FOOTER_SIZE + HEADER_SIZE > length {
        return Err(Error::CorruptMetadata(format!(
            "the footer length {} exceeds the file",
            footer_length
        )));
    }
    if footer_length + FOOTER_SIZE <= tail.len() as u64 {
        let start = tail.len() - (footer_length + FOOTER_SIZE) as usize;
        deserialize_metadata(&tail[start..tail.len() - FOOTER_SIZE as usize])
    } else {
        let footer = source
            .slice(length - FOOTER_SIZE - footer_length, length - FOOTER_SIZE)
            .await?;
        deserialize_metadata(&footer)
    }
}
