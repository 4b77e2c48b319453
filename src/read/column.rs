//! Per-column reading of one row group.
use crate::compression::Decompressors;
use crate::decode::{
    decode_data_page, decode_dictionary_page, DecodeOptions, DecodedPage,
};
use crate::error::Result;
use crate::metadata::{ColumnChunkMetaData, FileMetaData};
use crate::page::CompressedPage;
use crate::plan::GroupPlan;
use crate::prefetch::PrefetchCache;
use crate::source::ByteSource;
use crate::value::Value;

use super::decompress::{decompress_data_page, decompress_dict_page};
use super::page_reader::PageReader;

/// Lazy sequence of one chunk's decoded pages, each tagged with its absolute
/// starting row.
///
/// When the chunk opens with a dictionary page it is decoded first and
/// borrowed by every subsequent data page; it is dropped with the reader.
pub(crate) struct ChunkReader<'a> {
    pages: PageReader,
    chunk: &'a ColumnChunkMetaData,
    options: DecodeOptions<'a>,
    decompressors: &'a Decompressors,
    dictionary: Option<Vec<Value>>,
    start_row: u64,
    values_seen: u64,
}

impl<'a> ChunkReader<'a> {
    pub fn new(
        bytes: Vec<u8>,
        chunk: &'a ColumnChunkMetaData,
        group_start_row: u64,
        options: DecodeOptions<'a>,
        decompressors: &'a Decompressors,
    ) -> Self {
        Self {
            pages: PageReader::new(bytes, chunk.num_values),
            chunk,
            options,
            decompressors,
            dictionary: None,
            start_row: group_start_row,
            values_seen: 0,
        }
    }

    fn next_array(&mut self) -> Result<Option<(u64, DecodedPage)>> {
        loop {
            let page = match self.pages.next() {
                None => return Ok(None),
                Some(page) => page?,
            };
            match page {
                CompressedPage::Dict(dict) => {
                    let dict = decompress_dict_page(dict, self.chunk.codec, self.decompressors)?;
                    self.dictionary = Some(decode_dictionary_page(
                        &dict,
                        &self.chunk.descriptor,
                        self.options,
                    )?);
                }
                CompressedPage::Data(data) => {
                    let page = decompress_data_page(data, self.chunk.codec, self.decompressors)?;
                    let decoded = decode_data_page(
                        &page,
                        self.dictionary.as_deref(),
                        &self.chunk.descriptor,
                        self.options,
                    )?;
                    let row_start = self.start_row + self.values_seen;
                    self.values_seen += decoded.num_values as u64;
                    return Ok(Some((row_start, decoded)));
                }
            }
        }
    }
}

impl Iterator for ChunkReader<'_> {
    type Item = Result<(u64, DecodedPage)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_array().transpose()
    }
}

/// Reads and decodes every planned column of one row group.
///
/// Columns progress concurrently; within each column, pages are decoded in
/// order, so per-column row starts are non-decreasing.
pub(crate) async fn read_group_columns<'a, S: ByteSource>(
    cache: &PrefetchCache<S>,
    metadata: &FileMetaData,
    group: &GroupPlan,
    options: DecodeOptions<'a>,
    decompressors: &'a Decompressors,
) -> Result<Vec<Vec<(u64, DecodedPage)>>> {
    let row_group = &metadata.row_groups[group.group_index];
    let readers = group.columns.iter().map(|range| async move {
        let chunk = &row_group.columns[range.leaf_index];
        let bytes = cache.slice(range.start, range.end).await?;
        ChunkReader::new(bytes, chunk, group.start_row, options, decompressors)
            .collect::<Result<Vec<_>>>()
    });
    futures::future::try_join_all(readers).await
}
