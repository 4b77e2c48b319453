//! Iterates the pages of one column chunk.
use std::io::Read;

use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::{PageHeader, PageType};

use crate::error::{Error, Result};
use crate::page::{
    CompressedDataPage, CompressedDictPage, CompressedPage, DataPageHeader,
};

/// Parses the compact-thrift page header at the reader's position, leaving
/// the reader at the first body byte.
pub(crate) fn read_page_header<R: Read>(reader: &mut R, max_size: usize) -> Result<PageHeader> {
    let mut protocol = TCompactInputProtocol::new(reader, max_size);
    PageHeader::read_from_in_protocol(&mut protocol)
        .map_err(|error| Error::CorruptPage(format!("could not parse a page header: {}", error)))
}

/// Iterator over the pages of a column chunk's byte window.
///
/// Iteration ends when the declared value count has been yielded or the
/// window is exhausted, whichever comes first. The chunk invariant that a
/// dictionary page, when present, is the first page is enforced here.
pub struct PageReader {
    chunk: std::io::Cursor<Vec<u8>>,
    total_values: u64,
    seen_values: u64,
    seen_data_page: bool,
    seen_dictionary: bool,
}

impl PageReader {
    /// `chunk` holds the chunk's bytes, from its first page header to the end
    /// of its last page; `total_values` is the chunk's declared value count.
    pub fn new(chunk: Vec<u8>, total_values: u64) -> Self {
        Self {
            chunk: std::io::Cursor::new(chunk),
            total_values,
            seen_values: 0,
            seen_data_page: false,
            seen_dictionary: false,
        }
    }

    fn next_page(&mut self) -> Result<Option<CompressedPage>> {
        loop {
            if self.seen_values >= self.total_values {
                return Ok(None);
            }
            let length = self.chunk.get_ref().len() as u64;
            if self.chunk.position() >= length {
                return Ok(None);
            }
            let header = read_page_header(&mut self.chunk, length as usize)?;
            if header.compressed_page_size < 0 || header.uncompressed_page_size < 0 {
                return Err(Error::CorruptPage(
                    "a page header declares a negative size".to_string(),
                ));
            }
            let body_length = header.compressed_page_size as u64;
            if self.chunk.position() + body_length > length {
                return Err(Error::CorruptPage(
                    "a page body extends beyond the column chunk".to_string(),
                ));
            }
            let mut buffer = vec![0u8; body_length as usize];
            self.chunk
                .read_exact(&mut buffer)
                .map_err(|_| Error::CorruptPage("a page body is truncated".to_string()))?;
            let uncompressed_size = header.uncompressed_page_size as usize;

            match header.type_ {
                PageType::DICTIONARY_PAGE => {
                    if self.seen_data_page || self.seen_dictionary {
                        return Err(Error::CorruptPage(
                            "a dictionary page may only appear once, before all data pages"
                                .to_string(),
                        ));
                    }
                    self.seen_dictionary = true;
                    let dictionary = header.dictionary_page_header.ok_or_else(|| {
                        Error::CorruptPage(
                            "a dictionary page misses its dictionary header".to_string(),
                        )
                    })?;
                    if dictionary.num_values < 0 {
                        return Err(Error::CorruptPage(
                            "a dictionary page declares a negative value count".to_string(),
                        ));
                    }
                    return Ok(Some(CompressedPage::Dict(CompressedDictPage {
                        buffer,
                        num_values: dictionary.num_values as usize,
                        uncompressed_size,
                    })));
                }
                PageType::DATA_PAGE => {
                    let data = header.data_page_header.ok_or_else(|| {
                        Error::CorruptPage("a v1 data page misses its data header".to_string())
                    })?;
                    if data.num_values < 0 {
                        return Err(Error::CorruptPage(
                            "a data page declares a negative value count".to_string(),
                        ));
                    }
                    self.seen_data_page = true;
                    self.seen_values += data.num_values as u64;
                    return Ok(Some(CompressedPage::Data(CompressedDataPage {
                        header: DataPageHeader::V1(data),
                        buffer,
                        uncompressed_size,
                    })));
                }
                PageType::DATA_PAGE_V2 => {
                    let data = header.data_page_header_v2.ok_or_else(|| {
                        Error::CorruptPage("a v2 data page misses its data header".to_string())
                    })?;
                    if data.num_values < 0 {
                        return Err(Error::CorruptPage(
                            "a data page declares a negative value count".to_string(),
                        ));
                    }
                    self.seen_data_page = true;
                    self.seen_values += data.num_values as u64;
                    return Ok(Some(CompressedPage::Data(CompressedDataPage {
                        header: DataPageHeader::V2(data),
                        buffer,
                        uncompressed_size,
                    })));
                }
                PageType::INDEX_PAGE => {
                    // not decoded; its body was already skipped over
                }
                other => {
                    return Err(Error::CorruptPage(format!(
                        "unknown page type {}",
                        other.0
                    )))
                }
            }
        }
    }
}

impl Iterator for PageReader {
    type Item = Result<CompressedPage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page().transpose()
    }
}
