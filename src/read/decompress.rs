//! Decompresses pages as they come off the page reader.
use crate::compression::{decompress, Compression, Decompressors};
use crate::error::{Error, Result};
use crate::page::{
    CompressedDataPage, CompressedDictPage, DataPage, DataPageHeader, DictPage,
};

pub(crate) fn decompress_data_page(
    page: CompressedDataPage,
    codec: Compression,
    decompressors: &Decompressors,
) -> Result<DataPage> {
    let CompressedDataPage {
        header,
        buffer,
        uncompressed_size,
    } = page;
    let buffer = match &header {
        DataPageHeader::V1(_) => {
            if codec == Compression::Uncompressed {
                check_size(buffer, uncompressed_size)?
            } else {
                decompress(codec, &buffer, uncompressed_size, decompressors)?
            }
        }
        // v2 pages compress only the bytes after the level streams
        DataPageHeader::V2(v2) => {
            let rep_length = usize::try_from(v2.repetition_levels_byte_length)
                .map_err(|_| Error::oos("negative repetition level length"))?;
            let def_length = usize::try_from(v2.definition_levels_byte_length)
                .map_err(|_| Error::oos("negative definition level length"))?;
            let levels_length = rep_length + def_length;
            let compressed =
                v2.is_compressed.unwrap_or(true) && codec != Compression::Uncompressed;
            if !compressed {
                check_size(buffer, uncompressed_size)?
            } else {
                if levels_length > buffer.len() || levels_length > uncompressed_size {
                    return Err(Error::oos("v2 level streams exceed the page"));
                }
                let mut decompressed = Vec::with_capacity(uncompressed_size);
                decompressed.extend_from_slice(&buffer[..levels_length]);
                decompressed.extend(decompress(
                    codec,
                    &buffer[levels_length..],
                    uncompressed_size - levels_length,
                    decompressors,
                )?);
                decompressed
            }
        }
    };
    Ok(DataPage { header, buffer })
}

pub(crate) fn decompress_dict_page(
    page: CompressedDictPage,
    codec: Compression,
    decompressors: &Decompressors,
) -> Result<DictPage> {
    let buffer = if codec == Compression::Uncompressed {
        check_size(page.buffer, page.uncompressed_size)?
    } else {
        decompress(codec, &page.buffer, page.uncompressed_size, decompressors)?
    };
    Ok(DictPage {
        buffer,
        num_values: page.num_values,
    })
}

fn check_size(buffer: Vec<u8>, uncompressed_size: usize) -> Result<Vec<u8>> {
    if buffer.len() != uncompressed_size {
        return Err(Error::CorruptPage(format!(
            "an uncompressed page holds {} bytes, the header declares {}",
            buffer.len(),
            uncompressed_size
        )));
    }
    Ok(buffer)
}
