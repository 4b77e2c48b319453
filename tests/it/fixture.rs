//! Builders of complete, in-memory parquet files.
use std::sync::Mutex;

use futures::future::BoxFuture;
use parquet_format_safe::thrift::protocol::TCompactOutputProtocol;
use parquet_format_safe::{
    ColumnChunk, ColumnMetaData, CompressionCodec, ConvertedType, DataPageHeader,
    DataPageHeaderV2, DictionaryPageHeader, Encoding, FieldRepetitionType, FileMetaData,
    PageHeader, PageType, RowGroup, SchemaElement, Type,
};

use parquet_fetch::error::Result;
use parquet_fetch::source::{ByteSource, MemorySource};

pub const MAGIC: &[u8] = b"PAR1";

// ---- schema elements ----

pub fn root_element(num_children: i32) -> SchemaElement {
    SchemaElement {
        type_: None,
        type_length: None,
        repetition_type: None,
        name: "schema".to_string(),
        num_children: Some(num_children),
        converted_type: None,
        scale: None,
        precision: None,
        field_id: None,
        logical_type: None,
    }
}

pub fn group_element(
    name: &str,
    repetition: FieldRepetitionType,
    num_children: i32,
) -> SchemaElement {
    SchemaElement {
        type_: None,
        type_length: None,
        repetition_type: Some(repetition),
        name: name.to_string(),
        num_children: Some(num_children),
        converted_type: None,
        scale: None,
        precision: None,
        field_id: None,
        logical_type: None,
    }
}

pub fn primitive_element(
    name: &str,
    type_: Type,
    repetition: FieldRepetitionType,
    converted_type: Option<ConvertedType>,
) -> SchemaElement {
    SchemaElement {
        type_: Some(type_),
        type_length: None,
        repetition_type: Some(repetition),
        name: name.to_string(),
        num_children: None,
        converted_type,
        scale: None,
        precision: None,
        field_id: None,
        logical_type: None,
    }
}

// ---- low-level stream writers ----

pub fn write_uleb(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn write_zigzag(value: i64, out: &mut Vec<u8>) {
    write_uleb(((value << 1) ^ (value >> 63)) as u64, out)
}

/// Packs `values` least-significant bit first at `num_bits` per value.
pub fn bitpack(values: &[u32], num_bits: usize) -> Vec<u8> {
    let mut out = vec![];
    let mut buffer = 0u64;
    let mut bits = 0usize;
    for value in values {
        buffer |= (*value as u64) << bits;
        bits += num_bits;
        while bits >= 8 {
            out.push((buffer & 0xff) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push((buffer & 0xff) as u8);
    }
    out
}

/// One bit-packed hybrid run holding `values`, padded to groups of 8.
pub fn hybrid_bitpacked(values: &[u32], num_bits: usize) -> Vec<u8> {
    let groups = (values.len() + 7) / 8;
    let mut padded = values.to_vec();
    padded.resize(groups * 8, 0);
    let mut out = vec![];
    write_uleb(((groups as u64) << 1) | 1, &mut out);
    out.extend_from_slice(&bitpack(&padded, num_bits));
    out
}

/// A v1 level stream: the hybrid runs behind a four-byte length.
pub fn v1_levels(runs: &[u8]) -> Vec<u8> {
    let mut out = (runs.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(runs);
    out
}

/// A single-block DELTA_BINARY_PACKED stream (128 values, 4 miniblocks).
pub fn delta_stream(values: &[i64]) -> Vec<u8> {
    const BLOCK_SIZE: usize = 128;
    const NUM_MINIBLOCKS: usize = 4;
    const PER_MINIBLOCK: usize = BLOCK_SIZE / NUM_MINIBLOCKS;
    assert!(values.len() <= BLOCK_SIZE + 1);

    let mut out = vec![];
    write_uleb(BLOCK_SIZE as u64, &mut out);
    write_uleb(NUM_MINIBLOCKS as u64, &mut out);
    write_uleb(values.len() as u64, &mut out);
    write_zigzag(*values.first().unwrap_or(&0), &mut out);
    if values.len() < 2 {
        return out;
    }
    let deltas: Vec<i64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let min_delta = *deltas.iter().min().unwrap();
    write_zigzag(min_delta, &mut out);
    let adjusted: Vec<u64> = deltas.iter().map(|delta| (delta - min_delta) as u64).collect();

    let mut widths = [0u8; NUM_MINIBLOCKS];
    for (index, miniblock) in adjusted.chunks(PER_MINIBLOCK).enumerate() {
        let max = miniblock.iter().copied().max().unwrap_or(0);
        widths[index] = (64 - max.leading_zeros()) as u8;
    }
    out.extend_from_slice(&widths);
    for (index, miniblock) in adjusted.chunks(PER_MINIBLOCK).enumerate() {
        let mut padded: Vec<u32> = miniblock.iter().map(|delta| *delta as u32).collect();
        padded.resize(PER_MINIBLOCK, 0);
        out.extend_from_slice(&bitpack(&padded, widths[index] as usize));
    }
    out
}

// ---- value bodies ----

pub fn plain_i64(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn plain_i32(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn plain_byte_arrays<T: AsRef<[u8]>>(values: &[T]) -> Vec<u8> {
    let mut out = vec![];
    for value in values {
        out.extend_from_slice(&(value.as_ref().len() as u32).to_le_bytes());
        out.extend_from_slice(value.as_ref());
    }
    out
}

// ---- pages ----

fn serialize_header(header: &PageHeader) -> Vec<u8> {
    let mut out = vec![];
    let mut protocol = TCompactOutputProtocol::new(&mut out);
    header.write_to_out_protocol(&mut protocol).unwrap();
    out
}

fn page(header: PageHeader, body: &[u8]) -> Vec<u8> {
    let mut out = serialize_header(&header);
    out.extend_from_slice(body);
    out
}

pub fn v1_data_page(num_values: i32, encoding: Encoding, body: &[u8]) -> Vec<u8> {
    v1_data_page_with_levels(num_values, encoding, Encoding::RLE, body)
}

pub fn v1_data_page_with_levels(
    num_values: i32,
    encoding: Encoding,
    level_encoding: Encoding,
    body: &[u8],
) -> Vec<u8> {
    page(
        PageHeader {
            type_: PageType::DATA_PAGE,
            uncompressed_page_size: body.len() as i32,
            compressed_page_size: body.len() as i32,
            crc: None,
            data_page_header: Some(DataPageHeader {
                num_values,
                encoding,
                definition_level_encoding: level_encoding,
                repetition_level_encoding: level_encoding,
                statistics: None,
            }),
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: None,
        },
        body,
    )
}

/// An uncompressed v2 data page; `body` starts with the raw level streams.
pub fn v2_data_page(
    num_values: i32,
    num_nulls: i32,
    num_rows: i32,
    encoding: Encoding,
    rep_levels_length: i32,
    def_levels_length: i32,
    body: &[u8],
) -> Vec<u8> {
    page(
        PageHeader {
            type_: PageType::DATA_PAGE_V2,
            uncompressed_page_size: body.len() as i32,
            compressed_page_size: body.len() as i32,
            crc: None,
            data_page_header: None,
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: Some(DataPageHeaderV2 {
                num_values,
                num_nulls,
                num_rows,
                encoding,
                definition_levels_byte_length: def_levels_length,
                repetition_levels_byte_length: rep_levels_length,
                is_compressed: Some(false),
                statistics: None,
            }),
        },
        body,
    )
}

pub fn dictionary_page(num_values: i32, body: &[u8]) -> Vec<u8> {
    page(
        PageHeader {
            type_: PageType::DICTIONARY_PAGE,
            uncompressed_page_size: body.len() as i32,
            compressed_page_size: body.len() as i32,
            crc: None,
            data_page_header: None,
            index_page_header: None,
            dictionary_page_header: Some(DictionaryPageHeader {
                num_values,
                encoding: Encoding::PLAIN,
                is_sorted: None,
            }),
            data_page_header_v2: None,
        },
        body,
    )
}

/// A compressed page pair, for codec tests: sizes declared separately.
pub fn v1_data_page_compressed(
    num_values: i32,
    encoding: Encoding,
    compressed_body: &[u8],
    uncompressed_size: i32,
) -> Vec<u8> {
    page(
        PageHeader {
            type_: PageType::DATA_PAGE,
            uncompressed_page_size: uncompressed_size,
            compressed_page_size: compressed_body.len() as i32,
            crc: None,
            data_page_header: Some(DataPageHeader {
                num_values,
                encoding,
                definition_level_encoding: Encoding::RLE,
                repetition_level_encoding: Encoding::RLE,
                statistics: None,
            }),
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: None,
        },
        compressed_body,
    )
}

// ---- whole files ----

/// One column chunk of one row group: serialized pages plus the metadata the
/// footer needs.
pub struct ChunkSpec {
    pub path: Vec<String>,
    pub type_: Type,
    pub encodings: Vec<Encoding>,
    pub codec: CompressionCodec,
    /// Serialized pages, the dictionary page first when present.
    pub pages: Vec<Vec<u8>>,
    pub has_dictionary: bool,
    pub num_values: i64,
}

impl ChunkSpec {
    pub fn new(path: &[&str], type_: Type, num_values: i64, pages: Vec<Vec<u8>>) -> Self {
        Self {
            path: path.iter().map(|part| part.to_string()).collect(),
            type_,
            encodings: vec![Encoding::PLAIN],
            codec: CompressionCodec::UNCOMPRESSED,
            pages,
            has_dictionary: false,
            num_values,
        }
    }

    pub fn with_dictionary(mut self) -> Self {
        self.has_dictionary = true;
        self.encodings = vec![Encoding::PLAIN, Encoding::RLE_DICTIONARY];
        self
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }
}

/// Lays out pages and footer into a complete file.
pub fn build_file(schema: Vec<SchemaElement>, groups: Vec<(i64, Vec<ChunkSpec>)>) -> Vec<u8> {
    let mut bytes = MAGIC.to_vec();
    let mut row_groups = vec![];
    let mut num_rows = 0i64;

    for (group_rows, chunks) in groups {
        num_rows += group_rows;
        let mut columns = vec![];
        let mut total_byte_size = 0i64;
        for chunk in chunks {
            let chunk_start = bytes.len() as i64;
            let mut dictionary_page_offset = None;
            let mut data_page_offset = None;
            for (index, page) in chunk.pages.iter().enumerate() {
                let offset = bytes.len() as i64;
                if index == 0 && chunk.has_dictionary {
                    dictionary_page_offset = Some(offset);
                } else if data_page_offset.is_none() {
                    data_page_offset = Some(offset);
                }
                bytes.extend_from_slice(page);
            }
            let total_compressed_size = bytes.len() as i64 - chunk_start;
            total_byte_size += total_compressed_size;
            columns.push(ColumnChunk {
                file_path: None,
                file_offset: chunk_start,
                meta_data: Some(ColumnMetaData {
                    type_: chunk.type_,
                    encodings: chunk.encodings,
                    path_in_schema: chunk.path,
                    codec: chunk.codec,
                    num_values: chunk.num_values,
                    total_uncompressed_size: total_compressed_size,
                    total_compressed_size,
                    key_value_metadata: None,
                    data_page_offset: data_page_offset.expect("a chunk holds a data page"),
                    index_page_offset: None,
                    dictionary_page_offset,
                    statistics: None,
                    encoding_stats: None,
                    bloom_filter_offset: None,
                }),
                offset_index_offset: None,
                offset_index_length: None,
                column_index_offset: None,
                column_index_length: None,
                crypto_metadata: None,
                encrypted_column_metadata: None,
            });
        }
        row_groups.push(RowGroup {
            columns,
            total_byte_size,
            num_rows: group_rows,
            sorting_columns: None,
            file_offset: None,
            total_compressed_size: None,
            ordinal: None,
        });
    }

    let metadata = FileMetaData {
        version: 2,
        schema,
        num_rows,
        row_groups,
        key_value_metadata: None,
        created_by: Some("parquet-fetch tests".to_string()),
        column_orders: None,
        encryption_algorithm: None,
        footer_signing_key_metadata: None,
    };
    let mut footer = vec![];
    let mut protocol = TCompactOutputProtocol::new(&mut footer);
    metadata.write_to_out_protocol(&mut protocol).unwrap();

    let footer_length = footer.len() as u32;
    bytes.extend_from_slice(&footer);
    bytes.extend_from_slice(&footer_length.to_le_bytes());
    bytes.extend_from_slice(MAGIC);
    bytes
}

// ---- the shared basic file ----

pub const BASIC_GROUP_ROWS: i64 = 100;
pub const NAMES: [&str; 3] = ["alpha", "beta", "gamma"];

/// Two row groups of 100 rows over three columns:
/// `a` (required int64, PLAIN), `name` (required utf8, dictionary-encoded),
/// `score` (optional int32 with nulls at every third row).
pub fn basic_file() -> Vec<u8> {
    let schema = vec![
        root_element(3),
        primitive_element("a", Type::INT64, FieldRepetitionType::REQUIRED, None),
        primitive_element(
            "name",
            Type::BYTE_ARRAY,
            FieldRepetitionType::REQUIRED,
            Some(ConvertedType::UTF8),
        ),
        primitive_element("score", Type::INT32, FieldRepetitionType::OPTIONAL, None),
    ];

    let groups = (0..2)
        .map(|group| {
            let base = group * BASIC_GROUP_ROWS;
            let rows: Vec<i64> = (base..base + BASIC_GROUP_ROWS).collect();

            let a_body = plain_i64(&rows);
            let a = ChunkSpec::new(
                &["a"],
                Type::INT64,
                BASIC_GROUP_ROWS,
                vec![v1_data_page(
                    BASIC_GROUP_ROWS as i32,
                    Encoding::PLAIN,
                    &a_body,
                )],
            );

            let dict_body = plain_byte_arrays(&NAMES);
            let indices: Vec<u32> = rows.iter().map(|row| (*row % 3) as u32).collect();
            let mut index_body = vec![2u8];
            index_body.extend_from_slice(&hybrid_bitpacked(&indices, 2));
            let name = ChunkSpec::new(
                &["name"],
                Type::BYTE_ARRAY,
                BASIC_GROUP_ROWS,
                vec![
                    dictionary_page(NAMES.len() as i32, &dict_body),
                    v1_data_page(
                        BASIC_GROUP_ROWS as i32,
                        Encoding::RLE_DICTIONARY,
                        &index_body,
                    ),
                ],
            )
            .with_dictionary();

            let defs: Vec<u32> = rows.iter().map(|row| (*row % 3 != 0) as u32).collect();
            let defined: Vec<i32> = rows
                .iter()
                .filter(|row| *row % 3 != 0)
                .map(|row| *row as i32)
                .collect();
            let mut score_body = v1_levels(&hybrid_bitpacked(&defs, 1));
            score_body.extend_from_slice(&plain_i32(&defined));
            let score = ChunkSpec::new(
                &["score"],
                Type::INT32,
                BASIC_GROUP_ROWS,
                vec![v1_data_page(
                    BASIC_GROUP_ROWS as i32,
                    Encoding::PLAIN,
                    &score_body,
                )],
            );

            (BASIC_GROUP_ROWS, vec![a, name, score])
        })
        .collect();

    build_file(schema, groups)
}

/// One row group over `id` (required int64) and the nested path `b.c.d`:
/// `b` optional group, `c` repeated group, `d` optional utf8, its data
/// dictionary-encoded in a v2 page.
///
/// Rows: 0: b.c = [{d:"Test"}, {d:null}]; 1: b = null; 2: b.c = [];
/// 3: b.c = [{d:"other"}].
pub fn nested_file() -> Vec<u8> {
    let schema = vec![
        root_element(2),
        primitive_element("id", Type::INT64, FieldRepetitionType::REQUIRED, None),
        group_element("b", FieldRepetitionType::OPTIONAL, 1),
        group_element("c", FieldRepetitionType::REPEATED, 1),
        primitive_element(
            "d",
            Type::BYTE_ARRAY,
            FieldRepetitionType::OPTIONAL,
            Some(ConvertedType::UTF8),
        ),
    ];

    let id_body = plain_i64(&[0, 1, 2, 3]);
    let id = ChunkSpec::new(
        &["id"],
        Type::INT64,
        4,
        vec![v1_data_page(4, Encoding::PLAIN, &id_body)],
    );

    // positions: (rep, def): (0,3) (1,2) (0,0) (0,1) (0,3)
    let rep_runs = hybrid_bitpacked(&[0, 1, 0, 0, 0], 1);
    let def_runs = hybrid_bitpacked(&[3, 2, 0, 1, 3], 2);
    let dict_body = plain_byte_arrays(&["Test", "other"]);
    let mut body = rep_runs.clone();
    body.extend_from_slice(&def_runs);
    body.push(1u8);
    body.extend_from_slice(&hybrid_bitpacked(&[0, 1], 1));
    let d = ChunkSpec::new(
        &["b", "c", "d"],
        Type::BYTE_ARRAY,
        5,
        vec![
            dictionary_page(2, &dict_body),
            v2_data_page(
                5,
                3,
                4,
                Encoding::RLE_DICTIONARY,
                rep_runs.len() as i32,
                def_runs.len() as i32,
                &body,
            ),
        ],
    )
    .with_dictionary();

    build_file(schema, vec![(4, vec![id, d])])
}

// ---- instrumented sources ----

/// Records every range fetched from the wrapped source.
pub struct RangeRecorder {
    inner: MemorySource,
    pub fetched: Mutex<Vec<(u64, u64)>>,
}

impl RangeRecorder {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemorySource::new(data),
            fetched: Mutex::new(vec![]),
        }
    }

    pub fn clear(&self) {
        self.fetched.lock().unwrap().clear();
    }

    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.fetched.lock().unwrap().clone()
    }
}

impl ByteSource for RangeRecorder {
    fn byte_length(&self) -> u64 {
        self.inner.byte_length()
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        self.fetched.lock().unwrap().push((start, end));
        self.inner.slice(start, end)
    }
}
