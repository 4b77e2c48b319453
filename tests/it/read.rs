use futures::executor::block_on;
use parquet_format_safe::{Encoding, FieldRepetitionType, Type};

use parquet_fetch::source::MemorySource;
use parquet_fetch::value::{Row, Value};
use parquet_fetch::{ParquetFile, ReadRequest, RowFormat};

use super::fixture::*;

fn open(data: Vec<u8>) -> ParquetFile<MemorySource> {
    block_on(ParquetFile::open(MemorySource::new(data))).unwrap()
}

#[test]
fn row_conservation() {
    let file = open(basic_file());
    let rows = block_on(file.read(ReadRequest::new())).unwrap();
    assert_eq!(rows.len() as u64, file.num_rows());
    assert!(rows
        .iter()
        .all(|row| matches!(row, Row::Tuple(cells) if cells.len() == 3)));
}

#[test]
fn cells_hold_the_written_values() {
    let file = open(basic_file());
    let rows = block_on(file.read(ReadRequest::new())).unwrap();

    assert_eq!(
        rows[7],
        Row::Tuple(vec![
            Value::Int64(7),
            Value::Utf8("beta".to_string()),
            Value::Int32(7),
        ])
    );
    // every third row's score is null
    assert_eq!(
        rows[99],
        Row::Tuple(vec![
            Value::Int64(99),
            Value::Utf8("alpha".to_string()),
            Value::Null,
        ])
    );
    // the second row group continues the sequence
    assert_eq!(rows[150].get(0), Some(&Value::Int64(150)));
}

#[test]
fn partial_row_range() {
    let recorder = RangeRecorder::new(basic_file());
    let file = block_on(ParquetFile::open(&recorder)).unwrap();
    recorder.clear();

    let rows = block_on(
        file.read(
            ReadRequest::new()
                .with_columns(["a"])
                .with_row_range(120, 150),
        ),
    )
    .unwrap();
    assert_eq!(rows.len(), 30);
    assert_eq!(rows[0], Row::Tuple(vec![Value::Int64(120)]));
    assert_eq!(rows[29], Row::Tuple(vec![Value::Int64(149)]));

    // no bytes of the first row group were fetched
    let first_group = &file.metadata().row_groups[0];
    for chunk in &first_group.columns {
        let (start, length) = chunk.byte_range();
        let end = start + length;
        for (fetched_start, fetched_end) in recorder.ranges() {
            assert!(
                fetched_end <= start || fetched_start >= end,
                "fetched [{}, {}) overlaps the pruned chunk [{}, {})",
                fetched_start,
                fetched_end,
                start,
                end
            );
        }
    }
}

#[test]
fn row_range_spanning_both_groups() {
    let file = open(basic_file());
    let rows = block_on(
        file.read(
            ReadRequest::new()
                .with_columns(["a"])
                .with_row_range(95, 105),
        ),
    )
    .unwrap();
    let values: Vec<i64> = rows
        .iter()
        .map(|row| row.get(0).and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(values, (95..105).collect::<Vec<_>>());
}

#[test]
fn object_rows_over_nested_groups() {
    let file = open(nested_file());
    let rows = block_on(
        file.read(
            ReadRequest::new()
                .with_columns(["id", "b.c"])
                .with_row_format(RowFormat::Object),
        ),
    )
    .unwrap();
    assert_eq!(rows.len(), 4);

    let lists: Vec<Value> = rows
        .iter()
        .map(|row| match row.field("b") {
            Some(Value::Record(b)) => b.get("c").unwrap().clone(),
            Some(Value::Null) => Value::Null,
            other => panic!("unexpected b: {:?}", other),
        })
        .collect();

    let first = lists[0].as_list().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        first[0],
        Value::Record(
            [("d".to_string(), Value::Utf8("Test".to_string()))]
                .into_iter()
                .collect()
        )
    );
    assert_eq!(
        first[1],
        Value::Record([("d".to_string(), Value::Null)].into_iter().collect())
    );

    assert_eq!(lists[1], Value::Null);
    assert_eq!(lists[2].as_list().unwrap().len(), 0);
    assert_eq!(lists[3].as_list().unwrap().len(), 1);

    assert_eq!(rows[3].field("id"), Some(&Value::Int64(3)));
}

#[test]
fn array_rows_keep_request_order() {
    let file = open(basic_file());
    let rows = block_on(
        file.read(
            ReadRequest::new()
                .with_columns(["score", "a"])
                .with_row_range(1, 2),
        ),
    )
    .unwrap();
    assert_eq!(
        rows,
        vec![Row::Tuple(vec![Value::Int32(1), Value::Int64(1)])]
    );
}

fn single_i64_file(pages: Vec<Vec<u8>>, encodings: Vec<Encoding>, num_values: i64) -> Vec<u8> {
    let schema = vec![
        root_element(1),
        primitive_element("v", Type::INT64, FieldRepetitionType::REQUIRED, None),
    ];
    let mut chunk = ChunkSpec::new(&["v"], Type::INT64, num_values, pages);
    chunk.encodings = encodings;
    chunk.has_dictionary = chunk.encodings.contains(&Encoding::RLE_DICTIONARY);
    build_file(schema, vec![(num_values, vec![chunk])])
}

#[test]
fn encoding_equivalence() {
    let values = [3i64, 7, 7, 1, 9, 9, 9, 2];

    let plain = single_i64_file(
        vec![v1_data_page(8, Encoding::PLAIN, &plain_i64(&values))],
        vec![Encoding::PLAIN],
        8,
    );

    let delta = single_i64_file(
        vec![v1_data_page(
            8,
            Encoding::DELTA_BINARY_PACKED,
            &delta_stream(&values),
        )],
        vec![Encoding::DELTA_BINARY_PACKED],
        8,
    );

    // distinct values [3, 7, 1, 9, 2], indexed at width 3
    let dict_body = plain_i64(&[3, 7, 1, 9, 2]);
    let mut index_body = vec![3u8];
    index_body.extend_from_slice(&hybrid_bitpacked(&[0, 1, 1, 2, 3, 3, 3, 4], 3));
    let dictionary = single_i64_file(
        vec![
            dictionary_page(5, &dict_body),
            v1_data_page(8, Encoding::RLE_DICTIONARY, &index_body),
        ],
        vec![Encoding::PLAIN, Encoding::RLE_DICTIONARY],
        8,
    );

    let request = || ReadRequest::new().with_columns(["v"]);
    let from_plain = block_on(open(plain).read_column(request())).unwrap();
    let from_delta = block_on(open(delta).read_column(request())).unwrap();
    let from_dictionary = block_on(open(dictionary).read_column(request())).unwrap();

    let expected: Vec<Value> = values.iter().map(|value| Value::Int64(*value)).collect();
    assert_eq!(from_plain, expected);
    assert_eq!(from_delta, expected);
    assert_eq!(from_dictionary, expected);
}

#[test]
fn chunks_are_delivered_in_page_order() {
    let mut chunks: Vec<(String, u64, u64, usize)> = vec![];
    let file = open(basic_file());
    let rows = block_on(
        file.read(ReadRequest::new().with_on_chunk(|chunk| {
            chunks.push((
                chunk.column.clone(),
                chunk.row_start,
                chunk.row_end,
                chunk.values.len(),
            ));
        })),
    )
    .unwrap();
    assert_eq!(rows.len(), 200);

    // one page per column per row group
    assert_eq!(chunks.len(), 6);
    for column in ["a", "name", "score"] {
        let starts: Vec<u64> = chunks
            .iter()
            .filter(|(name, ..)| name == column)
            .map(|(_, start, ..)| *start)
            .collect();
        assert_eq!(starts, vec![0, 100]);
    }
    for (_, start, end, _) in &chunks {
        assert_eq!(end - start, 100);
    }
}

#[test]
fn utf8_decoding_is_gated() {
    let file = open(basic_file());
    let values = block_on(
        file.read_column(
            ReadRequest::new()
                .with_columns(["name"])
                .with_row_range(0, 1)
                .with_utf8(false),
        ),
    )
    .unwrap();
    assert_eq!(values, vec![Value::Bytes(b"alpha".to_vec())]);
}

#[test]
fn legacy_bit_packed_levels() {
    // definition levels 1, 0, 1, 1 packed from the most significant bit
    let schema = vec![
        root_element(1),
        primitive_element("x", Type::INT32, FieldRepetitionType::OPTIONAL, None),
    ];
    let mut body = vec![0b1011_0000u8];
    body.extend_from_slice(&plain_i32(&[10, 30, 40]));
    let chunk = ChunkSpec::new(
        &["x"],
        Type::INT32,
        4,
        vec![v1_data_page_with_levels(
            4,
            Encoding::PLAIN,
            Encoding::BIT_PACKED,
            &body,
        )],
    );
    let file = open(build_file(schema, vec![(4, vec![chunk])]));
    let values = block_on(file.read_column(ReadRequest::new().with_columns(["x"]))).unwrap();
    assert_eq!(
        values,
        vec![
            Value::Int32(10),
            Value::Null,
            Value::Int32(30),
            Value::Int32(40)
        ]
    );
}

#[test]
fn nested_column_flattened() {
    let file = open(nested_file());
    let values = block_on(file.read_column(ReadRequest::new().with_columns(["b.c.d"]))).unwrap();
    assert_eq!(
        values,
        vec![
            Value::Utf8("Test".to_string()),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Utf8("other".to_string()),
        ]
    );
}

#[test]
fn multi_column_read_column_is_invalid() {
    let file = open(basic_file());
    let error = block_on(file.read_column(ReadRequest::new().with_columns(["a", "name"])))
        .unwrap_err();
    assert!(matches!(
        error,
        parquet_fetch::Error::InvalidRequest(_)
    ));
}

#[cfg(feature = "snappy")]
#[test]
fn snappy_compressed_pages() {
    use parquet_format_safe::CompressionCodec;

    let values: Vec<i64> = (0..50).collect();
    let body = plain_i64(&values);
    let compressed = snap::raw::Encoder::new().compress_vec(&body).unwrap();
    let schema = vec![
        root_element(1),
        primitive_element("v", Type::INT64, FieldRepetitionType::REQUIRED, None),
    ];
    let chunk = ChunkSpec::new(
        &["v"],
        Type::INT64,
        50,
        vec![v1_data_page_compressed(
            50,
            Encoding::PLAIN,
            &compressed,
            body.len() as i32,
        )],
    )
    .with_codec(CompressionCodec::SNAPPY);
    let file = open(build_file(schema, vec![(50, vec![chunk])]));
    let read = block_on(file.read_column(ReadRequest::new().with_columns(["v"]))).unwrap();
    assert_eq!(
        read,
        values.iter().map(|value| Value::Int64(*value)).collect::<Vec<_>>()
    );
}
