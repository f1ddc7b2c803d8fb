use carton::container::{ContainerError, ContainerReader, ContainerWriter, WriterOptions};
use carton::{Datum, Record, Schema, TypedReader, TypedWriter, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use tempfile::NamedTempFile;

const BOOK_SCHEMA: &str = r#"{"type":"record","fields":[
    {"name":"id","type":"int32"},
    {"name":"name","type":"string"},
    {"name":"category","type":"string"}
]}"#;

fn book(id: i32, name: &str, category: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("category", category)
}

fn write_books(path: &std::path::Path) -> Schema {
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = ContainerWriter::create(schema.clone(), file, HashMap::new()).unwrap();
    writer.append(&book(123, "Programming is fun", "Fiction")).unwrap();
    writer.append(&book(456, "Some book", "Horror")).unwrap();
    writer.append(&book(789, "And another book", "")).unwrap();
    writer.close().unwrap();
    schema
}

#[test]
fn test_generic_read_recovers_schema_from_header() {
    let temp_file = NamedTempFile::new().unwrap();
    let written_schema = write_books(temp_file.path());

    // Reopen knowing nothing but the path; the header carries the schema.
    let file = File::open(temp_file.path()).unwrap();
    let mut reader = ContainerReader::open(file).unwrap();
    assert_eq!(reader.schema(), &written_schema);

    let mut records = Vec::new();
    while reader.has_next() {
        records.push(reader.next_record().unwrap());
    }
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].get("name"), Some(&Value::Str("Programming is fun".into())));
    assert_eq!(records[1].get("id"), Some(&Value::Int32(456)));
    assert_eq!(records[2].get("category"), Some(&Value::Str(String::new())));

    assert!(matches!(
        reader.next_record().unwrap_err(),
        ContainerError::Exhausted
    ));
}

// Hand-written stand-in for what a bindings generator would emit.
#[derive(Debug, Clone, PartialEq)]
struct Book {
    id: i32,
    name: String,
    category: String,
}

impl Datum for Book {
    fn schema() -> Schema {
        Schema::parse(BOOK_SCHEMA).expect("static schema")
    }

    fn from_record(record: Record) -> Result<Self, ContainerError> {
        match (record.get("id"), record.get("name"), record.get("category")) {
            (Some(Value::Int32(id)), Some(Value::Str(name)), Some(Value::Str(category))) => {
                Ok(Book { id: *id, name: name.clone(), category: category.clone() })
            }
            _ => Err(ContainerError::SchemaMismatch),
        }
    }

    fn into_record(self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name)
            .with("category", self.category)
    }
}

#[test]
fn test_typed_read_matches_generic_read() {
    let temp_file = NamedTempFile::new().unwrap();
    write_books(temp_file.path());

    let file = File::open(temp_file.path()).unwrap();
    let reader = TypedReader::<Book, _>::open(file).unwrap();
    let books: Vec<Book> = reader.map(|b| b.unwrap()).collect();

    assert_eq!(
        books,
        vec![
            Book { id: 123, name: "Programming is fun".into(), category: "Fiction".into() },
            Book { id: 456, name: "Some book".into(), category: "Horror".into() },
            Book { id: 789, name: "And another book".into(), category: String::new() },
        ]
    );
}

#[test]
fn test_typed_writer_generic_reader() {
    let mut writer = TypedWriter::<Book, _>::create(Vec::new(), HashMap::new()).unwrap();
    writer
        .append(Book { id: 1, name: "One".into(), category: "Test".into() })
        .unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
    let record = reader.next_record().unwrap();
    assert_eq!(record.get("name"), Some(&Value::Str("One".into())));
}

#[test]
fn test_typed_open_rejects_different_schema() {
    let schema = Schema::parse(
        r#"{"type":"record","fields":[{"name":"id","type":"int64"}]}"#,
    )
    .unwrap();
    let mut writer = ContainerWriter::create(schema, Vec::new(), HashMap::new()).unwrap();
    writer.append(&Record::new().with("id", 1i64)).unwrap();
    let bytes = writer.into_inner().unwrap();

    let err = TypedReader::<Book, _>::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, ContainerError::SchemaMismatch));
}

#[test]
fn test_block_count_matches_flush_threshold() {
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let marker = [0xC7; 16];
    let opts = WriterOptions {
        block_records: 4,
        block_bytes: usize::MAX,
        sync_marker: Some(marker),
    };

    let n = 10;
    let mut writer =
        ContainerWriter::with_options(schema, Vec::new(), HashMap::new(), opts).unwrap();
    for i in 0..n {
        writer.append(&book(i, "title", "cat")).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    // ceil(10 / 4) = 3 blocks; each block and the header end in the marker.
    let marker_count = bytes.windows(16).filter(|w| *w == marker).count();
    assert_eq!(marker_count, 1 + 3);

    let mut reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
    let mut ids = Vec::new();
    while reader.has_next() {
        match reader.next_record().unwrap().get("id") {
            Some(Value::Int32(id)) => ids.push(*id),
            other => panic!("unexpected id value {:?}", other),
        }
    }
    assert_eq!(ids, (0..n).collect::<Vec<_>>());
}

#[test]
fn test_truncation_tolerance_at_every_cut_point() {
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let opts = WriterOptions {
        block_records: 2,
        block_bytes: usize::MAX,
        sync_marker: Some([0x11; 16]),
    };

    // Header length = bytes written by a record-free container.
    let header_len = {
        let mut w = ContainerWriter::with_options(
            Schema::parse(BOOK_SCHEMA).unwrap(),
            Vec::new(),
            HashMap::new(),
            opts.clone(),
        )
        .unwrap();
        w.into_inner().unwrap().len()
    };

    let n = 6;
    let mut writer =
        ContainerWriter::with_options(schema, Vec::new(), HashMap::new(), opts).unwrap();
    let mut expected = Vec::new();
    for i in 0..n {
        let record = book(i, &format!("book-{i}"), "cat");
        writer.append(&record).unwrap();
        expected.push(record);
    }
    let bytes = writer.into_inner().unwrap();

    for cut in header_len..=bytes.len() {
        let mut reader = ContainerReader::open(Cursor::new(&bytes[..cut])).unwrap();
        let mut got = Vec::new();
        while reader.has_next() {
            got.push(reader.next_record().unwrap());
        }
        // Whatever survives is a prefix of the original sequence, made of
        // whole blocks (multiples of 2 records), and never an error.
        assert!(got.len() <= n as usize, "cut {cut} yielded too many records");
        assert_eq!(got.len() % 2, 0, "cut {cut} yielded a partial block");
        assert_eq!(got[..], expected[..got.len()], "cut {cut} reordered records");
    }

    // The complete file yields everything.
    let reader = ContainerReader::open(Cursor::new(&bytes[..])).unwrap();
    assert_eq!(reader.count(), n as usize);
}

#[test]
fn test_rejected_record_leaves_container_intact() {
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let mut writer = ContainerWriter::create(schema, Vec::new(), HashMap::new()).unwrap();

    writer.append(&book(1, "good", "a")).unwrap();

    let bad = Record::new()
        .with("id", "not an int")
        .with("name", "bad")
        .with("category", "b");
    assert!(matches!(
        writer.append(&bad).unwrap_err(),
        ContainerError::Encoding(_)
    ));

    writer.append(&book(2, "also good", "c")).unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
    let names: Vec<Record> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0].get("id"), Some(&Value::Int32(1)));
    assert_eq!(names[1].get("id"), Some(&Value::Int32(2)));
}

#[test]
fn test_close_is_idempotent_and_append_after_close_fails() {
    let temp_file = NamedTempFile::new().unwrap();
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();

    let file = File::create(temp_file.path()).unwrap();
    let mut writer = ContainerWriter::create(schema, file, HashMap::new()).unwrap();
    writer.append(&book(1, "only", "x")).unwrap();
    writer.close().unwrap();
    writer.close().unwrap(); // no-op, must not corrupt the file

    assert!(matches!(
        writer.append(&book(2, "late", "y")).unwrap_err(),
        ContainerError::Closed
    ));

    let file = File::open(temp_file.path()).unwrap();
    let reader = ContainerReader::open(file).unwrap();
    assert_eq!(reader.count(), 1);
}

#[test]
fn test_metadata_roundtrip() {
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let mut metadata = HashMap::new();
    metadata.insert("app".to_string(), "carton-tests".to_string());
    metadata.insert("source".to_string(), "integration".to_string());

    let mut writer = ContainerWriter::create(schema, Vec::new(), metadata.clone()).unwrap();
    writer.append(&book(1, "meta", "m")).unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.metadata(), &metadata);
}

#[test]
fn test_open_rejects_garbage_and_truncated_headers() {
    // Wrong magic.
    let err = ContainerReader::open(Cursor::new(b"NOPE definitely not a container".to_vec()))
        .unwrap_err();
    assert!(matches!(err, ContainerError::InvalidContainer(_)));

    // Empty source.
    let err = ContainerReader::open(Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(err, ContainerError::InvalidContainer(_)));

    // Valid prefix cut inside the header.
    let schema = Schema::parse(BOOK_SCHEMA).unwrap();
    let writer = ContainerWriter::create(schema, Vec::new(), HashMap::new()).unwrap();
    let bytes = writer.into_inner().unwrap();
    let err = ContainerReader::open(Cursor::new(bytes[..bytes.len() / 2].to_vec())).unwrap_err();
    assert!(matches!(err, ContainerError::InvalidContainer(_)));
}

#[test]
fn test_nested_records_and_arrays_through_container() {
    let schema = Schema::parse(
        r#"{"type":"record","fields":[
            {"name":"title","type":"string"},
            {"name":"author","type":{"type":"record","fields":[
                {"name":"name","type":"string"},
                {"name":"born","type":"int32"}
            ]}},
            {"name":"tags","type":{"type":"array","items":"string"}},
            {"name":"ratings","type":{"type":"array","items":"float64"}}
        ]}"#,
    )
    .unwrap();

    let record = Record::new()
        .with("title", "Structured")
        .with("author", Record::new().with("name", "N. Body").with("born", 1970))
        .with("tags", vec![Value::from("a"), Value::from("b"), Value::from("c")])
        .with("ratings", Vec::<Value>::new());

    let mut writer = ContainerWriter::create(schema, Vec::new(), HashMap::new()).unwrap();
    writer.append(&record).unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.next_record().unwrap(), record);
    assert!(!reader.has_next());
}

#[test]
fn test_two_readers_over_one_file() {
    let temp_file = NamedTempFile::new().unwrap();
    write_books(temp_file.path());

    let mut a = ContainerReader::open(File::open(temp_file.path()).unwrap()).unwrap();
    let mut b = ContainerReader::open(File::open(temp_file.path()).unwrap()).unwrap();
    // Independent cursors over the same immutable file.
    assert_eq!(a.next_record().unwrap(), b.next_record().unwrap());
    assert_eq!(a.by_ref().count(), b.by_ref().count());
}
