//! LIBSVM file format compatibility tests
//!
//! Exercises the reader on format variations and checks its cursor, failure
//! and rewind behavior across whole files.

use ndarray::array;
use std::io::{Cursor, Write};
use svmachine::{LibsvmFile, SVMError, Trainer};
use tempfile::NamedTempFile;

fn temp_file_with(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(content.as_bytes())
        .expect("Failed to write");
    temp_file.flush().expect("Failed to flush");
    temp_file
}

/// Test LIBSVM format variations
#[test]
fn test_libsvm_format_variations() {
    // (content, records, dimensionality, description)
    let test_cases = vec![
        ("+1 1:0.5 3:1.2 7:0.8\n-1 2:0.3 5:2.1\n", 2, 7, "basic format"),
        ("+1 1:0.5 3:1.2\n\n   \n-1 2:0.3\n", 2, 3, "blank lines"),
        ("1 1:0.5 2:1.0\n-1 1:-0.5 2:-1.0\n", 2, 2, "unsigned labels"),
        (
            "+1 1:1.0 10:2.0 100:3.0\n-1 5:1.5 50:2.5 500:3.5\n",
            2,
            500,
            "sparse indices",
        ),
        ("+1 1:2.0\n-1 1:-2.0\n+1 1:1.8\n-1 1:-1.8\n", 4, 1, "single feature"),
        ("3 1:1\n7\n3 2:1", 3, 2, "empty record and missing final newline"),
        ("1 1:1e-3 2:-2.5E2\n2 2:0\n", 2, 2, "scientific notation"),
        ("1\t1:1.0\t2:2.0\r\n2 1:0.5\r\n", 2, 2, "tabs and CRLF"),
    ];

    for (content, records, shape, description) in test_cases {
        let temp_file = temp_file_with(content);
        let mut file = LibsvmFile::open(temp_file.path())
            .unwrap_or_else(|e| panic!("Failed to open {description}: {e}"));

        assert_eq!(file.samples(), records, "{description}");
        assert_eq!(file.shape(), shape, "{description}");

        let (labels, rows) = file
            .read_all()
            .unwrap_or_else(|e| panic!("Failed to read {description}: {e}"));
        assert_eq!(labels.len(), records, "{description}");
        assert_eq!(rows.dim(), (records, shape), "{description}");
        assert!(file.eof(), "{description}");
        assert!(!file.good(), "{description}");
    }
}

#[test]
fn test_dense_rows_and_labels() {
    let mut file =
        LibsvmFile::from_reader(Cursor::new("2 1:0.5 3:-1\n-4 2:2.0\n2.0 3:7\n")).unwrap();

    let (labels, rows) = file.read_all().unwrap();
    assert_eq!(labels, vec![2, -4, 2]);
    assert_eq!(
        rows,
        array![[0.5, 0.0, -1.0], [0.0, 2.0, 0.0], [0.0, 0.0, 7.0]]
    );
}

#[test]
fn test_reset_is_idempotent() {
    let temp_file = temp_file_with("1 1:1 2:2\n2 2:3\n3 1:4\n");
    let mut file = LibsvmFile::open(temp_file.path()).unwrap();

    let first = file.read_all().unwrap();
    file.reset().unwrap();
    file.reset().unwrap();
    let second = file.read_all().unwrap();
    assert_eq!(first, second);

    // Rewinding mid-file starts over as well
    file.reset().unwrap();
    let head = file.read(2).unwrap();
    assert_eq!(head.len(), 2);
    assert!(file.good());
    file.reset().unwrap();
    let again = file.read(10).unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(&again[..2], &head[..]);
    assert_eq!(file.read_one().unwrap(), None);
}

#[test]
fn test_malformed_record_fails_until_reset() {
    let temp_file = temp_file_with("1 1:1\n1 2:x\n2 1:3\n");
    let mut file = LibsvmFile::open(temp_file.path()).unwrap();
    assert_eq!(file.samples(), 3);

    assert_eq!(file.read_one().unwrap(), Some((1, vec![1.0, 0.0])));
    assert!(matches!(
        file.read_one(),
        Err(SVMError::ParseError { line: 2, .. })
    ));
    assert!(file.fail());
    assert!(!file.eof());
    assert!(matches!(file.read_one(), Err(SVMError::ReaderFailed)));

    file.reset().unwrap();
    assert!(file.good());
    assert_eq!(file.read_one().unwrap(), Some((1, vec![1.0, 0.0])));
}

#[test]
fn test_rejected_records() {
    let cases = [
        ("1 0:1.0\n", "zero index"),
        ("1 2:1.0 1:1.0\n", "decreasing indices"),
        ("1 1:1.0 1:2.0\n", "repeated index"),
        ("a 1:1.0\n", "non-numeric label"),
        ("1.5 1:1.0\n", "fractional label"),
        ("1 1=1.0 2:1\n", "missing colon"),
    ];

    for (content, description) in cases {
        let mut file = LibsvmFile::from_reader(Cursor::new(content)).unwrap();
        assert!(
            matches!(file.read_all(), Err(SVMError::ParseError { .. })),
            "{description}"
        );
        assert!(file.fail(), "{description}");
    }
}

#[test]
fn test_read_into_checks_buffer() {
    let mut file = LibsvmFile::from_reader(Cursor::new("5 1:1 2:2\n")).unwrap();

    let mut short = [0.0; 1];
    assert!(matches!(
        file.read_into(&mut short),
        Err(SVMError::ShapeMismatch {
            what: "row",
            expected: 2,
            actual: 1
        })
    ));
    // A wrong buffer is not a format error
    assert!(file.good());

    let mut row = [9.0; 2];
    assert_eq!(file.read_into(&mut row).unwrap(), Some(5));
    assert_eq!(row, [1.0, 2.0]);
    assert_eq!(file.read_into(&mut row).unwrap(), None);
}

#[test]
fn test_display() {
    let temp_file = temp_file_with("1 1:1 4:2\n2 2:3\n");
    let file = LibsvmFile::open(temp_file.path()).unwrap();
    assert_eq!(
        file.to_string(),
        format!(
            "LibsvmFile('{}') <float64@(2, 4)>",
            temp_file.path().display()
        )
    );

    let stream = LibsvmFile::from_reader(Cursor::new("")).unwrap();
    assert_eq!(stream.to_string(), "LibsvmFile(<stream>) <float64@(0, 0)>");
    assert!(stream.eof());
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        LibsvmFile::open("/nonexistent/data.libsvm"),
        Err(SVMError::IoError(_))
    ));
}

#[test]
fn test_file_feeds_trainer() {
    let temp_file = temp_file_with(
        "1 1:0.1 2:0.2\n1 1:-0.1 2:0.1\n1 2:-0.2\n\
         2 1:3.1 2:3.0\n2 1:2.9 2:3.2\n2 1:3.0 2:2.8\n",
    );
    let mut file = LibsvmFile::open(temp_file.path()).unwrap();
    let (labels, rows) = file.read_all().unwrap();

    let pick = |wanted: i64| {
        let idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == wanted).collect();
        rows.select(ndarray::Axis(0), &idx)
    };
    let machine = Trainer::new().train(&[pick(1), pick(2)]).unwrap();

    // File labels 1 and 2 map to machine labels -1 and +1
    let predicted = machine.predict_classes(rows.view()).unwrap();
    let expected: Vec<i64> = labels.iter().map(|&l| if l == 1 { -1 } else { 1 }).collect();
    assert_eq!(predicted, expected);
}
