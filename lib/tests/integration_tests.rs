use std::fs;

use serde_json::json;

use apxdf::{
    apxdf_to_csv, Apx4Hit, ApxdfReader, ApxdfWriter, Error, FileHeader, Hit, Readout, EXTENSION,
};

// Mock readout captured verbatim from a NEXYS board running the AstroPix 4
// firmware (2024-12-19); it contains exactly 2 hits followed by padding.
fn mock_readout() -> Vec<u8> {
    let mut data = hex::decode(concat!(
        "bcbce08056e80da85403bcbcbcbcbcbc",
        "bcbce080d26f04ca3005bcbcbcbcbcbc"
    ))
    .unwrap();
    data.resize(data.len() + 504, 0xff);
    data
}

#[test]
fn decode_write_read_convert() {
    let readout = Readout::decode(&mock_readout(), Some(1_734_600_000.25)).unwrap();
    assert_eq!(readout.num_hits(), 2);

    let tmpdir = tempfile::tempdir().unwrap();
    let data_path = tmpdir.path().join("run.apx");
    assert_eq!(data_path.extension().unwrap(), EXTENSION);

    // Write header + hits, streaming.
    let header = FileHeader::new(json!({
        "conf": {"chip": "astropix4", "threshold_mv": 100.0},
        "args": {"maxruns": null, "name": "beam"},
    }));
    let mut writer = ApxdfWriter::create(&data_path, &header).unwrap();
    for hit in &readout.hits {
        writer.write_hit(hit).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);

    // Play the file back.
    let reader = ApxdfReader::<Apx4Hit, _>::open(&data_path).unwrap();
    assert_eq!(reader.header(), &header);
    let hits: Vec<Apx4Hit> = reader.map(Result::unwrap).collect();
    assert_eq!(hits.len(), 2);
    for (twin, hit) in hits.iter().zip(&readout.hits) {
        assert_eq!(twin, hit, "hits must round-trip byte for byte");
    }
    assert_eq!(hits[0].tot_us, 162.75);
    assert_eq!(hits[1].tot_us, 332.65);

    // Convert to CSV.
    let csv_path = apxdf_to_csv::<Apx4Hit>(&data_path, None).unwrap();
    assert_eq!(csv_path, tmpdir.path().join("run.csv"));
    let text = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], Apx4Hit::csv_header());
    // The host timestamp is not stored in the file, so the last field is
    // empty on playback.
    assert_eq!(lines[1], "0,7,0,5,1,5167,3,0,0,5418,6,0,49581,52836,162.75,");
    assert_eq!(lines[2], "0,7,0,5,0,6124,2,0,1,4876,5,0,54716,61369,332.65,");
}

#[test]
fn header_only_file_round_trips() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = tmpdir.path().join("empty.apx");

    let header = FileHeader::new(json!([1, "two", {"three": 3.0}, null]));
    let writer = ApxdfWriter::<Apx4Hit, _>::create(&path, &header).unwrap();
    drop(writer);

    let mut reader = ApxdfReader::<Apx4Hit, _>::open(&path).unwrap();
    assert_eq!(reader.header(), &header);
    assert!(reader.next().is_none(), "no hits were written");
}

#[test]
fn reading_a_non_apxdf_file_fails() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = tmpdir.path().join("not.apx");
    fs::write(&path, b"PK\x03\x04 some other format").unwrap();

    let err = ApxdfReader::<Apx4Hit, _>::open(&path)
        .err()
        .expect("reading must fail before exposing any header content");
    match err {
        Error::MagicWord { found, .. } => assert_eq!(&found, b"PK\x03\x04 s"),
        other => panic!("expected a magic word error, got {other}"),
    }
}
