//! Readers crossing a segment boundary, both below and at the write tail.

use std::sync::Arc;

use commit_log_reader::{decode_message, CancellationToken, CommitLog, CommittedReader, HEADER_LEN};

fn decode_all(mut bytes: &[u8]) -> Vec<(u64, u64, Vec<u8>)> {
    let mut out = Vec::new();
    let mut header_buf = [0u8; HEADER_LEN];
    loop {
        if bytes.is_empty() {
            break;
        }
        let (payload, offset, timestamp) = decode_message(&mut bytes, &mut header_buf).unwrap();
        out.push((offset, timestamp, payload));
    }
    out
}

#[test]
fn committed_reader_crosses_a_segment_boundary() {
    // Small max segment size forces a roll after the first couple of records.
    let log = CommitLog::with_config(Arc::new(commit_log_reader::SystemClock), HEADER_LEN + 1);
    for payload in [b"0" as &[u8], b"1", b"2", b"3", b"4", b"5"] {
        log.append(payload).unwrap();
    }
    log.advance_hw(5);
    assert!(log.segments().len() > 1, "test setup should force multiple segments");

    let reader = CommittedReader::new(&log, CancellationToken::new(), 1).unwrap();
    let mut buf = vec![0u8; 5 * (HEADER_LEN + 1)];
    let (n, err) = reader.read(&mut buf);
    assert!(err.is_none());
    assert_eq!(n, buf.len());

    let records = decode_all(&buf);
    let payloads: Vec<u8> = records.iter().map(|(_, _, p)| p[0]).collect();
    assert_eq!(payloads, vec![b'1', b'2', b'3', b'4', b'5']);
}
