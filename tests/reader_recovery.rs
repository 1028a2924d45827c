//! Orderly end-of-stream: cancellation mid-read, and a log-wide close
//! waking readers parked on either reader type.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use commit_log_reader::{
    CancellationToken, CommitLog, CommittedReader, Error, UncommittedReader, HEADER_LEN,
};

#[test]
fn uncommitted_reader_returns_end_of_stream_on_cancellation_after_partial_read() {
    let log = CommitLog::new();
    log.append(b"a").unwrap();
    log.append(b"b").unwrap();
    let cancel = CancellationToken::new();
    let reader = Arc::new(UncommittedReader::new(&log, cancel.clone(), 0).unwrap());

    let cancel2 = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        cancel2.cancel();
    });

    // Ask for more than is currently written so the reader parks after
    // delivering the two existing records.
    let mut buf = vec![0u8; 2 * (HEADER_LEN + 1) + 64];
    let (n, err) = reader.read(&mut buf);
    assert_eq!(n, 2 * (HEADER_LEN + 1));
    assert!(matches!(err, Some(Error::EndOfStream)));
}

#[test]
fn closing_the_log_wakes_a_parked_uncommitted_reader() {
    let log = CommitLog::new();
    let reader = Arc::new(UncommittedReader::new(&log, CancellationToken::new(), 0).unwrap());

    let log2 = Arc::clone(&log);
    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        log2.close();
    });

    let mut buf = vec![0u8; 16];
    let (n, err) = reader.read(&mut buf);
    assert_eq!(n, 0);
    assert!(matches!(err, Some(Error::EndOfStream)));
    closer.join().unwrap();
}

#[test]
fn closing_the_log_wakes_a_parked_committed_reader() {
    let log = CommitLog::new();
    log.append(b"a").unwrap();
    // No `advance_hw` call: the reader below is parked waiting for offset 0
    // to become committed, not for data to be written.
    let reader = Arc::new(CommittedReader::new(&log, CancellationToken::new(), 0).unwrap());

    let log2 = Arc::clone(&log);
    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        log2.close();
    });

    let mut buf = vec![0u8; HEADER_LEN + 1];
    let (n, err) = reader.read(&mut buf);
    assert_eq!(n, 0);
    assert!(matches!(err, Some(Error::EndOfStream)));
    closer.join().unwrap();
}
