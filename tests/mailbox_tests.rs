//! Integration tests for mailbox scanning, indexed access and date ranges.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use assert_fs::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use predicates::prelude::*;

use mboxscan::mailbox::{self, Mailbox};
use mboxscan::parser::MessageParser;
use mboxscan::store::cursor::ScanCursor;
use mboxscan::store::stream::MboxStream;
use mboxscan::{Mail, MboxError, MboxOptions, ParseOverrides, ParsedMessage, Separator};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
}

/// A mailbox with one message per entry; `Some(day)` adds a January 2024
/// `Date:` header, `None` leaves the message undated.
fn dated_mailbox(days: &[Option<u32>]) -> Vec<u8> {
    let mut out = String::new();
    for (i, day) in days.iter().enumerate() {
        out.push_str("From sender@example.com Mon Jan 01 00:00:00 2024\n");
        out.push_str(&format!("Subject: message {i}\n"));
        if let Some(day) = day {
            out.push_str(&format!("Date: {}\n", jan(*day).to_rfc2822()));
        }
        out.push_str("\nbody\n\n");
    }
    out.into_bytes()
}

fn subjects(mails: impl Iterator<Item = mboxscan::Result<Mail>>) -> Vec<String> {
    mails
        .map(|m| m.unwrap().subject().unwrap_or_default().to_string())
        .collect()
}

// ─── Counting and traversal ─────────────────────────────────────────

#[test]
fn test_simple_mbox_count() {
    let count = mailbox::open(fixture("simple.mbox"), MboxOptions::default(), |mbox| {
        mbox.length()
    })
    .unwrap();
    assert_eq!(count, 4, "simple.mbox should contain exactly 4 messages");
}

#[test]
fn test_simple_mbox_each_in_file_order() {
    mailbox::open(fixture("simple.mbox"), MboxOptions::default(), |mbox| {
        let all = subjects(mbox.each(&ParseOverrides::NONE)?);
        assert_eq!(
            all,
            vec!["New year", "Re: New year", "Meeting", "Undeliverable"]
        );

        let first = mbox.each(&ParseOverrides::NONE)?.next().unwrap()?;
        assert_eq!(first.from(), Some("Alice <alice@example.com>"));
        assert_eq!(first.message_id(), Some("<msg001@example.com>"));
        assert!(
            String::from_utf8_lossy(first.body()).contains("From here on"),
            "a body line starting with 'From' must not split the message"
        );
        Ok::<_, MboxError>(())
    })
    .unwrap();
}

#[test]
fn test_length_matches_raw_and_parsed_counts() {
    for name in ["simple.mbox", "preamble.mbox"] {
        mailbox::open(fixture(name), MboxOptions::default(), |mbox| {
            let length = mbox.length()?;
            let raw = mbox.each_raw_message(&ParseOverrides::NONE)?.count();
            let parsed = mbox.each(&ParseOverrides::NONE)?.count();
            assert_eq!(length, raw, "{name}");
            assert_eq!(length, parsed, "{name}");
            Ok::<_, MboxError>(())
        })
        .unwrap();
    }
}

#[test]
fn test_raw_blocks_reassemble_the_file() {
    let original = std::fs::read(fixture("simple.mbox")).unwrap();
    let mut mbox = Mailbox::from_bytes(original.clone());
    let rebuilt: Vec<u8> = mbox
        .each_raw_message(&ParseOverrides::NONE)
        .unwrap()
        .flat_map(|block| block.into_bytes())
        .collect();
    assert_eq!(rebuilt, original);
}

#[test]
fn test_preamble_is_kept_in_raw_mode_and_skipped_when_parsing() {
    let original = std::fs::read(fixture("preamble.mbox")).unwrap();
    let mut mbox = Mailbox::from_bytes(original.clone());

    let blocks: Vec<_> = mbox
        .each_raw_message(&ParseOverrides::NONE)
        .unwrap()
        .collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].offset, 0);
    assert!(blocks[0].to_string_lossy().starts_with("This mailbox"));
    assert_eq!(blocks[0].as_bytes(), original.as_slice());
    assert!(blocks[0].first_line().starts_with(b"This mailbox"));
    assert_eq!(
        blocks[0].separator_line(&Separator::mbox()),
        Some(&b"From dave@example.com Tue Jan 02 10:00:00 2024"[..])
    );

    let mails: Vec<Mail> = mbox
        .each(&ParseOverrides::NONE)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].subject(), Some("After the banner"));
    assert_eq!(mails[0].offset(), 67);
}

#[test]
fn test_preamble_only_stream_has_no_messages_but_one_raw_block() {
    let mut mbox = Mailbox::from_bytes("just some text\nwith no envelope line\n");
    assert_eq!(mbox.length().unwrap(), 0);
    assert!(mbox.is_empty().unwrap());
    assert_eq!(mbox.each(&ParseOverrides::NONE).unwrap().count(), 0);

    let blocks: Vec<_> = mbox
        .each_raw_message(&ParseOverrides::NONE)
        .unwrap()
        .collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].separator_line(&Separator::mbox()), None);
}

// ─── Indexed access ─────────────────────────────────────────────────

#[test]
fn test_index_of_starts_with_separator() {
    let mut mbox = Mailbox::from_bytes(std::fs::read(fixture("simple.mbox")).unwrap());
    let separator = Separator::mbox();
    for i in 0..4 {
        let block = mbox.index_of(i).unwrap();
        assert!(separator.matches(block.as_bytes()), "message {i}");
    }

    let third = mbox.index_of(2).unwrap();
    assert_eq!(
        third.separator_line(&separator),
        Some(&b"From carol@example.com Wed Jan 10 08:00:00 2024"[..])
    );
    assert_eq!(third.first_line(), third.separator_line(&separator).unwrap());
    assert!(predicate::str::contains("See you at ten.").eval(&third.to_string_lossy()));
    assert!(predicate::str::contains("No date header").not().eval(&third.to_string_lossy()));
}

#[test]
fn test_index_of_out_of_range() {
    let mut mbox = Mailbox::from_bytes(std::fs::read(fixture("simple.mbox")).unwrap());
    let err = mbox.index_of(4).unwrap_err();
    assert!(matches!(err, MboxError::OutOfRange { index: 4 }));
    assert_eq!(err.to_string(), "4 is out of range");

    // The failed lookup leaves the mailbox usable.
    assert_eq!(mbox.length().unwrap(), 4);
}

#[test]
fn test_first_n_windows() {
    let mut mbox = Mailbox::from_bytes(std::fs::read(fixture("simple.mbox")).unwrap());
    let window = subjects(mbox.first_n(1, 2, &ParseOverrides::NONE).unwrap());
    assert_eq!(window, vec!["Re: New year", "Meeting"]);

    let tail = subjects(mbox.first_n(3, 10, &ParseOverrides::NONE).unwrap());
    assert_eq!(tail, vec!["Undeliverable"]);

    assert!(matches!(
        mbox.first_n(4, 1, &ParseOverrides::NONE),
        Err(MboxError::OutOfRange { index: 4 })
    ));
}

// ─── Read state ─────────────────────────────────────────────────────

#[test]
fn test_has_unread() {
    let original = std::fs::read_to_string(fixture("simple.mbox")).unwrap();
    let mut mbox = Mailbox::from_bytes(original.clone());
    assert!(mbox.has_unread().unwrap());

    let all_read = original.replace("Status: O\n", "Status: RO\n");
    let mut mbox = Mailbox::from_bytes(all_read);
    assert!(!mbox.has_unread().unwrap());
}

#[test]
fn test_headers_only_override_is_per_call() {
    let mut mbox = Mailbox::from_bytes(std::fs::read(fixture("simple.mbox")).unwrap());
    let bodies: Vec<usize> = mbox
        .each(&ParseOverrides::headers_only())
        .unwrap()
        .map(|m| m.unwrap().body().len())
        .collect();
    assert!(bodies.iter().all(|&len| len == 0));
    assert!(!mbox.options().headers_only);

    let first = mbox.each(&ParseOverrides::NONE).unwrap().next().unwrap().unwrap();
    assert!(!first.body().is_empty());
}

// ─── Date ranges ────────────────────────────────────────────────────

#[test]
fn test_between_skips_undated_and_early() {
    let mut mbox = Mailbox::from_bytes(dated_mailbox(&[Some(1), None, Some(10), Some(20)]));
    let found = subjects(mbox.between(jan(5), jan(15), &ParseOverrides::NONE).unwrap());
    assert_eq!(found, vec!["message 2"]);
}

#[test]
fn test_since_yields_everything_after_first_match() {
    let mut mbox = Mailbox::from_bytes(dated_mailbox(&[Some(1), None, Some(15), Some(5)]));
    let found = subjects(mbox.since(jan(10), &ParseOverrides::NONE).unwrap());
    assert_eq!(found, vec!["message 2", "message 3"]);
}

#[test]
fn test_until_keeps_undated_and_stops_early() {
    let mut mbox = Mailbox::from_bytes(dated_mailbox(&[None, Some(5), Some(20), Some(8)]));
    let found = subjects(mbox.until(jan(10), &ParseOverrides::NONE).unwrap());
    assert_eq!(found, vec!["message 0", "message 1"]);
}

#[test]
fn test_ranges_on_fixture() {
    let mut mbox = Mailbox::from_bytes(std::fs::read(fixture("simple.mbox")).unwrap());

    let until = subjects(mbox.until(jan(6), &ParseOverrides::NONE).unwrap());
    assert_eq!(until, vec!["New year", "Re: New year"]);

    // The undated bounce comes after the latch and is kept.
    let since = subjects(mbox.since(jan(5), &ParseOverrides::NONE).unwrap());
    assert_eq!(since, vec!["Meeting", "Undeliverable"]);

    let between = subjects(mbox.between(jan(2), jan(12), &ParseOverrides::NONE).unwrap());
    assert_eq!(between, vec!["Re: New year", "Meeting"]);
}

// ─── Separators ─────────────────────────────────────────────────────

#[test]
fn test_custom_separator() {
    let data = "BEGIN 1\nSubject: a\n\nx\nBEGIN 2\nSubject: b\n\ny\n";
    let options = MboxOptions {
        separator: Separator::from_pattern("BEGIN \\d+").unwrap(),
        ..MboxOptions::default()
    };
    let mut mbox = Mailbox::with_options(Cursor::new(data.as_bytes().to_vec()), options).unwrap();
    assert_eq!(mbox.length().unwrap(), 2);
    assert_eq!(
        subjects(mbox.each(&ParseOverrides::NONE).unwrap()),
        vec!["a", "b"]
    );

    // The standard separator finds nothing here.
    let overrides = ParseOverrides::NONE.with_separator(Separator::mbox());
    assert_eq!(mbox.each(&overrides).unwrap().count(), 0);
}

#[test]
fn test_invalid_separator_pattern() {
    assert!(matches!(
        Separator::from_pattern("From ("),
        Err(MboxError::InvalidArgument(_))
    ));
}

// ─── Files and locking ──────────────────────────────────────────────

#[test]
fn test_open_real_file_with_locking() {
    let temp = assert_fs::TempDir::new().unwrap();
    let child = temp.child("inbox.mbox");
    child
        .write_str(&std::fs::read_to_string(fixture("simple.mbox")).unwrap())
        .unwrap();
    child.assert(predicate::path::is_file());

    mailbox::open(child.path(), MboxOptions::default(), |mbox| {
        assert_eq!(mbox.name(), Some("inbox.mbox"));
        assert_eq!(mbox.path(), Some(child.path()));
        assert!(mbox.supports_locking());
        assert_eq!(mbox.length()?, 4);
        assert!(mbox.has_unread()?);
        assert!(mbox.read_failure().is_none());
        Ok::<_, MboxError>(())
    })
    .unwrap();
}

#[test]
fn test_split_like_round_trip_through_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("split");
    std::fs::create_dir_all(out.path()).unwrap();

    let written = mailbox::open(fixture("simple.mbox"), MboxOptions::default(), |mbox| {
        let mut n = 0;
        for block in mbox.each_raw_message(&ParseOverrides::NONE)? {
            std::fs::write(out.path().join(format!("{n:06}.eml")), block.as_bytes())
                .map_err(MboxError::from)?;
            n += 1;
        }
        Ok::<_, MboxError>(n)
    })
    .unwrap();

    assert_eq!(written, 4);
    out.child("000002.eml")
        .assert(predicate::str::starts_with("From carol@example.com"));
    out.child("000003.eml")
        .assert(predicate::str::contains("No date header here."));
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.mbox");
    let result = mailbox::open(&missing, MboxOptions::default(), |mbox| mbox.length());
    assert!(matches!(result, Err(MboxError::FileNotFound(p)) if p == missing));
}

#[test]
fn test_file_grows_between_calls() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), dated_mailbox(&[Some(1)])).unwrap();

    mailbox::open(file.path(), MboxOptions::default(), |mbox| {
        assert_eq!(mbox.length()?, 1);
        std::fs::write(file.path(), dated_mailbox(&[Some(1), Some(2), Some(3)]))
            .map_err(MboxError::from)?;
        assert_eq!(mbox.length()?, 3);
        Ok::<_, MboxError>(())
    })
    .unwrap();
}

/// Whether an independent handle on `path` can take an exclusive lock.
fn is_unlocked(path: &Path) -> bool {
    let other = File::open(path).unwrap();
    match other.try_lock() {
        Ok(()) => {
            other.unlock().unwrap();
            true
        }
        Err(_) => false,
    }
}

#[test]
fn test_iterators_hold_the_lock_until_exhausted_or_dropped() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::copy(fixture("simple.mbox"), file.path()).unwrap();
    let path = file.path();
    let mut mbox = Mailbox::new(File::open(path).unwrap()).unwrap();
    assert!(mbox.supports_locking());
    assert!(is_unlocked(path));

    let mut mails = mbox.each(&ParseOverrides::NONE).unwrap();
    assert!(mails.next().is_some());
    assert!(!is_unlocked(path), "parsed scan in progress");
    assert_eq!(mails.by_ref().count(), 3);
    assert!(is_unlocked(path), "exhausted parsed scan still locked");
    drop(mails);

    let mut blocks = mbox.each_raw_message(&ParseOverrides::NONE).unwrap();
    assert!(blocks.next().is_some());
    assert!(!is_unlocked(path), "raw scan in progress");
    assert_eq!(blocks.by_ref().count(), 3);
    assert!(is_unlocked(path), "exhausted raw scan still locked");
    drop(blocks);

    let mut blocks = mbox.each_raw_message(&ParseOverrides::NONE).unwrap();
    assert!(blocks.next().is_some());
    assert!(!is_unlocked(path));
    drop(blocks);
    assert!(is_unlocked(path), "dropped raw scan still locked");
}

#[test]
fn test_lock_released_after_failed_lookup_and_range_stop() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::copy(fixture("simple.mbox"), file.path()).unwrap();
    let path = file.path();
    let mut mbox = Mailbox::new(File::open(path).unwrap()).unwrap();

    assert!(matches!(
        mbox.index_of(4),
        Err(MboxError::OutOfRange { index: 4 })
    ));
    assert!(is_unlocked(path), "failed lookup still locked");

    // Jan 1 and Jan 5 pass, Jan 10 stops the range.
    let mut until = mbox.until(jan(6), &ParseOverrides::NONE).unwrap();
    assert!(until.next().is_some());
    assert!(until.next().is_some());
    assert!(!is_unlocked(path), "range scan in progress");
    assert!(until.next().is_none());
    assert!(is_unlocked(path), "stopped range still locked");
    assert!(until.next().is_none());
}

// ─── Broken streams ─────────────────────────────────────────────────

/// Serves the first `good` bytes, then fails every read.
struct Flaky {
    inner: Cursor<Vec<u8>>,
    good: u64,
}

impl Read for Flaky {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.inner.position();
        if pos >= self.good {
            return Err(io::Error::other("device gone"));
        }
        let room = (self.good - pos) as usize;
        let len = buf.len().min(room);
        self.inner.read(&mut buf[..len])
    }
}

impl Seek for Flaky {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl MboxStream for Flaky {}

const FIRST: &str = "From a@example.com Mon Jan 01 10:00:00 2024\nSubject: one\n\nBody one\n";
const SECOND: &str =
    "From b@example.com Tue Jan 02 10:00:00 2024\nSubject: two\n\nBody two\nmore body\n";

fn flaky_mailbox() -> Mailbox<Flaky> {
    let data = format!("{FIRST}{SECOND}").into_bytes();
    // The failure lands inside the last line.
    let good = data.len() as u64 - 5;
    Mailbox::new(Flaky {
        inner: Cursor::new(data),
        good,
    })
    .unwrap()
}

#[test]
fn test_raw_scan_of_failing_stream_keeps_partial_last_block() {
    let mut mbox = flaky_mailbox();
    assert!(!mbox.supports_locking());

    let blocks: Vec<_> = mbox
        .each_raw_message(&ParseOverrides::NONE)
        .unwrap()
        .collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].as_bytes(), FIRST.as_bytes());
    assert_eq!(
        blocks[1].as_bytes(),
        SECOND.strip_suffix("more body\n").unwrap().as_bytes()
    );

    let failure = mbox.read_failure().expect("failure recorded");
    assert_eq!(failure.to_string(), "device gone");
}

#[test]
fn test_parsed_scan_of_failing_stream() {
    let mut mbox = flaky_mailbox();
    assert_eq!(mbox.length().unwrap(), 2);
    assert!(mbox.read_failure().is_some());

    let mails: Vec<Mail> = mbox
        .each(&ParseOverrides::NONE)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(mails.len(), 2);
    assert_eq!(mails[1].subject(), Some("two"));
    assert_eq!(mails[1].body(), b"Body two\n");
    assert!(mbox.read_failure().is_some());
}

// ─── Custom parsers ─────────────────────────────────────────────────

/// Fails on every call.
struct BrokenParser;

impl MessageParser for BrokenParser {
    type Message = Mail;

    fn parse<S: Read + Seek>(
        &self,
        _cursor: &mut ScanCursor<S>,
        _options: &MboxOptions,
    ) -> mboxscan::Result<Option<Mail>> {
        Err(MboxError::parser(std::io::Error::other("broken parser")))
    }
}

#[test]
fn test_parser_errors_pass_through_once() {
    let data = std::fs::read(fixture("simple.mbox")).unwrap();
    let mut mbox =
        Mailbox::with_parser(Cursor::new(data), MboxOptions::default(), BrokenParser).unwrap();

    let results: Vec<_> = mbox.each(&ParseOverrides::NONE).unwrap().collect();
    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(e @ MboxError::Parser(_)) => assert_eq!(e.to_string(), "broken parser"),
        other => panic!("expected a parser error, got {other:?}"),
    }

    // Counting does not involve the parser.
    assert_eq!(mbox.length().unwrap(), 4);
}
