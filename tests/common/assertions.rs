//! Domain-specific assertion macros for bookworm harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear *which* book or report diverged and how.

// ---------------------------------------------------------------------------
// Artifact assertions
// ---------------------------------------------------------------------------

/// Assert that `book_NN.txt` in `dir` holds exactly `expected`.
///
/// ```rust
/// assert_book_file!(dir.path(), 1, "Solo\n");
/// ```
#[macro_export]
macro_rules! assert_book_file {
    ($dir:expr, $seq:expr, $expected:expr) => {{
        let dir: &std::path::Path = $dir;
        let path = dir.join(format!("{}.txt", bookworm::persist::artifact_name($seq)));
        let actual = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => panic!("assert_book_file! failed: cannot read {}: {err}", path.display()),
        };
        let expected: &str = $expected;
        if actual != expected.as_bytes() {
            pretty_assertions::assert_eq!(
                String::from_utf8_lossy(&actual),
                expected,
                "assert_book_file! failed for {}",
                path.display()
            );
            panic!("assert_book_file! failed for {}: bytes differ", path.display());
        }
    }};
}

/// Assert that `dir` contains exactly `n` `book_*.txt` artifacts.
#[macro_export]
macro_rules! assert_book_count {
    ($dir:expr, $n:expr) => {{
        let dir: &std::path::Path = $dir;
        let books: Vec<String> = std::fs::read_dir(dir)
            .expect("artifact directory is readable")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("book_") && name.ends_with(".txt"))
            .collect();
        if books.len() != $n {
            panic!(
                "assert_book_count! failed:\n  expected: {}\n  actual:   {}\n  books: {:?}",
                $n,
                books.len(),
                books
            );
        }
    }};
}

// ---------------------------------------------------------------------------
// Ledger assertions
// ---------------------------------------------------------------------------

/// Assert that walking a document chain yields exactly `expected` text.
///
/// ```rust
/// assert_document!(ledger, conn(1), "Title\nbody\n");
/// ```
#[macro_export]
macro_rules! assert_document {
    ($ledger:expr, $conn:expr, $expected:expr) => {{
        let ledger: &bookworm::Ledger = &$ledger;
        let conn: bookworm::ConnectionId = $conn;
        let actual: String =
            ledger.read(|v| v.document_lines(conn).map(|r| r.content().to_string()).collect());
        pretty_assertions::assert_eq!(actual, $expected, "assert_document! failed for {conn}");
    }};
}

// ---------------------------------------------------------------------------
// Report assertions
// ---------------------------------------------------------------------------

/// Assert the `(title, count)` rows of a frequency table, in rank order.
///
/// ```rust
/// assert_ranking!(report.table, [("Title One", 2), ("Title Two", 1)]);
/// ```
#[macro_export]
macro_rules! assert_ranking {
    ($table:expr, [$(($title:expr, $count:expr)),* $(,)?]) => {{
        let table: &[bookworm::analysis::Ranked] = &$table;
        let actual: Vec<(String, usize)> =
            table.iter().map(|r| (r.title.clone(), r.count)).collect();
        let expected: Vec<(String, usize)> = vec![$(($title.to_string(), $count)),*];
        pretty_assertions::assert_eq!(actual, expected, "assert_ranking! failed");
    }};
}
