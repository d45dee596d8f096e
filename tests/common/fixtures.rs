//! Static book corpora used across harnesses.
//!
//! Each book is a complete, newline-terminated text. The multi-byte corpus
//! mixes 2-, 3- and 4-byte UTF-8 sequences so that arbitrary chunk cuts land
//! inside characters.

/// Short English books keyed by title line.
pub const BOOK_MOBY: &str = "Moby Dick\n\
Call me Ishmael.\n\
Some years ago, never mind how long precisely,\n\
having little or no money in my purse, I thought I would sail about a little.\n\
There now is your insular city of the Manhattoes, belted round by wharves.\n";

pub const BOOK_ALICE: &str = "Alice in Wonderland\n\
Alice was beginning to get very tired of sitting by her sister on the bank.\n\
The Cheshire Cat only grinned when it saw Alice.\n\
'Would you tell me, please, which way I ought to go from here?' said Alice to the cat.\n";

pub const BOOK_CATS: &str = "The Book of Cats\n\
Cats, cats, and more CATS.\n\
A cat sat on the mat next to another cat.\n\
Concatenation is not about cats, but it matches anyway.\n";

/// Lines with multi-byte characters of every UTF-8 width.
pub const BOOK_MULTIBYTE: &str = "Ünïcödé Tales\n\
日本語のテキスト\n\
🦀 crabs and 🐋 whales\n\
𝄞 musical clef 𝄞\n\
mixed ascii ü 中 😀 end\n";

/// All books above.
pub const CORPUS: &[&str] = &[BOOK_MOBY, BOOK_ALICE, BOOK_CATS, BOOK_MULTIBYTE];

/// Count non-overlapping, case-insensitive occurrences of `needle` in each
/// line of `book`, the way the analysis engine does.
pub fn expected_count(book: &str, needle: &str) -> usize {
    let needle = needle.to_lowercase();
    book.lines()
        .map(|line| line.trim().to_lowercase().matches(needle.as_str()).count())
        .sum()
}

/// First line of `book` without its terminator.
pub fn title_of(book: &str) -> &str {
    book.lines().next().unwrap_or_default()
}
