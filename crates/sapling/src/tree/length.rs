use std::fmt;
use std::ops::{Add, Sub};

/// A position in a document: zero-based row, and byte column within the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// Zero-based line number.
    pub row: usize,
    /// Zero-based byte offset within the line.
    pub column: usize,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Advancing a point by an extent: a multi-line extent resets the column.
impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        if other.row > 0 {
            Point::new(self.row + other.row, other.column)
        } else {
            Point::new(self.row, self.column + other.column)
        }
    }
}

/// The extent from `other` to `self`, saturating at zero.
impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        if self.row > other.row {
            Point::new(self.row - other.row, self.column)
        } else {
            Point::new(0, self.column.saturating_sub(other.column))
        }
    }
}

/// A span of text measured both in bytes and as a row/column extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Length {
    /// Number of bytes.
    pub bytes: usize,
    /// Rows and trailing columns covered.
    pub extent: Point,
}

impl Length {
    /// The empty span.
    pub const ZERO: Length = Length {
        bytes: 0,
        extent: Point { row: 0, column: 0 },
    };

    /// Measures `text`.
    #[must_use]
    pub fn of(text: &str) -> Self {
        let extent = match text.rfind('\n') {
            Some(last) => Point::new(text.matches('\n').count(), text.len() - last - 1),
            None => Point::new(0, text.len()),
        };
        Self {
            bytes: text.len(),
            extent,
        }
    }

    /// Like `self - other`, but zero whenever `other` is not strictly shorter.
    #[must_use]
    pub fn saturating_sub(self, other: Length) -> Length {
        if self.bytes > other.bytes {
            self - other
        } else {
            Length::ZERO
        }
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, other: Length) -> Length {
        Length {
            bytes: self.bytes + other.bytes,
            extent: self.extent + other.extent,
        }
    }
}

impl Sub for Length {
    type Output = Length;

    fn sub(self, other: Length) -> Length {
        Length {
            bytes: self.bytes.saturating_sub(other.bytes),
            extent: self.extent - other.extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", 0, 0, 0)]
    #[case("abc", 3, 0, 3)]
    #[case("ab\ncd", 5, 1, 2)]
    #[case("a\n\n", 3, 2, 0)]
    fn test_length_of(
        #[case] text: &str,
        #[case] bytes: usize,
        #[case] row: usize,
        #[case] column: usize,
    ) {
        assert_eq!(
            Length::of(text),
            Length {
                bytes,
                extent: Point::new(row, column)
            }
        );
    }

    #[test]
    fn test_add_matches_concatenation() {
        let (a, b) = ("one\ntw", "o\nthree");
        assert_eq!(Length::of(a) + Length::of(b), Length::of("one\ntwo\nthree"));
        assert_eq!(Length::of("ab") + Length::of("cd"), Length::of("abcd"));
    }

    #[test]
    fn test_sub_inverts_add() {
        let whole = Length::of("one\ntwo\nthree");
        let head = Length::of("one\ntw");
        assert_eq!(whole - head, Length::of("o\nthree"));
    }

    #[test]
    fn test_saturating_sub() {
        assert_eq!(Length::of("ab").saturating_sub(Length::of("abc")), Length::ZERO);
        assert_eq!(Length::of("ab").saturating_sub(Length::of("ab")), Length::ZERO);
    }
}
