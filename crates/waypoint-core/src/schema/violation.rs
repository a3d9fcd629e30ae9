//! Schema violations and the field paths that locate them.

use std::fmt;

use serde::Serialize;

/// Rendered path of the document root.
pub const ROOT_PATH: &str = "<root>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A location inside a JSON document, rendered as `milestones[2].title`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// A copy of this path extended by one key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push_key(key);
        path
    }

    /// A copy of this path extended by one array index.
    pub fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push_index(index);
        path
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(ROOT_PATH);
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// One way in which a payload fails its stage contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field path such as `questions[0].questionType`.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl Violation {
    pub fn new(path: &FieldPath, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Join violations into a single `path: message; path: message` line.
pub fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_renders_root() {
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn nested_path_rendering() {
        let path = FieldPath::root().key("milestones").index(2).key("title");
        assert_eq!(path.to_string(), "milestones[2].title");
    }

    #[test]
    fn push_and_pop() {
        let mut path = FieldPath::root();
        path.push_key("tasks");
        path.push_index(0);
        path.push_key("day");
        path.pop();
        assert_eq!(path.to_string(), "tasks[0]");
    }

    #[test]
    fn format_joins_with_semicolons() {
        let a = Violation::new(&FieldPath::root().key("a"), "bad");
        let b = Violation::new(&FieldPath::root(), "worse");
        assert_eq!(format_violations(&[a, b]), "a: bad; <root>: worse");
    }
}
