use super::Section;

/// Answers "which section contains line L?" in `O(log S)` plus the nesting
/// depth of the sections involved.
///
/// Sections nest, so the innermost section containing a line is wanted. The
/// rightmost section starting at or before the line is the only candidate
/// that can be innermost; if the line lies past its end, its enclosing
/// sections are tried in turn.
#[derive(Debug, Clone)]
pub struct SectionLocator<'s> {
    sections: &'s [Section],
    starts: Vec<usize>,
    ends: Vec<usize>,
    enclosing: Vec<Option<usize>>,
}

impl<'s> SectionLocator<'s> {
    /// Build the lookup tables.  `sections` must be sorted by `start_line`,
    /// as produced by the index builder.
    pub fn new(sections: &'s [Section]) -> Self {
        let starts = sections.iter().map(|s| s.start_line).collect::<Vec<_>>();
        // An unterminated section only arises from hand-built input; treat it
        // as running to the end of the document.
        let ends = sections
            .iter()
            .map(|s| s.end_line.unwrap_or(usize::MAX))
            .collect::<Vec<_>>();

        let mut enclosing = Vec::with_capacity(sections.len());
        let mut stack: Vec<usize> = Vec::new();
        for (ix, section) in sections.iter().enumerate() {
            while let Some(&top) = stack.last() {
                if ends[top] >= section.start_line && sections[top].level < section.level {
                    break;
                }
                stack.pop();
            }
            enclosing.push(stack.last().copied());
            stack.push(ix);
        }

        SectionLocator {
            sections,
            starts,
            ends,
            enclosing,
        }
    }

    /// The innermost section containing `line`, or `None` before the first
    /// heading or in a gap no section covers.
    pub fn section_of(&self, line: usize) -> Option<&'s Section> {
        self.index_of(line).map(|ix| &self.sections[ix])
    }

    /// Like [`SectionLocator::section_of`], returning the position in the
    /// section list.
    pub fn index_of(&self, line: usize) -> Option<usize> {
        let candidate = self.starts.partition_point(|&start| start <= line);
        let mut current = candidate.checked_sub(1);
        while let Some(ix) = current {
            if line <= self.ends[ix] {
                return Some(ix);
            }
            current = self.enclosing[ix];
        }
        None
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether there are no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
