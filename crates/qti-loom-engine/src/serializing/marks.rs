use crate::model::{GenericChild, GenericNode, Mark, TextRun};

/// Rebuild formatting elements around a run of sibling text runs.
///
/// Marks nest in [`Mark::ALL`] order, outermost first, and adjacent runs
/// sharing a mark share one element. Empty runs produce nothing.
pub fn wrap(runs: &[&TextRun]) -> Vec<GenericChild> {
    let runs: Vec<&TextRun> = runs
        .iter()
        .copied()
        .filter(|run| !run.text.is_empty())
        .collect();
    wrap_level(&runs, 0)
}

fn wrap_level(runs: &[&TextRun], level: usize) -> Vec<GenericChild> {
    let Some(&mark) = Mark::ALL.get(level) else {
        let text: String = runs.iter().map(|run| run.text.as_str()).collect();
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![GenericChild::Text(text)]
        };
    };

    let mut out = Vec::new();
    for group in runs.chunk_by(|a, b| a.has(mark) == b.has(mark)) {
        let inner = wrap_level(group, level + 1);
        if inner.is_empty() {
            continue;
        }
        if group[0].has(mark) {
            out.push(GenericChild::Node(
                GenericNode::new(mark.tag()).with_children(inner),
            ));
        } else {
            out.extend(inner);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn markup(children: Vec<GenericChild>) -> String {
        GenericNode::new("p").with_children(children).to_xml()
    }

    #[test]
    fn plain_runs_merge_into_one_text() {
        let a = TextRun::new("one ");
        let b = TextRun::new("two");
        assert_eq!(markup(wrap(&[&a, &b])), "<p>one two</p>");
    }

    #[test]
    fn adjacent_marked_runs_share_an_element() {
        let a = TextRun::new("bold ").with_mark(Mark::Bold);
        let b = TextRun::new("both").with_mark(Mark::Bold).with_mark(Mark::Italic);
        let c = TextRun::new(" plain");
        assert_eq!(
            markup(wrap(&[&a, &b, &c])),
            "<p><strong>bold <em>both</em></strong> plain</p>"
        );
    }

    #[test]
    fn nesting_follows_mark_order() {
        let run = TextRun::new("x")
            .with_mark(Mark::Code)
            .with_mark(Mark::Underline)
            .with_mark(Mark::Bold);
        assert_eq!(
            markup(wrap(&[&run])),
            "<p><strong><u><code>x</code></u></strong></p>"
        );
    }

    #[test]
    fn empty_runs_do_not_split_elements() {
        let a = TextRun::new("a").with_mark(Mark::Bold);
        let gap = TextRun::empty();
        let b = TextRun::new("b").with_mark(Mark::Bold);
        assert_eq!(markup(wrap(&[&a, &gap, &b])), "<p><strong>ab</strong></p>");
        assert!(wrap(&[&gap]).is_empty());
    }
}
