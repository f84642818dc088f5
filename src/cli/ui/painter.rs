use owo_colors::{OwoColorize, Style as OwoStyle};

const PASS_GLYPH: &str = "✔";
const FAIL_GLYPH: &str = "✘";

/// Applies colour and style to terminal text.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().yellow())
    }

    pub(crate) fn failure<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().red())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    /// Check mark for a pass, cross for a failure.
    pub(crate) fn outcome_glyph(&self, passed: bool) -> String {
        if passed {
            self.success(PASS_GLYPH)
        } else {
            self.failure(FAIL_GLYPH)
        }
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn apply(painter: &Painter, style: &str, text: &str) -> String {
        match style {
            "heading" => painter.heading(text),
            "success" => painter.success(text),
            "warning" => painter.warning(text),
            "failure" => painter.failure(text),
            "muted" => painter.muted(text),
            "value" => painter.value(text),
            other => panic!("unknown style: {other}"),
        }
    }

    #[rstest]
    fn plain_returns_unstyled_text(
        #[values("heading", "success", "warning", "failure", "muted", "value")] style: &str,
    ) {
        let painter = Painter::new(false);
        assert_eq!("text", apply(&painter, style, "text"));
    }

    #[rstest]
    fn coloured_wraps_text_in_escape_codes(
        #[values("heading", "success", "warning", "failure", "muted", "value")] style: &str,
    ) {
        let painter = Painter::new(true);
        let styled = apply(&painter, style, "text");
        assert_ne!("text", styled);
        assert!(styled.contains("text"));
    }

    #[rstest]
    #[case(true, "✔")]
    #[case(false, "✘")]
    fn outcome_glyph_marks_pass_and_failure(#[case] passed: bool, #[case] expected: &str) {
        assert_eq!(expected, Painter::new(false).outcome_glyph(passed));
    }
}
