//! Reply clean-up: turns LaTeX and markdown emitted by the model into plain
//! text that renders sensibly in a chat bubble.

use once_cell::sync::Lazy;
use regex::Regex;

fn re(pattern: &str) -> Regex {
    // Patterns are literals in this module; failing here is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern:?}: {e}"))
}

static DISPLAY_MATH: Lazy<[Regex; 2]> =
    Lazy::new(|| [re(r"(?s)\\\[(.*?)\\\]"), re(r"(?s)\$\$(.*?)\$\$")]);

static INLINE_MATH: Lazy<[Regex; 2]> = Lazy::new(|| [re(r"\\\((.*?)\\\)"), re(r"\$(.*?)\$")]);

/// A command must come after any longer command it is a prefix of:
/// `\subseteq` before `\subset` (else `⊂eq`), `\int` and `\infty` before
/// `\in` (else `∈t`, `∈fty`). `\notin` has no such constraint.
static SYMBOLS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\\times", "×"),
        (r"\\div", "÷"),
        (r"\\pm", "±"),
        (r"\\mp", "∓"),
        (r"\\leq", "≤"),
        (r"\\geq", "≥"),
        (r"\\neq", "≠"),
        (r"\\approx", "≈"),
        (r"\\infty", "∞"),
        (r"\\sum", "Σ"),
        (r"\\prod", "Π"),
        (r"\\int", "∫"),
        (r"\\partial", "∂"),
        (r"\\alpha", "α"),
        (r"\\beta", "β"),
        (r"\\gamma", "γ"),
        (r"\\Delta", "Δ"),
        (r"\\rightarrow", "→"),
        (r"\\leftarrow", "←"),
        (r"\\Rightarrow", "⇒"),
        (r"\\Leftarrow", "⇐"),
        (r"\\leftrightarrow", "↔"),
        (r"\\Leftrightarrow", "⇔"),
        (r"\\forall", "∀"),
        (r"\\exists", "∃"),
        (r"\\notin", "∉"),
        (r"\\in", "∈"),
        (r"\\subseteq", "⊆"),
        (r"\\subset", "⊂"),
        (r"\\cup", "∪"),
        (r"\\cap", "∩"),
        (r"\\emptyset", "∅"),
        (r"\\nabla", "∇"),
        (r"\\cdot", "·"),
        (r"\\sqrt", "√"),
        (r"\\frac\{(.*?)\}\{(.*?)\}", "${1}/${2}"),
        (r"\\vec\{(.*?)\}", "vector ${1}"),
        (r"\\text\{(.*?)\}", "${1}"),
        (r"\\mathrm\{(.*?)\}", "${1}"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (re(pattern), replacement))
    .collect()
});

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| re(r"\n{3,}"));

static MARKDOWN: Lazy<[Regex; 5]> = Lazy::new(|| {
    [
        re(r"\*\*([^*]+)\*\*"),
        re(r"\*([^*]+)\*"),
        re(r"__([^_]+)__"),
        re(r"_([^_]+)_"),
        re(r"(?m)^#+\s*"),
    ]
});

static STRAY_BACKSLASH: Lazy<Regex> = Lazy::new(|| re(r"\\([^a-zA-Z])"));

/// Normalizes model output for display. Pure and infallible.
pub fn normalize_reply(text: &str) -> String {
    let mut out = text.to_string();

    for pattern in DISPLAY_MATH.iter() {
        out = pattern.replace_all(&out, "\nEquation:\n${1}\n").into_owned();
    }
    for pattern in INLINE_MATH.iter() {
        out = pattern.replace_all(&out, "(${1})").into_owned();
    }
    for (pattern, replacement) in SYMBOLS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }

    out = EXCESS_NEWLINES.replace_all(&out, "\n\n").into_owned();

    let [bold, italic, underline_bold, underline_italic, heading] = &*MARKDOWN;
    for pattern in [bold, italic, underline_bold, underline_italic] {
        out = pattern.replace_all(&out, "${1}").into_owned();
    }
    out = heading.replace_all(&out, "").into_owned();

    out = STRAY_BACKSLASH.replace_all(&out, "${1}").into_owned();

    out.trim().to_string()
}
