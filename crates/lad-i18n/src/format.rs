//! Positional phrase formatting (`%s`, `%d`, `%%`)

use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%[sd%]").expect("placeholder pattern is valid"))
}

/// Replace `%s` / `%d` with `args` in order.
///
/// Placeholders without a matching argument are kept verbatim; `%%` renders
/// a literal percent sign.
pub fn format_phrase(template: &str, args: &[&str]) -> String {
    if !template.contains('%') {
        return template.to_string();
    }

    let mut next = args.iter();
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            let token = &caps[0];
            if token == "%%" {
                return "%".to_string();
            }
            match next.next() {
                Some(arg) => (*arg).to_string(),
                None => token.to_string(),
            }
        })
        .into_owned()
}
