//! `${NAME}` placeholder substitution.
//!
//! Only the braced form is recognised. A placeholder whose variable is unset is
//! left exactly as written, so a missing variable is visible in the resolved
//! document instead of silently becoming an empty string.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::value::ValueTree;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Replace every `${NAME}` in `input` using `lookup`.
///
/// Returns the input unchanged (borrowed) when nothing matched.
pub fn substitute_placeholders<'a, F>(input: &'a str, lookup: &F) -> Cow<'a, str>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_owned())
    })
}

/// Substitute placeholders in every string scalar of `value` using `lookup`.
///
/// Mapping keys, numbers, booleans, and nulls are untouched.
pub fn expand_env_with<F>(value: &mut ValueTree, lookup: &F)
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    value.visit_strings_mut(&mut |s: &mut String| {
        let replaced = match substitute_placeholders(s.as_str(), lookup) {
            Cow::Owned(replaced) => replaced,
            Cow::Borrowed(_) => return,
        };
        *s = replaced;
    });
}

/// Substitute placeholders from the process environment.
pub fn expand_env(value: &mut ValueTree) {
    expand_env_with(value, &|name: &str| std::env::var(name).ok());
}
