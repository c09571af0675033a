//! Voice matching: pick a platform voice for an utterance.

use crate::catalog::base_subtag;
use crate::speech::platform::Voice;

/// Resolve the voice for an utterance.
///
/// Candidates are tried in order and the first hit wins:
/// 1. the user's explicit selection, if the platform still reports it
/// 2. a voice whose tag equals `lang` exactly
/// 3. a voice whose tag shares `lang`'s base subtag (`"es"` ~ `"es-MX"`)
///
/// `None` means "use the platform default".
#[must_use]
pub fn resolve_voice<'a>(
    voices: &'a [Voice],
    selected_uri: Option<&str>,
    lang: Option<&str>,
) -> Option<&'a Voice> {
    let predicates: [&dyn Fn(&Voice) -> bool; 3] = [
        &|v: &Voice| selected_uri.is_some_and(|uri| v.uri == uri),
        &|v: &Voice| lang.is_some_and(|tag| v.lang.eq_ignore_ascii_case(tag)),
        &|v: &Voice| lang.is_some_and(|tag| same_base(&v.lang, tag)),
    ];
    predicates
        .iter()
        .find_map(|matches| voices.iter().find(|&v| matches(v)))
}

/// Voices whose tag shares the base subtag of `lang`, in platform order.
#[must_use]
pub fn voices_for_language<'a>(voices: &'a [Voice], lang: Option<&str>) -> Vec<&'a Voice> {
    let Some(tag) = lang else {
        return Vec::new();
    };
    voices.iter().filter(|v| same_base(&v.lang, tag)).collect()
}

fn same_base(a: &str, b: &str) -> bool {
    base_subtag(a).eq_ignore_ascii_case(base_subtag(b))
}
