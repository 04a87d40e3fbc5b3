//! `${name}` placeholder substitution in OOXML templates.
//!
//! Presentation templates keep their slides in `ppt/slides/slideN.xml`.
//! [`PlaceholderSelector`] plugs into [`modify_zip`](crate::zip::modify_zip)
//! to rewrite those entries while the rest of the package streams through.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::error::ZipError;
use crate::zip::{Replacement, Selection, Selector};

/// Whether `name` is a slide of a presentation package (`ppt/slides/slide<N>.xml`).
pub fn is_slide_entry(name: &str) -> bool {
    name.strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|number| !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()))
}

/// `${name}`; names do not span lines.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}\n]*)\}").expect("placeholder pattern compiles"));

/// Replace every `${name}` whose name is in `vars`. Unknown placeholders are
/// left as they are.
pub fn substitute_placeholders(text: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of all placeholders in `text`, sorted, duplicates removed.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Progress of a [`PlaceholderSelector`], readable while the stream runs
#[derive(Debug, Default)]
pub struct PatchReport {
    patched: AtomicUsize,
    finished: AtomicBool,
}

impl PatchReport {
    /// Entries rewritten so far
    pub fn patched(&self) -> usize {
        self.patched.load(Ordering::Acquire)
    }

    /// Whether the selector has seen the end of the archive
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

type EntryFilter = Box<dyn Fn(&str) -> bool + Send>;

/// Selector capturing template entries and filling in their placeholders.
pub struct PlaceholderSelector {
    vars: Arc<HashMap<String, String>>,
    filter: EntryFilter,
    report: Arc<PatchReport>,
}

impl PlaceholderSelector {
    /// Patch slide entries with `vars`
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self {
            vars: Arc::new(vars),
            filter: Box::new(is_slide_entry),
            report: Arc::default(),
        }
    }

    /// Patch the entries matching `filter` instead of slides
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        self.filter = Box::new(filter);
        self
    }

    pub fn report(&self) -> Arc<PatchReport> {
        self.report.clone()
    }
}

impl Selector for PlaceholderSelector {
    fn select(&mut self, name: Option<&str>) -> Selection {
        let Some(name) = name else {
            self.report.finished.store(true, Ordering::Release);
            return Selection::Passthrough;
        };
        if !(self.filter)(name) {
            return Selection::Passthrough;
        }

        let vars = self.vars.clone();
        let report = self.report.clone();
        let name = name.to_string();
        Selection::capture(move |data| {
            let text = String::from_utf8(data).map_err(|_| ZipError::InvalidText(name.clone()))?;
            let unresolved: Vec<_> = placeholder_names(&text)
                .into_iter()
                .filter(|n| !vars.contains_key(n))
                .collect();
            if !unresolved.is_empty() {
                debug!(entry = %name, ?unresolved, "placeholders left in place");
            }
            report.patched.fetch_add(1, Ordering::AcqRel);
            Ok(Replacement::Text(substitute_placeholders(&text, &vars)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn recognises_slides() {
        assert!(is_slide_entry("ppt/slides/slide1.xml"));
        assert!(is_slide_entry("ppt/slides/slide12.xml"));
        assert!(!is_slide_entry("ppt/slides/slide.xml"));
        assert!(!is_slide_entry("ppt/slides/slideA.xml"));
        assert!(!is_slide_entry("ppt/slides/_rels/slide1.xml.rels"));
        assert!(!is_slide_entry("ppt/slideLayouts/slideLayout1.xml"));
    }

    #[test]
    fn substitutes_known_placeholders() {
        let vars = vars(&[("placeholder", "wasabi donut"), ("x", "1")]);
        assert_eq!(
            substitute_placeholders("I like ${placeholder}!", &vars),
            "I like wasabi donut!"
        );
        assert_eq!(substitute_placeholders("${x}${x}${y}", &vars), "11${y}");
        assert_eq!(substitute_placeholders("$ {x} ${x", &vars), "$ {x} ${x");
        assert_eq!(substitute_placeholders("${x\n} ${x}", &vars), "${x\n} 1");
        assert_eq!(substitute_placeholders("żółw ${x} ąę", &vars), "żółw 1 ąę");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let vars = vars(&[("a", "${b}"), ("b", "never")]);
        assert_eq!(substitute_placeholders("${a} and ${b}", &vars), "${b} and never");
        assert_eq!(substitute_placeholders("${}${a}", &vars), "${}${b}");
        assert_eq!(placeholder_names("${a}${}"), vec!["", "a"]);
    }

    #[test]
    fn lists_placeholder_names() {
        assert_eq!(
            placeholder_names("${b} ${a} ${b} ${tab_1_line_2}"),
            vec!["a", "b", "tab_1_line_2"]
        );
        assert!(placeholder_names("nothing here").is_empty());
    }

    #[test]
    fn selector_captures_slides_and_reports() {
        let mut selector = PlaceholderSelector::new(vars(&[("name", "World")]));
        let report = selector.report();

        assert!(matches!(
            selector.select(Some("ppt/presentation.xml")),
            Selection::Passthrough
        ));
        let Selection::Capture(transform) = selector.select(Some("ppt/slides/slide1.xml")) else {
            panic!("slide should be captured");
        };
        let out = transform(b"Hello ${name}".to_vec()).unwrap();
        assert_eq!(out, Replacement::Text("Hello World".into()));
        assert_eq!(report.patched(), 1);
        assert!(!report.finished());

        selector.select(None);
        assert!(report.finished());
    }

    #[test]
    fn custom_filter_and_invalid_text() {
        let mut selector = PlaceholderSelector::new(HashMap::new()).with_filter(|n| n.starts_with("word/"));
        assert!(matches!(
            selector.select(Some("ppt/slides/slide1.xml")),
            Selection::Passthrough
        ));
        let Selection::Capture(transform) = selector.select(Some("word/document.xml")) else {
            panic!("document should be captured");
        };
        assert!(matches!(
            transform(vec![0xff, 0xfe]),
            Err(ZipError::InvalidText(name)) if name == "word/document.xml"
        ));
    }
}
