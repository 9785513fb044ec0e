use crate::QuillConfig;
use crate::defaults;
use lol_html::{RewriteStrSettings, doc_comments, element, rewrite_str};
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

fn data_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data-[\-\w.\u{00B7}-\u{FFFF}]+$").expect("valid regex"))
}

fn aria_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^aria-[\-\w]+$").expect("valid regex"))
}

fn attr_whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\u{0000}-\u{0020}\u{00A0}\u{1680}\u{180E}\u{2000}-\u{2029}\u{205F}\u{3000}]")
            .expect("valid regex")
    })
}

fn allowed_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?:(?:f|ht)tps?|mailto|tel|callto|sms|cid|xmpp):|[^a-z]|[a-z+.\-]+(?:[^a-z+.\-:]|$))")
            .expect("valid regex")
    })
}

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Tag and attribute allow-lists applied by [`sanitize_html_with`].
///
/// Option names in [`SanitizeProfile::with_config`] follow DOMPurify (`ALLOWED_TAGS`,
/// `ADD_ATTR`, `KEEP_CONTENT`, ...). Whatever a profile allows, `<script>` elements and `on*`
/// attributes never survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeProfile {
    allowed_tags: HashSet<String>,
    allowed_attr: HashSet<String>,
    uri_safe_attr: HashSet<String>,
    forbid_tags: HashSet<String>,
    forbid_attr: HashSet<String>,
    forbid_contents: HashSet<String>,
    allow_data_attr: bool,
    allow_aria_attr: bool,
    keep_content: bool,
}

impl SanitizeProfile {
    fn from_lists(tags: &[&str], attrs: &[&str]) -> Self {
        Self {
            allowed_tags: to_set(tags),
            allowed_attr: to_set(attrs),
            uri_safe_attr: to_set(defaults::URI_SAFE_ATTRIBUTES),
            forbid_tags: HashSet::new(),
            forbid_attr: HashSet::new(),
            forbid_contents: to_set(defaults::FORBID_CONTENTS),
            allow_data_attr: false,
            allow_aria_attr: false,
            keep_content: true,
        }
    }

    /// Rich text for user content: paragraphs, inline formatting, links, lists, headings, code.
    pub fn strict() -> Self {
        Self::from_lists(defaults::STRICT_ALLOWED_TAGS, defaults::STRICT_ALLOWED_ATTR)
    }

    /// `b`, `i`, `em`, `strong`, `br`, `p` and no attributes at all.
    pub fn minimal() -> Self {
        Self::from_lists(defaults::MINIMAL_ALLOWED_TAGS, &[])
    }

    /// Same allow-lists as [`SanitizeProfile::strict`]; kept as a separate name for call sites
    /// rendering link-bearing text.
    pub fn link_safe() -> Self {
        Self::strict()
    }

    /// No tags at all. Text content is kept.
    pub fn text_only() -> Self {
        Self::from_lists(&[], &[])
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        let lc = tag.to_ascii_lowercase();
        self.allowed_tags.contains(&lc) && !self.forbid_tags.contains(&lc)
    }

    pub fn allows_attr(&self, name: &str) -> bool {
        let lc = name.to_ascii_lowercase();
        self.allowed_attr.contains(&lc) && !self.forbid_attr.contains(&lc)
    }

    /// Layers the DOMPurify-style options found under `key` (e.g. `"sanitize.strict"`) over
    /// this profile. Missing keys leave the profile unchanged.
    pub fn with_config(mut self, config: &QuillConfig, key: &str) -> Self {
        if config.get(key).and_then(|v| v.as_object()).is_none() {
            return self;
        }
        let opt = |name: &str| format!("{key}.{name}");

        if let Some(tags) = config.get_str_list(&opt("ALLOWED_TAGS")) {
            self.allowed_tags = tags.into_iter().collect();
        }
        for t in config.get_str_list(&opt("ADD_TAGS")).unwrap_or_default() {
            self.allowed_tags.insert(t);
        }
        for t in config.get_str_list(&opt("FORBID_TAGS")).unwrap_or_default() {
            self.forbid_tags.insert(t);
        }

        if let Some(attrs) = config.get_str_list(&opt("ALLOWED_ATTR")) {
            self.allowed_attr = attrs.into_iter().collect();
        }
        for a in config.get_str_list(&opt("ADD_ATTR")).unwrap_or_default() {
            self.allowed_attr.insert(a);
        }
        for a in config.get_str_list(&opt("FORBID_ATTR")).unwrap_or_default() {
            self.forbid_attr.insert(a);
        }
        for a in config
            .get_str_list(&opt("ADD_URI_SAFE_ATTR"))
            .unwrap_or_default()
        {
            self.uri_safe_attr.insert(a);
        }

        if let Some(v) = config.get_bool(&opt("ALLOW_DATA_ATTR")) {
            self.allow_data_attr = v;
        }
        if let Some(v) = config.get_bool(&opt("ALLOW_ARIA_ATTR")) {
            self.allow_aria_attr = v;
        }
        if let Some(v) = config.get_bool(&opt("KEEP_CONTENT")) {
            self.keep_content = v;
        }

        tracing::debug!(
            key,
            tags = self.allowed_tags.len(),
            attrs = self.allowed_attr.len(),
            "applied sanitize profile overrides"
        );
        self
    }

    /// `raw` is the end tag after `</`, up to and including its `>`.
    fn keeps_end_tag(&self, raw: &str) -> bool {
        let name = raw
            .split(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name != "script"
            && self.allows_tag(&name)
    }

    fn is_valid_attribute(&self, lc_name: &str, value: &str) -> bool {
        if is_event_handler_attr(lc_name) {
            return false;
        }

        if self.allow_data_attr
            && !self.forbid_attr.contains(lc_name)
            && data_attr_regex().is_match(lc_name)
        {
            return true;
        }

        if self.allow_aria_attr && aria_attr_regex().is_match(lc_name) {
            return true;
        }

        if !self.allowed_attr.contains(lc_name) || self.forbid_attr.contains(lc_name) {
            return false;
        }

        if self.uri_safe_attr.contains(lc_name) {
            return true;
        }

        // Values arrive raw from the tokenizer; validate what a browser would see.
        let decoded = htmlize::unescape(value);
        let value_no_ws = attr_whitespace_regex().replace_all(&decoded, "");

        if allowed_uri_regex().is_match(&value_no_ws) {
            return true;
        }

        value.is_empty()
    }
}

fn is_event_handler_attr(lc_name: &str) -> bool {
    lc_name.len() > 2 && lc_name.starts_with("on")
}

fn strict_profile() -> &'static SanitizeProfile {
    static PROFILE: OnceLock<SanitizeProfile> = OnceLock::new();
    PROFILE.get_or_init(SanitizeProfile::strict)
}

fn minimal_profile() -> &'static SanitizeProfile {
    static PROFILE: OnceLock<SanitizeProfile> = OnceLock::new();
    PROFILE.get_or_init(SanitizeProfile::minimal)
}

pub(crate) fn text_only_profile() -> &'static SanitizeProfile {
    static PROFILE: OnceLock<SanitizeProfile> = OnceLock::new();
    PROFILE.get_or_init(SanitizeProfile::text_only)
}

/// Whether the byte after a `<` makes it the start of markup rather than text.
fn starts_tag(next: Option<u8>) -> bool {
    let next = next.unwrap_or(b' ');
    next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?')
}

/// `lol_html` rejects some fragments a browser would accept: a `<` that does not start a tag
/// (`"a < b"`, `"<3"`). Browsers treat those as text, so escape them before rewriting.
fn escape_stray_lt(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let first_stray =
        (0..bytes.len()).find(|&i| bytes[i] == b'<' && !starts_tag(bytes.get(i + 1).copied()));
    let Some(first) = first_stray else {
        return Cow::Borrowed(input);
    };

    let mut out = String::with_capacity(input.len() + 8);
    out.push_str(&input[..first]);
    let mut last = first;
    for i in first..bytes.len() {
        if bytes[i] == b'<' && !starts_tag(bytes.get(i + 1).copied()) {
            out.push_str(&input[last..i]);
            out.push_str("&lt;");
            last = i + 1;
        }
    }
    out.push_str(&input[last..]);
    Cow::Owned(out)
}

/// Byte offset just past the markup construct opening at `start`, or `None` when the input
/// ends first. Quoted attribute values may contain `>`.
fn markup_end(html: &str, start: usize) -> Option<usize> {
    let bytes = html.as_bytes();
    let rest = &html[start..];

    if let Some(body) = rest.strip_prefix("<!--") {
        if body.starts_with('>') {
            return Some(start + 5);
        }
        if body.starts_with("->") {
            return Some(start + 6);
        }
        return body.find("-->").map(|i| start + 4 + i + 3);
    }
    if matches!(bytes.get(start + 1), Some(b'!' | b'?')) {
        return rest.find('>').map(|i| start + i + 1);
    }

    let mut i = start + 1;
    let mut value_next = false;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some(i + 1),
            b'=' => value_next = true,
            q @ (b'"' | b'\'') if value_next => {
                let close = bytes[i + 1..].iter().position(|&b| b == q)?;
                i += close + 1;
                value_next = false;
            }
            b if b.is_ascii_whitespace() => {}
            _ => value_next = false,
        }
        i += 1;
    }
    None
}

/// Second pass over the rewriter's output. `lol_html` only reports start tags of elements it
/// finished parsing, so three kinds of markup reach the output untouched: a construct cut off
/// by the end of input, end tags without a start tag, and bogus comments (`<![CDATA[`, `<?`).
/// The first drops everything from its `<` on; the others are dropped unless they are end tags
/// of allowed elements.
fn drop_leftover_markup<'a>(html: &'a str, profile: &SanitizeProfile) -> Cow<'a, str> {
    let bytes = html.as_bytes();
    let mut out = String::new();
    let mut last = 0;
    let mut i = 0;

    while let Some(off) = html[i..].find('<') {
        let start = i + off;
        let next = bytes.get(start + 1).copied();
        if !starts_tag(next) {
            i = start + 1;
            continue;
        }

        let Some(end) = markup_end(html, start) else {
            tracing::debug!(offset = start, "dropping unterminated markup at end of input");
            out.push_str(&html[last..start]);
            last = html.len();
            break;
        };

        let keep = match next {
            Some(b'/') => profile.keeps_end_tag(&html[start + 2..end]),
            Some(b'!' | b'?') => false,
            _ => true,
        };
        if !keep {
            out.push_str(&html[last..start]);
            last = end;
        }
        i = end;
    }

    if last == 0 {
        return Cow::Borrowed(html);
    }
    out.push_str(&html[last..]);
    Cow::Owned(out)
}

/// Maximal stripping for input the rewriter could not handle: every tag delimiter becomes text.
fn escape_as_text(input: &str) -> String {
    input.replace('<', "&lt;").replace('>', "&gt;")
}

fn normalize_nbsp(input: String) -> String {
    if !input.contains("&nbsp;") && !input.contains('\u{00A0}') {
        return input;
    }
    input.replace("&nbsp;", " ").replace('\u{00A0}', " ")
}

fn rewrite(text: &str, profile: &SanitizeProfile) -> String {
    let text = escape_stray_lt(text);

    let handlers = vec![element!("*", |el| {
        let lc_tag = el.tag_name().to_ascii_lowercase();

        if lc_tag == "script" {
            el.remove();
            return Ok(());
        }

        if !profile.allowed_tags.contains(&lc_tag) || profile.forbid_tags.contains(&lc_tag) {
            if profile.keep_content && !profile.forbid_contents.contains(&lc_tag) {
                el.remove_and_keep_content();
            } else {
                el.remove();
            }
            return Ok(());
        }

        let attrs: Vec<(String, String)> = el
            .attributes()
            .iter()
            .map(|a| (a.name(), a.value()))
            .collect();

        for (name, value) in attrs {
            let lc_name = name.to_ascii_lowercase();
            if !profile.is_valid_attribute(&lc_name, &value) {
                el.remove_attribute(&name);
            }
        }

        Ok(())
    })];

    let result = rewrite_str(
        text.as_ref(),
        RewriteStrSettings {
            element_content_handlers: handlers,
            document_content_handlers: vec![doc_comments!(|c| {
                c.remove();
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    );

    match result {
        Ok(out) => match drop_leftover_markup(&out, profile) {
            Cow::Borrowed(_) => out,
            Cow::Owned(cleaned) => cleaned,
        },
        Err(err) => {
            tracing::warn!(error = %err, "html rewrite failed; escaping input as plain text");
            escape_as_text(text.as_ref())
        }
    }
}

/// Sanitizes `html` with the strict profile.
///
/// ```
/// use quill_core::sanitize::sanitize_html;
///
/// let out = sanitize_html(r#"<p onclick="x()">Hi<script>bad()</script></p>"#);
/// assert_eq!(out, "<p>Hi</p>");
/// ```
pub fn sanitize_html(html: &str) -> String {
    sanitize_html_with(html, strict_profile())
}

/// Sanitizes `html` against `profile`, then turns every `&nbsp;` into a plain space.
///
/// Never fails: input the HTML rewriter cannot process is escaped and returned as text.
pub fn sanitize_html_with(html: &str, profile: &SanitizeProfile) -> String {
    if html.is_empty() {
        return String::new();
    }

    let cleaned = if html.contains('<') {
        rewrite(html, profile)
    } else {
        html.to_string()
    };
    normalize_nbsp(cleaned)
}

/// Sanitizes with the minimal profile. Meant for comments and short text inputs.
pub fn sanitize_minimal(html: &str) -> String {
    sanitize_html_with(html, minimal_profile())
}

/// Strict sanitization for markup that is rendered with its structure intact. `&nbsp;` is
/// already a plain space in everything [`sanitize_html_with`] returns.
pub fn clean_html_for_display(html: &str) -> String {
    sanitize_html(html)
}

/// Markup that has been through the strict sanitizer.
///
/// Serializes as `{"__html": "..."}`, the shape front-ends pass to raw-markup props.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeHtml {
    #[serde(rename = "__html")]
    html: String,
}

impl SafeHtml {
    pub fn new(html: &str) -> Self {
        Self {
            html: sanitize_html(html),
        }
    }

    pub fn with_profile(html: &str, profile: &SanitizeProfile) -> Self {
        Self {
            html: sanitize_html_with(html, profile),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }
}

impl std::fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.html)
    }
}

pub fn create_safe_html(html: &str) -> SafeHtml {
    SafeHtml::new(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_allowed_formatting() {
        let out = sanitize_html("<p>Hello <strong>world</strong></p>");
        assert_eq!(out, "<p>Hello <strong>world</strong></p>");
    }

    #[test]
    fn removes_script_blocks_with_their_content() {
        let out = sanitize_html(r#"<p>Hello</p><script>alert("xss")</script>"#);
        assert_eq!(out, "<p>Hello</p>");

        let out = sanitize_html(r#"a<script src="http://abc.com/x.js"></script>b"#);
        assert_eq!(out, "ab");
    }

    #[test]
    fn removes_event_handlers() {
        let out = sanitize_html(r#"<p onclick="alert(1)" class="lead">Click me</p>"#);
        assert_eq!(out, r#"<p class="lead">Click me</p>"#);
    }

    #[test]
    fn removes_dangerous_hrefs_and_keeps_safe_ones() {
        assert_eq!(
            sanitize_html(r#"<a href="javascript:alert(1)">Click</a>"#),
            "<a>Click</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="JaVaScRiPt:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="java&#x09;script:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="javascript&colon;alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="data:text/html,hi">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="https://pinkquill.com/studio/ada" target="_blank" rel="noopener">Ada</a>"#),
            r#"<a href="https://pinkquill.com/studio/ada" target="_blank" rel="noopener">Ada</a>"#
        );
        assert_eq!(
            sanitize_html(r#"<a href="/post/42">x</a>"#),
            r#"<a href="/post/42">x</a>"#
        );
    }

    #[test]
    fn unwraps_unknown_tags_but_keeps_text() {
        assert_eq!(
            sanitize_html(r#"<custom-tag onclick="alert(1)">x</custom-tag>"#),
            "x"
        );
        assert_eq!(
            sanitize_html(r#"<img src="x.png" onerror="alert(1)"><p>ok</p>"#),
            "<p>ok</p>"
        );
        assert_eq!(sanitize_html("<table><tr><td>cell</td></tr></table>"), "cell");
    }

    #[test]
    fn drops_forbidden_content_containers() {
        assert_eq!(sanitize_html("<style>.x{color:red}</style><b>ok</b>"), "<b>ok</b>");
        assert_eq!(
            sanitize_html(r#"<iframe src="http://example.com/frame"></iframe>after"#),
            "after"
        );
        assert_eq!(
            sanitize_html(r#"<svg><a xlink:href="javascript:alert(1)">x</a></svg>y"#),
            "y"
        );
    }

    #[test]
    fn drops_comments_and_data_attributes() {
        assert_eq!(sanitize_html("<p><!-- hidden -->shown</p>"), "<p>shown</p>");
        assert_eq!(
            sanitize_html(r#"<span data-id="1" aria-label="x" style="color:red">t</span>"#),
            "<span>t</span>"
        );
    }

    #[test]
    fn replaces_nbsp_with_space() {
        assert_eq!(sanitize_html("<p>Hello&nbsp;world</p>"), "<p>Hello world</p>");
        assert_eq!(sanitize_html("Hello\u{00A0}world"), "Hello world");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(sanitize_html(""), "");
        assert_eq!(sanitize_minimal(""), "");
    }

    #[test]
    fn stray_angle_brackets_are_escaped_as_text() {
        assert_eq!(sanitize_html("1 < 2 and <b>bold</b>"), "1 &lt; 2 and <b>bold</b>");
        assert_eq!(sanitize_html("I <3 poems"), "I &lt;3 poems");
    }

    #[test]
    fn minimal_profile_drops_links_and_attributes() {
        let out = sanitize_minimal(
            r#"<p class="x"><a href="https://example.com">link</a> <em>em</em> <u>under</u></p>"#,
        );
        assert_eq!(out, "<p>link <em>em</em> under</p>");
    }

    #[test]
    fn config_overrides_extend_the_strict_profile() {
        let cfg = QuillConfig::from_value(json!({
            "sanitize": { "strict": {
                "ADD_TAGS": ["hr"],
                "FORBID_TAGS": ["h1"],
                "FORBID_ATTR": ["class"],
                "ALLOW_DATA_ATTR": true
            } }
        }));
        let profile = SanitizeProfile::strict().with_config(&cfg, "sanitize.strict");
        assert!(profile.allows_tag("hr"));
        assert!(!profile.allows_tag("h1"));
        assert!(!profile.allows_attr("class"));

        let out = sanitize_html_with(
            r#"<h1 class="t" data-x="1">Title</h1><hr><p class="c" data-y="2">Body</p>"#,
            &profile,
        );
        assert_eq!(out, r#"Title<hr><p data-y="2">Body</p>"#);
    }

    #[test]
    fn config_cannot_reenable_scripts_or_event_handlers() {
        let cfg = QuillConfig::from_value(json!({
            "sanitize": { "strict": { "ADD_TAGS": ["script"], "ADD_ATTR": ["onclick"] } }
        }));
        let profile = SanitizeProfile::strict().with_config(&cfg, "sanitize.strict");
        let out = sanitize_html_with(
            r#"<b onclick="alert(1)">ok</b><script>alert(2)</script>"#,
            &profile,
        );
        assert_eq!(out, "<b>ok</b>");
    }

    #[test]
    fn keep_content_false_removes_unknown_element_text() {
        let cfg = QuillConfig::from_value(json!({
            "sanitize": { "strict": { "KEEP_CONTENT": false } }
        }));
        let profile = SanitizeProfile::strict().with_config(&cfg, "sanitize.strict");
        assert_eq!(sanitize_html_with("<custom-tag>x</custom-tag>y", &profile), "y");
    }

    #[test]
    fn safe_html_wraps_sanitized_markup() {
        let safe = create_safe_html("<p>Hello</p>");
        assert_eq!(safe.as_str(), "<p>Hello</p>");

        let safe = create_safe_html(r#"<p onclick="alert(1)">Click</p>"#);
        assert!(!safe.as_str().contains("onclick"));
        assert_eq!(
            serde_json::to_value(&safe).unwrap(),
            json!({ "__html": "<p>Click</p>" })
        );
    }

    #[test]
    fn unterminated_tag_at_end_of_input_is_dropped() {
        assert_eq!(
            sanitize_html("<p>ok</p><img src=x onerror=alert(1)"),
            "<p>ok</p>"
        );
        assert_eq!(sanitize_minimal(r#"<a href="javascript:alert(1)""#), "");
        assert_eq!(sanitize_html(r#"<p>a</p><a title="x>y" onclick="z"#), "<p>a</p>");
        assert_eq!(sanitize_html("text <!-- never closed <b>x</b>"), "text ");
    }

    #[test]
    fn quoted_angle_brackets_do_not_end_a_tag() {
        assert_eq!(
            sanitize_html(r#"<p class="a>b">x</p>"#),
            r#"<p class="a>b">x</p>"#
        );
    }

    #[test]
    fn end_tags_without_start_tags_are_removed() {
        assert_eq!(sanitize_minimal("x</iframe></script></textarea>y"), "xy");
        assert_eq!(sanitize_html("a</div >b</SCRIPT>c"), "a</div >bc");
        assert_eq!(sanitize_html_with("a</div>b", &SanitizeProfile::text_only()), "ab");
    }

    #[test]
    fn bogus_comments_leave_no_markup_behind() {
        assert_eq!(
            sanitize_html("<![CDATA[<script>alert(1)</script>]]>"),
            "alert(1)]]>"
        );
        assert_eq!(sanitize_html("a<?php echo 1 ?>b"), "ab");
    }

    #[test]
    fn display_cleaning_matches_strict_sanitizing() {
        let html = "<p onclick=\"x()\">a&nbsp;b</p>";
        assert_eq!(clean_html_for_display(html), "<p>a b</p>");
        assert_eq!(clean_html_for_display(html), sanitize_html(html));
    }

    #[test]
    fn escape_as_text_neutralises_every_tag() {
        assert_eq!(escape_as_text("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
    }
}
