//! Built-in allow-lists and lookup tables.
//!
//! Tag and attribute names are lowercase. The attribute tables follow DOMPurify's defaults so
//! that profiles configured with DOMPurify option names behave the way front-end code expects.

/// Rich-text tags kept by the strict profile.
pub const STRICT_ALLOWED_TAGS: &[&str] = &[
    "p",
    "br",
    "strong",
    "em",
    "b",
    "i",
    "u",
    "s",
    "a",
    "ul",
    "ol",
    "li",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "span",
    "div",
    "pre",
    "code",
];

pub const STRICT_ALLOWED_ATTR: &[&str] = &["href", "target", "rel", "class"];

/// Basic formatting for comments and short inputs.
pub const MINIMAL_ALLOWED_TAGS: &[&str] = &["b", "i", "em", "strong", "br", "p"];

/// Attributes whose values are never treated as URLs.
pub const URI_SAFE_ATTRIBUTES: &[&str] = &[
    "alt",
    "class",
    "for",
    "id",
    "label",
    "name",
    "pattern",
    "placeholder",
    "role",
    "summary",
    "title",
    "value",
    "style",
    "xmlns",
];

/// Elements dropped together with everything inside them, even when content is otherwise kept.
pub const FORBID_CONTENTS: &[&str] = &[
    "annotation-xml",
    "audio",
    "colgroup",
    "desc",
    "embed",
    "foreignobject",
    "head",
    "iframe",
    "math",
    "mi",
    "mn",
    "mo",
    "ms",
    "mtext",
    "noembed",
    "noframes",
    "noscript",
    "object",
    "plaintext",
    "script",
    "select",
    "style",
    "svg",
    "template",
    "textarea",
    "thead",
    "title",
    "video",
    "xmp",
];

/// Schemes rejected by the compatible URL denylist.
pub const DENIED_URL_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:"];

/// Schemes accepted by the URL allowlist policy.
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http:", "https:", "mailto:"];
