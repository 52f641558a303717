//! Embed rendering and duplicate detection over rendered document bodies.

use regex::Regex;

const CARD_BEGIN: &str = "<!--kg-card-begin: html-->";
const CARD_END: &str = "<!--kg-card-end: html-->";

/// Render the embed block for a canonical post URL.
///
/// The block is wrapped in Ghost HTML-card markers so the Admin API keeps it as a single
/// card when converting HTML into its editor format.
pub fn render_embed(canonical_url: &str) -> String {
    let safe_url = escape_html_attribute(canonical_url);
    [
        CARD_BEGIN.to_string(),
        format!(r#"<blockquote class="twitter-tweet"><a href="{safe_url}">{safe_url}</a></blockquote>"#),
        CARD_END.to_string(),
    ]
    .join("\n")
}

/// Whether `html` already references `post_id` as a `status/{id}` path.
///
/// The id must be followed by an ASCII word boundary or one of `/ ? #`, so `status/123`
/// is never found inside `status/1234`. Non-ASCII letters count as non-word characters,
/// so `status/42é` still holds post `42`.
pub fn contains_post(html: Option<&str>, post_id: &str) -> bool {
    let html = match html {
        Some(html) if !html.is_empty() => html,
        _ => return false,
    };

    let pattern = format!(r"(?i)status/{}(?:(?-u:\b)|[/?#])", regex::escape(post_id));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(html),
        Err(error) => {
            tracing::error!(%error, post_id, "Failed to build post id pattern");
            false
        }
    }
}

/// Append `embed` to an existing body, separated by one blank line.
///
/// Trailing whitespace of the existing body is dropped first so repeated appends never
/// pile up blank lines. A blank body is replaced by the embed.
pub fn append_embed(existing: &str, embed: &str) -> String {
    if existing.trim().is_empty() {
        return embed.to_string();
    }
    format!("{}\n\n{}", existing.trim_end(), embed)
}

pub fn escape_html_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
