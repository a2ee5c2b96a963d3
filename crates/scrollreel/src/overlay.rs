//! Synthetic browser-window chrome.
//!
//! The overlay is a fixed top bar (window controls, centred title, address
//! field with a lock glyph) plus thin borders on the remaining edges. The
//! page's own content is padded by exactly the bar height and border width,
//! so nothing real is hidden underneath. Padding does not move
//! `position:fixed` elements, so the injection script also translates the
//! ones that start under the bar down by the bar height. Sticky elements
//! and fixed elements created after injection are left alone.
//!
//! Rendering is a pure function of the title, display URL and geometry:
//! the same inputs always produce byte-identical CSS and markup.

use crate::settings::ChromeGeometry;
use serde::{Deserialize, Serialize};

/// Element id of the overlay root, used to replace a previous injection
pub const OVERLAY_ID: &str = "scrollreel-chrome";

/// Element id of the injected style sheet
pub const STYLE_ID: &str = "scrollreel-chrome-style";

/// Text shown in the fake window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    /// Title bar text
    pub title: String,
    /// Address field text
    pub display_url: String,
}

/// Style rules and markup ready for injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayAssets {
    /// Contents of a `<style>` element
    pub css: String,
    /// Markup fragment appended to `<body>`
    pub html: String,
    /// Height of the top bar in pixels
    pub bar_height: u32,
}

impl Overlay {
    /// Create an overlay descriptor
    #[must_use]
    pub fn new(title: impl Into<String>, display_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            display_url: display_url.into(),
        }
    }

    /// Render the style rules and markup for the given geometry
    #[must_use]
    pub fn render(&self, geometry: &ChromeGeometry) -> OverlayAssets {
        OverlayAssets {
            css: render_css(geometry),
            html: render_html(&self.title, &self.display_url),
            bar_height: geometry.bar_height,
        }
    }
}

fn render_css(geometry: &ChromeGeometry) -> String {
    let bar = geometry.bar_height;
    let border = geometry.border_width;
    let title_row = bar * 2 / 5;
    let address_row = bar - title_row;
    let field_height = address_row.saturating_sub(12).max(1);

    let mut css = String::new();
    css.push_str(&format!(
        "html{{padding:{bar}px {border}px {border}px {border}px!important;\
box-sizing:border-box!important;background:#fff;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID}{{position:fixed;inset:0;pointer-events:none;z-index:2147483647;\
font:13px/1.2 -apple-system,BlinkMacSystemFont,\"Segoe UI\",Roboto,Helvetica,Arial,sans-serif;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-bar{{position:absolute;top:0;left:0;right:0;height:{bar}px;\
background:#e8e8e8;border-bottom:1px solid #c8c8c8;box-sizing:border-box;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-title-row{{position:relative;height:{title_row}px;\
display:flex;align-items:center;justify-content:center;color:#333;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-controls{{position:absolute;left:12px;top:0;height:{title_row}px;\
display:flex;align-items:center;gap:8px;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-dot{{width:12px;height:12px;border-radius:50%;display:inline-block;}}\n\
#{OVERLAY_ID} .sr-close{{background:#ff5f57;}}\n\
#{OVERLAY_ID} .sr-min{{background:#febc2e;}}\n\
#{OVERLAY_ID} .sr-max{{background:#28c840;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-title{{max-width:70%;overflow:hidden;white-space:nowrap;\
text-overflow:ellipsis;font-weight:600;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-address-row{{height:{address_row}px;display:flex;\
align-items:center;padding:0 12px;box-sizing:border-box;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-address{{flex:1;height:{field_height}px;border-radius:{radius}px;\
background:#fff;border:1px solid #d0d0d0;display:flex;align-items:center;gap:6px;\
padding:0 10px;box-sizing:border-box;color:#555;overflow:hidden;white-space:nowrap;}}\n",
        radius = field_height / 2
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-lock{{color:#777;font-size:11px;}}\n\
#{OVERLAY_ID} .sr-url{{overflow:hidden;text-overflow:ellipsis;}}\n"
    ));
    css.push_str(&format!(
        "#{OVERLAY_ID} .sr-edge{{position:absolute;background:#c8c8c8;}}\n\
#{OVERLAY_ID} .sr-left{{top:{bar}px;bottom:0;left:0;width:{border}px;}}\n\
#{OVERLAY_ID} .sr-right{{top:{bar}px;bottom:0;right:0;width:{border}px;}}\n\
#{OVERLAY_ID} .sr-bottom{{left:0;right:0;bottom:0;height:{border}px;}}\n"
    ));
    css
}

fn render_html(title: &str, display_url: &str) -> String {
    format!(
        "<div id=\"{OVERLAY_ID}\" aria-hidden=\"true\">\
<div class=\"sr-bar\">\
<div class=\"sr-title-row\">\
<div class=\"sr-controls\"><span class=\"sr-dot sr-close\"></span>\
<span class=\"sr-dot sr-min\"></span><span class=\"sr-dot sr-max\"></span></div>\
<div class=\"sr-title\">{title}</div>\
</div>\
<div class=\"sr-address-row\"><div class=\"sr-address\">\
<span class=\"sr-lock\">&#128274;</span><span class=\"sr-url\">{url}</span>\
</div></div>\
</div>\
<div class=\"sr-edge sr-left\"></div>\
<div class=\"sr-edge sr-right\"></div>\
<div class=\"sr-edge sr-bottom\"></div>\
</div>",
        title = escape_html(title),
        url = escape_html(display_url),
    )
}

/// Escape text for embedding in markup or a quoted attribute
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Address-field text for a URL: scheme and a lone trailing slash removed
#[must_use]
pub fn display_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let without_slash = without_scheme.strip_suffix('/').unwrap_or(without_scheme);
    if without_slash.is_empty() {
        trimmed.to_string()
    } else {
        without_slash.to_string()
    }
}

/// Attribute marking a fixed page element already moved below the bar
pub const SHIFTED_ATTR: &str = "data-scrollreel-shifted";

/// Page-side script that installs the overlay, replacing any earlier copy
///
/// Both strings travel as JSON string literals, so no markup or quote in
/// them can break out of the script. Fixed page elements whose top edge
/// is under the bar are translated down once; nested ones move with their
/// shifted ancestor.
pub fn injection_script(assets: &OverlayAssets) -> serde_json::Result<String> {
    let css = serde_json::to_string(&assets.css)?;
    let html = serde_json::to_string(&assets.html)?;
    let overlay_id = serde_json::to_string(OVERLAY_ID)?;
    let style_id = serde_json::to_string(STYLE_ID)?;
    let shifted = serde_json::to_string(SHIFTED_ATTR)?;
    let bar = assets.bar_height;
    Ok(format!(
        "(() => {{\
for (const id of [{overlay_id}, {style_id}]) {{ const old = document.getElementById(id); if (old) old.remove(); }}\
const style = document.createElement('style');\
style.id = {style_id};\
style.textContent = {css};\
(document.head || document.documentElement).appendChild(style);\
const holder = document.createElement('div');\
holder.innerHTML = {html};\
const overlay = holder.firstElementChild;\
(document.body || document.documentElement).appendChild(overlay);\
for (const el of (document.body ? document.body.querySelectorAll('*') : [])) {{\
if (overlay.contains(el) || el.hasAttribute({shifted})) continue;\
if (el.parentElement && el.parentElement.closest('[' + {shifted} + ']')) continue;\
if (getComputedStyle(el).position !== 'fixed') continue;\
if (el.getBoundingClientRect().top >= {bar}) continue;\
el.setAttribute({shifted}, '');\
el.style.setProperty('translate', '0 {bar}px', 'important');\
}}\
return true;\
}})()"
    ))
}
