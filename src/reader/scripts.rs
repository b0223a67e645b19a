//! In-page scripts evaluated against the reader.
//!
//! Selectors are embedded as JSON string literals so quoting inside them is
//! preserved.

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn count(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        js_string(selector)
    )
}

pub fn exists(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

/// Click the `index`th match; evaluates to false when there is no such match.
pub fn click_nth(selector: &str, index: usize) -> String {
    format!(
        r"(() => {{
            const els = document.querySelectorAll({sel});
            if (els.length <= {index}) return false;
            els[{index}].click();
            return true;
        }})()",
        sel = js_string(selector)
    )
}

/// `textContent` of the `index`th match, or null.
pub fn text_of_nth(selector: &str, index: usize) -> String {
    format!(
        r"(() => {{
            const els = document.querySelectorAll({sel});
            return els.length > {index} ? els[{index}].textContent : null;
        }})()",
        sel = js_string(selector)
    )
}

pub fn text_of(selector: &str) -> String {
    text_of_nth(selector, 0)
}

pub const FRAME_CONTENT: &str = r"(() => {
    const iframe = document.querySelector('iframe');
    return iframe ? iframe.srcdoc : null;
})()";

/// Blob references inside the content frame. Stylesheet links get a
/// `-stylesheet` suffix and image elements an `-image` suffix.
pub const FRAME_BLOB_REFS: &str = r"(() => {
    const iframe = document.querySelector('iframe');
    if (!iframe || !iframe.contentDocument) return [];
    const blobs = iframe.contentDocument.querySelectorAll('[src*=blob], [href*=blob]');
    return Array.from(blobs).map(el => {
        const tag = el.tagName.toLowerCase();
        if (el.hasAttribute('src')) {
            return tag === 'img' ? el.src + '-image' : el.src;
        }
        const href = typeof el.href === 'string' ? el.href : el.getAttribute('href');
        if (tag === 'image') return href + '-image';
        if (el.hasAttribute('rel') && el.type === 'text/css') return href + '-stylesheet';
        return href;
    }).filter(ref => typeof ref === 'string');
})()";

/// Fetch `url` in page context and resolve to `{ data }` (base64) or `{ error }`.
pub fn fetch_base64(url: &str) -> String {
    format!(
        r"(async () => {{
            try {{
                const response = await fetch({url}, {{ credentials: 'include' }});
                if (!response.ok) {{
                    return {{ error: `HTTP ${{response.status}}: ${{response.statusText}}` }};
                }}
                const bytes = new Uint8Array(await response.arrayBuffer());
                let binary = '';
                for (let i = 0; i < bytes.length; i += 0x8000) {{
                    binary += String.fromCharCode.apply(null, bytes.subarray(i, i + 0x8000));
                }}
                return {{ data: btoa(binary) }};
            }} catch (e) {{
                return {{ error: e.toString() }};
            }}
        }})()",
        url = js_string(url)
    )
}
