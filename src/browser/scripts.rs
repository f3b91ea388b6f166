//! In-page scripts evaluated by the session.

use std::time::Duration;

/// Current `document.readyState`.
pub const READY_STATE_SCRIPT: &str = "document.readyState";

/// Resolves `true` once the page is complete and no new resource entries
/// have appeared for a second, `false` when `timeout_ms` runs out.
pub fn quiescence_script(timeout: Duration) -> String {
    let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
    format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = 1000;
            const interval = 250;
            const count = () => {{
                try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }}
            }};
            const start = Date.now();
            let last = count();
            let stable = 0;
            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                const now = count();
                if (document.readyState === 'complete' && now === last) {{
                    stable += interval;
                    if (stable >= idleMs) return true;
                }} else {{
                    stable = 0;
                }}
                last = now;
            }}
            return false;
        }})()"#
    )
}

/// Write `token` into every challenge response field, fire the widget
/// callback if one is registered, then submit the enclosing form or
/// reload. Returns `"submitted"` or `"reloaded"`.
pub fn inject_token_script(token: &str) -> String {
    // serde_json gives a correctly escaped JS string literal
    let literal = serde_json::to_string(token).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
            const token = {literal};
            const names = ['cf-turnstile-response', 'g-recaptcha-response', 'h-captcha-response'];
            let field = null;
            for (const name of names) {{
                for (const el of document.querySelectorAll(`[name="${{name}}"]`)) {{
                    el.value = token;
                    field = field || el;
                }}
            }}
            if (!field) {{
                const host = document.querySelector('.cf-turnstile, [data-sitekey]');
                field = document.createElement('input');
                field.type = 'hidden';
                field.name = 'cf-turnstile-response';
                field.value = token;
                (host || document.body).appendChild(field);
            }}
            const widget = document.querySelector('[data-callback]');
            const callback = widget && window[widget.getAttribute('data-callback')];
            if (typeof callback === 'function') {{
                try {{ callback(token); }} catch (_) {{}}
            }}
            const form = field.closest('form');
            if (form) {{
                setTimeout(() => form.submit(), 0);
                return 'submitted';
            }}
            setTimeout(() => location.reload(), 0);
            return 'reloaded';
        }})()"#
    )
}

/// Click the first visible continue/verify style control.
pub const CLICK_CONTINUE_SCRIPT: &str = r#"(() => {
    const pattern = /continue|proceed|verify|i am human|i'm not a robot|submit/i;
    const candidates = document.querySelectorAll(
        'button, input[type="submit"], input[type="button"], a[role="button"], a'
    );
    for (const el of candidates) {
        const label = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim();
        if (!label || !pattern.test(label)) continue;
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) continue;
        el.click();
        return true;
    }
    return false;
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_escaped() {
        let script = inject_token_script("abc\"; alert(1); \"");
        assert!(script.contains(r#"const token = "abc\"; alert(1); \"";"#));
    }

    #[test]
    fn test_quiescence_timeout_inlined() {
        assert!(quiescence_script(Duration::from_secs(50)).contains("const timeoutMs = 50000;"));
    }
}
