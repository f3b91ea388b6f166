//! Automation fingerprint patches, installed before any page script runs.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is the first thing challenge scripts read
    r#"
    Object.defineProperty(Navigator.prototype, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // headless Chrome ships without window.chrome
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, app: {}, csi: () => {}, loadTimes: () => {} };
    }
    "#,
    r#"
    if (navigator.permissions && navigator.permissions.query) {
        const query = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (params) => (
            params && params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query(params)
        );
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chromium PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' }
        ],
        configurable: true
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // WebGL vendor strings give away SwiftShader
    r#"
    for (const ctx of [window.WebGLRenderingContext, window.WebGL2RenderingContext]) {
        if (!ctx) continue;
        const getParameter = ctx.prototype.getParameter;
        ctx.prototype.getParameter = function (p) {
            if (p === 37445) return 'Intel Inc.';
            if (p === 37446) return 'Intel Iris OpenGL Engine';
            return getParameter.call(this, p);
        };
    }
    "#,
];
