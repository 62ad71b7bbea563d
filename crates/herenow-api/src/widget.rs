//! Widget script generation.
//!
//! The instrumentation script served at /widget.js is rendered
//! per-request from this template: the deployment's API base address,
//! the domain allowlist, and the timing constants are baked into the
//! emitted JavaScript so the client heartbeat cadence always matches
//! the server's "now" window.
//!
//! The script itself is a small state machine. Each mount point (an
//! element carrying `data-herenow`) moves Unseen -> Initializing ->
//! Initialized; a failed initialization falls back to Unseen so the
//! next rescan retries it. In-flight elements are tracked in a WeakSet,
//! which expires automatically when an SPA unmounts the node.

use herenow_core::domains::DomainAllowlist;

/// Parameters baked into the emitted script.
#[derive(Debug, Clone)]
pub struct WidgetParams {
    /// Base URL the script calls back to (no trailing slash).
    pub api_base: String,
    /// Activity window in milliseconds; doubles as the heartbeat cadence.
    pub activity_window_ms: u64,
    /// Displayed-stats refresh interval in milliseconds.
    pub stats_refresh_ms: u64,
}

/// Render the widget script for one deployment.
pub fn render(params: &WidgetParams, allowlist: &DomainAllowlist) -> String {
    WIDGET_TEMPLATE
        .replace("__HERENOW_API__", &escape_js(&params.api_base))
        .replace("__ALLOWED_DOMAINS__", &js_string_array(allowlist.domains()))
        .replace(
            "__ACTIVITY_WINDOW_MS__",
            &params.activity_window_ms.to_string(),
        )
        .replace("__STATS_REFRESH_MS__", &params.stats_refresh_ms.to_string())
}

/// Escape a value for inclusion inside a single-quoted JS string.
fn escape_js(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

/// Build a JS array literal of single-quoted strings.
fn js_string_array(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("'{}'", escape_js(v)))
        .collect();
    format!("[{}]", quoted.join(", "))
}

const WIDGET_TEMPLATE: &str = r##"(function() {
  'use strict';

  // Bail out in non-browser environments (SSR).
  if (typeof window === 'undefined' || typeof document === 'undefined') {
    return;
  }

  var HERENOW_API = '__HERENOW_API__';
  var ALLOWED_DOMAINS = __ALLOWED_DOMAINS__;
  var ACTIVITY_WINDOW = __ACTIVITY_WINDOW_MS__;
  var STATS_REFRESH = __STATS_REFRESH_MS__;
  var NAVIGATION_DELAY = 100;
  var HYDRATION_DELAY = 500;

  var DEBUG = document.documentElement.hasAttribute('data-herenow-debug');
  var PREFIX = '[herenow]';

  function log() {
    if (DEBUG) {
      console.log.apply(console, [PREFIX].concat(Array.prototype.slice.call(arguments)));
    }
  }
  function warn() {
    console.warn.apply(console, [PREFIX].concat(Array.prototype.slice.call(arguments)));
  }
  function logError() {
    console.error.apply(console, [PREFIX].concat(Array.prototype.slice.call(arguments)));
  }

  // Mirror of the server-side allowlist check, including the
  // www-prefix equivalence. A disallowed host declines to run at all.
  function isDomainAllowed(domain) {
    if (ALLOWED_DOMAINS.indexOf(domain) !== -1) {
      return true;
    }
    if (domain.indexOf('www.') === 0) {
      return ALLOWED_DOMAINS.indexOf(domain.substring(4)) !== -1;
    }
    return false;
  }

  if (!isDomainAllowed(window.location.hostname)) {
    warn('Domain not allowed:', window.location.hostname);
    return;
  }

  var DOMAIN = window.location.hostname;
  log('Widget loading on domain:', DOMAIN);

  // In-flight initializations. A WeakSet never keeps a removed DOM
  // node alive, so SPA churn cannot leak entries.
  var initializing = new WeakSet();

  // Light/dark presentation from the document element, with a system
  // preference fallback.
  function isDarkMode() {
    if (document.documentElement.classList.contains('dark')) return true;
    if (document.documentElement.classList.contains('light')) return false;
    var theme = document.documentElement.getAttribute('data-theme');
    if (theme === 'dark') return true;
    if (theme === 'light') return false;
    return window.matchMedia && window.matchMedia('(prefers-color-scheme: dark)').matches;
  }

  // Stable per-browser visitor id, persisted across sessions.
  function getVisitorId() {
    var id = localStorage.getItem('herenow_user_id');
    if (!id) {
      id = 'user_' + Math.random().toString(36).substring(2) + '_' + Date.now().toString(36);
      localStorage.setItem('herenow_user_id', id);
      log('Generated new visitor id:', id);
    }
    return id;
  }

  // Session id scoped to one browser session.
  function getSessionId() {
    var id = sessionStorage.getItem('herenow_session_id');
    if (!id) {
      id = (window.crypto && crypto.randomUUID)
        ? crypto.randomUUID()
        : 'sess_' + Math.random().toString(36).substring(2);
      sessionStorage.setItem('herenow_session_id', id);
    }
    return id;
  }

  var lastActivity = 0;
  var lastStats = null;

  // Record one visit. Failures are logged and swallowed; the caller
  // decides whether the mount point stays retryable.
  async function trackVisit() {
    log('Tracking visit for path:', window.location.pathname);
    try {
      var response = await fetch(HERENOW_API + '/api/track', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({
          domain: DOMAIN,
          path: window.location.pathname,
          user_id: getVisitorId(),
          session_id: getSessionId()
        })
      });
      if (!response.ok) {
        logError('Tracking failed with status:', response.status);
        return false;
      }
      lastActivity = Date.now();
      return true;
    } catch (err) {
      logError('Tracking failed:', err);
      return false;
    }
  }

  // Fetch current stats; on failure return null so previously rendered
  // numbers stay in place rather than blanking.
  async function fetchStats() {
    try {
      var response = await fetch(
        HERENOW_API + '/api/stats?domain=' + encodeURIComponent(DOMAIN) +
        '&path=' + encodeURIComponent(window.location.pathname)
      );
      if (response.ok) {
        return await response.json();
      }
      logError('Stats fetch failed with status:', response.status);
    } catch (err) {
      logError('Stats fetch failed:', err);
    }
    return null;
  }

  function createSkeletonWidget() {
    var dark = isDarkMode();
    var colors = dark ? {
      bg: '#000', border: '#fff', numberText: '#fff', labelText: '#a1a1aa', pulse: '#fff'
    } : {
      bg: '#fff', border: '#000', numberText: '#000', labelText: '#374151', pulse: '#000'
    };

    var widget = document.createElement('div');
    widget.className = 'herenow-widget';
    widget.style.cssText =
      'display: inline-flex; align-items: stretch;' +
      "font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace;" +
      'font-size: 14px; border: 1px solid ' + colors.border + '; background: ' + colors.bg + ';';

    widget.innerHTML =
      '<div style="display: flex; align-items: center; gap: 4px; padding: 4px 8px;">' +
        '<span class="herenow-here-count" style="font-weight: 600; font-size: 16px; color: ' + colors.numberText + ';">&mdash;</span>' +
        '<span style="color: ' + colors.labelText + ';">here</span>' +
      '</div>' +
      '<div style="display: flex; align-items: center; gap: 4px; padding: 4px 8px; border-left: 1px solid ' + colors.border + ';">' +
        '<div style="width: 10px; height: 10px; background-color: ' + colors.pulse + '; animation: herenow-pulse 2s cubic-bezier(0.4, 0, 0.6, 1) infinite;"></div>' +
        '<span class="herenow-now-count" style="font-weight: 600; font-size: 16px; color: ' + colors.numberText + ';">&mdash;</span>' +
        '<span style="color: ' + colors.labelText + ';">now</span>' +
      '</div>';

    return widget;
  }

  function updateWidgetNumbers(stats) {
    if (!stats) return;
    lastStats = stats;
    document.querySelectorAll('.herenow-here-count').forEach(function(el) {
      el.textContent = stats.here;
    });
    document.querySelectorAll('.herenow-now-count').forEach(function(el) {
      el.textContent = stats.now;
    });
  }

  // Re-render every widget container with the last known stats. Used
  // for theme changes; does not hit the network.
  function rerenderWidgets() {
    document.querySelectorAll('.herenow-widget').forEach(function(old) {
      old.replaceWith(createSkeletonWidget());
    });
    updateWidgetNumbers(lastStats);
  }

  // Initialize one mount point. Re-entrancy is guarded two ways: the
  // data-herenow-initialized attribute marks completed elements, and
  // the WeakSet marks in-flight ones. The element is only marked
  // initialized after every step succeeded, so a failure leaves it
  // eligible for retry on the next scan.
  async function initializeElement(element) {
    if (!element || element.hasAttribute('data-herenow-initialized')) {
      log('Element already initialized, skipping');
      return;
    }
    if (initializing.has(element)) {
      log('Element already being initialized, skipping');
      return;
    }
    initializing.add(element);

    try {
      element.innerHTML = '';
      element.appendChild(createSkeletonWidget());
      log('Skeleton shown, loading data');

      // Visit first, then stats, so the fetched numbers reflect at
      // least this visitor's own event where server caching allows.
      var tracked = await trackVisit();
      if (!tracked) {
        return;
      }

      var stats = await fetchStats();
      if (!stats) {
        return;
      }
      updateWidgetNumbers(stats);

      element.setAttribute('data-herenow-initialized', 'true');
      log('Widget initialized');
    } catch (err) {
      logError('Failed to initialize widget:', err);
    } finally {
      initializing.delete(element);
    }
  }

  // Scan for mount points not yet initialized and not in flight.
  function rescan() {
    var elements = document.querySelectorAll('[data-herenow]:not([data-herenow-initialized])');
    log('Rescan found', elements.length, 'uninitialized elements');
    elements.forEach(function(element) {
      initializeElement(element);
    });
  }

  // Heartbeat: re-record the visit and refresh numbers, but never from
  // a hidden tab - a background tab must not inflate "now".
  async function sendHeartbeat() {
    if (document.hidden) {
      log('Page hidden, skipping heartbeat');
      return;
    }
    log('Sending presence heartbeat');
    await trackVisit();
    updateWidgetNumbers(await fetchStats());
  }

  // On return to a visible tab, treat it as a fresh burst of presence
  // only when the last recorded visit has aged out of the window.
  function handleVisibilityChange() {
    if (document.hidden) {
      return;
    }
    if (Date.now() - lastActivity >= ACTIVITY_WINDOW) {
      log('Returned to tab after window expiry, sending heartbeat');
      sendHeartbeat();
    } else {
      log('Returned to tab with recent activity, skipping');
    }
  }

  function init() {
    rescan();

    // Theme changes re-render with the last stats, no refetch.
    var themeObserver = new MutationObserver(function(mutations) {
      mutations.forEach(function(mutation) {
        if (mutation.type === 'attributes' &&
            (mutation.attributeName === 'class' || mutation.attributeName === 'data-theme')) {
          rerenderWidgets();
        }
      });
    });
    themeObserver.observe(document.documentElement, {
      attributes: true,
      attributeFilter: ['class', 'data-theme']
    });

    // Browser back/forward.
    window.addEventListener('popstate', function() {
      log('popstate detected');
      rescan();
    });

    // Programmatic SPA navigation: forward the original call first,
    // then rescan after a short delay so the new view has rendered.
    var originalPushState = history.pushState;
    var originalReplaceState = history.replaceState;
    history.pushState = function() {
      originalPushState.apply(this, arguments);
      setTimeout(rescan, NAVIGATION_DELAY);
    };
    history.replaceState = function() {
      originalReplaceState.apply(this, arguments);
      setTimeout(rescan, NAVIGATION_DELAY);
    };

    // Host pages may force a rescan explicitly.
    document.addEventListener('herenow-rescan', function() {
      log('Explicit rescan requested');
      rescan();
    });

    // Next.js router hook, when present.
    if (window.next && window.next.router && window.next.router.events &&
        window.next.router.events.on) {
      log('Next.js router detected');
      window.next.router.events.on('routeChangeComplete', rescan);
    }

    document.addEventListener('visibilitychange', handleVisibilityChange);

    // Keep-alive cadence equals the server's "now" window.
    setInterval(sendHeartbeat, ACTIVITY_WINDOW);

    // Displayed numbers stay fresh even when this visitor is idle.
    setInterval(async function() {
      updateWidgetNumbers(await fetchStats());
    }, STATS_REFRESH);
  }

  if (!document.getElementById('herenow-styles')) {
    var style = document.createElement('style');
    style.id = 'herenow-styles';
    style.textContent =
      '@keyframes herenow-pulse {' +
      '  0%, 100% { opacity: 1; }' +
      '  50% { opacity: .5; }' +
      '}';
    document.head.appendChild(style);
  }

  // Delay initial discovery past framework hydration so the first scan
  // does not race a client-side takeover of the DOM.
  function safeInit() {
    requestAnimationFrame(init);
  }

  if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', function() {
      setTimeout(safeInit, HYDRATION_DELAY);
    });
  } else {
    setTimeout(safeInit, HYDRATION_DELAY);
  }
})();
"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn make_allowlist() -> DomainAllowlist {
        DomainAllowlist::new(vec!["example.com".to_string(), "localhost".to_string()])
    }

    fn make_params() -> WidgetParams {
        WidgetParams {
            api_base: "https://api.herenow.fyi".to_string(),
            activity_window_ms: 300_000,
            stats_refresh_ms: 30_000,
        }
    }

    #[test]
    fn test_all_tokens_replaced() {
        let script = render(&make_params(), &make_allowlist());
        assert!(!script.contains("__HERENOW_API__"));
        assert!(!script.contains("__ALLOWED_DOMAINS__"));
        assert!(!script.contains("__ACTIVITY_WINDOW_MS__"));
        assert!(!script.contains("__STATS_REFRESH_MS__"));
    }

    #[test]
    fn test_config_values_baked_in() {
        let script = render(&make_params(), &make_allowlist());
        assert!(script.contains("var HERENOW_API = 'https://api.herenow.fyi';"));
        assert!(script.contains("var ALLOWED_DOMAINS = ['example.com', 'localhost'];"));
        assert!(script.contains("var ACTIVITY_WINDOW = 300000;"));
        assert!(script.contains("var STATS_REFRESH = 30000;"));
    }

    #[test]
    fn test_state_machine_markers_present() {
        let script = render(&make_params(), &make_allowlist());
        // Discovery and re-entrancy guards.
        assert!(script.contains("data-herenow"));
        assert!(script.contains("data-herenow-initialized"));
        assert!(script.contains("new WeakSet()"));
        // Navigation interception forwards the original call.
        assert!(script.contains("originalPushState.apply(this, arguments)"));
        assert!(script.contains("originalReplaceState.apply(this, arguments)"));
        // Visibility gating.
        assert!(script.contains("document.hidden"));
        assert!(script.contains("visibilitychange"));
    }

    #[test]
    fn test_endpoints_referenced() {
        let script = render(&make_params(), &make_allowlist());
        assert!(script.contains("/api/track"));
        assert!(script.contains("/api/stats"));
    }

    #[test]
    fn test_domains_escaped() {
        let allowlist = DomainAllowlist::new(vec!["it's.example".to_string()]);
        let script = render(&make_params(), &allowlist);
        assert!(script.contains(r"'it\'s.example'"));
    }

    #[test]
    fn test_js_string_array_empty() {
        assert_eq!(js_string_array(&[]), "[]");
    }
}
